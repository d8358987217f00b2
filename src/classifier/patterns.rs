//! Pattern tables for error classification
//!
//! Tables are plain data compiled once and handed to the classifier, so
//! tests can swap in their own. Family order matters: the first family
//! with a matching pattern classifies the line.

use crate::classifier::types::ErrorType;
use crate::errors::Result;
use regex::Regex;

/// Markers that open a new error block
pub const FAILURE_MARKERS: [&str; 3] = ["FAIL", "✕", "×"];

/// Built-in message shapes per error family, in table order
pub const BUILTIN_FAMILIES: &[(ErrorType, &[&str])] = &[
    (
        ErrorType::Import,
        &[
            r#"Cannot find module ['"]([^'"]+)['"]"#,
            r#"Module not found: (?:Error: )?Can't resolve ['"]([^'"]+)['"]"#,
            r#"Failed to resolve import ['"]([^'"]+)['"]"#,
            r#"Unable to resolve path to module ['"]([^'"]+)['"]"#,
        ],
    ),
    (
        ErrorType::Export,
        &[
            r#"does not provide an export named ['"]([^'"]+)['"]"#,
            r#"has no exported member (?:named )?['"]([^'"]+)['"]"#,
            r#"['"]([^'"]+)['"] is not exported (?:by|from)"#,
            r#"(?:has no|does not contain a) default export"#,
        ],
    ),
    (
        ErrorType::Typescript,
        &[
            r#"Type ['"]([^'"]+)['"] is not assignable to type ['"]([^'"]+)['"]"#,
            r#"Property ['"]([^'"]+)['"] does not exist on type ['"]([^'"]+)['"]"#,
            r#"Property ['"]([^'"]+)['"] is missing in type"#,
            r#"['"]?([\w.]+)['"]? is possibly ['"]?(null|undefined)['"]?"#,
            r#"Object is possibly ['"]?(null|undefined)['"]?"#,
        ],
    ),
    (
        ErrorType::Database,
        &[
            r#"Table ['"`]?([\w.]+)['"`]? doesn't exist"#,
            r#"relation ['"]?([\w.]+)['"]? does not exist"#,
            r#"no such table: ([\w.]+)"#,
            r#"Unknown column ['"`]?([\w.]+)['"`]?"#,
            r#"column ['"]?([\w.]+)['"]? does not exist"#,
            r#"no such column: ([\w.]+)"#,
        ],
    ),
    (
        ErrorType::React,
        &[
            r#"Warning: Failed prop type: (.+)"#,
            r#"Each child in a list should have a unique ['"]?(key)['"]? prop"#,
            r#"React Hook (\w+) has (?:a )?missing dependenc(?:y|ies)"#,
            r#"React Hook ['"]?(\w+)['"]? is called conditionally"#,
            r#"Invalid hook call"#,
            r#"Cannot read propert(?:y|ies) of (undefined|null) \(reading ['"]([^'"]+)['"]\)"#,
            r#"Cannot read property ['"]([^'"]+)['"] of (undefined|null)"#,
        ],
    ),
    (
        ErrorType::Syntax,
        &[
            r#"SyntaxError: (.+)"#,
            r#"Unexpected token(?: ['"]?([^'"\s]+)['"]?)?"#,
            r#"Unterminated (?:string constant|template literal|regular expression)"#,
            r#"Expected ['"]([^'"]+)['"] but found ['"]([^'"]+)['"]"#,
        ],
    ),
    (
        ErrorType::Testing,
        &[
            r#"expect\((\w+)\)\.(\w+)\("#,
            r#"AssertionError: (.+)"#,
            r#"Unable to find (?:an element|role) (?:with|by)?\s*(.+)"#,
            r#"TestingLibraryElementError: (.+)"#,
        ],
    ),
];

/// Path shapes that name the failing file, in priority order
pub const BUILTIN_FILE_PATTERNS: &[&str] = &[
    r#"(?:FAIL|✕|×)\s+(\S+\.(?:[cm]?[jt]sx?|vue|svelte))"#,
    r#"Error in (\S+\.(?:[cm]?[jt]sx?|vue|svelte))"#,
    r#"\(([^\s()]+\.(?:[cm]?[jt]sx?)):\d+:\d+\)"#,
    r#"([\w./@-]+\.(?:test|spec)\.[cm]?[jt]sx?)"#,
];

/// `at fn (path:line:col)` or bare `at path:line:col`
pub const BUILTIN_STACK_FRAME: &str = r#"^\s*at\s+(?:.*?\()?([^\s()]+?):(\d+):(\d+)\)?\s*$"#;

/// One pattern family
#[derive(Debug, Clone)]
pub struct PatternFamily {
    pub error_type: ErrorType,
    pub patterns: Vec<Regex>,
}

/// Compiled, read-only classification tables
#[derive(Debug, Clone)]
pub struct PatternTable {
    families: Vec<PatternFamily>,
    file_patterns: Vec<Regex>,
    stack_frame: Regex,
}

/// Result of a successful classification attempt
#[derive(Debug, Clone, PartialEq)]
pub struct PatternMatch {
    pub error_type: ErrorType,
    pub captures: Vec<String>,
}

/// Parsed stack frame location
#[derive(Debug, Clone, PartialEq)]
pub struct FrameLocation {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl PatternTable {
    /// Compile the built-in tables
    pub fn builtin() -> Result<Self> {
        Self::from_specs(BUILTIN_FAMILIES, BUILTIN_FILE_PATTERNS, BUILTIN_STACK_FRAME)
    }

    /// Compile custom tables
    pub fn from_specs(
        families: &[(ErrorType, &[&str])],
        file_patterns: &[&str],
        stack_frame: &str,
    ) -> Result<Self> {
        let families = families
            .iter()
            .map(|(error_type, sources)| {
                let patterns = sources
                    .iter()
                    .map(|s| Regex::new(s))
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(PatternFamily {
                    error_type: *error_type,
                    patterns,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let file_patterns = file_patterns
            .iter()
            .map(|s| Regex::new(s))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Self {
            families,
            file_patterns,
            stack_frame: Regex::new(stack_frame)?,
        })
    }

    /// Families in declaration order
    pub fn families(&self) -> &[PatternFamily] {
        &self.families
    }

    /// Whether a line opens a new error block
    pub fn is_failure_marker(&self, line: &str) -> bool {
        FAILURE_MARKERS.iter().any(|m| line.contains(m))
    }

    /// First family/pattern in table order that matches anywhere in `line`
    pub fn classify(&self, line: &str) -> Option<PatternMatch> {
        for family in &self.families {
            for pattern in &family.patterns {
                if let Some(caps) = pattern.captures(line) {
                    let captures = caps
                        .iter()
                        .skip(1)
                        .flatten()
                        .map(|m| m.as_str().to_string())
                        .collect();
                    return Some(PatternMatch {
                        error_type: family.error_type,
                        captures,
                    });
                }
            }
        }
        None
    }

    /// First file path named on a marker line
    pub fn extract_file(&self, line: &str) -> Option<String> {
        self.file_patterns.iter().find_map(|pattern| {
            pattern
                .captures(line)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string())
        })
    }

    /// Location from a stack frame line
    pub fn extract_frame(&self, line: &str) -> Option<FrameLocation> {
        let caps = self.stack_frame.captures(line)?;
        let file = caps.get(1)?.as_str().to_string();
        let line_no = caps.get(2)?.as_str().parse().ok()?;
        let column = caps.get(3)?.as_str().parse().ok()?;
        Some(FrameLocation {
            file,
            line: line_no,
            column,
        })
    }
}
