//! Database-family strategies
//!
//! Schema changes are never applied automatically; both strategies only
//! advise.

use crate::classifier::ErrorRecord;
use crate::errors::Result;
use crate::strategies::registry::StrategyContext;
use crate::strategies::text::to_snake_case;
use crate::strategies::types::{PatchCandidate, StrategyId};

fn is_column_error(error: &ErrorRecord) -> bool {
    error
        .trigger_line
        .as_deref()
        .map(|line| line.to_lowercase().contains("column"))
        .unwrap_or(false)
}

/// Drop a schema qualifier (`public.user` -> `user`)
fn unqualified(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}

/// fixTableNames
pub fn fix_table_names(error: &ErrorRecord, ctx: &StrategyContext) -> Result<Option<PatchCandidate>> {
    if is_column_error(error) {
        return Ok(None);
    }
    let Some(table) = error.first_match().map(unqualified) else {
        return Ok(None);
    };
    let Some(plural) = ctx.plural_table(table) else {
        return Ok(None);
    };

    Ok(Some(PatchCandidate::suggestion(
        error,
        StrategyId::FixTableNames,
        0.6,
        format!("Consider using table name '{}' instead of '{}'", plural, table),
    )))
}

/// fixColumnNames
pub fn fix_column_names(error: &ErrorRecord, _ctx: &StrategyContext) -> Result<Option<PatchCandidate>> {
    if !is_column_error(error) {
        return Ok(None);
    }
    let Some(column) = error.first_match().map(unqualified) else {
        return Ok(None);
    };
    let snake = to_snake_case(column);
    if snake == column {
        return Ok(None);
    }

    Ok(Some(PatchCandidate::suggestion(
        error,
        StrategyId::FixColumnNames,
        0.5,
        format!("Consider using column name '{}' instead of '{}'", snake, column),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::ErrorType;

    fn db_error(name: &str, line: &str) -> ErrorRecord {
        let mut error = ErrorRecord::new("FAIL src/x.test.ts", Some("src/x.test.ts".into()));
        error.classify(ErrorType::Database, vec![name.to_string()], line);
        error
    }

    #[test]
    fn test_table_name_suggestion() {
        let ctx = StrategyContext::new("/tmp");
        let patch = fix_table_names(&db_error("user", "Table 'user' doesn't exist"), &ctx)
            .unwrap()
            .unwrap();
        assert!(patch.changes.is_empty());
        assert_eq!(patch.confidence, 0.6);
        assert_eq!(
            patch.suggestion.as_deref(),
            Some("Consider using table name 'users' instead of 'user'")
        );
    }

    #[test]
    fn test_table_name_schema_qualified() {
        let ctx = StrategyContext::new("/tmp");
        let patch = fix_table_names(
            &db_error("public.Guest", r#"relation "public.Guest" does not exist"#),
            &ctx,
        )
        .unwrap()
        .unwrap();
        assert!(patch.suggestion.unwrap().contains("'guests'"));
    }

    #[test]
    fn test_table_unknown_declines() {
        let ctx = StrategyContext::new("/tmp");
        assert!(fix_table_names(&db_error("users", "no such table: users"), &ctx)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_column_suggestion() {
        let ctx = StrategyContext::new("/tmp");
        let error = db_error("createdAt", "Unknown column 'createdAt' in 'field list'");
        assert!(fix_table_names(&error, &ctx).unwrap().is_none());

        let patch = fix_column_names(&error, &ctx).unwrap().unwrap();
        assert_eq!(patch.confidence, 0.5);
        assert!(patch.suggestion.unwrap().contains("'created_at'"));
    }
}
