//! Pre-flight patch validation

use crate::errors::{PatchError, Result};
use crate::strategies::PatchCandidate;

/// Check every edit names a file, has exactly one shape, and targets a file
/// that exists right now
pub fn validate_patch(patch: &PatchCandidate) -> Result<()> {
    for (idx, edit) in patch.changes.iter().enumerate() {
        if edit.file.as_os_str().is_empty() {
            return Err(PatchError::Validation(format!(
                "edit {} of {} names no file",
                idx + 1,
                patch.strategy
            )));
        }

        edit.operation()?;

        if !edit.file.is_file() {
            return Err(PatchError::Validation(format!(
                "target file does not exist: {}",
                edit.file.display()
            )));
        }
    }
    Ok(())
}
