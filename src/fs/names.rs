//! Validation of names that become single path components.

use crate::error::{Result, SmError};

/// Names become path components: no empty names, no leading dot, no separator.
///
/// The leading-dot rule keeps caller names from colliding with reserved
/// entries such as the nil lock namespace or in-flight temporary files.
pub fn validate_component(what: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(SmError::InvalidName(format!("{} must be non-empty", what)));
    }
    if value.starts_with('.') {
        return Err(SmError::InvalidName(format!(
            "{} '{}' must not start with '.'",
            what, value
        )));
    }
    if value.contains(std::path::MAIN_SEPARATOR) || value.contains('\0') {
        return Err(SmError::InvalidName(format!(
            "{} '{}' must not contain a path separator",
            what, value
        )));
    }
    Ok(())
}
