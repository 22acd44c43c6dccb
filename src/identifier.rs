//! Quoting and validation of SQL Server identifiers that end up in generated statement text.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Result, SqlModelError};

// One to three dot-separated parts, each bracketed or a plain word.
static OBJECT_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\[[^\]]+\]|[A-Za-z_#@][A-Za-z0-9_#@$]*)(?:\.(?:\[[^\]]+\]|[A-Za-z_#@][A-Za-z0-9_#@$]*)){0,2}$")
        .expect("object name pattern compiles")
});

/// Wrap a single identifier in brackets, doubling any closing bracket.
#[must_use]
pub fn quote(name: &str) -> String {
    format!("[{}]", name.replace(']', "]]"))
}

/// Parameter names may not contain characters that would end the `@name` token.
///
/// # Errors
///
/// Returns [`SqlModelError::Validation`] for empty names or names with characters other
/// than letters, digits, `_`, `#`, `@` or `$`.
pub fn check_param_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '#' | '@' | '$'));
    if valid {
        Ok(())
    } else {
        Err(SqlModelError::validation(format!(
            "{name:?} cannot be used as a parameter name"
        )))
    }
}

/// Check a possibly schema-qualified object name such as `[dbo].[GetAccount]` or `dbo.GetAccount`.
///
/// # Errors
///
/// Returns [`SqlModelError::Validation`] when the name is not a well-formed object name.
pub fn check_object_name(name: &str) -> Result<()> {
    if OBJECT_NAME.is_match(name) {
        Ok(())
    } else {
        Err(SqlModelError::validation(format!(
            "{name:?} is not a valid object name"
        )))
    }
}
