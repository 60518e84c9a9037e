//! SQL identifier validation, quoting and sanitization.
//!
//! Relation and attribute names reach SQL text unparameterized, so every name
//! is either validated up front (definitions, schema descriptors) or quoted
//! when rendered.

use regex::Regex;
use std::sync::LazyLock;

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid")
});

/// Check whether `name` is a plain SQL identifier (letters, digits, underscore;
/// not starting with a digit).
///
/// # Examples
///
/// ```
/// use sqlassoc_core::is_valid_identifier;
///
/// assert!(is_valid_identifier("task_tags"));
/// assert!(!is_valid_identifier("1tags"));
/// assert!(!is_valid_identifier("tags; DROP TABLE users"));
/// ```
pub fn is_valid_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

/// Quote a SQL identifier using ANSI double-quoting.
///
/// Embedded double-quotes are escaped by doubling them (`"` → `""`).
///
/// # Examples
///
/// ```
/// use sqlassoc_core::quote_ident;
///
/// assert_eq!(quote_ident("users"), "\"users\"");
/// assert_eq!(quote_ident("user\"name"), "\"user\"\"name\"");
/// ```
#[inline]
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a SQL identifier using MySQL backtick quoting.
///
/// ```
/// use sqlassoc_core::quote_ident_mysql;
///
/// assert_eq!(quote_ident_mysql("user`name"), "`user``name`");
/// ```
#[inline]
pub fn quote_ident_mysql(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Sanitize a SQL identifier by removing non-alphanumeric/underscore characters.
///
/// Used where quoting is not possible (e.g. SQLite PRAGMA arguments).
#[inline]
pub fn sanitize_identifier(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect()
}
