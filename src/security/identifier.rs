//! SQL identifier allow-listing (spec §4.1).
//!
//! Connectors that interpolate identifiers directly into SQL text (table
//! names, column names for connectors whose wire protocol has no bind-
//! parameter support for identifiers) MUST validate through
//! [`validate_identifier`] first. Bind parameters handle *values*; this
//! handles the one class of injection that bind parameters cannot, the
//! identifier itself.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use super::SecurityError;

/// ANSI SQL:2016 + common vendor extensions, uppercase. Callers with a
/// vendor-specific or narrower list can pass their own `reserved` set to
/// [`validate_identifier_with_reserved`] instead of relying on this default.
const DEFAULT_RESERVED: &[&str] = &[
    "SELECT", "INSERT", "UPDATE", "DELETE", "DROP", "CREATE", "ALTER", "TABLE", "FROM", "WHERE",
    "JOIN", "UNION", "GRANT", "REVOKE", "EXEC", "EXECUTE", "TRUNCATE", "INTO", "VALUES", "SET",
    "AND", "OR", "NOT", "NULL", "TRUE", "FALSE", "PRIMARY", "KEY", "FOREIGN", "REFERENCES",
    "INDEX", "VIEW", "TRIGGER", "PROCEDURE", "FUNCTION", "DATABASE", "SCHEMA", "USER", "ROLE",
    "ORDER", "GROUP", "BY", "HAVING", "LIMIT", "OFFSET", "DISTINCT", "AS", "ON", "IN", "IS",
    "LIKE", "BETWEEN", "CASE", "WHEN", "THEN", "ELSE", "END",
];

fn identifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("static regex is valid"))
}

/// Validate `ident` against the shape rule and the default reserved-word list.
pub fn validate_identifier(ident: &str) -> Result<(), SecurityError> {
    let reserved: HashSet<&str> = DEFAULT_RESERVED.iter().copied().collect();
    validate_identifier_with_reserved(ident, &reserved)
}

/// Validate `ident` against the shape rule and a caller-supplied reserved-word
/// set, case-insensitively.
pub fn validate_identifier_with_reserved(ident: &str, reserved: &HashSet<&str>) -> Result<(), SecurityError> {
    if ident.is_empty() {
        return Err(SecurityError::EmptyIdentifier);
    }
    if !identifier_re().is_match(ident) {
        return Err(SecurityError::InvalidIdentifierShape(ident.to_string()));
    }
    if reserved.contains(ident.to_uppercase().as_str()) {
        return Err(SecurityError::ReservedIdentifier(ident.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_identifier() {
        assert_eq!(validate_identifier(""), Err(SecurityError::EmptyIdentifier));
    }

    #[test]
    fn rejects_identifier_with_injected_sql() {
        let err = validate_identifier("users; DROP TABLE users--").unwrap_err();
        assert!(matches!(err, SecurityError::InvalidIdentifierShape(_)));
    }

    #[test]
    fn rejects_identifier_starting_with_digit() {
        let err = validate_identifier("1users").unwrap_err();
        assert!(matches!(err, SecurityError::InvalidIdentifierShape(_)));
    }

    #[test]
    fn rejects_reserved_word_case_insensitively() {
        let err = validate_identifier("select").unwrap_err();
        assert!(matches!(err, SecurityError::ReservedIdentifier(_)));
        let err = validate_identifier("DROP").unwrap_err();
        assert!(matches!(err, SecurityError::ReservedIdentifier(_)));
    }

    #[test]
    fn accepts_ordinary_identifier() {
        assert!(validate_identifier("customer_orders_2024").is_ok());
    }

    #[test]
    fn accepts_underscore_prefixed_identifier() {
        assert!(validate_identifier("_internal_table").is_ok());
    }

    #[test]
    fn custom_reserved_set_overrides_default() {
        let mut custom: HashSet<&str> = HashSet::new();
        custom.insert("KEYSPACE");
        assert!(validate_identifier_with_reserved("select", &custom).is_ok());
        assert_eq!(
            validate_identifier_with_reserved("keyspace", &custom),
            Err(SecurityError::ReservedIdentifier("keyspace".to_string()))
        );
    }
}
