//! Shared validation predicates for domain types.
//!
//! Entity names and aliases end up in partition names and in bound SQL
//! parameters, so they are restricted to a conservative identifier alphabet.

/// Validation predicate: ASCII letters, digits and underscores, not starting
/// with a digit.
pub(crate) fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
