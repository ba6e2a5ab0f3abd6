//! Small helpers shared across modules.

/// True when `value` is empty or only whitespace.
pub fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}
