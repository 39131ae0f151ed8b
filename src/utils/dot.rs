//! Helpers for Graphviz DOT output.

/// Escapes a string for safe use in DOT format labels and identifiers.
///
/// Quotes, backslashes and angle brackets are escaped, newlines become `\n` and carriage
/// returns are dropped. Angle brackets mostly come from generic instantiations in
/// signatures.
///
/// # Examples
///
/// ```rust
/// use secscope::utils::escape_dot;
///
/// assert_eq!(escape_dot("List`1<T>"), "List`1\\<T\\>");
/// ```
#[must_use]
pub fn escape_dot(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "")
        .replace('<', "\\<")
        .replace('>', "\\>")
}
