//! Metric key normalization (component A).
//!
//! Deterministic, pure, side-effect free: drop illegal bytes, fold `/` into
//! `-`, collapse whitespace runs into a single `_`.

/// Normalize a raw metric key into its canonical storage form.
///
/// Applied in order: (1) drop every byte not in `[A-Za-z0-9._-]`, except
/// whitespace and `/` which are handled by the following two steps; (2)
/// replace `/` with `-`; (3) collapse runs of whitespace to a single `_`.
pub fn normalize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '/' {
            out.push('-');
        } else if c.is_whitespace() {
            out.push('_');
            while matches!(chars.peek(), Some(c) if c.is_whitespace()) {
                chars.next();
            }
        } else if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
            out.push(c);
        }
        // every other byte is dropped silently
    }

    out
}
