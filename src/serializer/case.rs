//! Identifier case conversion
//!
//! Internal field names are snake_case, wire documents are camelCase. The two
//! functions are mutually inverse for simple identifiers (no leading, trailing
//! or doubled underscores), which is what keeps serialize-then-deserialize
//! lossless.

/// `tokens_revoked_at` → `tokensRevokedAt`
pub fn snake_to_camel(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut upper_next = false;
    for ch in input.chars() {
        if ch == '_' {
            upper_next = true;
        } else if upper_next {
            out.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}

/// `tokensRevokedAt` → `tokens_revoked_at`
pub fn camel_to_snake(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 4);
    for ch in input.chars() {
        if ch.is_ascii_uppercase() {
            out.push('_');
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}
