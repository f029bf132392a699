//! The `print` builtin and its HTML escaping.

use crate::error::EvalResult;
use stencil_types::Value;

/// Concatenate print arguments and escape the result.
///
/// Strings are used as-is; any other value is written as JSON text.
pub fn print_values(values: &[Value]) -> EvalResult<String> {
    let mut joined = String::new();
    for value in values {
        match value {
            Value::String(s) => joined.push_str(s),
            other => joined.push_str(&serde_json::to_string(other)?),
        }
    }
    Ok(escape_html(&joined))
}

/// Replace `&`, `<` and `>` with numeric character references.
///
/// One left-to-right pass; replacement text is never re-scanned, so `&`
/// becomes `&#38;` exactly once. Quotes pass through unchanged.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' | '<' | '>' => {
                out.push_str("&#");
                out.push_str(&u32::from(ch).to_string());
                out.push(';');
            }
            _ => out.push(ch),
        }
    }
    out
}
