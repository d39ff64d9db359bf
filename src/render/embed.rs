use serde_json::Value;

/// Field that tags structured results built by the `Tangle.*` helpers
pub const KIND_FIELD: &str = "$kind";

/// The `$kind` tag of an object result, if any
pub fn result_kind(value: &Value) -> Option<&str> {
    value.as_object()?.get(KIND_FIELD)?.as_str()
}

/// Markup supplied by the value itself, checked before any renderer
pub fn self_embed(value: &Value) -> Option<String> {
    if result_kind(value)? != "html" {
        return None;
    }
    value.get("html")?.as_str().map(str::to_string)
}

/// Inline-code rendering for values no renderer accepts.
///
/// Strings are shown as-is, everything else as compact JSON.
pub fn text_fallback(value: &Value) -> String {
    match value {
        Value::String(s) => format!("`{}`", s),
        other => format!("`{}`", other),
    }
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}
