//! Dynamic value model shared by resolution, filters and functions.
//!
//! Every value flowing through the interpreter is a [`serde_json::Value`]:
//! null, bool, number, string, ordered sequence or string-keyed map (the
//! `preserve_order` feature keeps map insertion order). Foreign types enter a
//! context through serde serialization, so structured values are always maps
//! by the time resolution sees them.

pub use serde_json::Value;

/// String-keyed, insertion-ordered map of values: the shape of every scope's
/// local bindings and of render contexts.
pub type Map = serde_json::Map<String, Value>;

/// Renders a value the way it appears in template output, before escaping.
/// Null renders as empty text; whole floats print without a fraction so that
/// arithmetic filters round-trip cleanly through templates.
pub fn display(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else if let Some(u) = n.as_u64() {
                u.to_string()
            } else {
                match n.as_f64() {
                    Some(f) if f.is_finite() && f == f.trunc() && f.abs() < 1e15 => {
                        format!("{}", f as i64)
                    }
                    _ => n.to_string(),
                }
            }
        }
        // Sequences and maps rarely reach display; compact JSON keeps the
        // output deterministic when they do.
        other => other.to_string(),
    }
}

/// Truthiness rules for bare `if` conditions: booleans as-is, strings true
/// when non-empty and not `"0"`, numeric zero false, null false, everything
/// else true.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty() && s != "0",
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        _ => true,
    }
}

/// Integer coercion used by comparison operators: numbers truncate, strings
/// parse as integers, anything else is zero.
pub fn to_i64(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Value::String(s) => s.trim().parse::<i64>().unwrap_or(0),
        _ => 0,
    }
}

/// Float coercion used by numeric filters.
pub fn to_f64(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Escapes HTML metacharacters for rendered output.
pub fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Whether a string parses as an integer or float.
pub fn is_numeric(s: &str) -> bool {
    s.parse::<i64>().is_ok() || s.parse::<f64>().is_ok()
}

/// Recognizes parse-time literals inside tags: a quoted string (quotes
/// stripped), an integer or a float. Returns `None` for anything that must
/// resolve through a context.
pub(crate) fn parse_literal(s: &str) -> Option<Value> {
    let b = s.as_bytes();
    if s.len() > 1
        && ((b[0] == b'"' && b[s.len() - 1] == b'"')
            || (b[0] == b'\'' && b[s.len() - 1] == b'\''))
    {
        return Some(Value::String(s[1..s.len() - 1].to_string()));
    }
    if let Ok(i) = s.parse::<i64>() {
        return Some(Value::from(i));
    }
    if let Ok(f) = s.parse::<f64>() {
        return serde_json::Number::from_f64(f).map(Value::Number);
    }
    None
}
