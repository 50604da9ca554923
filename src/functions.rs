//! Function registry types and call-argument handling.
//!
//! Functions are named callables invoked by call-expressions inside tags,
//! e.g. `{{ getProducts() }}` or `{{ trans("cart.items", ctx, count) }}`.
//! They receive already-resolved values and return a raw value.

use std::sync::Arc;

use crate::value::Value;

/// A registered template function: `(...args) -> value`.
pub type FunctionFn = Arc<dyn Fn(&[Value]) -> Value + Send + Sync>;

/// A registered filter: `(value, ...args) -> value`.
pub type FilterFn = Arc<dyn Fn(&Value, &[Value]) -> Value + Send + Sync>;

/// Splits a call-argument list on commas, treating commas inside quoted
/// strings (and backslash-escaped quotes) as literal characters.
pub(crate) fn split_args(s: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut quote_char = '\0';
    let mut prev = '\0';
    for c in s.chars() {
        if (c == '"' || c == '\'') && prev != '\\' {
            if in_quotes && c == quote_char {
                in_quotes = false;
            } else if !in_quotes {
                in_quotes = true;
                quote_char = c;
            }
            current.push(c);
        } else if c == ',' && !in_quotes {
            args.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
        prev = c;
    }
    if !current.is_empty() {
        args.push(current);
    }
    args
}

/// Coerces textual filter arguments into values: quoted strings lose their
/// quotes, integers and floats become numbers, the rest stay as raw strings.
pub(crate) fn parse_filter_args(args: &[String]) -> Vec<Value> {
    args.iter()
        .map(|arg| {
            let b = arg.as_bytes();
            if arg.len() > 1
                && ((b[0] == b'"' && b[arg.len() - 1] == b'"')
                    || (b[0] == b'\'' && b[arg.len() - 1] == b'\''))
            {
                Value::String(arg[1..arg.len() - 1].to_string())
            } else if let Ok(i) = arg.parse::<i64>() {
                Value::from(i)
            } else if let Ok(f) = arg.parse::<f64>() {
                serde_json::Number::from_f64(f)
                    .map(Value::Number)
                    .unwrap_or_else(|| Value::String(arg.clone()))
            } else {
                Value::String(arg.clone())
            }
        })
        .collect()
}
