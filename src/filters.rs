//! Builtin filter library.
//!
//! Filters are total functions over the dynamic value model: a filter never
//! errors, it transforms what it understands and passes everything else
//! through unchanged. Timestamps enter templates as RFC 3339 strings; the
//! `date` and `humanize` filters parse them on the fly.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, FixedOffset, Utc};
use regex::Regex;

use crate::functions::FilterFn;
use crate::value::{self, Value};

fn arg_str(args: &[Value], idx: usize, default: &str) -> String {
    args.get(idx).map(value::display).unwrap_or_else(|| default.to_string())
}

fn arg_i64(args: &[Value], idx: usize, default: i64) -> i64 {
    args.get(idx).map(value::to_i64).unwrap_or(default)
}

fn number(f: f64) -> Value {
    if f == f.trunc() && f.abs() < 1e15 {
        Value::from(f as i64)
    } else {
        serde_json::Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
    }
}

fn parse_time(val: &Value) -> Option<DateTime<FixedOffset>> {
    match val {
        Value::String(s) => DateTime::parse_from_rfc3339(s.trim()).ok(),
        _ => None,
    }
}

fn pad_right(s: String, width: usize) -> String {
    let len = s.chars().count();
    if len >= width {
        s
    } else {
        let mut out = s;
        out.extend(std::iter::repeat(' ').take(width - len));
        out
    }
}

fn filter(f: impl Fn(&Value, &[Value]) -> Value + Send + Sync + 'static) -> FilterFn {
    Arc::new(f)
}

/// The filter table installed by `Engine::new`.
pub(crate) fn default_filters() -> HashMap<String, FilterFn> {
    let mut m: HashMap<String, FilterFn> = HashMap::new();

    m.insert(
        "upper".into(),
        filter(|val, _| Value::String(value::display(val).to_uppercase())),
    );
    m.insert(
        "lower".into(),
        filter(|val, _| Value::String(value::display(val).to_lowercase())),
    );
    m.insert(
        "length".into(),
        filter(|val, _| match val {
            Value::String(s) => Value::from(s.chars().count() as i64),
            Value::Array(items) => Value::from(items.len() as i64),
            _ => Value::from(0),
        }),
    );
    m.insert(
        "trim".into(),
        filter(|val, _| Value::String(value::display(val).trim().to_string())),
    );
    m.insert(
        "title".into(),
        filter(|val, _| {
            let s = value::display(val);
            let titled: Vec<String> = s
                .split(' ')
                .map(|word| {
                    let mut chars = word.chars();
                    match chars.next() {
                        Some(first) => {
                            first.to_uppercase().collect::<String>() + chars.as_str()
                        }
                        None => String::new(),
                    }
                })
                .collect();
            Value::String(titled.join(" "))
        }),
    );
    m.insert(
        "reverse".into(),
        filter(|val, _| Value::String(value::display(val).chars().rev().collect())),
    );
    m.insert(
        "default".into(),
        filter(|val, args| {
            if value::display(val).is_empty() {
                if let Some(fallback) = args.first() {
                    return fallback.clone();
                }
            }
            val.clone()
        }),
    );
    // Identity: its presence in a chain disables HTML escaping.
    m.insert("safe".into(), filter(|val, _| val.clone()));
    m.insert(
        "date".into(),
        filter(|val, args| {
            let format = arg_str(args, 0, "%Y-%m-%d");
            match parse_time(val) {
                Some(t) => Value::String(t.format(&format).to_string()),
                None => val.clone(),
            }
        }),
    );
    m.insert(
        "join".into(),
        filter(|val, args| {
            let sep = arg_str(args, 0, ",");
            match val {
                Value::Array(items) => {
                    let parts: Vec<String> = items.iter().map(value::display).collect();
                    Value::String(parts.join(&sep))
                }
                _ => val.clone(),
            }
        }),
    );
    m.insert(
        "add".into(),
        filter(|val, args| match args.first() {
            Some(rhs) => number(value::to_f64(val) + value::to_f64(rhs)),
            None => val.clone(),
        }),
    );
    m.insert(
        "money".into(),
        filter(|val, _| match val {
            Value::Number(n) => match n.as_i64() {
                Some(i) => Value::String(i.to_string()),
                None => Value::String(format!("{:.2}", n.as_f64().unwrap_or(0.0))),
            },
            _ => val.clone(),
        }),
    );
    m.insert(
        "truncate".into(),
        filter(|val, args| {
            let limit = arg_i64(args, 0, 10).max(0) as usize;
            let s = value::display(val);
            if s.chars().count() > limit {
                let cut: String = s.chars().take(limit).collect();
                Value::String(cut + "...")
            } else {
                Value::String(s)
            }
        }),
    );
    m.insert(
        "slice".into(),
        filter(|val, args| {
            let start = arg_i64(args, 0, 0).max(0) as usize;
            let end = arg_i64(args, 1, 0).max(0) as usize;
            match val {
                Value::Array(items) => {
                    let end = if end == 0 || end > items.len() { items.len() } else { end };
                    if start < end {
                        Value::Array(items[start..end].to_vec())
                    } else {
                        val.clone()
                    }
                }
                _ => {
                    let chars: Vec<char> = value::display(val).chars().collect();
                    let end = if end == 0 || end > chars.len() { chars.len() } else { end };
                    if start < end {
                        Value::String(chars[start..end].iter().collect())
                    } else {
                        val.clone()
                    }
                }
            }
        }),
    );
    m.insert(
        "replace".into(),
        filter(|val, args| {
            if args.len() < 2 {
                return val.clone();
            }
            let from = value::display(&args[0]);
            let to = value::display(&args[1]);
            Value::String(value::display(val).replace(&from, &to))
        }),
    );
    m.insert("abs".into(), filter(|val, _| number(value::to_f64(val).abs())));
    m.insert(
        "yesno".into(),
        filter(|val, args| {
            let yes = arg_str(args, 0, "yes");
            let no = arg_str(args, 1, "no");
            Value::String(if value::truthy(val) { yes } else { no })
        }),
    );
    m.insert(
        "sort".into(),
        filter(|val, _| {
            let Value::Array(items) = val else { return val.clone() };
            match items.first() {
                Some(Value::String(_)) => {
                    let mut sorted: Vec<String> = items.iter().map(value::display).collect();
                    sorted.sort();
                    Value::Array(sorted.into_iter().map(Value::String).collect())
                }
                Some(Value::Number(_)) => {
                    let mut sorted = items.clone();
                    sorted.sort_by(|a, b| {
                        value::to_f64(a)
                            .partial_cmp(&value::to_f64(b))
                            .unwrap_or(std::cmp::Ordering::Equal)
                    });
                    Value::Array(sorted)
                }
                _ => val.clone(),
            }
        }),
    );
    m.insert(
        "uniq".into(),
        filter(|val, _| {
            let Value::Array(items) = val else { return val.clone() };
            let mut seen: Vec<Value> = Vec::with_capacity(items.len());
            for item in items {
                if !seen.contains(item) {
                    seen.push(item.clone());
                }
            }
            Value::Array(seen)
        }),
    );
    m.insert(
        "split".into(),
        filter(|val, args| {
            let sep = arg_str(args, 0, ",");
            let parts = value::display(val)
                .split(&sep)
                .map(|p| Value::String(p.to_string()))
                .collect();
            Value::Array(parts)
        }),
    );
    m.insert(
        "slugify".into(),
        filter(|val, _| {
            static NON_SLUG: OnceLock<Regex> = OnceLock::new();
            let re = NON_SLUG.get_or_init(|| {
                Regex::new("[^a-z0-9]+").unwrap_or_else(|_| unreachable!())
            });
            let mut s = value::display(val).to_lowercase();
            for (from, to) in [("ç", "c"), ("ğ", "g"), ("ı", "i"), ("ö", "o"), ("ş", "s"), ("ü", "u")] {
                s = s.replace(from, to);
            }
            let s = re.replace_all(&s, "-");
            Value::String(s.trim_matches('-').to_string())
        }),
    );
    m.insert(
        "startswith".into(),
        filter(|val, args| match args.first() {
            Some(prefix) => {
                Value::Bool(value::display(val).starts_with(&value::display(prefix)))
            }
            None => Value::Bool(false),
        }),
    );
    m.insert(
        "endswith".into(),
        filter(|val, args| match args.first() {
            Some(suffix) => {
                Value::Bool(value::display(val).ends_with(&value::display(suffix)))
            }
            None => Value::Bool(false),
        }),
    );
    m.insert(
        "pad".into(),
        filter(|val, args| {
            let width = arg_i64(args, 0, 0).max(0) as usize;
            Value::String(pad_right(value::display(val), width))
        }),
    );
    m.insert(
        "ljust".into(),
        filter(|val, args| {
            let width = arg_i64(args, 0, 0).max(0) as usize;
            Value::String(pad_right(value::display(val), width))
        }),
    );
    m.insert(
        "rjust".into(),
        filter(|val, args| {
            let width = arg_i64(args, 0, 0).max(0) as usize;
            let s = value::display(val);
            let len = s.chars().count();
            if len >= width {
                Value::String(s)
            } else {
                let mut out: String = std::iter::repeat(' ').take(width - len).collect();
                out.push_str(&s);
                Value::String(out)
            }
        }),
    );
    m.insert(
        "humanize".into(),
        filter(|val, _| {
            let Some(t) = parse_time(val) else { return val.clone() };
            let delta = Utc::now().signed_duration_since(t.with_timezone(&Utc));
            let text = if delta.num_minutes() < 1 {
                "just now".to_string()
            } else if delta.num_hours() < 1 {
                format!("{} minutes ago", delta.num_minutes())
            } else if delta.num_days() < 1 {
                format!("{} hours ago", delta.num_hours())
            } else if delta.num_days() < 7 {
                format!("{} days ago", delta.num_days())
            } else {
                t.format("%Y-%m-%d").to_string()
            };
            Value::String(text)
        }),
    );
    m.insert(
        "regex_replace".into(),
        filter(|val, args| {
            let s = value::display(val);
            if args.len() < 2 {
                return Value::String(s);
            }
            let pattern = value::display(&args[0]);
            let repl = value::display(&args[1]);
            match Regex::new(&pattern) {
                Ok(re) => Value::String(re.replace_all(&s, repl.as_str()).into_owned()),
                Err(_) => Value::String(s),
            }
        }),
    );

    m
}
