//! Scope-chained lookup environment.
//!
//! A [`Context`] owns the locally bound names of one scope, a reference to
//! the engine-level registries (shared, never copied) and an optional
//! read-only reference to its parent scope. Lookup walks from the most
//! specific scope to the root; mutation (`set`) writes only into the current
//! scope's own map. New scopes are created per `for` iteration, `with` body,
//! `block` body and template inclusion, and discarded when the body ends.

use std::cell::RefCell;

use crate::engine::Engine;
use crate::error::Result;
use crate::functions;
use crate::sandbox::Limiter;
use crate::value::{self, Map, Value};

pub struct Context<'a> {
    data: RefCell<Map>,
    engine: &'a Engine,
    parent: Option<&'a Context<'a>>,
    locale: Option<String>,
    limiter: Option<&'a Limiter>,
}

impl<'a> Context<'a> {
    /// Root scope for one render call.
    pub fn new(data: Map, engine: &'a Engine) -> Self {
        Context { data: RefCell::new(data), engine, parent: None, locale: None, limiter: None }
    }

    /// Root scope with sandbox limits attached.
    pub(crate) fn with_limiter(data: Map, engine: &'a Engine, limiter: Option<&'a Limiter>) -> Self {
        Context { data: RefCell::new(data), engine, parent: None, locale: None, limiter }
    }

    /// Creates a child scope chained to this one. The child inherits the
    /// registries, locale and limits; its parent reference is a read path
    /// only.
    pub fn child(&self, data: Map) -> Context<'_> {
        Context {
            data: RefCell::new(data),
            engine: self.engine,
            parent: Some(self),
            locale: self.locale.clone(),
            limiter: self.limiter,
        }
    }

    pub(crate) fn engine(&self) -> &'a Engine {
        self.engine
    }

    /// Per-scope language override for translation lookups.
    pub fn set_locale(&mut self, locale: impl Into<String>) {
        self.locale = Some(locale.into());
    }

    pub(crate) fn locale(&self) -> Option<String> {
        self.locale.clone()
    }

    /// Binds a name in the current scope, shadowing any ancestor binding.
    pub fn set(&self, name: &str, value: Value) {
        self.data.borrow_mut().insert(name.to_string(), value);
    }

    /// Snapshot of this scope's own bindings (ancestors excluded), used to
    /// seed the scope of an included template.
    pub(crate) fn local_bindings(&self) -> Map {
        self.data.borrow().clone()
    }

    /// Flattens the whole chain into one map, root first so the most
    /// specific bindings win. Used as the implicit render context for
    /// translation interpolation.
    pub(crate) fn flatten(&self) -> Map {
        let mut scopes = Vec::new();
        let mut cur = Some(self);
        while let Some(scope) = cur {
            scopes.push(scope.data.borrow().clone());
            cur = scope.parent;
        }
        let mut out = Map::new();
        for scope in scopes.into_iter().rev() {
            for (k, v) in scope {
                out.insert(k, v);
            }
        }
        out
    }

    /// Counts one node evaluation against the sandbox budget.
    pub(crate) fn step(&self) -> Result<()> {
        match self.limiter {
            Some(limiter) => limiter.check(),
            None => Ok(()),
        }
    }

    /// Counts a filter or function invocation without checking the budget;
    /// the next node boundary picks the overflow up.
    pub(crate) fn bump(&self) {
        if let Some(limiter) = self.limiter {
            limiter.bump();
        }
    }

    /// Looks a function up and invokes it. The engine registry is consulted
    /// first; the builtin `trans` resolves through the same dispatch when
    /// not shadowed by a user registration. `None` means no such function;
    /// `Some(Err(..))` carries a sandbox abort out of `trans`.
    pub(crate) fn call_function(&self, name: &str, args: &[Value]) -> Option<Result<Value>> {
        if let Some(func) = self.engine.lookup_function(name) {
            self.bump();
            return Some(Ok(func(args)));
        }
        if name == "trans" {
            self.bump();
            return Some(self.engine.translate(self, args));
        }
        None
    }

    /// Resolves a path expression through the scope chain. Any miss
    /// anywhere in the chain degrades to [`Value::Null`], never an error.
    pub fn resolve(&self, path: &str) -> Value {
        if path.is_empty() {
            return Value::Null;
        }
        let parts = split_path(path);
        self.resolve_parts(&parts)
    }

    fn resolve_parts(&self, parts: &[String]) -> Value {
        let Some(first) = parts.first() else { return Value::Null };

        // Function call embedded in a path, e.g. `getUser().name`.
        if first.ends_with(')') {
            if let Some(open) = first.find('(') {
                let fname = &first[..open];
                let args = self.parse_call_args(&first[open + 1..first.len() - 1]);
                return match self.call_function(fname, &args) {
                    Some(Ok(val)) if parts.len() > 1 => resolve_value(val, &parts[1..]),
                    Some(Ok(val)) => val,
                    // A failed call degrades like any other path miss; an
                    // exhausted budget resurfaces at the next node boundary.
                    Some(Err(_)) | None => Value::Null,
                };
            }
        }

        let mut scope = Some(self);
        while let Some(s) = scope {
            let val = s.data.borrow().get(first.as_str()).cloned();
            if let Some(val) = val {
                return if parts.len() > 1 { resolve_value(val, &parts[1..]) } else { val };
            }
            scope = s.parent;
        }
        Value::Null
    }

    /// Arguments of a call embedded in a path: `ctx` and `.` stand for the
    /// current scope's bindings, literals parse in place, bare names look
    /// up in the current scope and otherwise pass through as strings.
    fn parse_call_args(&self, args_str: &str) -> Vec<Value> {
        let mut args = Vec::new();
        if args_str.is_empty() {
            return args;
        }
        for raw in functions::split_args(args_str) {
            let a = raw.trim();
            if a == "ctx" || a == "." {
                args.push(Value::Object(self.data.borrow().clone()));
            } else if let Some(lit) = value::parse_literal(a) {
                args.push(lit);
            } else if let Some(val) = self.data.borrow().get(a).cloned() {
                args.push(val);
            } else {
                args.push(Value::String(a.to_string()));
            }
        }
        args
    }
}

/// Structural recursion over a resolved value for the remaining path
/// segments: maps by key, sequences by index (negative counts from the
/// end), strings by character. Any miss yields [`Value::Null`].
fn resolve_value(val: Value, parts: &[String]) -> Value {
    let Some(first) = parts.first() else { return val };
    match val {
        Value::Object(mut map) => match map.remove(first.as_str()) {
            Some(inner) => resolve_value(inner, &parts[1..]),
            None => Value::Null,
        },
        Value::Array(items) => {
            if let Ok(idx) = first.parse::<i64>() {
                let idx = if idx < 0 { idx + items.len() as i64 } else { idx };
                if idx >= 0 && (idx as usize) < items.len() {
                    let mut items = items;
                    return resolve_value(items.swap_remove(idx as usize), &parts[1..]);
                }
            }
            Value::Null
        }
        Value::String(s) => {
            if let Ok(idx) = first.parse::<i64>() {
                let chars: Vec<char> = s.chars().collect();
                let idx = if idx < 0 { idx + chars.len() as i64 } else { idx };
                if idx >= 0 && (idx as usize) < chars.len() {
                    return resolve_value(
                        Value::String(chars[idx as usize].to_string()),
                        &parts[1..],
                    );
                }
            }
            Value::Null
        }
        _ => Value::Null,
    }
}

/// Splits a path like `products[0].name` or `user["first name"]` into
/// segments. Dots and brackets inside quoted bracket contents are literal
/// characters; quotes delimiting a bracket segment are consumed.
pub(crate) fn split_path(path: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut buf = String::new();
    let mut in_bracket = false;
    let mut in_quote = false;
    let mut quote_char = '\0';
    for c in path.chars() {
        match c {
            '.' if !in_bracket && !in_quote => {
                if !buf.is_empty() {
                    parts.push(std::mem::take(&mut buf));
                }
            }
            '[' if !in_quote => {
                if !buf.is_empty() {
                    parts.push(std::mem::take(&mut buf));
                }
                in_bracket = true;
            }
            ']' if in_bracket && !in_quote => {
                if !buf.is_empty() {
                    parts.push(std::mem::take(&mut buf));
                }
                in_bracket = false;
            }
            '"' | '\'' if in_bracket => {
                if !in_quote {
                    in_quote = true;
                    quote_char = c;
                } else if c == quote_char {
                    in_quote = false;
                } else {
                    buf.push(c);
                }
            }
            _ => buf.push(c),
        }
    }
    if !buf.is_empty() {
        parts.push(buf);
    }
    parts
}
