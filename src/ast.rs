//! AST node model and tree-walking interpreter.
//!
//! Every node supports two evaluation modes: [`Node::render`] produces
//! display text (HTML-escaped unless a `safe` filter opts out) and
//! [`Node::eval`] produces the raw underlying value, used when a result
//! feeds another operation such as a `set` right-hand side or a `for`
//! collection.

use std::collections::HashMap;

use log::warn;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::functions;
use crate::html;
use crate::parser::Parser;
use crate::value::{self, Map, Value};

/// One filter invocation in a chain: `|name:arg1,arg2`. Arguments stay
/// textual until application time.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCall {
    pub name: String,
    pub args: Vec<String>,
}

/// One `if`/`elif` arm: a condition expression and its body.
#[derive(Debug, Clone, PartialEq)]
pub struct IfBranch {
    pub condition: String,
    pub body: Node,
}

/// A template AST node.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Literal output span.
    Text(String),
    /// Path expression or literal plus an ordered filter chain. A
    /// call-shaped `name` (`f(args...)`) dispatches a function at
    /// evaluation time.
    Variable {
        name: String,
        literal: Option<Value>,
        filters: Vec<FilterCall>,
    },
    /// Ordered container of sibling nodes; the top level and block bodies.
    List(Vec<Node>),
    /// Ordered branches; the first true condition wins.
    If {
        branches: Vec<IfBranch>,
        else_body: Option<Box<Node>>,
    },
    /// Loop over a sequence, binding `var` per iteration.
    For {
        var: String,
        collection: String,
        body: Box<Node>,
    },
    /// One scoped binding of `alias` to a resolved expression.
    With {
        expr: String,
        alias: String,
        body: Box<Node>,
    },
    /// Renders another file with the caller's scope chained in.
    Include { file: String },
    /// A named, overridable region.
    Block { name: String, body: Box<Node> },
    /// Base-file reference plus child-supplied block overrides.
    Extends {
        base_file: String,
        blocks: HashMap<String, Node>,
    },
    /// Raw-mode assignment into the current scope.
    Set { name: String, value: Box<Node> },
}

impl Node {
    /// Renders the node to display text.
    pub fn render(&self, ctx: &Context) -> Result<String> {
        ctx.step()?;
        match self {
            Node::Text(text) => Ok(text.clone()),

            Node::List(nodes) => {
                let mut out = String::new();
                for node in nodes {
                    out.push_str(&node.render(ctx)?);
                }
                Ok(out)
            }

            Node::Variable { filters, .. } => {
                let val = self.eval(ctx)?;
                let safe = filters.iter().any(|f| f.name == "safe");
                match val {
                    Value::Null => Ok(String::new()),
                    // Nested mappings render as empty rather than as a
                    // stringified structure.
                    Value::Object(_) => Ok(String::new()),
                    other => {
                        let s = value::display(&other);
                        Ok(if safe { s } else { value::html_escape(&s) })
                    }
                }
            }

            Node::If { branches, else_body } => {
                for branch in branches {
                    if eval_condition(&branch.condition, ctx) {
                        return branch.body.render(ctx);
                    }
                }
                match else_body {
                    Some(body) => body.render(ctx),
                    None => Ok(String::new()),
                }
            }

            Node::For { var, collection, body } => {
                let resolved = ctx.resolve(collection);
                let items = match resolved {
                    Value::Array(items) => items,
                    other => {
                        return Err(Error::Eval(format!(
                            "for loop over '{}': expected a sequence, got: {}",
                            collection,
                            value::display(&other)
                        )))
                    }
                };
                let mut out = String::new();
                let last = items.len().saturating_sub(1);
                for (i, item) in items.into_iter().enumerate() {
                    let mut data = Map::new();
                    data.insert(var.clone(), item);
                    let child = ctx.child(data);
                    out.push_str(&body.render(&child)?);
                    if i != last {
                        out.push('\n');
                    }
                }
                Ok(out)
            }

            Node::With { expr, alias, body } => {
                let val = ctx.resolve(expr);
                let mut data = Map::new();
                data.insert(alias.clone(), val);
                let child = ctx.child(data);
                body.render(&child)
            }

            Node::Include { file } => {
                let child = ctx.child(ctx.local_bindings());
                ctx.engine().render_file_with_scope(file, &child)
            }

            // Blocks isolate local `set` mutations: the fresh scope carries
            // no bindings of its own, while chain lookups still reach the
            // ancestors.
            Node::Block { body, .. } => {
                let child = ctx.child(Map::new());
                body.render(&child)
            }

            Node::Extends { base_file, blocks } => {
                let content = ctx.engine().read_file_cached(base_file)?;
                let region = html::extract_template_region(&content);
                let ast = Parser::with_file(&region, base_file.clone())
                    .parse_with_blocks(blocks)?;
                ast.render(ctx)
            }

            Node::Set { name, value } => {
                let val = value.eval(ctx)?;
                ctx.set(name, val);
                Ok(String::new())
            }
        }
    }

    /// Evaluates the node to its raw, unescaped value.
    pub fn eval(&self, ctx: &Context) -> Result<Value> {
        match self {
            Node::Text(text) => {
                let trimmed = text.trim();
                match value::parse_literal(trimmed) {
                    Some(Value::String(s)) => Ok(Value::String(s)),
                    _ => Ok(Value::String(text.clone())),
                }
            }

            Node::Variable { name, literal, filters } => {
                ctx.step()?;
                let mut val = if name.contains('(') && name.ends_with(')') {
                    match eval_call(name, ctx) {
                        Some(v) => v?,
                        // Missing function: empty value, no error, no
                        // filter application.
                        None => return Ok(Value::Null),
                    }
                } else if let Some(lit) = literal {
                    lit.clone()
                } else if name.is_empty() {
                    Value::Null
                } else {
                    ctx.resolve(name)
                };
                for call in filters {
                    val = apply_filter(ctx, val, call);
                }
                Ok(val)
            }

            Node::Set { name, value } => {
                let val = value.eval(ctx)?;
                ctx.set(name, val);
                Ok(Value::Null)
            }

            // Structural nodes evaluate to their rendered text.
            other => Ok(Value::String(other.render(ctx)?)),
        }
    }
}

/// Dispatches a call-shaped expression: split the call name from the
/// argument list, resolve each argument (quoted and numeric arguments are
/// literals, everything else resolves through the scope chain), then look
/// the function up. `None` means no such function.
fn eval_call(expr: &str, ctx: &Context) -> Option<Result<Value>> {
    let open = expr.find('(')?;
    let fname = expr[..open].trim();
    let args_str = expr[open + 1..expr.len() - 1].trim();
    let mut args = Vec::new();
    if !args_str.is_empty() {
        for raw in functions::split_args(args_str) {
            let part = raw.trim();
            match value::parse_literal(part) {
                Some(lit) => args.push(lit),
                None => args.push(ctx.resolve(part)),
            }
        }
    }
    ctx.call_function(fname, &args)
}

/// Applies one filter. A missing filter is a soft, visible failure: the
/// value is stringified with a bracketed marker and a diagnostic goes to
/// the log side-channel, never to the primary output stream.
fn apply_filter(ctx: &Context, val: Value, call: &FilterCall) -> Value {
    match ctx.engine().lookup_filter(&call.name) {
        Some(filter) => {
            ctx.bump();
            let args = functions::parse_filter_args(&call.args);
            filter(&val, &args)
        }
        None => {
            warn!("filter '{}' not found", call.name);
            Value::String(format!(
                "{} [filter {} not found]",
                value::display(&val),
                call.name
            ))
        }
    }
}

/// Evaluates an `if`/`elif` condition: a binary comparison when one of the
/// operators is present (checked in the order `>=`, `<=`, `>`, `<`, `==`,
/// `!=`), otherwise a truthiness test of the resolved expression. Ordering
/// operators compare integer coercions; equality compares display strings.
pub(crate) fn eval_condition(expr: &str, ctx: &Context) -> bool {
    let expr = expr.trim();
    for op in [">=", "<=", ">", "<", "==", "!="] {
        let Some(idx) = expr.find(op) else { continue };
        let left = operand(ctx, &expr[..idx]);
        let right = operand(ctx, &expr[idx + op.len()..]);
        return match op {
            ">=" => value::to_i64(&left) >= value::to_i64(&right),
            "<=" => value::to_i64(&left) <= value::to_i64(&right),
            ">" => value::to_i64(&left) > value::to_i64(&right),
            "<" => value::to_i64(&left) < value::to_i64(&right),
            "==" => value::display(&left) == value::display(&right),
            _ => value::display(&left) != value::display(&right),
        };
    }
    value::truthy(&ctx.resolve(expr))
}

/// Resolves one comparison operand: a quoted or numeric literal is used
/// directly, anything else resolves through the scope chain.
fn operand(ctx: &Context, s: &str) -> Value {
    let s = s.trim();
    match value::parse_literal(s) {
        Some(lit) => lit,
        None => ctx.resolve(s),
    }
}
