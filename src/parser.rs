//! Tag scanner and parser.
//!
//! Templates are scanned left-to-right for `{{ ... }}` tags; the enclosed,
//! trimmed tag string selects the node type by prefix keyword (`set`,
//! `include`, `if`, `for`, `with`) or, with no recognized keyword, parses as
//! a variable/filter-chain expression. Block constructs find their balanced
//! terminator by substring search for the literal terminator tag. Any
//! unterminated tag or block is a fatal parse error carrying the line/column
//! computed from the offset into the original source.

use std::collections::HashMap;

use crate::ast::{FilterCall, IfBranch, Node};
use crate::blocks;
use crate::error::{Error, ParseError, Result};
use crate::value;

/// Parser over one template source string, with an optional file name used
/// in error messages.
pub struct Parser<'s> {
    source: &'s str,
    filename: Option<String>,
}

impl<'s> Parser<'s> {
    pub fn new(source: &'s str) -> Self {
        Parser { source, filename: None }
    }

    pub fn with_file(source: &'s str, filename: impl Into<String>) -> Self {
        Parser { source, filename: Some(filename.into()) }
    }

    /// Parses the template into an AST. Parsing is a pure function of the
    /// source text: equal sources produce structurally equal trees.
    pub fn parse(&self) -> Result<Node> {
        let trimmed = self.source.trim();

        // A document extending a base must open with the extends tag; the
        // remainder is only scanned for block overrides.
        if trimmed.starts_with("{{ extends ") {
            let end = trimmed.find("}}").ok_or_else(|| {
                Error::Parse(ParseError {
                    file: self.filename.clone(),
                    line: 1,
                    column: 1,
                    message: "unclosed extends tag".to_string(),
                })
            })?;
            let tag = &trimmed[..end + 2];
            let base_file = blocks::extract_extends_file_name(tag);
            let overrides = blocks::parse_blocks(&trimmed[end + 2..])?;
            return Ok(Node::Extends { base_file, blocks: overrides });
        }

        let mut nodes = Vec::new();
        let mut tpl = self.source;

        while !tpl.is_empty() {
            let start = match tpl.find("{{") {
                Some(i) => i,
                None => {
                    nodes.push(Node::Text(tpl.to_string()));
                    break;
                }
            };
            if start > 0 {
                let text = &tpl[..start];
                // Whitespace-only runs between tags carry no content.
                if !text.trim().is_empty() {
                    nodes.push(Node::Text(text.to_string()));
                }
            }
            let end = match tpl[start..].find("}}") {
                Some(i) => i,
                None => {
                    return Err(self.error_at(
                        self.offset_of(tpl, start),
                        "unclosed variable or block tag",
                    ))
                }
            };
            let tag = tpl[start + 2..start + end].trim();
            let tag_offset = self.offset_of(tpl, start);
            let after = &tpl[start + end + 2..];

            if let Some(rest) = tag.strip_prefix("set ") {
                nodes.push(self.parse_set(rest, tag_offset)?);
                tpl = after;
                continue;
            }

            if let Some(rest) = tag.strip_prefix("include ") {
                let file = rest.trim().trim_matches(|c| c == '"' || c == '\'').to_string();
                nodes.push(Node::Include { file });
                tpl = after;
                continue;
            }

            if let Some(rest) = tag.strip_prefix("if ") {
                let (node, remain) = self.parse_if(rest.trim(), after, tag_offset)?;
                nodes.push(node);
                tpl = remain;
                continue;
            }

            if let Some(rest) = tag.strip_prefix("for ") {
                let (node, remain) = self.parse_for(rest.trim(), after, tag_offset)?;
                nodes.push(node);
                tpl = remain;
                continue;
            }

            if let Some(rest) = tag.strip_prefix("with ") {
                let (node, remain) = self.parse_with(rest.trim(), after, tag_offset)?;
                nodes.push(node);
                tpl = remain;
                continue;
            }

            nodes.push(parse_variable_tag(tag));
            tpl = after;
        }

        Ok(Node::List(nodes))
    }

    /// Parses the base document while substituting named blocks from the
    /// override map; blocks absent from the map keep their own parsed body.
    pub fn parse_with_blocks(&self, overrides: &HashMap<String, Node>) -> Result<Node> {
        let mut nodes = Vec::new();
        let mut tpl = self.source;

        while !tpl.is_empty() {
            let start = match tpl.find("{{ block ") {
                Some(i) => i,
                None => {
                    nodes.push(Node::Text(tpl.to_string()));
                    break;
                }
            };
            if start > 0 {
                nodes.push(Node::Text(tpl[..start].to_string()));
            }
            let name_end = tpl[start..].find("}}").ok_or_else(|| {
                self.error_at(self.offset_of(tpl, start), "unclosed block tag")
            })?;
            let name = tpl[start + "{{ block ".len()..start + name_end].trim().to_string();
            let after = &tpl[start + name_end + 2..];
            let end_idx = after.find("{{ endblock }}").ok_or_else(|| {
                self.error_at(
                    self.offset_of(tpl, start),
                    format!("unclosed endblock for block '{}'", name),
                )
            })?;
            let body = match overrides.get(&name) {
                Some(ast) => ast.clone(),
                None => Parser::new(&after[..end_idx]).parse()?,
            };
            nodes.push(Node::Block { name, body: Box::new(body) });
            tpl = &after[end_idx + "{{ endblock }}".len()..];
        }

        Ok(Node::List(nodes))
    }

    /// `set name = rhs`. The right-hand side is re-parsed as if wrapped in a
    /// variable tag so literals, paths, filter chains and function calls all
    /// work; a single-node result is unwrapped from its containing list.
    fn parse_set(&self, rest: &str, offset: usize) -> Result<Node> {
        let expr = rest.trim();
        let eq = expr
            .find('=')
            .ok_or_else(|| self.error_at(offset, "set tag is missing '='"))?;
        let name = expr[..eq].trim().to_string();
        let rhs = expr[eq + 1..].trim();
        if name.is_empty() {
            return Err(self.error_at(offset, "set tag is missing a variable name"));
        }

        let mut value_ast = unwrap_single(Parser::new(rhs).parse()?);

        // A bare right-hand side parses as plain text. Quoted non-numeric
        // literals stay textual (their raw evaluation strips the quotes);
        // everything else re-parses as a variable expression so filter
        // chains and context lookups apply.
        if let Node::Text(text) = &value_ast {
            let content = text.trim();
            if !content.is_empty() {
                let b = content.as_bytes();
                let quoted = content.len() > 1
                    && ((b[0] == b'"' && b[content.len() - 1] == b'"')
                        || (b[0] == b'\'' && b[content.len() - 1] == b'\''));
                if content.contains('|') || !(quoted && !value::is_numeric(content)) {
                    let wrapped = format!("{{{{ {} }}}}", content);
                    if let Ok(reparsed) = Parser::new(&wrapped).parse() {
                        value_ast = unwrap_single(reparsed);
                    }
                }
            }
        }

        Ok(Node::Set { name, value: Box::new(value_ast) })
    }

    /// `if cond ... elif cond ... else ... endif`. The nearest of the three
    /// continuation tags after the current branch start closes that branch.
    fn parse_if<'t>(
        &self,
        first_cond: &str,
        after: &'t str,
        offset: usize,
    ) -> Result<(Node, &'t str)> {
        let mut branches = Vec::new();
        let mut else_body = None;
        let mut remain = after;
        let mut cond = first_cond.to_string();

        loop {
            let elif_idx = remain.find("{{ elif ");
            let else_idx = remain.find("{{ else }}");
            let endif_idx = remain.find("{{ endif }}");
            let min_idx = [elif_idx, else_idx, endif_idx]
                .into_iter()
                .flatten()
                .min()
                .ok_or_else(|| self.error_at(offset, "unclosed if block (missing endif)"))?;

            let body = Parser::new(&remain[..min_idx]).parse()?;
            branches.push(IfBranch { condition: std::mem::take(&mut cond), body });

            if Some(min_idx) == elif_idx {
                remain = &remain[min_idx + "{{ elif ".len()..];
                let end_elif = remain
                    .find("}}")
                    .ok_or_else(|| self.error_at(offset, "unclosed elif tag"))?;
                cond = remain[..end_elif].trim().to_string();
                remain = &remain[end_elif + 2..];
                continue;
            }

            if Some(min_idx) == else_idx {
                remain = &remain[min_idx + "{{ else }}".len()..];
                let endif2 = remain
                    .find("{{ endif }}")
                    .ok_or_else(|| self.error_at(offset, "unclosed endif after else"))?;
                else_body = Some(Box::new(Parser::new(remain[..endif2].trim()).parse()?));
                remain = &remain[endif2 + "{{ endif }}".len()..];
            } else {
                remain = &remain[min_idx + "{{ endif }}".len()..];
            }
            break;
        }

        Ok((Node::If { branches, else_body }, remain))
    }

    /// `for item in coll` or the legacy `for coll item` ordering.
    fn parse_for<'t>(
        &self,
        inner: &str,
        after: &'t str,
        offset: usize,
    ) -> Result<(Node, &'t str)> {
        let parts: Vec<&str> = inner.split_whitespace().collect();
        let (var, collection) = match parts.as_slice() {
            [collection, var] => (var.to_string(), collection.to_string()),
            [var, "in", collection] => (var.to_string(), collection.to_string()),
            _ => return Err(self.error_at(offset, "invalid for syntax")),
        };
        let end_idx = after
            .find("{{ endfor }}")
            .ok_or_else(|| self.error_at(offset, "unclosed for block"))?;
        let body = Parser::new(&after[..end_idx]).parse()?;
        let remain = &after[end_idx + "{{ endfor }}".len()..];
        Ok((Node::For { var, collection, body: Box::new(body) }, remain))
    }

    /// `with expr as alias` or the legacy `with expr alias` ordering.
    fn parse_with<'t>(
        &self,
        inner: &str,
        after: &'t str,
        offset: usize,
    ) -> Result<(Node, &'t str)> {
        let parts: Vec<&str> = inner.split_whitespace().collect();
        let (expr, alias) = match parts.as_slice() {
            [expr, alias] => (expr.to_string(), alias.to_string()),
            [expr, "as", alias] => (expr.to_string(), alias.to_string()),
            _ => return Err(self.error_at(offset, "invalid with syntax")),
        };
        let end_idx = after
            .find("{{ endwith }}")
            .ok_or_else(|| self.error_at(offset, "unclosed with block"))?;
        let body = Parser::new(&after[..end_idx]).parse()?;
        let remain = &after[end_idx + "{{ endwith }}".len()..];
        Ok((Node::With { expr, alias, body: Box::new(body) }, remain))
    }

    /// Byte offset of `start` within `tpl` relative to the original source.
    /// `tpl` is always a suffix slice of the source, so the arithmetic holds
    /// through the whole scan.
    fn offset_of(&self, tpl: &str, start: usize) -> usize {
        self.source.len() - tpl.len() + start
    }

    fn error_at(&self, offset: usize, message: impl Into<String>) -> Error {
        let (line, column) = line_col(self.source, offset);
        Error::Parse(ParseError {
            file: self.filename.clone(),
            line,
            column,
            message: message.into(),
        })
    }
}

/// Parses a variable tag body: `expr|filter:arg1,arg2|...`. A call-shaped
/// head is kept textually for evaluation-time dispatch; a recognized literal
/// is stored on the node.
fn parse_variable_tag(tag: &str) -> Node {
    let mut parts = tag.split('|');
    let head = parts.next().unwrap_or("").trim();

    let mut filters = Vec::new();
    for f in parts {
        let f = f.trim();
        if f.is_empty() {
            continue;
        }
        let (name, args) = match f.find(':') {
            Some(i) => {
                let args = f[i + 1..]
                    .trim()
                    .split(',')
                    .map(str::trim)
                    .filter(|a| !a.is_empty())
                    .map(String::from)
                    .collect();
                (f[..i].trim().to_string(), args)
            }
            None => (f.to_string(), Vec::new()),
        };
        filters.push(FilterCall { name, args });
    }

    if head.contains('(') && head.ends_with(')') {
        return Node::Variable { name: head.to_string(), literal: None, filters };
    }
    match value::parse_literal(head) {
        Some(literal) => Node::Variable { name: String::new(), literal: Some(literal), filters },
        None => Node::Variable { name: head.to_string(), literal: None, filters },
    }
}

/// Unwraps a single-node list produced by a sub-parse.
fn unwrap_single(node: Node) -> Node {
    match node {
        Node::List(mut nodes) if nodes.len() == 1 => nodes.remove(0),
        other => other,
    }
}

/// Converts a byte offset into a 1-based line/column pair, counting columns
/// in characters.
pub(crate) fn line_col(source: &str, offset: usize) -> (usize, usize) {
    let mut line = 1;
    let mut col = 1;
    for c in source[..offset.min(source.len())].chars() {
        if c == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }
    (line, col)
}
