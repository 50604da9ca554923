//! Template inheritance: `extends` header and block override collection.
//!
//! A child template opens with an `{{ extends "base.html" }}` tag; everything
//! after it is a series of `{{ block name }} ... {{ endblock }}` fragments
//! whose bodies replace the same-named blocks of the base document.

use std::collections::HashMap;

use crate::ast::Node;
use crate::error::{Error, ParseError, Result};
use crate::parser::{self, Parser};

/// Pulls the base file name out of an `{{ extends ... }}` tag, dropping
/// the tag delimiters and any surrounding quotes.
pub(crate) fn extract_extends_file_name(tag: &str) -> String {
    tag.trim_start_matches("{{ extends ")
        .trim_end_matches("}}")
        .trim_matches([' ', '\t', '\r', '\n', '"', '\''])
        .to_string()
}

/// Collects the named block overrides of a child template. Each block body
/// is parsed to an AST up front; a block declared twice keeps the later
/// body.
pub fn parse_blocks(source: &str) -> Result<HashMap<String, Node>> {
    let mut blocks = HashMap::new();
    let mut rest = source;

    while let Some(start) = rest.find("{{ block ") {
        let name_end = rest[start..]
            .find("}}")
            .ok_or_else(|| error_at(source, rest, start, "unclosed block tag"))?;
        let name = rest[start + "{{ block ".len()..start + name_end].trim().to_string();
        if name.is_empty() {
            return Err(error_at(source, rest, start, "block tag is missing a name"));
        }
        let after = &rest[start + name_end + 2..];
        let end_idx = after.find("{{ endblock }}").ok_or_else(|| {
            error_at(
                source,
                rest,
                start,
                format!("unclosed endblock for block '{}'", name),
            )
        })?;
        let body = Parser::new(after[..end_idx].trim()).parse()?;
        blocks.insert(name, body);
        rest = &after[end_idx + "{{ endblock }}".len()..];
    }

    Ok(blocks)
}

fn error_at(source: &str, rest: &str, start: usize, message: impl Into<String>) -> Error {
    let offset = source.len() - rest.len() + start;
    let (line, column) = parser::line_col(source, offset);
    Error::Parse(ParseError { file: None, line, column, message: message.into() })
}
