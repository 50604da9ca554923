//! Hipoengine is a `{{ ... }}` text-templating engine.
//! Templates are parsed into an AST and evaluated against a JSON-shaped
//! context, with filter chains, control flow, template composition
//! (include, extends/blocks, layout embedding) and i18n message dispatch.

/// AST node model and the tree-walking interpreter
pub mod ast;

/// Block capture and `extends` handling for template inheritance
pub mod blocks;

/// Command-line interface module for rendering templates from the shell
pub mod cli;

/// Scope-chained lookup environment and path resolution
pub mod context;

/// Engine: registries, caches, render entry points and translation dispatch
pub mod engine;

/// Error types and handling for the engine
pub mod error;

/// Builtin filter library
pub mod filters;

/// Function registry types and call-argument handling
pub mod functions;

/// Single-file component splitting (`<template>`/`<script>`/`<style>`)
/// and output minification
pub mod html;

/// Translation table lookup helpers
pub mod i18n;

/// Tag scanner and recursive-descent template parser
pub mod parser;

/// Execution limits (step budget, wall-clock deadline) for untrusted
/// templates
pub mod sandbox;

/// Dynamic value model shared by resolution, filters and functions
pub mod value;

pub use ast::Node;
pub use context::Context;
pub use engine::Engine;
pub use error::{Error, ParseError, Result};
pub use functions::{FilterFn, FunctionFn};
pub use parser::Parser;
pub use sandbox::RenderOptions;
pub use value::{Map, Value};
