//! Engine: registries, caches, file resolution, render entry points and
//! translation dispatch.
//!
//! One engine instance is shared across renders. The filter/function
//! registries and the two caches (parsed ASTs, file contents) sit behind
//! reader/writer locks so concurrent renders can read them freely; each
//! render call builds its own scope tree and never shares it.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use std::time::SystemTime;

use indexmap::IndexMap;
use log::warn;

use crate::ast::Node;
use crate::blocks;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::filters;
use crate::functions::{FilterFn, FunctionFn};
use crate::html;
use crate::i18n;
use crate::parser::Parser;
use crate::sandbox::{Limiter, RenderOptions};
use crate::value::{self, Map, Value};

struct FileCacheEntry {
    content: String,
    modified: SystemTime,
}

/// Shapes the data every render sees before template-local bindings apply.
pub type ContextProcessor = Box<dyn Fn(&mut Map) + Send + Sync>;

pub struct Engine {
    filters: RwLock<HashMap<String, FilterFn>>,
    functions: RwLock<HashMap<String, FunctionFn>>,
    ast_cache: RwLock<HashMap<PathBuf, Node>>,
    file_cache: RwLock<HashMap<PathBuf, FileCacheEntry>>,

    template_paths: Vec<PathBuf>,
    template_aliases: IndexMap<String, PathBuf>,

    context_processors: Vec<ContextProcessor>,
    global_context: Map,

    translations: Map,
    lang: String,
    fallback_lang: Option<String>,
    current_locale: Option<String>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Engine {
            filters: RwLock::new(filters::default_filters()),
            functions: RwLock::new(HashMap::new()),
            ast_cache: RwLock::new(HashMap::new()),
            file_cache: RwLock::new(HashMap::new()),
            template_paths: vec![PathBuf::from(".")],
            template_aliases: IndexMap::new(),
            context_processors: Vec::new(),
            global_context: Map::new(),
            translations: Map::new(),
            lang: "en".to_string(),
            fallback_lang: None,
            current_locale: None,
        }
    }

    /// Registers a filter, overwriting (with a warning) any previous entry
    /// under the same name.
    pub fn register_filter(&self, name: &str, filter: FilterFn) {
        let mut filters = self.filters.write().unwrap_or_else(PoisonError::into_inner);
        if filters.insert(name.to_string(), filter).is_some() {
            warn!("filter '{}' was already registered, overwriting", name);
        }
    }

    /// Registers a function, overwriting (with a warning) any previous
    /// entry under the same name. Registering `trans` shadows the builtin
    /// translation dispatch.
    pub fn register_function(&self, name: &str, func: FunctionFn) {
        let mut funcs = self.functions.write().unwrap_or_else(PoisonError::into_inner);
        if funcs.insert(name.to_string(), func).is_some() {
            warn!("function '{}' was already registered, overwriting", name);
        }
    }

    pub(crate) fn lookup_filter(&self, name: &str) -> Option<FilterFn> {
        self.filters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub(crate) fn lookup_function(&self, name: &str) -> Option<FunctionFn> {
        self.functions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Directory or file to consult, in order, when resolving a template
    /// name.
    pub fn add_template_path(&mut self, path: impl Into<PathBuf>) {
        self.template_paths.push(path.into());
    }

    /// Maps a short template name to a concrete path, bypassing the search
    /// paths.
    pub fn set_template_alias(&mut self, alias: impl Into<String>, real: impl Into<PathBuf>) {
        self.template_aliases.insert(alias.into(), real.into());
    }

    /// Base data visible to every render, underneath the per-call context.
    pub fn set_global_context(&mut self, ctx: Map) {
        self.global_context = ctx;
    }

    pub fn add_context_processor(&mut self, proc: ContextProcessor) {
        self.context_processors.push(proc);
    }

    pub fn set_lang(&mut self, lang: impl Into<String>) {
        self.lang = lang.into();
    }

    pub fn set_fallback_lang(&mut self, lang: impl Into<String>) {
        self.fallback_lang = Some(lang.into());
    }

    /// Engine-wide locale override, between the default language and any
    /// per-scope or per-call locale.
    pub fn set_locale(&mut self, locale: impl Into<String>) {
        self.current_locale = Some(locale.into());
    }

    /// Installs the translation store: language code to nested message
    /// tree.
    pub fn set_translations(&mut self, translations: Map) {
        self.translations = translations;
    }

    /// Loads every `*.json` file of a directory into the translation
    /// store, keyed by file stem (`tr.json` becomes language `tr`).
    pub fn set_translations_from_dir(&mut self, dir: impl AsRef<Path>) -> Result<()> {
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(lang) = path.file_stem().and_then(|s| s.to_str()) else { continue };
            let content = fs::read_to_string(&path)?;
            let tree: Value = serde_json::from_str(&content)?;
            self.translations.insert(lang.to_string(), tree);
        }
        Ok(())
    }

    fn merge_context(&self, ctx: Map) -> Map {
        let mut merged = self.global_context.clone();
        for (k, v) in ctx {
            merged.insert(k, v);
        }
        for proc in &self.context_processors {
            proc(&mut merged);
        }
        merged
    }

    /// Renders a template string against a context. The output passes
    /// through the minify post-pass.
    pub fn render(&self, template: &str, ctx: Map) -> Result<String> {
        self.render_inner(template, ctx, None)
    }

    /// Renders with sandbox limits; the limiter lives for this call only.
    pub fn render_with_options(
        &self,
        template: &str,
        ctx: Map,
        opts: &RenderOptions,
    ) -> Result<String> {
        let limiter = Limiter::new(opts);
        self.render_inner(template, ctx, Some(&limiter))
    }

    fn render_inner(&self, template: &str, ctx: Map, limiter: Option<&Limiter>) -> Result<String> {
        let merged = self.merge_context(ctx);
        let ast = Parser::new(template).parse()?;
        let context = Context::with_limiter(merged, self, limiter);
        let result = ast.render(&context)?;
        Ok(html::minify(&result))
    }

    /// Renders a template file: the `<template>` region is templated, the
    /// `<script>` and `<style>` regions are re-wrapped verbatim around it.
    pub fn render_file(&self, name: &str, ctx: Map) -> Result<String> {
        let content = self.read_file_cached(name)?;
        let regions = html::split_regions(&content);
        let body = if regions.template.is_empty() {
            String::new()
        } else {
            self.render(&regions.template, ctx)?
        };
        Ok(html::minify(&wrap_regions(&regions.script, &body, &regions.style)))
    }

    /// Renders a view file inside a layout file: the layout's `{{ embed }}`
    /// marker is replaced by the view's template region, the view's block
    /// overrides apply to the layout's blocks, and the script/style regions
    /// of both files are concatenated around the result.
    pub fn render_with_layout(&self, view: &str, layout: &str, ctx: Map) -> Result<String> {
        let merged = self.merge_context(ctx);

        let view_content = self.read_file_cached(view)?;
        let view_regions = html::split_regions(&view_content);
        let view_blocks = blocks::parse_blocks(&view_regions.template)?;

        let layout_content = self.read_file_cached(layout)?;
        let layout_regions = html::split_regions(&layout_content);
        let layout_tpl = layout_regions
            .template
            .replacen("{{ embed }}", &view_regions.template, 1);

        let ast = Parser::with_file(&layout_tpl, layout.to_string()).parse_with_blocks(&view_blocks)?;
        let context = Context::new(merged, self);
        let body = ast.render(&context)?;

        let script = format!("{}\n{}", layout_regions.script, view_regions.script);
        let style = format!("{}\n{}", layout_regions.style, view_regions.style);
        Ok(wrap_regions(script.trim(), &body, style.trim()))
    }

    /// Renders a file against an existing scope chain, used by `include` so
    /// the included template sees the caller's bindings.
    pub(crate) fn render_file_with_scope(&self, name: &str, ctx: &Context) -> Result<String> {
        let content = self.read_file_cached(name)?;
        let regions = html::split_regions(&content);
        let body = if regions.template.is_empty() {
            String::new()
        } else {
            let ast = Parser::with_file(&regions.template, name.to_string()).parse()?;
            ast.render(ctx)?
        };
        Ok(html::minify(&wrap_regions(&regions.script, &body, &regions.style)))
    }

    /// Parses a template file to an AST, caching by resolved path.
    pub fn parse_file(&self, name: &str) -> Result<Node> {
        let resolved = self.resolve_template_path(name)?;
        {
            let cache = self.ast_cache.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(ast) = cache.get(&resolved) {
                return Ok(ast.clone());
            }
        }
        let content = fs::read_to_string(&resolved)?;
        let ast = Parser::with_file(&content, resolved.display().to_string()).parse()?;
        self.ast_cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(resolved, ast.clone());
        Ok(ast)
    }

    /// Reads a file through the content cache, invalidating on modification
    /// time change.
    pub(crate) fn read_file_cached(&self, name: &str) -> Result<String> {
        let resolved = self.resolve_template_path(name)?;
        let modified = fs::metadata(&resolved)?.modified()?;
        {
            let cache = self.file_cache.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(entry) = cache.get(&resolved) {
                if entry.modified == modified {
                    return Ok(entry.content.clone());
                }
            }
        }
        let content = fs::read_to_string(&resolved)?;
        self.file_cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(resolved, FileCacheEntry { content: content.clone(), modified });
        Ok(content)
    }

    /// Resolves a template name: alias first, then the name as a path, then
    /// each search path in order.
    fn resolve_template_path(&self, name: &str) -> Result<PathBuf> {
        if let Some(real) = self.template_aliases.get(name) {
            return Ok(real.clone());
        }
        let direct = Path::new(name);
        if direct.exists() {
            return Ok(direct.to_path_buf());
        }
        for dir in &self.template_paths {
            let full = dir.join(name);
            if full.exists() {
                return Ok(full);
            }
        }
        Err(Error::TemplateNotFound(name.to_string()))
    }

    /// Builtin `trans` dispatch. Arguments after the key are sniffed by
    /// shape: a language-code string overrides the locale, a map becomes
    /// the interpolation context, the first numeric argument becomes the
    /// plural count. A missing key or language renders as the key itself;
    /// a sandbox abort inside message interpolation is fatal.
    pub(crate) fn translate(&self, scope: &Context, args: &[Value]) -> Result<Value> {
        let Some(key_arg) = args.first() else {
            return Ok(Value::String(String::new()));
        };
        let key = value::display(key_arg);

        let mut lang = self.lang.clone();
        if let Some(locale) = &self.current_locale {
            lang = locale.clone();
        }
        if let Some(locale) = scope.locale() {
            lang = locale;
        }

        let mut ctx_arg: Option<Map> = None;
        let mut count: Option<i64> = None;
        let mut explicit_lang: Option<String> = None;
        for arg in &args[1..] {
            match arg {
                Value::String(s) if i18n::is_lang_code(s) => {
                    explicit_lang = Some(s.clone());
                }
                Value::Object(m) => ctx_arg = Some(m.clone()),
                other if count.is_none() && value::is_numeric(&value::display(other)) => {
                    count = Some(value::to_i64(other));
                }
                _ => {}
            }
        }
        if let Some(m) = &ctx_arg {
            if let Some(Value::String(l)) = m.get("locale") {
                if !l.is_empty() {
                    lang = l.clone();
                }
            }
        }
        if let Some(l) = explicit_lang {
            lang = l;
        }

        let mut langs = vec![lang.as_str()];
        if let Some(fallback) = &self.fallback_lang {
            if fallback != &lang {
                langs.push(fallback.as_str());
            }
        }

        match i18n::lookup_with_fallback(&self.translations, &langs, &key) {
            Some(Value::String(msg)) => {
                if msg.contains("{{") {
                    let base = ctx_arg.unwrap_or_else(|| scope.flatten());
                    match self.render_message(scope, msg, base) {
                        Ok(out) => return Ok(Value::String(out)),
                        Err(err @ (Error::StepLimitExceeded | Error::Timeout)) => return Err(err),
                        Err(_) => {}
                    }
                }
                Ok(Value::String(msg.clone()))
            }
            Some(Value::Object(forms)) => {
                let c = count.unwrap_or(1);
                let Some(form) = i18n::select_plural_form(forms, c) else {
                    return Ok(Value::String(String::new()));
                };
                let Some(msg_val) = forms.get(form) else {
                    return Ok(Value::String(String::new()));
                };
                let msg = value::display(msg_val);
                if msg.contains("{{") {
                    let mut base = ctx_arg.unwrap_or_else(|| scope.flatten());
                    base.insert("count".to_string(), Value::from(c));
                    match self.render_message(scope, &msg, base) {
                        Ok(out) => return Ok(Value::String(out)),
                        Err(err @ (Error::StepLimitExceeded | Error::Timeout)) => return Err(err),
                        Err(_) => {}
                    }
                }
                Ok(Value::String(msg))
            }
            _ => Ok(Value::String(key)),
        }
    }

    /// Renders a translation message in a child of the calling scope, the
    /// way includes render, so the active sandbox budget and the scope
    /// chain carry through. An unparsable message falls back to its raw
    /// text at the call site.
    fn render_message(&self, scope: &Context, msg: &str, bindings: Map) -> Result<String> {
        let ast = Parser::new(msg).parse()?;
        let child = scope.child(bindings);
        ast.render(&child)
    }
}

fn wrap_regions(script: &str, body: &str, style: &str) -> String {
    let mut out = String::new();
    if !script.is_empty() {
        out.push_str("<script>\n");
        out.push_str(script);
        out.push_str("\n</script>\n");
    }
    out.push_str(body);
    if !style.is_empty() {
        out.push_str("\n<style>\n");
        out.push_str(style);
        out.push_str("\n</style>");
    }
    out
}
