//! Main application entry point: parses arguments, configures an engine
//! and renders one template file to stdout.

use std::fs;
use std::path::Path;

use hipoengine::{
    cli::{get_args, Args},
    error::{default_error_handler, Result},
    Engine, Map, Value,
};

fn main() {
    let args = get_args();

    // Logger configuration
    env_logger::Builder::new()
        .filter_level(if args.verbose {
            log::LevelFilter::Trace
        } else {
            log::LevelFilter::Warn
        })
        .init();

    if let Err(err) = run(args) {
        default_error_handler(err);
    }
}

fn load_context(path: Option<&Path>) -> Result<Map> {
    let Some(path) = path else { return Ok(Map::new()) };
    let content = fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&content)?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Ok(Map::new()),
    }
}

fn run(args: Args) -> Result<()> {
    let mut engine = Engine::new();
    engine.set_lang(&args.lang);
    if let Some(fallback) = &args.fallback_lang {
        engine.set_fallback_lang(fallback);
    }
    if let Some(dir) = &args.translations {
        engine.set_translations_from_dir(dir)?;
    }
    for path in &args.template_paths {
        engine.add_template_path(path);
    }

    let ctx = load_context(args.context.as_deref())?;
    let template = args.template.display().to_string();

    let output = match &args.layout {
        Some(layout) => {
            engine.render_with_layout(&template, &layout.display().to_string(), ctx)?
        }
        None => engine.render_file(&template, ctx)?,
    };
    println!("{}", output);
    Ok(())
}
