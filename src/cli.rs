use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde_json::{Map, Value as Json};

use crate::config::{self, AppConfig};
use crate::history::{PrintLog, PrintRecord};
use crate::pipeline::{scheduler, Pipeline, PipelineOptions};
use crate::render::document::Document;
use crate::render::issue_card::IssueCardRenderer;
use crate::render::page::AssetCache;
use crate::render::schema::{json_schema, render_form, validate};
use crate::render::{Renderer, RendererRegistry};
use crate::source;
use crate::spool::{LpSpooler, Spooler};
use crate::store::IssueStore;

const DEFAULT_HISTORY_LIMIT: usize = 20;

#[derive(Debug, PartialEq)]
pub enum Command {
    Run,
    Once,
    Renderers,
    Schema(String),
    Form(String),
    Render(RenderArgs),
    History { limit: usize },
    Help,
}

/// `cardpress render <renderer> <out.pdf> [--print] key=value...`
#[derive(Debug, PartialEq)]
pub struct RenderArgs {
    pub renderer: String,
    pub output: PathBuf,
    pub print: bool,
    pub values: Map<String, Json>,
}

/// Parse everything after the program name. No arguments means `run`.
pub fn parse_command(args: &[String]) -> Result<Command> {
    let Some((first, rest)) = args.split_first() else {
        return Ok(Command::Run);
    };

    match first.as_str() {
        "run" => Ok(Command::Run),
        "once" => Ok(Command::Once),
        "renderers" => Ok(Command::Renderers),
        "schema" => Ok(Command::Schema(renderer_name(rest, "schema")?)),
        "form" => Ok(Command::Form(renderer_name(rest, "form")?)),
        "render" => Ok(Command::Render(parse_render_args(rest)?)),
        "history" => Ok(Command::History {
            limit: parse_history_args(rest)?,
        }),
        "help" | "-h" | "--help" => Ok(Command::Help),
        other => bail!("Unknown command `{other}`. Run `cardpress help` for usage."),
    }
}

fn renderer_name(args: &[String], command: &str) -> Result<String> {
    match args {
        [name] => Ok(name.clone()),
        _ => bail!("Usage: cardpress {command} <renderer>"),
    }
}

/// Parse `render` arguments. Field values are passed through as strings and
/// coerced by the renderer's field validation.
///
/// Supported forms:
///   cardpress render centered out.pdf message="Back in 5"
///   cardpress render issuecard card.pdf --print issue_id=CI-1 summary="Fix it" ...
pub fn parse_render_args(args: &[String]) -> Result<RenderArgs> {
    let mut positional: Vec<&str> = Vec::new();
    let mut values = Map::new();
    let mut print = false;

    for arg in args {
        if arg == "--print" || arg == "-p" {
            print = true;
        } else if positional.len() < 2 {
            positional.push(arg);
        } else {
            let Some((key, value)) = arg.split_once('=') else {
                bail!("Expected key=value, got `{arg}`");
            };
            if key.is_empty() {
                bail!("Missing field name in `{arg}`");
            }
            values.insert(key.to_string(), Json::String(value.to_string()));
        }
    }

    let [renderer, output] = positional.as_slice() else {
        bail!("Usage: cardpress render <renderer> <out.pdf> [--print] key=value...\n\nExample:\n  cardpress render centered sign.pdf message=\"Back in 5\"");
    };

    Ok(RenderArgs {
        renderer: renderer.to_string(),
        output: PathBuf::from(*output),
        print,
        values,
    })
}

fn parse_history_args(args: &[String]) -> Result<usize> {
    match args {
        [] => Ok(DEFAULT_HISTORY_LIMIT),
        [flag, n] if flag == "-n" => n
            .parse()
            .with_context(|| format!("Invalid count `{n}` for -n")),
        _ => bail!("Usage: cardpress history [-n <count>]"),
    }
}

pub async fn handle(command: Command) -> Result<()> {
    match command {
        Command::Run => handle_run().await,
        Command::Once => handle_once().await,
        Command::Renderers => {
            handle_renderers(&registry()?);
            Ok(())
        }
        Command::Schema(name) => handle_schema(&registry()?, &name),
        Command::Form(name) => handle_form(&registry()?, &name),
        Command::Render(args) => handle_render(args).await,
        Command::History { limit } => {
            handle_history(&PrintLog::default(), limit);
            Ok(())
        }
        Command::Help => {
            print_help();
            Ok(())
        }
    }
}

fn registry() -> Result<RendererRegistry> {
    let config = config::load_config()?;
    Ok(RendererRegistry::with_defaults(config.card.theme()))
}

fn lookup(registry: &RendererRegistry, name: &str) -> Result<Box<dyn Renderer>> {
    match registry.get(name) {
        Some(renderer) => Ok(renderer),
        None => {
            let known: Vec<_> = registry.list().into_iter().map(|r| r.name).collect();
            bail!("Unknown renderer `{name}`. Available: {}", known.join(", "))
        }
    }
}

fn spooler_for(config: &AppConfig) -> LpSpooler {
    LpSpooler::new(config.printer.queue.clone())
}

fn build_pipeline(config: &AppConfig) -> Result<Pipeline> {
    let source = source::create_source(config)
        .context("No issue source configured. Add a [jira] section to ~/.cardpress/config.toml")?;
    let store = IssueStore::open(config.store.path())?;
    let options = PipelineOptions::from_config(config)?;

    let mut pipeline = Pipeline::new(
        source,
        store,
        IssueCardRenderer::new(config.card.theme()),
        options,
    )
    .with_history(PrintLog::default());
    if config.printer.enabled {
        pipeline = pipeline.with_spooler(Box::new(spooler_for(config)));
    }
    Ok(pipeline)
}

async fn handle_run() -> Result<()> {
    let config = config::load_config()?;
    let mut pipeline = build_pipeline(&config)?;

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };
    scheduler::run(&mut pipeline, config.poll.interval(), shutdown).await?;
    Ok(())
}

async fn handle_once() -> Result<()> {
    let config = config::load_config()?;
    let mut pipeline = build_pipeline(&config)?;

    let report = pipeline.run_cycle().await?;
    match &report.document {
        Some(path) => {
            println!("Printed {} card(s) to {}", report.cards.len(), path.display());
            for key in report.rendered_keys() {
                println!("  {key}");
            }
            if let Some(job_id) = &report.job_id {
                println!("  spooled as {job_id}");
            }
        }
        None => println!("No new or changed issues ({} fetched)", report.fetched),
    }
    for key in &report.failed {
        println!("  failed: {key}");
    }
    Ok(())
}

fn handle_renderers(registry: &RendererRegistry) {
    for info in registry.list() {
        println!("{:<12} {}", info.name, info.title);
        println!("{:<12} {}", "", info.description);
    }
}

fn handle_schema(registry: &RendererRegistry, name: &str) -> Result<()> {
    let renderer = lookup(registry, name)?;
    let schema = json_schema(&renderer.fields(), renderer.description());
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}

fn handle_form(registry: &RendererRegistry, name: &str) -> Result<()> {
    let renderer = lookup(registry, name)?;
    println!("{}", render_form(&renderer.fields(), &format!("/render/{name}")));
    Ok(())
}

async fn handle_render(args: RenderArgs) -> Result<()> {
    let config = config::load_config()?;
    let registry = RendererRegistry::with_defaults(config.card.theme());
    let renderer = lookup(&registry, &args.renderer)?;

    let path = render_to_file(renderer.as_ref(), &args.values, &args.output)?;
    println!("Wrote {}", path.display());

    if args.print {
        let title = format!("cardpress: {}", args.renderer);
        let job_id = spooler_for(&config).submit(path, &title).await?;
        println!("Spooled as {job_id}");
        let record = PrintRecord::new(path, vec![args.renderer.clone()], Some(job_id));
        if let Err(e) = PrintLog::default().append(&record) {
            tracing::warn!(error = %e, "Failed to append print history");
        }
    }
    Ok(())
}

/// Validate `values` against the renderer's fields and write a one-page PDF.
pub fn render_to_file<'a>(
    renderer: &dyn Renderer,
    values: &Map<String, Json>,
    output: &'a Path,
) -> Result<&'a Path> {
    let values = validate(&renderer.fields(), values)
        .with_context(|| format!("Invalid input for renderer `{}`", renderer.name()))?;
    let page = renderer.render(&values, &AssetCache::default())?;

    let mut document = Document::new();
    document.push(page);
    document
        .save(output)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    Ok(output)
}

fn handle_history(log: &PrintLog, limit: usize) {
    let records = log.read(Some(limit));
    if records.is_empty() {
        println!("Nothing printed yet");
        return;
    }
    for record in records {
        let job = record.job_id.as_deref().unwrap_or("-");
        println!(
            "{}  {:<12} {}  {}",
            record.timestamp.format("%Y-%m-%d %H:%M:%S"),
            job,
            record.document.display(),
            record.cards.join(" ")
        );
    }
}

pub fn print_help() {
    println!("cardpress: print index cards for new and changed Jira issues\n");
    println!("USAGE:");
    println!("  cardpress                Poll the configured filter until Ctrl-C");
    println!("  cardpress run            Same as above");
    println!("  cardpress once           Run a single cycle and exit");
    println!("  cardpress renderers      List available card renderers");
    println!("  cardpress schema <name>  Print a renderer's input as JSON Schema");
    println!("  cardpress form <name>    Print a renderer's input as an HTML form");
    println!("  cardpress render <name> <out.pdf> [--print] key=value...");
    println!("                           Render one card from the given fields");
    println!("  cardpress history [-n N] Show the last N printed documents");
    println!();
    println!("Configuration lives in ~/.cardpress/config.toml. Set RUST_LOG to change log output.");
    println!();
    println!("EXAMPLES:");
    println!("  cardpress render centered sign.pdf message=\"Back in 5\" color=Red");
    println!("  cardpress render issuecard card.pdf --print issue_id=CI-1 summary=\"Fix login\" \\");
    println!("      reporter=\"Bob\" date=\"2024-01-15 10:30\" priority=Critical");
}
