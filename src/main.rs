use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context as AnyhowContext, Result};
use gal::js::ScriptLoader;
use gal::{PageSession, RuntimeConfig};
use tracing_subscriber::EnvFilter;

struct CliArgs {
    page: PathBuf,
    config: Option<PathBuf>,
    clicks: Vec<String>,
}

const USAGE: &str = "usage: gal <page.html> [--config FILE] [--click SELECTOR]...";

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<CliArgs> {
    let mut page = None;
    let mut config = None;
    let mut clicks = Vec::new();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let path = args.next().context("--config needs a file")?;
                config = Some(PathBuf::from(path));
            }
            "--click" => clicks.push(args.next().context("--click needs a selector")?),
            "-h" | "--help" => bail!(USAGE),
            other if other.starts_with("--") => bail!("unknown option {other}\n{USAGE}"),
            other => {
                if page.replace(PathBuf::from(other)).is_some() {
                    bail!("only one page may be given\n{USAGE}");
                }
            }
        }
    }
    Ok(CliArgs {
        page: page.context(USAGE)?,
        config,
        clicks,
    })
}

fn load_config(path: Option<&PathBuf>) -> Result<RuntimeConfig> {
    let config = match path {
        Some(path) => RuntimeConfig::load(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => RuntimeConfig::default(),
    };
    config
        .with_overrides(|name| std::env::var(name).ok())
        .context("invalid environment override")
}

fn run() -> Result<()> {
    let args = parse_args(std::env::args().skip(1))?;
    let config = load_config(args.config.as_ref())?;

    let subscriber_result = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&config.log_filter).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
    if subscriber_result.is_err() {
        // tracing was already initialised; continue silently
    }

    let html = std::fs::read_to_string(&args.page)
        .with_context(|| format!("failed to read {}", args.page.display()))?;
    let base_dir = args
        .page
        .parent()
        .map(PathBuf::from)
        .unwrap_or_default();
    let read_relative = move |src: &str| -> Result<String> {
        let path = base_dir.join(src);
        std::fs::read_to_string(&path).with_context(|| format!("failed to read {}", path.display()))
    };
    let loader: &ScriptLoader = &read_relative;

    let session = PageSession::load_with(&html, &config, Some(loader))?;
    let summary = session.summary();
    tracing::info!(
        executed = summary.executed_scripts,
        failed = summary.failed_scripts,
        skipped = summary.skipped_scripts,
        "page loaded"
    );

    for selector in &args.clicks {
        session
            .click(selector)
            .with_context(|| format!("click on {selector:?} failed"))?;
    }

    println!("{}", session.document_html());
    for url in session.host().navigations() {
        println!("navigate: {url}");
    }
    for line in session.host().console() {
        println!("console: {line}");
    }
    Ok(())
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
