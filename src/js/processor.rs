use anyhow::{anyhow, Result};
use kuchiki::parse_html;
use kuchiki::traits::*;
use tracing::{debug, error, warn};

use super::environment::ScriptEnvironment;
use super::script::{ScriptDescriptor, ScriptExecution, ScriptKind, ScriptSource};

/// Fetches the source of an external script given its `src` attribute.
pub type ScriptLoader = dyn Fn(&str) -> Result<String>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScriptExecutionSummary {
    pub executed_scripts: usize,
    pub failed_scripts: usize,
    /// Modules, unknown types and external scripts with no loader.
    pub skipped_scripts: usize,
}

pub fn collect_scripts(html: &str) -> Result<Vec<ScriptDescriptor>> {
    let parsed = parse_html().one(html);
    let mut collected = Vec::new();
    let selector = parsed
        .select("script")
        .map_err(|_| anyhow!("failed to compile selector"))?;

    for (index, script) in selector.enumerate() {
        let attributes = script.attributes.borrow();
        let kind = classify_kind(attributes.get("type"));

        if let Some(src) = attributes
            .get("src")
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
        {
            collected.push(ScriptDescriptor {
                index,
                kind,
                execution: determine_execution(&attributes, kind),
                source: ScriptSource::External {
                    src: src.to_string(),
                },
            });
            continue;
        }

        drop(attributes);
        let code = script.text_contents();
        if code.trim().is_empty() {
            continue;
        }
        let mut descriptor = ScriptDescriptor::inline(index, code, kind);
        if kind == ScriptKind::Module {
            descriptor.execution = ScriptExecution::Defer;
        }
        collected.push(descriptor);
    }

    Ok(collected)
}

fn classify_kind(script_type: Option<&str>) -> ScriptKind {
    let Some(value) = script_type else {
        return ScriptKind::Classic;
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "" | "text/javascript" | "application/javascript" | "text/ecmascript"
        | "application/ecmascript" => ScriptKind::Classic,
        "module" => ScriptKind::Module,
        _ => ScriptKind::Unknown,
    }
}

/// `async` and `defer` only matter for external scripts.
fn determine_execution(attributes: &kuchiki::Attributes, kind: ScriptKind) -> ScriptExecution {
    if attributes.get("async").is_some() {
        return ScriptExecution::Async;
    }
    if attributes.get("defer").is_some() || kind == ScriptKind::Module {
        return ScriptExecution::Defer;
    }
    ScriptExecution::Blocking
}

/// Classic scripts in the order they run: blocking, then deferred, then
/// async, document order within each group.
pub(super) fn runnable_in_order(scripts: &[ScriptDescriptor]) -> Vec<&ScriptDescriptor> {
    let mut runnable: Vec<&ScriptDescriptor> = scripts
        .iter()
        .filter(|descriptor| descriptor.kind == ScriptKind::Classic)
        .collect();
    runnable.sort_by_key(|descriptor| (descriptor.execution, descriptor.index));
    runnable
}

/// Evaluate every classic script. A failing script is logged and counted;
/// later scripts still run.
pub fn run_scripts(
    environment: &ScriptEnvironment,
    scripts: &[ScriptDescriptor],
    loader: Option<&ScriptLoader>,
) -> ScriptExecutionSummary {
    let mut summary = ScriptExecutionSummary {
        skipped_scripts: scripts
            .iter()
            .filter(|descriptor| descriptor.kind != ScriptKind::Classic)
            .count(),
        ..ScriptExecutionSummary::default()
    };

    for descriptor in runnable_in_order(scripts) {
        let filename = descriptor.filename();
        let source = match (&descriptor.source, loader) {
            (ScriptSource::Inline { code }, _) => code.clone(),
            (ScriptSource::External { src }, Some(load)) => match load(src) {
                Ok(code) => code,
                Err(err) => {
                    error!(target: "quickjs", %filename, error = %err, "failed to load script");
                    summary.failed_scripts += 1;
                    continue;
                }
            },
            (ScriptSource::External { src }, None) => {
                warn!(target: "quickjs", %src, "no loader for external script");
                summary.skipped_scripts += 1;
                continue;
            }
        };

        match environment.eval(&source, &filename) {
            Ok(()) => summary.executed_scripts += 1,
            Err(err) => {
                error!(target: "quickjs", %filename, error = %err, "script execution failed");
                summary.failed_scripts += 1;
            }
        }
    }

    debug!(
        target: "quickjs",
        executed = summary.executed_scripts,
        failed = summary.failed_scripts,
        skipped = summary.skipped_scripts,
        "page scripts finished"
    );
    summary
}
