use anyhow::{Context as AnyhowContext, Result};
use rquickjs::{Context, Ctx, Error as JsError, Runtime, Value};

use super::listener::ScriptError;

/// JavaScript runtime backed by QuickJS.
///
/// The engine owns the QuickJS runtime and context and provides helpers for
/// evaluating scripts and draining the job queue afterwards.
pub struct QuickJsEngine {
    runtime: Runtime,
    context: Context,
    max_pending_jobs: usize,
}

impl QuickJsEngine {
    pub fn new(max_pending_jobs: usize) -> Result<Self> {
        let runtime = Runtime::new().context("failed to create QuickJS runtime")?;
        let context = Context::full(&runtime).context("failed to create QuickJS context")?;
        Ok(Self {
            runtime,
            context,
            max_pending_jobs,
        })
    }

    /// Evaluate a script and discard the result.
    pub fn eval(&self, source: &str, filename: &str) -> Result<()> {
        self.eval_with::<()>(source, filename)
    }

    /// Evaluate a script and convert the result into `V`.
    pub fn eval_with<V>(&self, source: &str, filename: &str) -> Result<V>
    where
        V: for<'js> rquickjs::FromJs<'js>,
    {
        let script = Self::with_source_url(source, filename);
        let value = self.context.with(|ctx| match ctx.eval::<V, _>(script) {
            Ok(value) => Ok(value),
            Err(err) => Err(describe_js_error(&ctx, err)),
        })?;
        self.execute_pending_jobs()?;
        Ok(value)
    }

    /// Run `f` inside the context, turning a pending script exception into
    /// an error that carries its message.
    pub fn with_script<T, F>(&self, f: F) -> Result<T>
    where
        F: for<'js> FnOnce(&Ctx<'js>) -> Result<T, ScriptError>,
    {
        let value = self.context.with(|ctx| {
            f(&ctx).map_err(|err| match err {
                ScriptError::Js(err) => describe_js_error(&ctx, err),
                ScriptError::Dom(err) => anyhow::Error::from(err),
            })
        })?;
        self.execute_pending_jobs()?;
        Ok(value)
    }

    /// Provide access to the underlying QuickJS context for advanced integrations.
    pub fn with_context<T, F>(&self, f: F) -> Result<T>
    where
        F: for<'js> FnOnce(Ctx<'js>) -> rquickjs::Result<T>,
    {
        self.context.with(f).map_err(anyhow::Error::from)
    }

    /// Execute pending promise jobs, up to the configured cap.
    fn execute_pending_jobs(&self) -> Result<()> {
        let mut job_count = 0;

        while self.runtime.is_job_pending() {
            match self.runtime.execute_pending_job() {
                Ok(true) => {
                    job_count += 1;
                    if job_count >= self.max_pending_jobs {
                        tracing::warn!(
                            target: "quickjs",
                            "Stopped processing jobs after {} iterations (possible infinite loop)",
                            self.max_pending_jobs
                        );
                        break;
                    }
                }
                Ok(false) => break,
                Err(job_exception) => {
                    tracing::error!(
                        target: "quickjs",
                        "Job execution error: {:?}",
                        job_exception
                    );
                    break;
                }
            }
        }

        if job_count > 0 {
            tracing::debug!(target: "quickjs", "Executed {} pending jobs", job_count);
        }

        Ok(())
    }

    fn with_source_url(source: &str, filename: &str) -> Vec<u8> {
        let mut script = String::with_capacity(source.len() + filename.len() + 32);
        script.push_str(source);
        if !source.ends_with('\n') {
            script.push('\n');
        }
        script.push_str("//# sourceURL=");
        script.push_str(filename);
        script.push('\n');
        script.into_bytes()
    }
}

fn describe_js_error(ctx: &Ctx<'_>, err: JsError) -> anyhow::Error {
    match err {
        JsError::Exception => anyhow::anyhow!(
            capture_exception_message(ctx).unwrap_or_else(|| "QuickJS exception".to_string())
        ),
        err => anyhow::Error::from(err),
    }
}

pub(crate) fn capture_exception_message(ctx: &Ctx<'_>) -> Option<String> {
    let exception: Value = ctx.catch();
    if exception.is_undefined() {
        return None;
    }

    if let Some(obj) = exception.as_object() {
        if let Ok(message) = obj.get::<_, String>("message") {
            if let Ok(stack) = obj.get::<_, String>("stack") {
                if !stack.is_empty() {
                    return Some(format!("Error: {}\nStack: {}", message, stack));
                }
            }
            return Some(format!("Error: {}", message));
        }
    }

    if let Some(text) = exception.as_string().and_then(|s| s.to_string().ok()) {
        return Some(text);
    }

    Some(format!("{:?}", exception))
}
