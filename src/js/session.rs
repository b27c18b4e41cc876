use std::rc::Rc;

use anyhow::{anyhow, Context as AnyhowContext, Result};
use tracing::debug;

use crate::config::RuntimeConfig;
use crate::host::{Handle, MemoryHost};

use super::environment::ScriptEnvironment;
use super::processor::{collect_scripts, run_scripts, ScriptExecutionSummary, ScriptLoader};
use super::script::ScriptDescriptor;

/// One loaded page: the in-memory host document, its script context and
/// the outcome of running the page's scripts.
pub struct PageSession {
    host: Rc<MemoryHost>,
    environment: ScriptEnvironment,
    scripts: Vec<ScriptDescriptor>,
    summary: ScriptExecutionSummary,
}

impl PageSession {
    /// Load `html` and run its classic scripts. External scripts are skipped.
    pub fn load(html: &str, config: &RuntimeConfig) -> Result<Self> {
        Self::load_with(html, config, None)
    }

    pub fn load_with(
        html: &str,
        config: &RuntimeConfig,
        loader: Option<&ScriptLoader>,
    ) -> Result<Self> {
        let host = Rc::new(MemoryHost::from_html(html, &config.base_url));
        let environment = ScriptEnvironment::new(host.clone(), config)
            .context("failed to create QuickJS environment for page")?;

        if config.register_id_aliases {
            for (id, handle) in host.id_elements() {
                if !environment.register_global_alias(&id, handle)? {
                    debug!(target: "quickjs", %id, "global name already taken");
                }
            }
        }

        let scripts = collect_scripts(html).context("failed to collect page scripts")?;
        let summary = run_scripts(&environment, &scripts, loader);

        Ok(Self {
            host,
            environment,
            scripts,
            summary,
        })
    }

    pub fn host(&self) -> &Rc<MemoryHost> {
        &self.host
    }

    pub fn environment(&self) -> &ScriptEnvironment {
        &self.environment
    }

    pub fn scripts(&self) -> &[ScriptDescriptor] {
        &self.scripts
    }

    pub fn summary(&self) -> ScriptExecutionSummary {
        self.summary
    }

    /// Handle of the first element matching `selector`.
    pub fn find(&self, selector: &str) -> Result<Handle> {
        self.host
            .find(selector)
            .ok_or_else(|| anyhow!("no element matches {selector:?}"))
    }

    /// A user click on the first match: listeners run, then the host performs
    /// the default action unless it was prevented.
    pub fn click(&self, selector: &str) -> Result<()> {
        let handle = self.find(selector)?;
        self.environment.dispatch_host_event(handle, "click")
    }

    pub fn document_html(&self) -> String {
        self.host.serialize()
    }
}
