use rquickjs::{Ctx, Function, IntoJs, Object};
use thiserror::Error;
use tracing::error;

use crate::dom::{DomError, Event, ListenerInvoker, NodeProxy};
use crate::host::Handle;

/// Failure while running script listeners.
///
/// `Js` keeps the engine's own error so a pending exception can be rethrown
/// to the script that started the dispatch without being rewritten.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error(transparent)]
    Js(#[from] rquickjs::Error),
    #[error(transparent)]
    Dom(#[from] DomError),
}

/// A script function registered as a listener.
///
/// The function object itself lives in a slot table inside the script
/// context; the registry only carries the slot number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JsListener {
    slot: u32,
}

impl JsListener {
    pub fn new(slot: u32) -> Self {
        Self { slot }
    }

    pub fn slot(self) -> u32 {
        self.slot
    }
}

pub(crate) const PREVENTED: u32 = 1;
pub(crate) const STOPPED: u32 = 2;

/// Runs [`JsListener`]s against one script-visible event object.
///
/// Host-raised events have no script object until a listener needs one, so
/// it is created lazily on the first invocation.
pub struct JsInvoker<'js> {
    ctx: Ctx<'js>,
    target: Handle,
    event: Option<Object<'js>>,
}

impl<'js> JsInvoker<'js> {
    pub fn new(ctx: &Ctx<'js>, target: Handle) -> Self {
        Self {
            ctx: ctx.clone(),
            target,
            event: None,
        }
    }

    /// Reuse an event object the script already holds.
    pub fn with_event(ctx: &Ctx<'js>, target: Handle, event: Object<'js>) -> Self {
        Self {
            ctx: ctx.clone(),
            target,
            event: Some(event),
        }
    }

    /// Reset the script event once dispatch is over. No-op if no listener ran.
    pub fn finish(mut self) -> rquickjs::Result<()> {
        let Some(event) = self.event.take() else {
            return Ok(());
        };
        let finish = self.helper("__finishEvent")?;
        finish.call::<_, ()>((event,))
    }

    fn helper(&self, name: &str) -> rquickjs::Result<Function<'js>> {
        let gal: Object<'js> = self.ctx.globals().get("gal")?;
        gal.get(name)
    }

    fn script_event(&mut self, event: &Event) -> rquickjs::Result<Object<'js>> {
        if let Some(existing) = &self.event {
            return Ok(existing.clone());
        }
        let create = self.helper("__createEvent")?;
        let created: Object<'js> = create.call((
            event.event_type().to_string(),
            event.bubbles(),
            event.is_trusted(),
            self.target.raw(),
            event.default_prevented(),
        ))?;
        self.event = Some(created.clone());
        Ok(created)
    }
}

impl<'js> ListenerInvoker<JsListener> for JsInvoker<'js> {
    type Error = ScriptError;

    fn invoke(
        &mut self,
        listener: &JsListener,
        current: &NodeProxy,
        event: &Event,
    ) -> Result<(), ScriptError> {
        let script_event = self.script_event(event)?;
        let invoke = self.helper("__invokeListener")?;
        let flags: u32 = invoke.call((
            listener.slot,
            current.handle().raw(),
            script_event,
            u32::from(event.phase().code()),
        ))?;
        if flags & PREVENTED != 0 {
            event.prevent_default();
        }
        if flags & STOPPED != 0 {
            event.stop_propagation();
        }
        Ok(())
    }
}

/// Throw `err` into the script as an `Error` object.
pub(crate) fn throw_dom_error<T>(ctx: &Ctx<'_>, err: DomError) -> rquickjs::Result<T> {
    error!(target: "quickjs", "DOM operation failed: {err}");
    let message = err.to_string().into_js(ctx)?;
    let constructor: Function = ctx.globals().get("Error")?;
    let value = match constructor.call::<_, rquickjs::Value>((message.clone(),)) {
        Ok(value) => value,
        Err(_) => message,
    };
    Err(ctx.throw(value))
}

/// Hand a [`ScriptError`] back to the script: engine errors pass through,
/// DOM errors become exceptions.
pub(crate) fn rethrow<T>(ctx: &Ctx<'_>, err: ScriptError) -> rquickjs::Result<T> {
    match err {
        ScriptError::Js(err) => Err(err),
        ScriptError::Dom(err) => throw_dom_error(ctx, err),
    }
}
