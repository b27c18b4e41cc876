//! QuickJS scripting on top of [`crate::dom`].

pub mod environment;
pub mod listener;
pub mod processor;
pub mod runtime;
pub mod script;
pub mod session;

pub use environment::ScriptEnvironment;
pub use listener::{JsInvoker, JsListener, ScriptError};
pub use processor::{collect_scripts, run_scripts, ScriptExecutionSummary, ScriptLoader};
pub use runtime::QuickJsEngine;
pub use script::{ScriptDescriptor, ScriptExecution, ScriptKind, ScriptSource};
pub use session::PageSession;
