//! A script runtime that presents a host-owned document to page scripts
//! through handle-backed node proxies and a synchronous event dispatcher.

pub mod config;
pub mod dom;
pub mod host;
pub mod js;

pub use config::{ConfigError, RuntimeConfig};
pub use dom::{DomError, DomRuntime, Event, EventInit, NodeProxy};
pub use host::{BridgeError, Handle, HostBridge, HostCall, HostReply, MemoryHost};
pub use js::{PageSession, ScriptEnvironment};
