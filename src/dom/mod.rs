//! Script-facing document model: node proxies, events, listeners and dispatch.
//!
//! Nothing here owns tree state. Every structural read or write is a call
//! through [`crate::host::HostBridge`].

pub mod dispatch;
pub mod document;
pub mod error;
pub mod event;
pub mod listeners;
pub mod node;
pub mod request;
pub mod runtime;

pub use dispatch::{ListenerInvoker, NativeInvoker, NativeListener};
pub use document::Document;
pub use error::DomError;
pub use event::{Event, EventInit, Phase};
pub use listeners::{ListenerId, ListenerRegistry};
pub use node::NodeProxy;
pub use request::XmlHttpRequest;
pub use runtime::DomRuntime;
