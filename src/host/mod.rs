//! The boundary to the process that owns the real document.
//!
//! Everything the runtime knows about the tree arrives through a single
//! synchronous primitive, [`HostBridge::invoke`]. Calls and replies are plain
//! serde enums so a host living in another process can be reached through
//! [`wire::JsonBridge`].

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};

pub mod memory;
pub mod wire;

pub use memory::{MemoryHost, RecordedRequest};
pub use wire::{serve_json, JsonBridge};

/// Opaque, host-assigned identifier of one node in the external tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Handle(u32);

impl Handle {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Translate a raw host value, mapping the negative "no node" sentinel to `None`.
    pub fn from_raw(raw: i64) -> Option<Self> {
        u32::try_from(raw).ok().map(Self)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One request to the host. Each variant is a single round trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum HostCall {
    /// Reply: optional text. An unset attribute is `None`, never `""`.
    GetAttribute { handle: Handle, name: String },
    SetAttribute { handle: Handle, name: String, value: String },
    InnerContentGet { handle: Handle },
    InnerContentSet { handle: Handle, value: String },
    OuterContentGet { handle: Handle },
    /// Reply: element children in document order.
    ChildrenGet { handle: Handle },
    /// Reply: optional node; the root has no parent.
    ParentGet { handle: Handle },
    AppendChild { parent: Handle, child: Handle },
    /// A missing reference appends.
    InsertBefore {
        parent: Handle,
        node: Handle,
        reference: Option<Handle>,
    },
    RemoveChild { parent: Handle, node: Handle },
    Query { selector: String },
    CreateElement { tag: String },
    CreateTextNode { text: String },
    DocumentTitleGet,
    DocumentTitleSet { title: String },
    DocumentBodyGet,
    DocumentCookieGet,
    DocumentCookieSet { cookie: String },
    LocationSet { url: String },
    ComputedStyleGet { handle: Handle },
    DefaultActionPerform { handle: Handle, event_type: String },
    Log { text: String },
    /// Synchronous request; the host never sees asynchronous ones.
    XhrSend {
        method: String,
        url: String,
        body: Option<String>,
    },
}

impl HostCall {
    pub fn name(&self) -> &'static str {
        match self {
            HostCall::GetAttribute { .. } => "getAttribute",
            HostCall::SetAttribute { .. } => "setAttribute",
            HostCall::InnerContentGet { .. } => "innerContentGet",
            HostCall::InnerContentSet { .. } => "innerContentSet",
            HostCall::OuterContentGet { .. } => "outerContentGet",
            HostCall::ChildrenGet { .. } => "childrenGet",
            HostCall::ParentGet { .. } => "parentGet",
            HostCall::AppendChild { .. } => "appendChild",
            HostCall::InsertBefore { .. } => "insertBefore",
            HostCall::RemoveChild { .. } => "removeChild",
            HostCall::Query { .. } => "query",
            HostCall::CreateElement { .. } => "createElement",
            HostCall::CreateTextNode { .. } => "createTextNode",
            HostCall::DocumentTitleGet => "documentTitleGet",
            HostCall::DocumentTitleSet { .. } => "documentTitleSet",
            HostCall::DocumentBodyGet => "documentBodyGet",
            HostCall::DocumentCookieGet => "documentCookieGet",
            HostCall::DocumentCookieSet { .. } => "documentCookieSet",
            HostCall::LocationSet { .. } => "locationSet",
            HostCall::ComputedStyleGet { .. } => "computedStyleGet",
            HostCall::DefaultActionPerform { .. } => "defaultActionPerform",
            HostCall::Log { .. } => "log",
            HostCall::XhrSend { .. } => "xhrSend",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum HostReply {
    Unit,
    Text(String),
    MaybeText(Option<String>),
    Node(Handle),
    MaybeNode(Option<Handle>),
    Nodes(Vec<Handle>),
    Style(BTreeMap<String, String>),
}

impl HostReply {
    fn kind(&self) -> &'static str {
        match self {
            HostReply::Unit => "unit",
            HostReply::Text(_) => "text",
            HostReply::MaybeText(_) => "optional text",
            HostReply::Node(_) => "node",
            HostReply::MaybeNode(_) => "optional node",
            HostReply::Nodes(_) => "node list",
            HostReply::Style(_) => "style",
        }
    }
}

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("host rejected {op}: {message}")]
    Host { op: &'static str, message: String },
    #[error("host answered {op} with {found}, expected {expected}")]
    UnexpectedReply {
        op: &'static str,
        expected: &'static str,
        found: &'static str,
    },
    #[error("wire error: {0}")]
    Wire(#[from] serde_json::Error),
    #[error("transport error: {0}")]
    Transport(String),
}

/// The synchronous call primitive implemented by every host.
pub trait HostBridge {
    fn invoke(&self, call: HostCall) -> Result<HostReply, BridgeError>;
}

/// A reply tagged with the operation that produced it, so shape mismatches
/// can say which call misbehaved.
#[derive(Debug)]
pub struct Reply {
    op: &'static str,
    value: HostReply,
}

impl Reply {
    fn mismatch(self, expected: &'static str) -> BridgeError {
        BridgeError::UnexpectedReply {
            op: self.op,
            expected,
            found: self.value.kind(),
        }
    }

    pub fn unit(self) -> Result<(), BridgeError> {
        match self.value {
            HostReply::Unit => Ok(()),
            _ => Err(self.mismatch("unit")),
        }
    }

    pub fn text(self) -> Result<String, BridgeError> {
        match self.value {
            HostReply::Text(text) => Ok(text),
            _ => Err(self.mismatch("text")),
        }
    }

    pub fn optional_text(self) -> Result<Option<String>, BridgeError> {
        match self.value {
            HostReply::MaybeText(text) => Ok(text),
            HostReply::Text(text) => Ok(Some(text)),
            _ => Err(self.mismatch("optional text")),
        }
    }

    pub fn node(self) -> Result<Handle, BridgeError> {
        match self.value {
            HostReply::Node(handle) => Ok(handle),
            _ => Err(self.mismatch("node")),
        }
    }

    pub fn optional_node(self) -> Result<Option<Handle>, BridgeError> {
        match self.value {
            HostReply::MaybeNode(handle) => Ok(handle),
            HostReply::Node(handle) => Ok(Some(handle)),
            _ => Err(self.mismatch("optional node")),
        }
    }

    pub fn nodes(self) -> Result<Vec<Handle>, BridgeError> {
        match self.value {
            HostReply::Nodes(handles) => Ok(handles),
            _ => Err(self.mismatch("node list")),
        }
    }

    pub fn style(self) -> Result<BTreeMap<String, String>, BridgeError> {
        match self.value {
            HostReply::Style(style) => Ok(style),
            _ => Err(self.mismatch("style")),
        }
    }
}

/// Issue one call and tag the reply with its operation name.
pub fn invoke(host: &dyn HostBridge, call: HostCall) -> Result<Reply, BridgeError> {
    let op = call.name();
    trace!(target: "gal::bridge", op, ?call, "host call");
    match host.invoke(call) {
        Ok(value) => Ok(Reply { op, value }),
        Err(err) => {
            debug!(target: "gal::bridge", op, error = %err, "host call failed");
            Err(err)
        }
    }
}
