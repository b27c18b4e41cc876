use std::cell::RefCell;
use std::rc::Rc;

use crate::host::{Handle, HostBridge};

use super::document::Document;
use super::listeners::{ListenerId, ListenerRegistry};
use super::node::NodeProxy;

/// Shared state of one scripting runtime: the host connection, the document
/// facade and the listener registry.
///
/// `L` is the listener representation; native Rust closures and script
/// function references both fit. One instance per runtime, so tests get
/// isolated registries by constructing their own.
pub struct DomRuntime<L> {
    host: Rc<dyn HostBridge>,
    document: Document,
    pub(super) listeners: RefCell<ListenerRegistry<L>>,
}

impl<L> DomRuntime<L> {
    pub fn new(host: Rc<dyn HostBridge>) -> Self {
        Self {
            document: Document::new(Rc::clone(&host)),
            host,
            listeners: RefCell::new(ListenerRegistry::new()),
        }
    }

    pub fn host(&self) -> &Rc<dyn HostBridge> {
        &self.host
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// A fresh proxy for `handle`.
    pub fn node(&self, handle: Handle) -> NodeProxy {
        NodeProxy::new(handle, Rc::clone(&self.host))
    }

    pub fn add_event_listener(&self, node: &NodeProxy, event_type: &str, listener: L) -> ListenerId {
        self.listeners
            .borrow_mut()
            .register(node.handle(), event_type, listener)
    }

    pub fn remove_event_listener(&self, node: &NodeProxy, event_type: &str, id: ListenerId) -> bool {
        self.listeners
            .borrow_mut()
            .remove(node.handle(), event_type, id)
    }

    /// Remove the earliest listener for `(node, event_type)` accepted by `matches`.
    pub fn remove_event_listener_where(
        &self,
        node: &NodeProxy,
        event_type: &str,
        matches: impl FnMut(&L) -> bool,
    ) -> bool {
        self.listeners
            .borrow_mut()
            .remove_first(node.handle(), event_type, matches)
    }

    /// Registered listeners in order, copied out of the registry.
    pub fn listeners_for(&self, node: &NodeProxy, event_type: &str) -> Vec<L>
    where
        L: Clone,
    {
        self.listeners
            .borrow()
            .listeners_for(node.handle(), event_type)
    }

    pub fn listener_count(&self, node: &NodeProxy, event_type: &str) -> usize {
        self.listeners.borrow().count(node.handle(), event_type)
    }

    pub fn clear_listeners(&self) {
        self.listeners.borrow_mut().clear();
    }
}
