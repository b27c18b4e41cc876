use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use crate::host::{invoke, Handle, HostBridge, HostCall};

use super::error::DomError;

/// Local stand-in for one remote node.
///
/// Nothing is cached: every read is a fresh host call. Two proxies for the
/// same handle are equal and interchangeable.
#[derive(Clone)]
pub struct NodeProxy {
    handle: Handle,
    host: Rc<dyn HostBridge>,
}

impl NodeProxy {
    pub fn new(handle: Handle, host: Rc<dyn HostBridge>) -> Self {
        Self { handle, host }
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }

    fn wrap(&self, handle: Handle) -> NodeProxy {
        NodeProxy::new(handle, Rc::clone(&self.host))
    }

    fn call(&self, call: HostCall) -> Result<crate::host::Reply, DomError> {
        Ok(invoke(self.host.as_ref(), call)?)
    }

    /// `None` when the attribute is unset.
    pub fn get_attribute(&self, name: &str) -> Result<Option<String>, DomError> {
        Ok(self
            .call(HostCall::GetAttribute {
                handle: self.handle,
                name: name.to_string(),
            })?
            .optional_text()?)
    }

    pub fn set_attribute(&self, name: &str, value: &str) -> Result<(), DomError> {
        Ok(self
            .call(HostCall::SetAttribute {
                handle: self.handle,
                name: name.to_string(),
                value: value.to_string(),
            })?
            .unit()?)
    }

    /// Serialized children (`innerHTML`).
    pub fn content(&self) -> Result<String, DomError> {
        Ok(self
            .call(HostCall::InnerContentGet {
                handle: self.handle,
            })?
            .text()?)
    }

    pub fn set_content(&self, value: &str) -> Result<(), DomError> {
        Ok(self
            .call(HostCall::InnerContentSet {
                handle: self.handle,
                value: value.to_string(),
            })?
            .unit()?)
    }

    /// The node itself serialized (`outerHTML`).
    pub fn serialized_self(&self) -> Result<String, DomError> {
        Ok(self
            .call(HostCall::OuterContentGet {
                handle: self.handle,
            })?
            .text()?)
    }

    pub fn children(&self) -> Result<Vec<NodeProxy>, DomError> {
        let handles = self
            .call(HostCall::ChildrenGet {
                handle: self.handle,
            })?
            .nodes()?;
        Ok(handles.into_iter().map(|handle| self.wrap(handle)).collect())
    }

    pub fn parent(&self) -> Result<Option<NodeProxy>, DomError> {
        let parent = self
            .call(HostCall::ParentGet {
                handle: self.handle,
            })?
            .optional_node()?;
        Ok(parent.map(|handle| self.wrap(handle)))
    }

    pub fn append_child(&self, child: &NodeProxy) -> Result<(), DomError> {
        Ok(self
            .call(HostCall::AppendChild {
                parent: self.handle,
                child: child.handle,
            })?
            .unit()?)
    }

    /// Insert `node` before `reference`, or append when there is none.
    pub fn insert_before(
        &self,
        node: &NodeProxy,
        reference: Option<&NodeProxy>,
    ) -> Result<(), DomError> {
        Ok(self
            .call(HostCall::InsertBefore {
                parent: self.handle,
                node: node.handle,
                reference: reference.map(NodeProxy::handle),
            })?
            .unit()?)
    }

    /// Returns the very proxy passed in so calls can be chained.
    pub fn remove_child(&self, node: NodeProxy) -> Result<NodeProxy, DomError> {
        self.call(HostCall::RemoveChild {
            parent: self.handle,
            node: node.handle,
        })?
        .unit()?;
        Ok(node)
    }

    pub fn computed_style(&self) -> Result<BTreeMap<String, String>, DomError> {
        Ok(self
            .call(HostCall::ComputedStyleGet {
                handle: self.handle,
            })?
            .style()?)
    }

    pub(crate) fn perform_default_action(&self, event_type: &str) -> Result<(), DomError> {
        Ok(self
            .call(HostCall::DefaultActionPerform {
                handle: self.handle,
                event_type: event_type.to_string(),
            })?
            .unit()?)
    }
}

impl PartialEq for NodeProxy {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle
    }
}

impl Eq for NodeProxy {}

impl Hash for NodeProxy {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.handle.hash(state);
    }
}

impl fmt::Debug for NodeProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NodeProxy").field(&self.handle).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryHost;

    fn page(html: &str) -> (Rc<MemoryHost>, Rc<dyn HostBridge>) {
        let host = Rc::new(MemoryHost::from_html(html, "about:blank"));
        let bridge: Rc<dyn HostBridge> = host.clone();
        (host, bridge)
    }

    #[test]
    fn proxies_compare_by_handle() {
        let (host, bridge) = page("<ul><li>a</li></ul>");
        let li = host.find("li").expect("li");
        let one = NodeProxy::new(li, Rc::clone(&bridge));
        let other = NodeProxy::new(li, bridge);
        assert_eq!(one, other);
    }

    #[test]
    fn children_and_parent_are_read_from_the_host() {
        let (host, bridge) = page("<ul id=list><li>a</li><li>b</li></ul>");
        let list = NodeProxy::new(host.find("#list").expect("list"), bridge);
        let children = list.children().expect("children");
        assert_eq!(children.len(), 2);
        assert_eq!(children[1].content().expect("content"), "b");
        assert_eq!(children[0].parent().expect("parent"), Some(list.clone()));
    }

    #[test]
    fn document_node_has_no_parent() {
        let (host, bridge) = page("<p></p>");
        let document = NodeProxy::new(host.document_handle(), bridge);
        assert_eq!(document.parent().expect("parent lookup"), None);
    }

    #[test]
    fn remove_child_hands_back_the_same_proxy() {
        let (host, bridge) = page("<div><span>x</span></div>");
        let div = NodeProxy::new(host.find("div").expect("div"), Rc::clone(&bridge));
        let span = NodeProxy::new(host.find("span").expect("span"), bridge);
        let removed = div.remove_child(span.clone()).expect("remove");
        assert_eq!(removed, span);
        assert_eq!(div.content().expect("content"), "");
        assert_eq!(span.parent().expect("detached parent"), None);
    }

    #[test]
    fn insert_before_places_node_ahead_of_reference() {
        let (host, bridge) = page("<ol><li id=b>b</li></ol>");
        let list = NodeProxy::new(host.find("ol").expect("ol"), Rc::clone(&bridge));
        let b = NodeProxy::new(host.find("#b").expect("b"), Rc::clone(&bridge));
        let handle = bridge
            .invoke(HostCall::CreateElement { tag: "li".into() })
            .expect("create");
        let crate::host::HostReply::Node(handle) = handle else {
            panic!("expected node");
        };
        let a = NodeProxy::new(handle, bridge);
        a.set_content("a").expect("content");
        list.insert_before(&a, Some(&b)).expect("insert");
        assert_eq!(
            list.content().expect("content"),
            "<li>a</li><li id=\"b\">b</li>"
        );
    }
}
