use std::rc::Rc;

use crate::host::{invoke, HostBridge, HostCall, Reply};

use super::error::DomError;
use super::node::NodeProxy;

/// Entry points that are not tied to a particular node.
///
/// Holds no tree state; every method is one forwarded call.
#[derive(Clone)]
pub struct Document {
    host: Rc<dyn HostBridge>,
}

impl Document {
    pub fn new(host: Rc<dyn HostBridge>) -> Self {
        Self { host }
    }

    fn call(&self, call: HostCall) -> Result<Reply, DomError> {
        Ok(invoke(self.host.as_ref(), call)?)
    }

    fn wrap(&self, handle: crate::host::Handle) -> NodeProxy {
        NodeProxy::new(handle, Rc::clone(&self.host))
    }

    /// Matching elements in the order the host reports them.
    pub fn query(&self, selector: &str) -> Result<Vec<NodeProxy>, DomError> {
        let handles = self
            .call(HostCall::Query {
                selector: selector.to_string(),
            })?
            .nodes()?;
        Ok(handles.into_iter().map(|handle| self.wrap(handle)).collect())
    }

    pub fn query_first(&self, selector: &str) -> Result<Option<NodeProxy>, DomError> {
        Ok(self.query(selector)?.into_iter().next())
    }

    pub fn create_element(&self, tag: &str) -> Result<NodeProxy, DomError> {
        let handle = self
            .call(HostCall::CreateElement {
                tag: tag.to_string(),
            })?
            .node()?;
        Ok(self.wrap(handle))
    }

    pub fn create_text_node(&self, text: &str) -> Result<NodeProxy, DomError> {
        let handle = self
            .call(HostCall::CreateTextNode {
                text: text.to_string(),
            })?
            .node()?;
        Ok(self.wrap(handle))
    }

    pub fn body(&self) -> Result<NodeProxy, DomError> {
        let handle = self.call(HostCall::DocumentBodyGet)?.node()?;
        Ok(self.wrap(handle))
    }

    pub fn title(&self) -> Result<String, DomError> {
        Ok(self.call(HostCall::DocumentTitleGet)?.text()?)
    }

    pub fn set_title(&self, title: &str) -> Result<(), DomError> {
        Ok(self
            .call(HostCall::DocumentTitleSet {
                title: title.to_string(),
            })?
            .unit()?)
    }

    pub fn cookie(&self) -> Result<String, DomError> {
        Ok(self.call(HostCall::DocumentCookieGet)?.text()?)
    }

    pub fn set_cookie(&self, cookie: &str) -> Result<(), DomError> {
        Ok(self
            .call(HostCall::DocumentCookieSet {
                cookie: cookie.to_string(),
            })?
            .unit()?)
    }

    /// Ask the host to navigate. Write-only: the host owns the current location.
    pub fn set_location(&self, url: &str) -> Result<(), DomError> {
        Ok(self
            .call(HostCall::LocationSet {
                url: url.to_string(),
            })?
            .unit()?)
    }

    pub fn log(&self, text: &str) -> Result<(), DomError> {
        Ok(self
            .call(HostCall::Log {
                text: text.to_string(),
            })?
            .unit()?)
    }
}
