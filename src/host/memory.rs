use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};

use html5ever::{LocalName, Namespace, QualName};
use kuchiki::traits::*;
use kuchiki::{parse_fragment, parse_html, Attribute, ExpandedName, NodeRef};
use tracing::{debug, info};
use url::Url;

use super::{BridgeError, Handle, HostBridge, HostCall, HostReply};

const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

/// A request the page issued through `XMLHttpRequest`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: String,
    pub url: String,
    pub body: Option<String>,
}

/// Reference host keeping the document in a `kuchiki` tree.
///
/// Handles are indices into a table that only grows, so a handle is never
/// reused. The document node itself is handle 0.
pub struct MemoryHost {
    state: RefCell<MemoryState>,
}

struct MemoryState {
    document: NodeRef,
    nodes: Vec<NodeRef>,
    base_url: String,
    cookies: Vec<(String, String)>,
    navigations: Vec<String>,
    default_actions: Vec<(Handle, String)>,
    console: Vec<String>,
    responses: HashMap<(String, String), String>,
    requests: Vec<RecordedRequest>,
}

impl MemoryHost {
    pub fn from_html(html: &str, base_url: &str) -> Self {
        let document = parse_html().one(html);
        Self {
            state: RefCell::new(MemoryState {
                nodes: vec![document.clone()],
                document,
                base_url: base_url.to_string(),
                cookies: Vec::new(),
                navigations: Vec::new(),
                default_actions: Vec::new(),
                console: Vec::new(),
                responses: HashMap::new(),
                requests: Vec::new(),
            }),
        }
    }

    pub fn document_handle(&self) -> Handle {
        Handle::new(0)
    }

    /// Register the body returned for a synchronous request.
    pub fn add_response(&self, method: &str, url: &str, body: &str) {
        let mut state = self.state.borrow_mut();
        let resolved = state.resolve(url);
        state
            .responses
            .insert((method.to_ascii_uppercase(), resolved), body.to_string());
    }

    /// Handle of the first element matching `selector`.
    pub fn find(&self, selector: &str) -> Option<Handle> {
        let mut state = self.state.borrow_mut();
        let node = state
            .document
            .select_first(selector)
            .ok()
            .map(|found| found.as_node().clone())?;
        Some(state.handle_of(&node))
    }

    /// Every element carrying an `id`, with its handle, in document order.
    pub fn id_elements(&self) -> Vec<(String, Handle)> {
        let mut state = self.state.borrow_mut();
        let Ok(selected) = state.document.select("[id]") else {
            return Vec::new();
        };
        let found: Vec<(String, NodeRef)> = selected
            .filter_map(|element| {
                let id = element.attributes.borrow().get("id")?.to_string();
                Some((id, element.as_node().clone()))
            })
            .collect();
        found
            .into_iter()
            .map(|(id, node)| (id, state.handle_of(&node)))
            .collect()
    }

    pub fn serialize(&self) -> String {
        self.state.borrow().document.to_string()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.state.borrow().navigations.clone()
    }

    pub fn default_actions(&self) -> Vec<(Handle, String)> {
        self.state.borrow().default_actions.clone()
    }

    pub fn console(&self) -> Vec<String> {
        self.state.borrow().console.clone()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.borrow().requests.clone()
    }
}

impl HostBridge for MemoryHost {
    fn invoke(&self, call: HostCall) -> Result<HostReply, BridgeError> {
        let op = call.name();
        self.state
            .borrow_mut()
            .apply(call)
            .map_err(|message| BridgeError::Host { op, message })
    }
}

impl MemoryState {
    fn node(&self, handle: Handle) -> Result<NodeRef, String> {
        self.nodes
            .get(handle.raw() as usize)
            .cloned()
            .ok_or_else(|| format!("unknown node {handle}"))
    }

    fn handle_of(&mut self, node: &NodeRef) -> Handle {
        if let Some(index) = self.nodes.iter().position(|known| known == node) {
            return Handle::new(index as u32);
        }
        self.nodes.push(node.clone());
        Handle::new((self.nodes.len() - 1) as u32)
    }

    fn handles_of(&mut self, nodes: Vec<NodeRef>) -> Vec<Handle> {
        nodes.iter().map(|node| self.handle_of(node)).collect()
    }

    fn resolve(&self, target: &str) -> String {
        Url::parse(&self.base_url)
            .and_then(|base| base.join(target))
            .or_else(|_| Url::parse(target))
            .map(|url| url.to_string())
            .unwrap_or_else(|_| target.to_string())
    }

    fn navigate(&mut self, target: &str) {
        let resolved = self.resolve(target);
        info!(target: "gal::host", url = %resolved, "navigation requested");
        self.navigations.push(resolved);
    }

    fn apply(&mut self, call: HostCall) -> Result<HostReply, String> {
        match call {
            HostCall::GetAttribute { handle, name } => {
                let node = self.node(handle)?;
                let value = node.as_element().and_then(|element| {
                    element
                        .attributes
                        .borrow()
                        .get(name.to_ascii_lowercase().as_str())
                        .map(str::to_string)
                });
                Ok(HostReply::MaybeText(value))
            }
            HostCall::SetAttribute {
                handle,
                name,
                value,
            } => {
                let node = self.node(handle)?;
                let element = node
                    .as_element()
                    .ok_or_else(|| format!("node {handle} is not an element"))?;
                element
                    .attributes
                    .borrow_mut()
                    .insert(name.to_ascii_lowercase().as_str(), value);
                Ok(HostReply::Unit)
            }
            HostCall::InnerContentGet { handle } => {
                let node = self.node(handle)?;
                let html: String = node.children().map(|child| child.to_string()).collect();
                Ok(HostReply::Text(html))
            }
            HostCall::InnerContentSet { handle, value } => {
                let node = self.node(handle)?;
                set_inner_html(&node, &value);
                Ok(HostReply::Unit)
            }
            HostCall::OuterContentGet { handle } => Ok(HostReply::Text(self.node(handle)?.to_string())),
            HostCall::ChildrenGet { handle } => {
                let node = self.node(handle)?;
                let children: Vec<NodeRef> = node
                    .children()
                    .filter(|child| child.as_element().is_some())
                    .collect();
                Ok(HostReply::Nodes(self.handles_of(children)))
            }
            HostCall::ParentGet { handle } => {
                let parent = self.node(handle)?.parent();
                Ok(HostReply::MaybeNode(
                    parent.map(|parent| self.handle_of(&parent)),
                ))
            }
            HostCall::AppendChild { parent, child } => {
                let parent = self.node(parent)?;
                let child = self.node(child)?;
                ensure_no_cycle(&parent, &child)?;
                parent.append(child);
                Ok(HostReply::Unit)
            }
            HostCall::InsertBefore {
                parent,
                node,
                reference,
            } => {
                let parent_node = self.node(parent)?;
                let node = self.node(node)?;
                ensure_no_cycle(&parent_node, &node)?;
                match reference {
                    Some(reference) => {
                        let reference_node = self.node(reference)?;
                        if reference_node.parent().as_ref() != Some(&parent_node) {
                            return Err(format!(
                                "node {reference} is not a child of {parent}"
                            ));
                        }
                        if reference_node == node {
                            return Ok(HostReply::Unit);
                        }
                        reference_node.insert_before(node);
                    }
                    None => parent_node.append(node),
                }
                Ok(HostReply::Unit)
            }
            HostCall::RemoveChild { parent, node } => {
                let parent_node = self.node(parent)?;
                let child = self.node(node)?;
                if child.parent().as_ref() != Some(&parent_node) {
                    return Err(format!("node {node} is not a child of {parent}"));
                }
                child.detach();
                Ok(HostReply::Unit)
            }
            HostCall::Query { selector } => {
                let matches: Vec<NodeRef> = self
                    .document
                    .select(&selector)
                    .map_err(|()| format!("invalid selector {selector:?}"))?
                    .map(|element| element.as_node().clone())
                    .collect();
                Ok(HostReply::Nodes(self.handles_of(matches)))
            }
            HostCall::CreateElement { tag } => {
                let element = NodeRef::new_element(
                    html_name(&tag.to_ascii_lowercase()),
                    std::iter::empty::<(ExpandedName, Attribute)>(),
                );
                Ok(HostReply::Node(self.handle_of(&element)))
            }
            HostCall::CreateTextNode { text } => {
                let text = NodeRef::new_text(text);
                Ok(HostReply::Node(self.handle_of(&text)))
            }
            HostCall::DocumentTitleGet => {
                let title = self
                    .document
                    .select_first("title")
                    .map(|title| title.as_node().text_contents().trim().to_string())
                    .unwrap_or_default();
                Ok(HostReply::Text(title))
            }
            HostCall::DocumentTitleSet { title } => {
                let element = self.title_element();
                for child in element.children().collect::<Vec<_>>() {
                    child.detach();
                }
                element.append(NodeRef::new_text(title));
                Ok(HostReply::Unit)
            }
            HostCall::DocumentBodyGet => {
                let body = self
                    .document
                    .select_first("body")
                    .map(|body| body.as_node().clone())
                    .map_err(|()| "document has no body".to_string())?;
                Ok(HostReply::Node(self.handle_of(&body)))
            }
            HostCall::DocumentCookieGet => {
                let cookie = self
                    .cookies
                    .iter()
                    .map(|(name, value)| format!("{name}={value}"))
                    .collect::<Vec<_>>()
                    .join("; ");
                Ok(HostReply::Text(cookie))
            }
            HostCall::DocumentCookieSet { cookie } => {
                let pair = cookie.split(';').next().unwrap_or_default();
                let (name, value) = match pair.split_once('=') {
                    Some((name, value)) => (name.trim().to_string(), value.trim().to_string()),
                    None => (String::new(), pair.trim().to_string()),
                };
                match self.cookies.iter_mut().find(|(known, _)| *known == name) {
                    Some(entry) => entry.1 = value,
                    None => self.cookies.push((name, value)),
                }
                Ok(HostReply::Unit)
            }
            HostCall::LocationSet { url } => {
                self.navigate(&url);
                Ok(HostReply::Unit)
            }
            HostCall::ComputedStyleGet { handle } => {
                let node = self.node(handle)?;
                let inline = node
                    .as_element()
                    .and_then(|element| element.attributes.borrow().get("style").map(str::to_string))
                    .unwrap_or_default();
                Ok(HostReply::Style(parse_declarations(&inline)))
            }
            HostCall::DefaultActionPerform { handle, event_type } => {
                let node = self.node(handle)?;
                debug!(target: "gal::host", %handle, event_type = %event_type, "default action");
                self.default_actions.push((handle, event_type.clone()));
                if let Some(element) = node.as_element() {
                    let tag = element.name.local.to_string();
                    let attributes = element.attributes.borrow();
                    match (event_type.as_str(), tag.as_str()) {
                        ("click", "a") => {
                            if let Some(href) = attributes.get("href").map(str::to_string) {
                                drop(attributes);
                                self.navigate(&href);
                            }
                        }
                        ("submit", "form") => {
                            let action = attributes.get("action").unwrap_or("").to_string();
                            drop(attributes);
                            self.navigate(&action);
                        }
                        _ => {}
                    }
                }
                Ok(HostReply::Unit)
            }
            HostCall::Log { text } => {
                info!(target: "gal::host", "{text}");
                self.console.push(text);
                Ok(HostReply::Unit)
            }
            HostCall::XhrSend { method, url, body } => {
                let method = method.to_ascii_uppercase();
                let url = self.resolve(&url);
                self.requests.push(RecordedRequest {
                    method: method.clone(),
                    url: url.clone(),
                    body,
                });
                self.responses
                    .get(&(method.clone(), url.clone()))
                    .cloned()
                    .map(HostReply::Text)
                    .ok_or_else(|| format!("no response registered for {method} {url}"))
            }
        }
    }

    fn title_element(&self) -> NodeRef {
        if let Ok(title) = self.document.select_first("title") {
            return title.as_node().clone();
        }
        let title = NodeRef::new_element(
            html_name("title"),
            std::iter::empty::<(ExpandedName, Attribute)>(),
        );
        match self.document.select_first("head") {
            Ok(head) => head.as_node().append(title.clone()),
            Err(()) => self.document.append(title.clone()),
        }
        title
    }
}

fn html_name(local: &str) -> QualName {
    QualName::new(None, Namespace::from(HTML_NAMESPACE), LocalName::from(local))
}

fn ensure_no_cycle(parent: &NodeRef, child: &NodeRef) -> Result<(), String> {
    if parent.inclusive_ancestors().any(|ancestor| ancestor == *child) {
        return Err("hierarchy request: node would become its own ancestor".to_string());
    }
    Ok(())
}

fn set_inner_html(node: &NodeRef, html: &str) {
    for child in node.children().collect::<Vec<_>>() {
        child.detach();
    }
    let context = node
        .as_element()
        .map(|element| element.name.clone())
        .unwrap_or_else(|| html_name("body"));
    let fragment = parse_fragment(context, Vec::new()).one(html);
    // The fragment parser wraps its output in a synthetic <html> element.
    if let Some(wrapper) = fragment.first_child() {
        for child in wrapper.children().collect::<Vec<_>>() {
            node.append(child);
        }
    }
}

fn parse_declarations(inline: &str) -> BTreeMap<String, String> {
    inline
        .split(';')
        .filter_map(|declaration| {
            let (property, value) = declaration.split_once(':')?;
            let property = property.trim().to_ascii_lowercase();
            if property.is_empty() {
                return None;
            }
            Some((property, value.trim().to_string()))
        })
        .collect()
}
