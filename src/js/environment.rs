use std::rc::Rc;

use anyhow::Result;
use rquickjs::{Ctx, Function, Object, Value};
use tracing::{debug, info};

use crate::config::RuntimeConfig;
use crate::dom::{DomError, DomRuntime, Event, EventInit, NodeProxy, XmlHttpRequest};
use crate::host::{BridgeError, Handle, HostBridge};

use super::listener::{rethrow, throw_dom_error, JsInvoker, JsListener, PREVENTED, STOPPED};
use super::runtime::QuickJsEngine;

/// A QuickJS context wired to one host document.
///
/// Scripts see `document`, `window`, `Node`, `Event`, `XMLHttpRequest` and
/// friends; every tree operation they perform goes through the shared
/// [`DomRuntime`], and so does every dispatch, whether a script or the host
/// started it.
pub struct ScriptEnvironment {
    engine: QuickJsEngine,
    runtime: Rc<DomRuntime<JsListener>>,
}

impl ScriptEnvironment {
    pub fn new(host: Rc<dyn HostBridge>, config: &RuntimeConfig) -> Result<Self> {
        let engine = QuickJsEngine::new(config.max_pending_jobs)?;
        let runtime = Rc::new(DomRuntime::new(host));
        engine.with_context(|ctx| install_dom_bindings(&ctx, &runtime))?;
        Ok(Self { engine, runtime })
    }

    pub fn runtime(&self) -> &Rc<DomRuntime<JsListener>> {
        &self.runtime
    }

    pub fn eval(&self, source: &str, filename: &str) -> Result<()> {
        self.engine.eval(source, filename)
    }

    pub fn eval_with<V>(&self, source: &str, filename: &str) -> Result<V>
    where
        V: for<'js> rquickjs::FromJs<'js>,
    {
        self.engine.eval_with(source, filename)
    }

    /// Raise a trusted, bubbling event from the host and let the host run the
    /// default action unless a listener prevented it.
    pub fn dispatch_host_event(&self, handle: Handle, event_type: &str) -> Result<()> {
        self.dispatch_from_host(handle, event_type, true).map(|_| ())
    }

    /// Like [`Self::dispatch_host_event`], but report instead of notifying:
    /// `true` when no listener prevented the default.
    pub fn dispatch_host_event_and_report(&self, handle: Handle, event_type: &str) -> Result<bool> {
        self.dispatch_from_host(handle, event_type, false)
    }

    /// Bind `name` as a global for the node unless the name is already taken.
    pub fn register_global_alias(&self, name: &str, handle: Handle) -> Result<bool> {
        self.alias_helper("__registerAlias", name, handle)
    }

    /// Remove the global `name` only if it still refers to `handle`.
    pub fn unregister_global_alias(&self, name: &str, handle: Handle) -> Result<bool> {
        self.alias_helper("__unregisterAlias", name, handle)
    }

    fn dispatch_from_host(&self, handle: Handle, event_type: &str, notify: bool) -> Result<bool> {
        let runtime = &self.runtime;
        let target = runtime.node(handle);
        let event = Event::with_init(
            event_type,
            EventInit {
                bubbles: true,
                trusted: true,
            },
        );
        debug!(target: "gal::dispatch", %handle, event_type, notify, "host event");
        self.engine.with_script(|ctx| {
            let mut invoker = JsInvoker::new(ctx, handle);
            let allowed = if notify {
                runtime.dispatch_and_notify_host(&target, &event, &mut invoker)?;
                event.default_allowed()
            } else {
                runtime.dispatch_and_report(&target, &event, &mut invoker)?
            };
            invoker.finish()?;
            Ok(allowed)
        })
    }

    fn alias_helper(&self, helper: &str, name: &str, handle: Handle) -> Result<bool> {
        self.engine.with_script(|ctx| {
            let gal: Object = ctx.globals().get("gal")?;
            let func: Function = gal.get(helper)?;
            Ok(func.call((name.to_string(), handle.raw()))?)
        })
    }
}

fn node_for(ctx: &Ctx<'_>, runtime: &DomRuntime<JsListener>, raw: i32) -> rquickjs::Result<NodeProxy> {
    match Handle::from_raw(i64::from(raw)) {
        Some(handle) => Ok(runtime.node(handle)),
        None => throw_dom_error(
            ctx,
            DomError::InvalidState(format!("{raw} does not name a node")),
        ),
    }
}

fn settle<T>(ctx: &Ctx<'_>, result: Result<T, DomError>) -> rquickjs::Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(err) => throw_dom_error(ctx, err),
    }
}

/// `flags` carries the script event's prevented/stopped state, which is not
/// reachable through its own properties.
fn event_from_script(object: &Object<'_>, flags: u32) -> rquickjs::Result<Event> {
    let event_type: String = object.get("type")?;
    let bubbles = object.get::<_, Option<bool>>("bubbles")?.unwrap_or(false);
    let trusted = object.get::<_, Option<bool>>("isTrusted")?.unwrap_or(false);
    let event = Event::with_init(event_type, EventInit { bubbles, trusted });
    if flags & PREVENTED != 0 {
        event.prevent_default();
    }
    if flags & STOPPED != 0 {
        event.stop_propagation();
    }
    Ok(event)
}

fn expose<'js>(global: &Object<'js>, name: &str, func: Function<'js>) -> rquickjs::Result<()> {
    global.set(name, func.with_name(name)?)
}

fn install_dom_bindings<'js>(
    ctx: &Ctx<'js>,
    runtime: &Rc<DomRuntime<JsListener>>,
) -> rquickjs::Result<()> {
    let global = ctx.globals();

    // Node accessors
    {
        let rt = Rc::clone(runtime);
        expose(
            &global,
            "__gal_get_attribute",
            Function::new(
                ctx.clone(),
                move |ctx: Ctx<'js>, handle: i32, name: String| -> rquickjs::Result<Option<String>> {
                    let node = node_for(&ctx, &rt, handle)?;
                    settle(&ctx, node.get_attribute(&name))
                },
            )?,
        )?;
    }

    {
        let rt = Rc::clone(runtime);
        expose(
            &global,
            "__gal_set_attribute",
            Function::new(
                ctx.clone(),
                move |ctx: Ctx<'js>, handle: i32, name: String, value: String| -> rquickjs::Result<()> {
                    let node = node_for(&ctx, &rt, handle)?;
                    settle(&ctx, node.set_attribute(&name, &value))
                },
            )?,
        )?;
    }

    {
        let rt = Rc::clone(runtime);
        expose(
            &global,
            "__gal_get_content",
            Function::new(
                ctx.clone(),
                move |ctx: Ctx<'js>, handle: i32| -> rquickjs::Result<String> {
                    let node = node_for(&ctx, &rt, handle)?;
                    settle(&ctx, node.content())
                },
            )?,
        )?;
    }

    {
        let rt = Rc::clone(runtime);
        expose(
            &global,
            "__gal_set_content",
            Function::new(
                ctx.clone(),
                move |ctx: Ctx<'js>, handle: i32, value: String| -> rquickjs::Result<()> {
                    let node = node_for(&ctx, &rt, handle)?;
                    settle(&ctx, node.set_content(&value))
                },
            )?,
        )?;
    }

    {
        let rt = Rc::clone(runtime);
        expose(
            &global,
            "__gal_get_outer",
            Function::new(
                ctx.clone(),
                move |ctx: Ctx<'js>, handle: i32| -> rquickjs::Result<String> {
                    let node = node_for(&ctx, &rt, handle)?;
                    settle(&ctx, node.serialized_self())
                },
            )?,
        )?;
    }

    {
        let rt = Rc::clone(runtime);
        expose(
            &global,
            "__gal_computed_style",
            Function::new(
                ctx.clone(),
                move |ctx: Ctx<'js>, handle: i32| -> rquickjs::Result<String> {
                    let node = node_for(&ctx, &rt, handle)?;
                    let style = settle(&ctx, node.computed_style())?;
                    let encoded = serde_json::to_string(&style)
                        .map_err(|err| DomError::Bridge(BridgeError::Wire(err)));
                    settle(&ctx, encoded)
                },
            )?,
        )?;
    }

    // Tree reads and mutation
    {
        let rt = Rc::clone(runtime);
        expose(
            &global,
            "__gal_children",
            Function::new(
                ctx.clone(),
                move |ctx: Ctx<'js>, handle: i32| -> rquickjs::Result<Vec<u32>> {
                    let node = node_for(&ctx, &rt, handle)?;
                    let children = settle(&ctx, node.children())?;
                    Ok(children.iter().map(|child| child.handle().raw()).collect())
                },
            )?,
        )?;
    }

    {
        let rt = Rc::clone(runtime);
        expose(
            &global,
            "__gal_parent",
            Function::new(
                ctx.clone(),
                move |ctx: Ctx<'js>, handle: i32| -> rquickjs::Result<Option<u32>> {
                    let node = node_for(&ctx, &rt, handle)?;
                    let parent = settle(&ctx, node.parent())?;
                    Ok(parent.map(|parent| parent.handle().raw()))
                },
            )?,
        )?;
    }

    {
        let rt = Rc::clone(runtime);
        expose(
            &global,
            "__gal_append_child",
            Function::new(
                ctx.clone(),
                move |ctx: Ctx<'js>, parent: i32, child: i32| -> rquickjs::Result<()> {
                    let parent = node_for(&ctx, &rt, parent)?;
                    let child = node_for(&ctx, &rt, child)?;
                    settle(&ctx, parent.append_child(&child))
                },
            )?,
        )?;
    }

    {
        let rt = Rc::clone(runtime);
        expose(
            &global,
            "__gal_insert_before",
            Function::new(
                ctx.clone(),
                move |ctx: Ctx<'js>,
                      parent: i32,
                      node: i32,
                      reference: Option<i32>|
                      -> rquickjs::Result<()> {
                    let parent = node_for(&ctx, &rt, parent)?;
                    let node = node_for(&ctx, &rt, node)?;
                    let reference = match reference {
                        Some(raw) => Some(node_for(&ctx, &rt, raw)?),
                        None => None,
                    };
                    settle(&ctx, parent.insert_before(&node, reference.as_ref()))
                },
            )?,
        )?;
    }

    {
        let rt = Rc::clone(runtime);
        expose(
            &global,
            "__gal_remove_child",
            Function::new(
                ctx.clone(),
                move |ctx: Ctx<'js>, parent: i32, node: i32| -> rquickjs::Result<u32> {
                    let parent = node_for(&ctx, &rt, parent)?;
                    let node = node_for(&ctx, &rt, node)?;
                    let removed = settle(&ctx, parent.remove_child(node))?;
                    Ok(removed.handle().raw())
                },
            )?,
        )?;
    }

    // Document facade
    {
        let rt = Rc::clone(runtime);
        expose(
            &global,
            "__gal_query",
            Function::new(
                ctx.clone(),
                move |ctx: Ctx<'js>, selector: String| -> rquickjs::Result<Vec<u32>> {
                    let nodes = settle(&ctx, rt.document().query(&selector))?;
                    Ok(nodes.iter().map(|node| node.handle().raw()).collect())
                },
            )?,
        )?;
    }

    {
        let rt = Rc::clone(runtime);
        expose(
            &global,
            "__gal_create_element",
            Function::new(
                ctx.clone(),
                move |ctx: Ctx<'js>, tag: String| -> rquickjs::Result<u32> {
                    let node = settle(&ctx, rt.document().create_element(&tag))?;
                    Ok(node.handle().raw())
                },
            )?,
        )?;
    }

    {
        let rt = Rc::clone(runtime);
        expose(
            &global,
            "__gal_create_text",
            Function::new(
                ctx.clone(),
                move |ctx: Ctx<'js>, text: String| -> rquickjs::Result<u32> {
                    let node = settle(&ctx, rt.document().create_text_node(&text))?;
                    Ok(node.handle().raw())
                },
            )?,
        )?;
    }

    {
        let rt = Rc::clone(runtime);
        expose(
            &global,
            "__gal_body",
            Function::new(ctx.clone(), move |ctx: Ctx<'js>| -> rquickjs::Result<u32> {
                let body = settle(&ctx, rt.document().body())?;
                Ok(body.handle().raw())
            })?,
        )?;
    }

    {
        let rt = Rc::clone(runtime);
        expose(
            &global,
            "__gal_title_get",
            Function::new(ctx.clone(), move |ctx: Ctx<'js>| -> rquickjs::Result<String> {
                settle(&ctx, rt.document().title())
            })?,
        )?;
    }

    {
        let rt = Rc::clone(runtime);
        expose(
            &global,
            "__gal_title_set",
            Function::new(
                ctx.clone(),
                move |ctx: Ctx<'js>, title: String| -> rquickjs::Result<()> {
                    settle(&ctx, rt.document().set_title(&title))
                },
            )?,
        )?;
    }

    {
        let rt = Rc::clone(runtime);
        expose(
            &global,
            "__gal_cookie_get",
            Function::new(ctx.clone(), move |ctx: Ctx<'js>| -> rquickjs::Result<String> {
                settle(&ctx, rt.document().cookie())
            })?,
        )?;
    }

    {
        let rt = Rc::clone(runtime);
        expose(
            &global,
            "__gal_cookie_set",
            Function::new(
                ctx.clone(),
                move |ctx: Ctx<'js>, cookie: String| -> rquickjs::Result<()> {
                    settle(&ctx, rt.document().set_cookie(&cookie))
                },
            )?,
        )?;
    }

    {
        let rt = Rc::clone(runtime);
        expose(
            &global,
            "__gal_location_set",
            Function::new(
                ctx.clone(),
                move |ctx: Ctx<'js>, url: String| -> rquickjs::Result<()> {
                    debug!(target: "gal::dispatch", %url, "script navigation");
                    settle(&ctx, rt.document().set_location(&url))
                },
            )?,
        )?;
    }

    {
        let rt = Rc::clone(runtime);
        expose(
            &global,
            "__gal_log",
            Function::new(
                ctx.clone(),
                move |ctx: Ctx<'js>, message: String| -> rquickjs::Result<()> {
                    info!(target: "quickjs", message = %message);
                    settle(&ctx, rt.document().log(&message))
                },
            )?,
        )?;
    }

    // Requests. The script object keeps the opened method and URL; the host
    // request only exists for the duration of `send`.
    {
        let rt = Rc::clone(runtime);
        expose(
            &global,
            "__gal_xhr_open",
            Function::new(
                ctx.clone(),
                move |ctx: Ctx<'js>,
                      method: String,
                      url: String,
                      asynchronous: bool|
                      -> rquickjs::Result<()> {
                    let mut request = XmlHttpRequest::new(Rc::clone(rt.host()));
                    settle(&ctx, request.open(&method, &url, asynchronous))
                },
            )?,
        )?;
    }

    {
        let rt = Rc::clone(runtime);
        expose(
            &global,
            "__gal_xhr_send",
            Function::new(
                ctx.clone(),
                move |ctx: Ctx<'js>,
                      method: Option<String>,
                      url: Option<String>,
                      body: Option<String>|
                      -> rquickjs::Result<String> {
                    let mut request = XmlHttpRequest::new(Rc::clone(rt.host()));
                    if let (Some(method), Some(url)) = (method, url) {
                        settle(&ctx, request.open(&method, &url, false))?;
                    }
                    settle(&ctx, request.send(body.as_deref()).map(str::to_string))
                },
            )?,
        )?;
    }

    // Listeners and dispatch
    {
        let rt = Rc::clone(runtime);
        expose(
            &global,
            "__gal_add_listener",
            Function::new(
                ctx.clone(),
                move |ctx: Ctx<'js>, handle: i32, event_type: String, slot: u32| -> rquickjs::Result<()> {
                    let node = node_for(&ctx, &rt, handle)?;
                    rt.add_event_listener(&node, &event_type, JsListener::new(slot));
                    Ok(())
                },
            )?,
        )?;
    }

    {
        let rt = Rc::clone(runtime);
        expose(
            &global,
            "__gal_listener_slots",
            Function::new(
                ctx.clone(),
                move |ctx: Ctx<'js>, handle: i32, event_type: String| -> rquickjs::Result<Vec<u32>> {
                    let node = node_for(&ctx, &rt, handle)?;
                    Ok(rt
                        .listeners_for(&node, &event_type)
                        .into_iter()
                        .map(JsListener::slot)
                        .collect())
                },
            )?,
        )?;
    }

    {
        let rt = Rc::clone(runtime);
        expose(
            &global,
            "__gal_remove_listener",
            Function::new(
                ctx.clone(),
                move |ctx: Ctx<'js>, handle: i32, event_type: String, slot: u32| -> rquickjs::Result<bool> {
                    let node = node_for(&ctx, &rt, handle)?;
                    Ok(rt.remove_event_listener_where(&node, &event_type, |listener| {
                        listener.slot() == slot
                    }))
                },
            )?,
        )?;
    }

    {
        let rt = Rc::clone(runtime);
        expose(
            &global,
            "__gal_dispatch",
            Function::new(
                ctx.clone(),
                move |ctx: Ctx<'js>, handle: i32, event: Object<'js>, flags: u32| -> rquickjs::Result<bool> {
                    let target = node_for(&ctx, &rt, handle)?;
                    let native = event_from_script(&event, flags)?;
                    let mut invoker = JsInvoker::with_event(&ctx, target.handle(), event);
                    match rt.dispatch_and_report(&target, &native, &mut invoker) {
                        Ok(allowed) => Ok(allowed),
                        Err(err) => rethrow(&ctx, err),
                    }
                },
            )?,
        )?;
    }

    {
        let rt = Rc::clone(runtime);
        expose(
            &global,
            "__gal_click",
            Function::new(
                ctx.clone(),
                move |ctx: Ctx<'js>, handle: i32| -> rquickjs::Result<bool> {
                    let target = node_for(&ctx, &rt, handle)?;
                    let mut invoker = JsInvoker::new(&ctx, target.handle());
                    let allowed = match rt.click(&target, &mut invoker) {
                        Ok(allowed) => allowed,
                        Err(err) => return rethrow(&ctx, err),
                    };
                    invoker.finish()?;
                    Ok(allowed)
                },
            )?,
        )?;
    }

    match ctx.eval::<(), _>(DOM_BOOTSTRAP.as_bytes()) {
        Ok(()) => Ok(()),
        Err(err) => {
            if let rquickjs::Error::Exception = err {
                let value: Value<'_> = ctx.catch();
                tracing::error!(target: "quickjs", "DOM bootstrap failed: {:?}", value);
            }
            Err(err)
        }
    }
}

const DOM_BOOTSTRAP: &str = r#"
(() => {
    'use strict';
    const global = globalThis;
    const gal = {};
    const slots = new Map();
    let nextSlot = 1;

    const absent = (value) => value === undefined || value === null;
    const hide = (target, name, value) => {
        Object.defineProperty(target, name, {
            value,
            writable: true,
            enumerable: false,
            configurable: false,
        });
    };
    const handleOf = (node) => {
        if (!node || typeof node.__handle !== 'number') {
            throw new TypeError('parameter is not of type Node');
        }
        return node.__handle;
    };

    function wrapNode(handle) {
        if (absent(handle) || handle < 0) {
            return null;
        }
        const node = Object.create(Node.prototype);
        Object.defineProperty(node, '__handle', { value: handle, enumerable: false });
        return node;
    }

    // Nodes

    function Node() {
        throw new TypeError('Illegal constructor');
    }
    const NodeProto = Node.prototype;

    NodeProto.getAttribute = function (name) {
        const value = __gal_get_attribute(this.__handle, String(name));
        return absent(value) ? null : value;
    };
    NodeProto.setAttribute = function (name, value) {
        __gal_set_attribute(this.__handle, String(name), String(value));
    };
    NodeProto.appendChild = function (child) {
        __gal_append_child(this.__handle, handleOf(child));
        return child;
    };
    NodeProto.insertBefore = function (node, reference) {
        const ref = absent(reference) ? null : handleOf(reference);
        __gal_insert_before(this.__handle, handleOf(node), ref);
        return node;
    };
    NodeProto.removeChild = function (node) {
        __gal_remove_child(this.__handle, handleOf(node));
        return node;
    };
    NodeProto.isSameNode = function (other) {
        return !absent(other) && other.__handle === this.__handle;
    };
    NodeProto.querySelectorAll = function (selector) {
        const self = this.__handle;
        return __gal_query(String(selector))
            .filter((handle) => {
                let current = __gal_parent(handle);
                while (!absent(current)) {
                    if (current === self) {
                        return true;
                    }
                    current = __gal_parent(current);
                }
                return false;
            })
            .map(wrapNode);
    };
    NodeProto.querySelector = function (selector) {
        const found = this.querySelectorAll(selector);
        return found.length > 0 ? found[0] : null;
    };
    NodeProto.addEventListener = function (type, listener) {
        if (typeof listener !== 'function' &&
            !(listener && typeof listener.handleEvent === 'function')) {
            return;
        }
        const slot = nextSlot++;
        slots.set(slot, listener);
        __gal_add_listener(this.__handle, String(type), slot);
    };
    NodeProto.removeEventListener = function (type, listener) {
        const eventType = String(type);
        for (const slot of __gal_listener_slots(this.__handle, eventType)) {
            if (slots.get(slot) === listener) {
                if (__gal_remove_listener(this.__handle, eventType, slot)) {
                    slots.delete(slot);
                }
                return;
            }
        }
    };
    NodeProto.dispatchEvent = function (event) {
        if (!(event instanceof Event)) {
            throw new TypeError("parameter 1 is not of type 'Event'");
        }
        const state = stateOf(event);
        if (state.dispatched) {
            throw new Error('InvalidStateError: the event is already being dispatched');
        }
        state.dispatched = true;
        state.target = this;
        try {
            return __gal_dispatch(this.__handle, event, flagsOf(state));
        } finally {
            finishEvent(event);
        }
    };
    NodeProto.click = function () {
        return __gal_click(this.__handle);
    };

    const content = {
        get() { return __gal_get_content(this.__handle); },
        set(value) { __gal_set_content(this.__handle, String(value)); },
    };
    const serializedSelf = {
        get() { return __gal_get_outer(this.__handle); },
    };
    const parent = {
        get() { return wrapNode(__gal_parent(this.__handle)); },
    };
    Object.defineProperties(NodeProto, {
        content,
        innerHTML: content,
        serializedSelf,
        outerHTML: serializedSelf,
        parent,
        parentNode: parent,
        children: {
            get() { return __gal_children(this.__handle).map(wrapNode); },
        },
    });

    // Events. Dispatch state lives here, out of reach of page scripts.

    const eventState = new WeakMap();
    const stateOf = (event) => {
        const state = eventState.get(event);
        if (state === undefined) {
            throw new TypeError('Illegal invocation');
        }
        return state;
    };
    const flagsOf = (state) => (state.prevented ? 1 : 0) | (state.stopped ? 2 : 0);

    function Event(type, init) {
        if (!(this instanceof Event)) {
            throw new TypeError('Constructor Event requires "new"');
        }
        if (arguments.length === 0) {
            throw new TypeError('Failed to construct "Event": 1 argument required');
        }
        const options = init || {};
        Object.defineProperty(this, 'type', { value: String(type), enumerable: true });
        Object.defineProperty(this, 'bubbles', { value: !!options.bubbles, enumerable: true });
        eventState.set(this, {
            trusted: false,
            prevented: false,
            stopped: false,
            dispatched: false,
            phase: 0,
            target: null,
            current: null,
        });
    }
    const EventProto = Event.prototype;
    const phases = { NONE: 0, CAPTURING_PHASE: 1, AT_TARGET: 2, BUBBLING_PHASE: 3 };
    for (const name of Object.keys(phases)) {
        Object.defineProperty(Event, name, { value: phases[name], enumerable: true });
        Object.defineProperty(EventProto, name, { value: phases[name], enumerable: true });
    }
    EventProto.preventDefault = function () {
        stateOf(this).prevented = true;
    };
    EventProto.stopPropagation = function () {
        stateOf(this).stopped = true;
    };
    Object.defineProperties(EventProto, {
        isTrusted: { get() { return stateOf(this).trusted; } },
        defaultPrevented: { get() { return stateOf(this).prevented; } },
        eventPhase: { get() { return stateOf(this).phase; } },
        target: { get() { return stateOf(this).target; } },
        currentTarget: { get() { return stateOf(this).current; } },
    });

    function finishEvent(event) {
        const state = stateOf(event);
        state.phase = 0;
        state.current = null;
    }

    // Document

    function Document() {
        throw new TypeError('Illegal constructor');
    }
    const DocumentProto = Document.prototype;
    DocumentProto.querySelectorAll = function (selector) {
        return __gal_query(String(selector)).map(wrapNode);
    };
    DocumentProto.querySelector = function (selector) {
        const found = __gal_query(String(selector));
        return found.length > 0 ? wrapNode(found[0]) : null;
    };
    DocumentProto.getElementById = function (id) {
        const escaped = String(id).replace(/["\\]/g, '\\$&');
        return this.querySelector('[id="' + escaped + '"]');
    };
    DocumentProto.createElement = function (tag) {
        return wrapNode(__gal_create_element(String(tag)));
    };
    DocumentProto.createTextNode = function (text) {
        return wrapNode(__gal_create_text(String(text)));
    };
    const setLocation = (value) => { __gal_location_set(String(value)); };
    Object.defineProperties(DocumentProto, {
        body: { get() { return wrapNode(__gal_body()); } },
        title: {
            get() { return __gal_title_get(); },
            set(value) { __gal_title_set(String(value)); },
        },
        cookie: {
            get() { return __gal_cookie_get(); },
            set(value) { __gal_cookie_set(String(value)); },
        },
        location: { set: setLocation },
    });

    // Requests

    function XMLHttpRequest() {
        if (!(this instanceof XMLHttpRequest)) {
            throw new TypeError('Constructor XMLHttpRequest requires "new"');
        }
        this.readyState = 0;
        this.status = 0;
        this.responseText = '';
        hide(this, '__opened', null);
    }
    XMLHttpRequest.prototype.open = function (method, url, async) {
        __gal_xhr_open(String(method), String(url), !!async);
        this.__opened = { method: String(method), url: String(url) };
        this.readyState = 1;
        this.status = 0;
        this.responseText = '';
    };
    XMLHttpRequest.prototype.send = function (body) {
        const opened = this.__opened;
        this.__opened = null;
        this.responseText = __gal_xhr_send(
            opened ? opened.method : undefined,
            opened ? opened.url : undefined,
            absent(body) ? undefined : String(body),
        );
        this.status = 200;
        this.readyState = 4;
        if (typeof this.onload === 'function') {
            this.onload.call(this);
        }
    };

    // Console

    const stringify = (value) => {
        try {
            if (typeof value === 'string') {
                return value;
            }
            if (value === undefined) {
                return 'undefined';
            }
            if (value === null) {
                return 'null';
            }
            return String(value);
        } catch (err) {
            return '[unprintable]';
        }
    };
    const logImpl = (...args) => {
        try {
            __gal_log(args.map(stringify).join(' '));
        } catch (err) {
            // console must never throw
        }
    };
    global.console = {
        log: logImpl,
        error: logImpl,
        warn: logImpl,
        info: logImpl,
        debug: logImpl,
    };

    // Hooks used from Rust

    gal.__createEvent = (type, bubbles, trusted, target, prevented) => {
        const event = new Event(type, { bubbles });
        const state = stateOf(event);
        state.trusted = !!trusted;
        state.prevented = !!prevented;
        state.dispatched = true;
        state.target = wrapNode(target);
        return event;
    };
    gal.__invokeListener = (slot, current, event, phase) => {
        const listener = slots.get(slot);
        if (listener === undefined) {
            return 0;
        }
        const state = stateOf(event);
        state.current = wrapNode(current);
        state.phase = phase;
        if (typeof listener === 'function') {
            listener.call(state.current, event);
        } else {
            listener.handleEvent(event);
        }
        return flagsOf(state);
    };
    gal.__finishEvent = finishEvent;
    gal.__registerAlias = (name, handle) => {
        if (name in global) {
            return false;
        }
        Object.defineProperty(global, name, {
            value: wrapNode(handle),
            writable: true,
            enumerable: false,
            configurable: true,
        });
        return true;
    };
    gal.__unregisterAlias = (name, handle) => {
        const current = global[name];
        if (!(current instanceof Node) || current.__handle !== handle) {
            return false;
        }
        delete global[name];
        return true;
    };

    // Globals

    global.getComputedStyle = function (node) {
        const style = JSON.parse(__gal_computed_style(handleOf(node)));
        Object.defineProperty(style, 'getPropertyValue', {
            value: (name) => (Object.prototype.hasOwnProperty.call(style, name) ? style[name] : ''),
        });
        return style;
    };

    const document = Object.create(DocumentProto);
    global.Node = Node;
    global.Event = Event;
    global.Document = Document;
    global.XMLHttpRequest = XMLHttpRequest;
    global.document = document;
    global.window = global;
    global.self = global;
    Object.defineProperty(global, 'location', {
        set: setLocation,
        enumerable: true,
        configurable: true,
    });
    Object.defineProperty(global, 'gal', { value: gal, enumerable: false });
})();
"#;
