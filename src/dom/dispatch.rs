//! Target and bubbling phases for one event, plus the two ways of finishing.
//!
//! Script-initiated dispatch reports whether the default action may run
//! ([`DomRuntime::dispatch_and_report`]); host-initiated dispatch tells the
//! host to perform it ([`DomRuntime::dispatch_and_notify_host`]). Both share
//! the same phase walk.

use std::rc::Rc;

use tracing::{debug, trace};

use super::error::DomError;
use super::event::{Event, EventInit, Phase};
use super::node::NodeProxy;
use super::runtime::DomRuntime;

/// Runs one listener of representation `L`.
///
/// Failures are not caught by the dispatcher: the first error aborts the
/// rest of the dispatch and is returned to whoever started it.
pub trait ListenerInvoker<L> {
    type Error: From<DomError>;

    fn invoke(&mut self, listener: &L, current: &NodeProxy, event: &Event)
        -> Result<(), Self::Error>;
}

/// Listener written in Rust. `current` is the node whose listeners are running.
pub type NativeListener = Rc<dyn Fn(&NodeProxy, &Event) -> anyhow::Result<()>>;

pub struct NativeInvoker;

impl ListenerInvoker<NativeListener> for NativeInvoker {
    type Error = DomError;

    fn invoke(
        &mut self,
        listener: &NativeListener,
        current: &NodeProxy,
        event: &Event,
    ) -> Result<(), DomError> {
        listener(current, event).map_err(DomError::Listener)
    }
}

impl<L: Clone> DomRuntime<L> {
    /// Dispatch and return `true` unless a listener prevented the default.
    pub fn dispatch_and_report<I>(
        &self,
        target: &NodeProxy,
        event: &Event,
        invoker: &mut I,
    ) -> Result<bool, I::Error>
    where
        I: ListenerInvoker<L>,
    {
        self.run_phases(target, event, invoker)?;
        let allowed = event.default_allowed();
        debug!(
            target: "gal::dispatch",
            handle = %target.handle(),
            event_type = event.event_type(),
            allowed,
            "dispatch reported"
        );
        Ok(allowed)
    }

    /// Dispatch, then have the host run its default action unless a listener
    /// prevented it.
    pub fn dispatch_and_notify_host<I>(
        &self,
        target: &NodeProxy,
        event: &Event,
        invoker: &mut I,
    ) -> Result<(), I::Error>
    where
        I: ListenerInvoker<L>,
    {
        self.run_phases(target, event, invoker)?;
        if event.default_prevented() {
            debug!(
                target: "gal::dispatch",
                handle = %target.handle(),
                event_type = event.event_type(),
                "default action suppressed"
            );
            return Ok(());
        }
        target.perform_default_action(event.event_type())?;
        Ok(())
    }

    /// A bubbling `click` on `target`, reported like any script dispatch.
    ///
    /// The host default action never runs here, so a click on a link does not
    /// navigate. Hosts that want the native behaviour raise the click through
    /// [`Self::dispatch_and_notify_host`], or `dispatch_host_event` on a
    /// `ScriptEnvironment`.
    pub fn click<I>(&self, target: &NodeProxy, invoker: &mut I) -> Result<bool, I::Error>
    where
        I: ListenerInvoker<L>,
    {
        let event = Event::with_init(
            "click",
            EventInit {
                bubbles: true,
                ..EventInit::default()
            },
        );
        self.dispatch_and_report(target, &event, invoker)
    }

    fn run_phases<I>(&self, target: &NodeProxy, event: &Event, invoker: &mut I) -> Result<(), I::Error>
    where
        I: ListenerInvoker<L>,
    {
        event.begin_dispatch()?;
        event.set_phase(Phase::AtTarget);
        let walked = self.walk(target, event, invoker);
        event.set_phase(Phase::None);
        walked
    }

    fn walk<I>(&self, target: &NodeProxy, event: &Event, invoker: &mut I) -> Result<(), I::Error>
    where
        I: ListenerInvoker<L>,
    {
        self.invoke_at(target, event, invoker)?;
        if !event.should_propagate() {
            return Ok(());
        }

        event.set_phase(Phase::Bubbling);
        // Parents are fetched one step at a time so tree changes made by
        // listeners are seen by the rest of the walk.
        let mut current = target.clone();
        while event.should_propagate() {
            let Some(parent) = current.parent()? else {
                break;
            };
            self.invoke_at(&parent, event, invoker)?;
            current = parent;
        }
        Ok(())
    }

    fn invoke_at<I>(&self, node: &NodeProxy, event: &Event, invoker: &mut I) -> Result<(), I::Error>
    where
        I: ListenerInvoker<L>,
    {
        // Snapshot so listeners may register or remove listeners while running.
        let listeners = self
            .listeners
            .borrow()
            .listeners_for(node.handle(), event.event_type());
        if listeners.is_empty() {
            return Ok(());
        }
        trace!(
            target: "gal::dispatch",
            handle = %node.handle(),
            event_type = event.event_type(),
            phase = ?event.phase(),
            count = listeners.len(),
            "invoking listeners"
        );
        for listener in &listeners {
            invoker.invoke(listener, node, event)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;

    use anyhow::anyhow;

    use super::*;
    use crate::host::{BridgeError, Handle, HostBridge, HostCall, HostReply, MemoryHost};

    /// Host that only knows parent links and records every call.
    struct TreeHost {
        parents: HashMap<u32, u32>,
        calls: RefCell<Vec<HostCall>>,
    }

    impl TreeHost {
        fn chain() -> Rc<Self> {
            Rc::new(Self {
                parents: HashMap::from([(5, 3), (3, 1)]),
                calls: RefCell::new(Vec::new()),
            })
        }

        fn parent_lookups(&self) -> Vec<u32> {
            self.calls
                .borrow()
                .iter()
                .filter_map(|call| match call {
                    HostCall::ParentGet { handle } => Some(handle.raw()),
                    _ => None,
                })
                .collect()
        }
    }

    impl HostBridge for TreeHost {
        fn invoke(&self, call: HostCall) -> Result<HostReply, BridgeError> {
            self.calls.borrow_mut().push(call.clone());
            match call {
                HostCall::ParentGet { handle } => Ok(HostReply::MaybeNode(
                    self.parents.get(&handle.raw()).copied().map(Handle::new),
                )),
                HostCall::DefaultActionPerform { .. } => Ok(HostReply::Unit),
                other => Err(BridgeError::Host {
                    op: other.name(),
                    message: "not modelled".into(),
                }),
            }
        }
    }

    type Log = Rc<RefCell<Vec<String>>>;

    fn recorder(log: &Log, label: &'static str) -> NativeListener {
        let log = Rc::clone(log);
        Rc::new(move |current: &NodeProxy, _event: &Event| {
            log.borrow_mut()
                .push(format!("{label}@{}", current.handle().raw()));
            Ok(())
        })
    }

    fn bubbling(event_type: &str) -> Event {
        Event::with_init(
            event_type,
            EventInit {
                bubbles: true,
                ..EventInit::default()
            },
        )
    }

    #[test]
    fn listeners_run_in_registration_order_and_report_true() {
        let host = TreeHost::chain();
        let runtime: DomRuntime<NativeListener> = DomRuntime::new(host);
        let node = runtime.node(Handle::new(5));
        let log = Log::default();
        runtime.add_event_listener(&node, "click", recorder(&log, "A"));
        runtime.add_event_listener(&node, "click", recorder(&log, "B"));

        let allowed = runtime
            .dispatch_and_report(&node, &Event::new("click"), &mut NativeInvoker)
            .expect("dispatch");

        assert!(allowed);
        assert_eq!(*log.borrow(), vec!["A@5", "B@5"]);
    }

    #[test]
    fn non_bubbling_event_never_reaches_ancestors() {
        let host = TreeHost::chain();
        let runtime: DomRuntime<NativeListener> = DomRuntime::new(host.clone());
        let log = Log::default();
        runtime.add_event_listener(&runtime.node(Handle::new(5)), "custom", recorder(&log, "target"));
        runtime.add_event_listener(&runtime.node(Handle::new(3)), "custom", recorder(&log, "parent"));

        runtime
            .dispatch_and_report(&runtime.node(Handle::new(5)), &Event::new("custom"), &mut NativeInvoker)
            .expect("dispatch");

        assert_eq!(*log.borrow(), vec!["target@5"]);
        assert!(host.parent_lookups().is_empty());
    }

    #[test]
    fn stop_propagation_on_ancestor_ends_the_walk() {
        let host = TreeHost::chain();
        let runtime: DomRuntime<NativeListener> = DomRuntime::new(host.clone());
        let log = Log::default();
        let stopper_log = Rc::clone(&log);
        runtime.add_event_listener(
            &runtime.node(Handle::new(3)),
            "custom",
            Rc::new(move |current: &NodeProxy, event: &Event| {
                stopper_log
                    .borrow_mut()
                    .push(format!("stopper@{}", current.handle().raw()));
                event.stop_propagation();
                Ok(())
            }),
        );
        runtime.add_event_listener(&runtime.node(Handle::new(1)), "custom", recorder(&log, "root"));

        let event = bubbling("custom");
        runtime
            .dispatch_and_report(&runtime.node(Handle::new(5)), &event, &mut NativeInvoker)
            .expect("dispatch");

        assert_eq!(*log.borrow(), vec!["stopper@3"]);
        assert_eq!(host.parent_lookups(), vec![5]);
        assert!(event.bubbles());
        assert_eq!(event.phase(), Phase::None);
    }

    #[test]
    fn stop_propagation_at_target_keeps_sibling_listeners_running() {
        let host = TreeHost::chain();
        let runtime: DomRuntime<NativeListener> = DomRuntime::new(host);
        let target = runtime.node(Handle::new(5));
        let log = Log::default();
        runtime.add_event_listener(
            &target,
            "custom",
            Rc::new(|_: &NodeProxy, event: &Event| {
                event.stop_propagation();
                Ok(())
            }),
        );
        runtime.add_event_listener(&target, "custom", recorder(&log, "second"));
        runtime.add_event_listener(&runtime.node(Handle::new(3)), "custom", recorder(&log, "parent"));

        runtime
            .dispatch_and_report(&target, &bubbling("custom"), &mut NativeInvoker)
            .expect("dispatch");

        assert_eq!(*log.borrow(), vec!["second@5"]);
    }

    #[test]
    fn bubbling_visits_each_ancestor_with_bubbling_phase() {
        let host = TreeHost::chain();
        let runtime: DomRuntime<NativeListener> = DomRuntime::new(host);
        let phases = Rc::new(RefCell::new(Vec::new()));
        for raw in [5, 3, 1] {
            let phases = Rc::clone(&phases);
            runtime.add_event_listener(
                &runtime.node(Handle::new(raw)),
                "custom",
                Rc::new(move |current: &NodeProxy, event: &Event| {
                    phases
                        .borrow_mut()
                        .push((current.handle().raw(), event.phase()));
                    Ok(())
                }),
            );
        }

        runtime
            .dispatch_and_report(&runtime.node(Handle::new(5)), &bubbling("custom"), &mut NativeInvoker)
            .expect("dispatch");

        assert_eq!(
            *phases.borrow(),
            vec![
                (5, Phase::AtTarget),
                (3, Phase::Bubbling),
                (1, Phase::Bubbling)
            ]
        );
    }

    #[test]
    fn prevent_default_cannot_be_undone_by_later_listeners() {
        let host = TreeHost::chain();
        let runtime: DomRuntime<NativeListener> = DomRuntime::new(host);
        let node = runtime.node(Handle::new(5));
        runtime.add_event_listener(
            &node,
            "submit",
            Rc::new(|_: &NodeProxy, event: &Event| {
                event.prevent_default();
                Ok(())
            }),
        );
        runtime.add_event_listener(
            &node,
            "submit",
            Rc::new(|_: &NodeProxy, event: &Event| {
                event.prevent_default();
                Ok(())
            }),
        );

        let allowed = runtime
            .dispatch_and_report(&node, &Event::new("submit"), &mut NativeInvoker)
            .expect("dispatch");
        assert!(!allowed);
    }

    #[test]
    fn listener_failure_aborts_the_rest_of_the_dispatch() {
        let host = TreeHost::chain();
        let runtime: DomRuntime<NativeListener> = DomRuntime::new(host);
        let node = runtime.node(Handle::new(5));
        let log = Log::default();
        runtime.add_event_listener(
            &node,
            "click",
            Rc::new(|_: &NodeProxy, _: &Event| Err(anyhow!("boom"))),
        );
        runtime.add_event_listener(&node, "click", recorder(&log, "after"));
        runtime.add_event_listener(&runtime.node(Handle::new(3)), "click", recorder(&log, "parent"));

        let err = runtime
            .dispatch_and_report(&node, &bubbling("click"), &mut NativeInvoker)
            .expect_err("listener error propagates");

        assert!(matches!(err, DomError::Listener(_)));
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn nested_dispatch_completes_before_outer_listeners_continue() {
        let host = TreeHost::chain();
        let runtime: Rc<DomRuntime<NativeListener>> = Rc::new(DomRuntime::new(host));
        let log = Log::default();
        let outer = runtime.node(Handle::new(5));

        let weak = Rc::downgrade(&runtime);
        let nested_log = Rc::clone(&log);
        runtime.add_event_listener(
            &outer,
            "outer",
            Rc::new(move |_: &NodeProxy, _: &Event| {
                nested_log.borrow_mut().push("outer-first".into());
                let runtime = weak.upgrade().ok_or_else(|| anyhow!("runtime dropped"))?;
                runtime.dispatch_and_report(
                    &runtime.node(Handle::new(3)),
                    &bubbling("inner"),
                    &mut NativeInvoker,
                )?;
                Ok(())
            }),
        );
        runtime.add_event_listener(&outer, "outer", recorder(&log, "outer-second"));
        runtime.add_event_listener(&runtime.node(Handle::new(3)), "inner", recorder(&log, "inner"));
        runtime.add_event_listener(&runtime.node(Handle::new(1)), "inner", recorder(&log, "inner"));

        runtime
            .dispatch_and_report(&outer, &Event::new("outer"), &mut NativeInvoker)
            .expect("dispatch");

        assert_eq!(
            *log.borrow(),
            vec!["outer-first", "inner@3", "inner@1", "outer-second@5"]
        );
    }

    #[test]
    fn dispatching_the_same_event_twice_is_rejected() {
        let host = TreeHost::chain();
        let runtime: DomRuntime<NativeListener> = DomRuntime::new(host);
        let node = runtime.node(Handle::new(5));
        let event = Event::new("click");
        runtime
            .dispatch_and_report(&node, &event, &mut NativeInvoker)
            .expect("first");
        assert!(matches!(
            runtime.dispatch_and_report(&node, &event, &mut NativeInvoker),
            Err(DomError::InvalidState(_))
        ));
    }

    #[test]
    fn host_notify_mode_runs_default_action_only_when_allowed() {
        let host = Rc::new(MemoryHost::from_html(
            "<a id=go href=/next>go</a><a id=stay href=/elsewhere>stay</a>",
            "http://example.org/",
        ));
        let runtime: DomRuntime<NativeListener> = DomRuntime::new(host.clone());
        let go = runtime.node(host.find("#go").expect("go"));
        let stay = runtime.node(host.find("#stay").expect("stay"));
        runtime.add_event_listener(
            &stay,
            "click",
            Rc::new(|_: &NodeProxy, event: &Event| {
                event.prevent_default();
                Ok(())
            }),
        );

        runtime
            .dispatch_and_notify_host(&go, &bubbling("click"), &mut NativeInvoker)
            .expect("go");
        runtime
            .dispatch_and_notify_host(&stay, &bubbling("click"), &mut NativeInvoker)
            .expect("stay");

        assert_eq!(host.navigations(), vec!["http://example.org/next".to_string()]);
    }

    #[test]
    fn click_bubbles_but_does_not_ask_the_host() {
        let host = Rc::new(MemoryHost::from_html(
            "<div id=outer><a href=/x>x</a></div>",
            "http://example.org/",
        ));
        let runtime: DomRuntime<NativeListener> = DomRuntime::new(host.clone());
        let log = Log::default();
        let outer = runtime.node(host.find("#outer").expect("outer"));
        runtime.add_event_listener(&outer, "click", recorder(&log, "outer"));

        let link = runtime.node(host.find("a").expect("link"));
        assert!(runtime.click(&link, &mut NativeInvoker).expect("click"));
        assert_eq!(log.borrow().len(), 1);
        assert!(host.navigations().is_empty());
    }

    #[test]
    fn removed_listener_no_longer_runs() {
        let host = TreeHost::chain();
        let runtime: DomRuntime<NativeListener> = DomRuntime::new(host);
        let node = runtime.node(Handle::new(5));
        let log = Log::default();
        let id = runtime.add_event_listener(&node, "click", recorder(&log, "gone"));
        assert!(runtime.remove_event_listener(&node, "click", id));

        runtime
            .dispatch_and_report(&node, &Event::new("click"), &mut NativeInvoker)
            .expect("dispatch");
        assert!(log.borrow().is_empty());
        assert_eq!(runtime.listener_count(&node, "click"), 0);
    }
}
