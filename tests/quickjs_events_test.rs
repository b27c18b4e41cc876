use std::rc::Rc;

use gal::{MemoryHost, RuntimeConfig, ScriptEnvironment};

const PAGE: &str = r#"
    <!DOCTYPE html>
    <html>
        <body>
            <div id="outer">
                <div id="inner">
                    <span id="leaf">leaf</span>
                </div>
            </div>
            <button id="btn">Click</button>
            <a id="link" href="/next">next</a>
        </body>
    </html>
"#;

fn environment() -> (Rc<MemoryHost>, ScriptEnvironment) {
    let host = Rc::new(MemoryHost::from_html(PAGE, "http://example.org/"));
    let environment =
        ScriptEnvironment::new(host.clone(), &RuntimeConfig::default()).expect("environment");
    (host, environment)
}

#[test]
fn test_add_event_listener() {
    let (host, environment) = environment();
    environment
        .eval(
            r#"
            const btn = document.getElementById('btn');
            btn.addEventListener('click', function () {
                btn.innerHTML = 'Clicked!';
            });
            btn.dispatchEvent(new Event('click'));
        "#,
            "event-test.js",
        )
        .expect("evaluate script");

    assert!(
        host.serialize().contains("<button id=\"btn\">Clicked!</button>"),
        "event listener should have updated button text"
    );
}

#[test]
fn test_remove_event_listener() {
    let (_host, environment) = environment();
    let count: i32 = environment
        .eval_with(
            r#"
            const btn = document.getElementById('btn');
            let count = 0;
            function handler() {
                count += 1;
            }
            btn.addEventListener('click', handler);
            btn.addEventListener('click', handler);
            btn.dispatchEvent(new Event('click'));
            btn.removeEventListener('click', handler);
            btn.dispatchEvent(new Event('click'));
            count
        "#,
            "remove-listener.js",
        )
        .expect("evaluate script");

    assert_eq!(count, 3, "duplicates run twice and removal drops only one");
}

#[test]
fn listeners_run_in_registration_order() {
    let (_host, environment) = environment();
    let result: String = environment
        .eval_with(
            r#"
            const log = [];
            const btn = document.getElementById('btn');
            btn.addEventListener('ping', () => log.push('A'));
            btn.addEventListener('ping', () => log.push('B'));
            const allowed = btn.dispatchEvent(new Event('ping'));
            JSON.stringify([log, allowed])
        "#,
            "order.js",
        )
        .expect("evaluate script");

    assert_eq!(result, r#"[["A","B"],true]"#);
}

#[test]
fn prevent_default_reports_false_and_sticks() {
    let (_host, environment) = environment();
    let result: String = environment
        .eval_with(
            r#"
            const btn = document.getElementById('btn');
            btn.addEventListener('submit', (e) => e.preventDefault());
            btn.addEventListener('submit', (e) => { e.defaultPrevented = false; });
            const event = new Event('submit');
            const allowed = btn.dispatchEvent(event);
            JSON.stringify([allowed, event.defaultPrevented])
        "#,
            "prevent-default.js",
        )
        .expect("evaluate script");

    assert_eq!(result, "[false,true]");
}

#[test]
fn later_listeners_cannot_be_told_the_default_is_allowed_again() {
    let (_host, environment) = environment();
    let result: String = environment
        .eval_with(
            r#"
            const seen = [];
            const btn = document.getElementById('btn');
            btn.addEventListener('submit', (e) => e.preventDefault());
            btn.addEventListener('submit', (e) => {
                e.__prevented = false;
                e.__stopped = false;
            });
            btn.addEventListener('submit', (e) => seen.push(e.defaultPrevented));
            const allowed = btn.dispatchEvent(new Event('submit'));
            JSON.stringify([allowed, seen])
        "#,
            "private-state.js",
        )
        .expect("evaluate script");

    assert_eq!(result, "[false,[true]]");
}

#[test]
fn stop_propagation_keeps_bubbles_and_spares_ancestors() {
    let (_host, environment) = environment();
    let result: String = environment
        .eval_with(
            r#"
            const seen = [];
            const outer = document.getElementById('outer');
            const inner = document.getElementById('inner');
            const leaf = document.getElementById('leaf');
            outer.addEventListener('custom', () => seen.push('outer'));
            inner.addEventListener('custom', (e) => {
                seen.push('inner');
                e.stopPropagation();
            });
            inner.addEventListener('custom', () => seen.push('inner-2'));
            const event = new Event('custom', { bubbles: true });
            leaf.dispatchEvent(event);
            JSON.stringify({ seen, bubbles: event.bubbles, phase: event.eventPhase })
        "#,
            "stop-propagation.js",
        )
        .expect("evaluate script");

    assert_eq!(
        result,
        r#"{"seen":["inner","inner-2"],"bubbles":true,"phase":0}"#
    );
}

#[test]
fn non_bubbling_event_stays_on_target() {
    let (_host, environment) = environment();
    let result: String = environment
        .eval_with(
            r#"
            const seen = [];
            const leaf = document.getElementById('leaf');
            document.getElementById('inner').addEventListener('focus', () => seen.push('inner'));
            leaf.addEventListener('focus', () => seen.push('leaf'));
            leaf.dispatchEvent(new Event('focus'));
            seen.join(',')
        "#,
            "non-bubbling.js",
        )
        .expect("evaluate script");

    assert_eq!(result, "leaf");
}

#[test]
fn listeners_see_this_target_and_phase() {
    let (_host, environment) = environment();
    let result: String = environment
        .eval_with(
            r#"
            const record = [];
            const handler = function (e) {
                record.push([
                    this.getAttribute('id'),
                    e.currentTarget.getAttribute('id'),
                    e.target.getAttribute('id'),
                    e.eventPhase,
                    this.isSameNode(e.currentTarget),
                ]);
            };
            const leaf = document.getElementById('leaf');
            leaf.addEventListener('ping', handler);
            document.getElementById('outer').addEventListener('ping', handler);
            leaf.dispatchEvent(new Event('ping', { bubbles: true }));
            JSON.stringify(record)
        "#,
            "phases.js",
        )
        .expect("evaluate script");

    assert_eq!(
        result,
        r#"[["leaf","leaf","leaf",2,true],["outer","outer","leaf",3,true]]"#
    );
}

#[test]
fn nested_dispatch_finishes_before_outer_listeners_resume() {
    let (_host, environment) = environment();
    let result: String = environment
        .eval_with(
            r#"
            const order = [];
            const leaf = document.getElementById('leaf');
            const outer = document.getElementById('outer');
            leaf.addEventListener('first', () => {
                order.push('first-1');
                document.getElementById('inner').dispatchEvent(new Event('second', { bubbles: true }));
                order.push('first-1-end');
            });
            leaf.addEventListener('first', () => order.push('first-2'));
            outer.addEventListener('second', () => order.push('second@outer'));
            leaf.dispatchEvent(new Event('first'));
            order.join(',')
        "#,
            "nested.js",
        )
        .expect("evaluate script");

    assert_eq!(result, "first-1,second@outer,first-1-end,first-2");
}

#[test]
fn listener_exception_reaches_the_dispatcher_caller() {
    let (_host, environment) = environment();
    let result: String = environment
        .eval_with(
            r#"
            let after = false;
            let parentRan = false;
            const leaf = document.getElementById('leaf');
            leaf.addEventListener('boom', () => { throw new Error('listener exploded'); });
            leaf.addEventListener('boom', () => { after = true; });
            document.getElementById('inner').addEventListener('boom', () => { parentRan = true; });
            let caught = '';
            try {
                leaf.dispatchEvent(new Event('boom', { bubbles: true }));
            } catch (err) {
                caught = err.message;
            }
            JSON.stringify([caught, after, parentRan])
        "#,
            "throwing-listener.js",
        )
        .expect("evaluate script");

    assert_eq!(result, r#"["listener exploded",false,false]"#);
}

#[test]
fn an_event_object_cannot_be_dispatched_twice() {
    let (_host, environment) = environment();
    let threw: bool = environment
        .eval_with(
            r#"
            const leaf = document.getElementById('leaf');
            const event = new Event('once');
            leaf.dispatchEvent(event);
            let threw = false;
            try {
                leaf.dispatchEvent(event);
            } catch (err) {
                threw = true;
            }
            threw
        "#,
            "twice.js",
        )
        .expect("evaluate script");

    assert!(threw);
}

#[test]
fn script_click_reports_without_running_the_default_action() {
    let (host, environment) = environment();
    let result: String = environment
        .eval_with(
            r#"
            const link = document.getElementById('link');
            const first = link.click();
            link.addEventListener('click', (e) => e.preventDefault());
            const second = link.click();
            JSON.stringify([first, second])
        "#,
            "click.js",
        )
        .expect("evaluate script");

    assert_eq!(result, "[true,false]");
    assert!(host.navigations().is_empty());
    assert!(host.default_actions().is_empty());
}

#[test]
fn click_bubbles_to_ancestors() {
    let (_host, environment) = environment();
    let result: String = environment
        .eval_with(
            r#"
            const seen = [];
            document.getElementById('outer').addEventListener('click', (e) => {
                seen.push(e.target.getAttribute('id') + ':' + e.bubbles + ':' + e.isTrusted);
            });
            document.getElementById('leaf').click();
            seen.join(',')
        "#,
            "click-bubbles.js",
        )
        .expect("evaluate script");

    assert_eq!(result, "leaf:true:false");
}

#[test]
fn handle_event_objects_are_accepted() {
    let (_host, environment) = environment();
    let calls: i32 = environment
        .eval_with(
            r#"
            const listener = {
                calls: 0,
                handleEvent(e) { this.calls += 1; },
            };
            const btn = document.getElementById('btn');
            btn.addEventListener('poke', listener);
            btn.addEventListener('poke', null);
            btn.dispatchEvent(new Event('poke'));
            listener.calls
        "#,
            "handle-event.js",
        )
        .expect("evaluate script");

    assert_eq!(calls, 1);
}

#[test]
fn listeners_registered_through_different_proxies_share_one_entry() {
    let (_host, environment) = environment();
    let count: i32 = environment
        .eval_with(
            r#"
            let count = 0;
            document.getElementById('btn').addEventListener('tap', () => { count += 1; });
            document.querySelector('button').addEventListener('tap', () => { count += 10; });
            document.querySelectorAll('#btn')[0].dispatchEvent(new Event('tap'));
            count
        "#,
            "proxies.js",
        )
        .expect("evaluate script");

    assert_eq!(count, 11);
}
