use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;

use trellis_core::platform::DefaultScheduler;
use trellis_core::reactive::{Flush, Graph};
use trellis_core::runtime::Runtime;
use trellis_testing::prelude::*;
use trellis_tree::{
    Component, Context, Element, HostAdapter, LifecycleEvent, LiveRef, PropValue, Props,
    Reconciler, RenderError, RenderFn, RenderNode,
};

fn setup() -> (Runtime, Rc<MemoryHost>, Reconciler<MemoryHost>) {
    let runtime = Runtime::new(Arc::new(DefaultScheduler));
    let host = Rc::new(MemoryHost::new());
    let reconciler = Reconciler::new(host.clone(), runtime.handle());
    (runtime, host, reconciler)
}

fn mount_at_root(
    reconciler: &Reconciler<MemoryHost>,
    host: &MemoryHost,
    vnode: &RenderNode,
) -> LiveRef<MemoryHost> {
    reconciler
        .mount(&host.root(), None, &host.root_state(), vnode, &Context::root())
        .expect("mount succeeds")
}

#[test]
fn mounts_an_element_tree() {
    let (_runtime, host, reconciler) = setup();
    let vnode = Element::builder("panel")
        .props(Props::builder().set("width", 320i64).build())
        .child(RenderNode::list(vec![
            RenderNode::text("hi"),
            RenderNode::Empty,
        ]))
        .build();

    let _live = mount_at_root(&reconciler, &host, &vnode);
    assert_eq!(host.dump(host.root()), "<panel width=320>hi·</panel>");
}

#[test]
fn identical_snapshot_update_touches_nothing() {
    let (_runtime, host, reconciler) = setup();
    let vnode = Element::builder("panel")
        .child(RenderNode::text("hi"))
        .build();
    let mut live = mount_at_root(&reconciler, &host, &vnode);
    host.clear_ops();

    reconciler
        .update(&mut live, &host.root_state(), &vnode.clone(), &Context::root())
        .unwrap();
    assert!(host.ops().is_empty(), "same snapshot must be a no-op");
}

#[test]
fn leaf_content_updates_as_an_attribute() {
    let (_runtime, host, reconciler) = setup();
    let mut live = mount_at_root(&reconciler, &host, &RenderNode::text("a"));
    host.clear_ops();

    reconciler
        .update(&mut live, &host.root_state(), &RenderNode::text("b"), &Context::root())
        .unwrap();
    assert_eq!(host.dump(host.root()), "b");
    let ops = host.take_ops();
    assert_eq!(ops.len(), 1);
    assert!(matches!(&ops[0], HostOp::SetText { text, .. } if text == "b"));

    // Equal leaf value is snapshot-identical: nothing reaches the host.
    reconciler
        .update(&mut live, &host.root_state(), &RenderNode::text("b"), &Context::root())
        .unwrap();
    assert!(host.ops().is_empty());
}

#[test]
fn element_attribute_diff_sets_and_removes() {
    let (_runtime, host, reconciler) = setup();
    let old = Element::builder("panel")
        .props(Props::builder().set("width", 320i64).set("label", "old").build())
        .build();
    let mut live = mount_at_root(&reconciler, &host, &old);
    host.clear_ops();

    let new = Element::builder("panel")
        .props(Props::builder().set("width", 320i64).set("title", "new").build())
        .build();
    reconciler
        .update(&mut live, &host.root_state(), &new, &Context::root())
        .unwrap();

    let ops = host.take_ops();
    assert!(ops.contains(&HostOp::SetAttribute {
        node: 1,
        name: "title".to_owned(),
        value: "new".to_owned(),
    }));
    assert!(ops.contains(&HostOp::RemoveAttribute {
        node: 1,
        name: "label".to_owned(),
    }));
    // Unchanged attribute never re-applied.
    assert!(!ops.iter().any(|op| matches!(
        op,
        HostOp::SetAttribute { name, .. } if name == "width"
    )));
}

#[test]
fn element_child_appears_and_disappears() {
    let (_runtime, host, reconciler) = setup();
    let bare = Element::builder("panel").build();
    let mut live = mount_at_root(&reconciler, &host, &bare);
    assert_eq!(host.dump(host.root()), "<panel></panel>");

    let with_child = Element::builder("panel").child(RenderNode::text("hi")).build();
    reconciler
        .update(&mut live, &host.root_state(), &with_child, &Context::root())
        .unwrap();
    assert_eq!(host.dump(host.root()), "<panel>hi</panel>");

    let bare_again = Element::builder("panel").build();
    reconciler
        .update(&mut live, &host.root_state(), &bare_again, &Context::root())
        .unwrap();
    assert_eq!(host.dump(host.root()), "<panel></panel>");
}

#[test]
fn shape_mismatch_replaces_in_position() {
    let (_runtime, host, reconciler) = setup();
    let list = RenderNode::list(vec![
        RenderNode::text("before"),
        RenderNode::text("x"),
        RenderNode::text("after"),
    ]);
    let mut live = mount_at_root(&reconciler, &host, &list);
    host.clear_ops();

    let next = RenderNode::list(vec![
        RenderNode::text("before"),
        Element::builder("panel").build(),
        RenderNode::text("after"),
    ]);
    reconciler
        .update(&mut live, &host.root_state(), &next, &Context::root())
        .unwrap();
    assert_eq!(host.dump(host.root()), "before<panel></panel>after");
    assert!(host
        .ops()
        .iter()
        .any(|op| matches!(op, HostOp::RemoveChild { .. })));
}

fn logging_component(name: &'static str, log: Rc<RefCell<Vec<String>>>, body: RenderNode) -> Component {
    Rc::new(move |_props, instance| {
        for (event, tag) in [
            (LifecycleEvent::Mount, "mount"),
            (LifecycleEvent::Mounted, "mounted"),
            (LifecycleEvent::Unmount, "unmount"),
            (LifecycleEvent::Unmounted, "unmounted"),
        ] {
            let log = log.clone();
            let _registration = instance.on(event, move || {
                log.borrow_mut().push(format!("{name}:{tag}"));
            });
        }
        let body = body.clone();
        Box::new(move |_props: &Props| Ok(body.clone())) as RenderFn
    })
}

#[test]
fn lifecycle_hooks_bracket_the_child() {
    let (_runtime, host, reconciler) = setup();
    let log = Rc::new(RefCell::new(Vec::new()));

    let inner = logging_component("inner", log.clone(), RenderNode::text("leaf"));
    let outer = logging_component(
        "outer",
        log.clone(),
        RenderNode::component(inner, Props::empty()),
    );
    let live = mount_at_root(
        &reconciler,
        &host,
        &RenderNode::component(outer, Props::empty()),
    );
    assert_eq!(
        *log.borrow(),
        vec!["outer:mount", "inner:mount", "inner:mounted", "outer:mounted"]
    );
    assert_eq!(host.dump(host.root()), "leaf");

    log.borrow_mut().clear();
    reconciler.unmount(live);
    assert_eq!(
        *log.borrow(),
        vec![
            "outer:unmount",
            "inner:unmount",
            "inner:unmounted",
            "outer:unmounted"
        ]
    );
    assert_eq!(host.dump(host.root()), "");
}

#[test]
fn component_update_reinvokes_stored_render_with_new_props() {
    let (_runtime, host, reconciler) = setup();
    let constructions = Rc::new(Cell::new(0));

    let built = constructions.clone();
    let component: Component = Rc::new(move |_props, _instance| {
        built.set(built.get() + 1);
        Box::new(move |props: &Props| {
            let label = props
                .get("label")
                .and_then(PropValue::as_text)
                .unwrap_or("?")
                .to_owned();
            Ok(RenderNode::text(label))
        }) as RenderFn
    });

    let first = RenderNode::component(
        component.clone(),
        Props::builder().set("label", "one").build(),
    );
    let mut live = mount_at_root(&reconciler, &host, &first);
    assert_eq!(host.dump(host.root()), "one");
    assert_eq!(constructions.get(), 1);

    let second = RenderNode::component(
        component.clone(),
        Props::builder().set("label", "two").build(),
    );
    reconciler
        .update(&mut live, &host.root_state(), &second, &Context::root())
        .unwrap();
    assert_eq!(host.dump(host.root()), "two");
    assert_eq!(constructions.get(), 1, "constructor runs once per mount");
    assert_eq!(
        live.instance()
            .unwrap()
            .props()
            .get("label")
            .and_then(PropValue::as_text),
        Some("two")
    );
}

#[test]
fn scheduled_updates_coalesce_into_one_rerender() {
    let (runtime, host, reconciler) = setup();
    let renders = Rc::new(Cell::new(0));
    let value = Rc::new(Cell::new(0i64));

    let count = renders.clone();
    let current = value.clone();
    let component: Component = Rc::new(move |_props, _instance| {
        let count = count.clone();
        let current = current.clone();
        Box::new(move |_props: &Props| {
            count.set(count.get() + 1);
            Ok(RenderNode::int(current.get()))
        }) as RenderFn
    });

    let live = mount_at_root(
        &reconciler,
        &host,
        &RenderNode::component(component, Props::empty()),
    );
    assert_eq!(renders.get(), 1);

    let instance = live.instance().unwrap().clone();
    value.set(7);
    instance.update(None);
    instance.update(None);
    instance.update(None);
    runtime.run_until_idle().unwrap();
    assert_eq!(renders.get(), 2, "three updates collapse into one re-render");
    assert_eq!(host.dump(host.root()), "7");
}

#[test]
fn state_write_drives_a_rerender_through_an_effect() {
    let (runtime, host, reconciler) = setup();
    let graph = Graph::new(runtime.handle());
    let count = graph.state(0i64);

    let current = count.clone();
    let component: Component = Rc::new(move |_props, _instance| {
        let current = current.clone();
        Box::new(move |_props: &Props| Ok(RenderNode::int(current.get()))) as RenderFn
    });

    let live = mount_at_root(
        &reconciler,
        &host,
        &RenderNode::component(component, Props::empty()),
    );
    let instance = live.instance().unwrap().clone();
    let tracked = count.clone();
    let effect = graph.effect(Flush::Pre, move || {
        tracked.get();
        instance.update(None);
        None
    });
    runtime.run_until_idle().unwrap();
    assert_eq!(host.dump(host.root()), "0");

    count.set(3);
    runtime.run_until_idle().unwrap();
    assert_eq!(host.dump(host.root()), "3");
    effect.revoke();
}

#[test]
fn error_hook_keeps_the_previous_subtree() {
    let (runtime, host, reconciler) = setup();
    let poison = Rc::new(Cell::new(false));
    let caught = Rc::new(RefCell::new(Vec::new()));

    let fail = poison.clone();
    let seen = caught.clone();
    let component: Component = Rc::new(move |_props, instance| {
        let seen = seen.clone();
        let _registration = instance.on_error(move |err| {
            seen.borrow_mut().push(err.message().to_owned());
        });
        let fail = fail.clone();
        Box::new(move |_props: &Props| {
            if fail.get() {
                Err(RenderError::msg("boom"))
            } else {
                Ok(RenderNode::text("ok"))
            }
        }) as RenderFn
    });

    let live = mount_at_root(
        &reconciler,
        &host,
        &RenderNode::component(component, Props::empty()),
    );
    assert_eq!(host.dump(host.root()), "ok");

    poison.set(true);
    live.instance().unwrap().update(None);
    runtime.run_until_idle().unwrap();
    assert_eq!(host.dump(host.root()), "ok", "failed render keeps the old subtree");
    assert_eq!(*caught.borrow(), vec!["boom"]);
}

#[test]
fn unhandled_render_error_is_fatal_to_the_flush() {
    let (runtime, host, reconciler) = setup();
    let poison = Rc::new(Cell::new(false));

    let fail = poison.clone();
    let component: Component = Rc::new(move |_props, _instance| {
        let fail = fail.clone();
        Box::new(move |_props: &Props| {
            if fail.get() {
                Err(RenderError::msg("boom"))
            } else {
                Ok(RenderNode::text("ok"))
            }
        }) as RenderFn
    });

    let live = mount_at_root(
        &reconciler,
        &host,
        &RenderNode::component(component, Props::empty()),
    );
    poison.set(true);
    live.instance().unwrap().update(None);
    assert!(runtime.run_until_idle().is_err());
    assert_eq!(host.dump(host.root()), "ok");
}

#[test]
fn context_flows_from_ancestor_to_descendant() {
    let (_runtime, host, reconciler) = setup();
    let seen = Rc::new(RefCell::new(None));

    let observed = seen.clone();
    let inner: Component = Rc::new(move |_props, instance| {
        *observed.borrow_mut() = instance.context().get_as::<String>("theme");
        Box::new(|_props: &Props| Ok(RenderNode::Empty)) as RenderFn
    });

    let inner_for_outer = inner.clone();
    let outer: Component = Rc::new(move |_props, instance| {
        instance
            .context()
            .set("theme", Rc::new("dark".to_owned()) as Rc<dyn std::any::Any>);
        let body = RenderNode::component(inner_for_outer.clone(), Props::empty());
        Box::new(move |_props: &Props| Ok(body.clone())) as RenderFn
    });

    mount_at_root(
        &reconciler,
        &host,
        &RenderNode::component(outer, Props::empty()),
    );
    assert_eq!(seen.borrow().as_deref(), Some(&"dark".to_owned()));
}
