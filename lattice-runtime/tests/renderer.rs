//! Integration Tests for the Renderer
//!
//! These tests drive the reconciler against the in-memory host and check
//! both the resulting tree and the host operations it took to get there.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use lattice_runtime::render::{HostOp, Slot, Slots};
use lattice_runtime::{
    callback, fragment, h, props, text, Component, MemoryHost, NodeId, RenderError, Renderer, Runtime,
    SetupResult, VNode, Value,
};

fn setup() -> (Runtime, Renderer<MemoryHost>, NodeId) {
    let runtime = Runtime::new();
    let renderer = Renderer::new(runtime.clone(), MemoryHost::new());
    let container = renderer.host().create_container();
    (runtime, renderer, container)
}

fn keyed_list(keys: &[&str]) -> VNode {
    let items: Vec<VNode> = keys
        .iter()
        .map(|key| h("li", props! { "key" => *key }, *key))
        .collect();
    h("ul", props! {}, items)
}

fn count_ops(host: &MemoryHost, pred: impl Fn(&HostOp) -> bool) -> usize {
    host.ops().iter().filter(|op| pred(op)).count()
}

// ----------------------------------------------------------------------------
// Elements and children
// ----------------------------------------------------------------------------

/// Test that mounting an element tree produces the expected host tree.
#[test]
fn mounts_element_tree() {
    let (_rt, renderer, container) = setup();
    let tree = h(
        "div",
        props! { "id" => "app" },
        vec![h("span", props! {}, "hello"), text(" world")],
    );

    renderer.render(tree, container).unwrap();
    assert_eq!(
        renderer.host().serialize(container),
        "<div id=\"app\"><span>hello</span> world</div>"
    );
}

/// Test that rotating a keyed list moves exactly one node.
#[test]
fn keyed_rotation_is_a_single_move() {
    let (_rt, renderer, container) = setup();
    renderer.render(keyed_list(&["a", "b", "c"]), container).unwrap();
    let host = renderer.host();
    host.clear_ops();

    renderer.render(keyed_list(&["c", "a", "b"]), container).unwrap();

    assert_eq!(host.move_count(), 1);
    assert_eq!(
        count_ops(host, |op| matches!(
            op,
            HostOp::CreateElement { .. } | HostOp::CreateText { .. } | HostOp::Remove { .. }
        )),
        0
    );
    assert_eq!(
        host.serialize(container),
        "<ul><li>c</li><li>a</li><li>b</li></ul>"
    );
}

/// Test that keyed removal and insertion touch only the affected nodes.
#[test]
fn keyed_insert_and_remove() {
    let (_rt, renderer, container) = setup();
    let host = renderer.host();
    renderer.render(keyed_list(&["a", "b", "c"]), container).unwrap();
    host.clear_ops();

    renderer.render(keyed_list(&["a", "c"]), container).unwrap();
    assert_eq!(count_ops(host, |op| matches!(op, HostOp::Remove { .. })), 1);
    assert_eq!(host.move_count(), 0);
    host.clear_ops();

    renderer.render(keyed_list(&["a", "b", "c", "d"]), container).unwrap();
    assert_eq!(count_ops(host, |op| matches!(op, HostOp::CreateElement { .. })), 2);
    assert_eq!(count_ops(host, |op| matches!(op, HostOp::Remove { .. })), 0);
    assert_eq!(
        host.serialize(container),
        "<ul><li>a</li><li>b</li><li>c</li><li>d</li></ul>"
    );
}

/// Test a reorder mixed with insertions and removals.
#[test]
fn keyed_shuffle_with_new_and_missing_keys() {
    let (_rt, renderer, container) = setup();
    let host = renderer.host();
    renderer
        .render(keyed_list(&["a", "b", "c", "d", "e"]), container)
        .unwrap();
    host.clear_ops();

    renderer
        .render(keyed_list(&["a", "d", "x", "b", "e"]), container)
        .unwrap();

    assert_eq!(
        host.serialize(container),
        "<ul><li>a</li><li>d</li><li>x</li><li>b</li><li>e</li></ul>"
    );
    // "c" is removed, "x" created, and "d" is the only node that moves.
    assert_eq!(count_ops(host, |op| matches!(op, HostOp::Remove { .. })), 1);
    assert_eq!(count_ops(host, |op| matches!(op, HostOp::CreateElement { .. })), 1);
    assert_eq!(host.move_count(), 1);
}

/// Test that text children replaced by a list become real child elements.
#[test]
fn text_children_to_list() {
    let (_rt, renderer, container) = setup();
    renderer.render(h("div", props! {}, "x"), container).unwrap();
    assert_eq!(renderer.host().serialize(container), "<div>x</div>");

    renderer
        .render(
            h("div", props! {}, vec![h("p", props! {}, "1"), h("p", props! {}, "2")]),
            container,
        )
        .unwrap();
    assert_eq!(
        renderer.host().serialize(container),
        "<div><p>1</p><p>2</p></div>"
    );

    renderer.render(h("div", props! {}, "y"), container).unwrap();
    assert_eq!(renderer.host().serialize(container), "<div>y</div>");
}

/// Test that attribute changes and removals reach the host.
#[test]
fn patches_attributes() {
    let (_rt, renderer, container) = setup();
    let host = renderer.host();
    renderer
        .render(h("div", props! { "class" => "a", "title" => "t" }, ()), container)
        .unwrap();
    host.clear_ops();

    renderer
        .render(h("div", props! { "class" => "b" }, ()), container)
        .unwrap();

    assert_eq!(host.serialize(container), "<div class=\"b\"></div>");
    assert_eq!(count_ops(host, |op| matches!(op, HostOp::SetAttribute { .. })), 1);
    assert_eq!(count_ops(host, |op| matches!(op, HostOp::RemoveAttribute { .. })), 1);
}

/// Test that a change of element tag replaces the node.
#[test]
fn different_tags_replace_the_node() {
    let (_rt, renderer, container) = setup();
    renderer.render(h("div", props! {}, "a"), container).unwrap();
    renderer.render(h("span", props! {}, "a"), container).unwrap();
    assert_eq!(renderer.host().serialize(container), "<span>a</span>");
}

/// Test that fragments keep their children between their anchors.
#[test]
fn fragment_children_stay_in_place() {
    let (_rt, renderer, container) = setup();
    let tree = |middle: &[&str]| {
        let items: Vec<VNode> = middle
            .iter()
            .map(|key| h("i", props! { "key" => *key }, *key))
            .collect();
        h(
            "div",
            props! {},
            vec![h("b", props! {}, "start"), fragment(items), h("b", props! {}, "end")],
        )
    };

    renderer.render(tree(&["1"]), container).unwrap();
    renderer.render(tree(&["2", "1"]), container).unwrap();
    assert_eq!(
        renderer.host().serialize(container),
        "<div><b>start</b><i>2</i><i>1</i><b>end</b></div>"
    );
}

/// Test that unmounting a container clears it.
#[test]
fn unmount_root_clears_container() {
    let (_rt, renderer, container) = setup();
    renderer.render(keyed_list(&["a"]), container).unwrap();
    renderer.unmount_root(container).unwrap();

    assert_eq!(renderer.host().serialize(container), "");
    assert_eq!(
        renderer.unmount_root(container),
        Err(RenderError::InvalidContainer(container.raw()))
    );
}

// ----------------------------------------------------------------------------
// Components
// ----------------------------------------------------------------------------

/// Test that several state changes in one tick produce a single re-render.
#[test]
fn state_changes_are_batched() {
    let (rt, renderer, container) = setup();
    let count = rt.create_ref(0);

    let state = count.clone();
    let counter = Component::new("Counter")
        .setup(move |_, _| {
            let state = state.clone();
            SetupResult::render(move |_| h("p", props! {}, state.get().to_display_string()))
        })
        .build();

    let instance = renderer.create_app(counter).mount(container).unwrap().unwrap();
    assert_eq!(instance.render_count(), 1);

    count.set(1);
    count.set(2);
    count.set(3);
    assert_eq!(instance.render_count(), 1);
    assert_eq!(renderer.host().serialize(container), "<p>0</p>");

    let seen = Rc::new(RefCell::new(String::new()));
    let seen_clone = seen.clone();
    let host = Rc::clone(renderer.host());
    rt.next_tick(move || *seen_clone.borrow_mut() = host.serialize(container));
    rt.run_microtasks().unwrap();

    assert_eq!(instance.render_count(), 2);
    assert_eq!(*seen.borrow(), "<p>3</p>");
}

/// Test that state returned from setup is reachable from the render context
/// with refs unwrapped.
#[test]
fn setup_state_is_unwrapped_for_render() {
    let (rt, renderer, container) = setup();
    let greeting = Component::new("Greeting")
        .setup(|_, ctx| {
            let name = ctx.runtime().create_ref("ada");
            SetupResult::state(lattice_runtime::object! { "name" => name })
        })
        .render(|ctx| h("p", props! {}, format!("hi {}", ctx.get("name"))))
        .build();

    renderer
        .render(h(&greeting, props! {}, ()), container)
        .unwrap();
    assert_eq!(renderer.host().serialize(container), "<p>hi ada</p>");
    assert!(!rt.has_pending_jobs());
}

/// Test that a child emits to the handler its parent passed as a prop.
#[test]
fn emit_reaches_parent_handler() {
    let (rt, renderer, container) = setup();

    let button = Component::new("IncButton")
        .setup(|_, ctx| {
            let emitter = ctx.emitter();
            SetupResult::render(move |_| {
                let emitter = emitter.clone();
                let on_click = callback(move |_| {
                    emitter.emit("increment", &[Value::from(1)]);
                    Value::Undefined
                });
                h("button", props! { "onClick" => on_click }, "+")
            })
        })
        .build();

    let count = rt.create_ref(0);
    let state = count.clone();
    let parent = Component::new("Parent")
        .setup(move |_, _| {
            let state = state.clone();
            let button = Rc::clone(&button);
            SetupResult::render(move |_| {
                let state_for_handler = state.clone();
                let on_increment = callback(move |args| {
                    let step = args.first().and_then(Value::as_number).unwrap_or(0.0);
                    state_for_handler.update(|v| Value::from(v.as_number().unwrap_or(0.0) + step));
                    Value::Undefined
                });
                h(
                    "div",
                    props! {},
                    vec![
                        text(state.get().to_display_string()),
                        h(&button, props! { "onIncrement" => on_increment }, ()),
                    ],
                )
            })
        })
        .build();

    renderer.create_app(parent).mount(container).unwrap();
    let host = renderer.host();
    let div = host.children(container)[0];
    let button_el = host.children(div)[1];

    assert!(host.dispatch(button_el, "click", &[]));
    assert_eq!(count.peek(), Value::from(1));

    rt.run_microtasks().unwrap();
    assert_eq!(host.serialize(container), "<div>1<button>+</button></div>");
}

/// Test that emitting an event nobody listens to is a no-op.
#[test]
fn emit_without_handler_is_ignored() {
    let (_rt, renderer, container) = setup();
    let emitted = Rc::new(Cell::new(None));

    let emitted_clone = emitted.clone();
    let lonely = Component::new("Lonely")
        .setup(move |_, ctx| {
            emitted_clone.set(Some(ctx.emit("change", &[])));
            SetupResult::render(|_| h("i", props! {}, ()))
        })
        .build();

    renderer.render(h(&lonely, props! {}, ()), container).unwrap();
    assert_eq!(emitted.get(), Some(false));
}

/// Test that a prop change from the parent re-renders the child once.
#[test]
fn props_flow_from_parent_to_child() {
    let (rt, renderer, container) = setup();

    let label = Component::new("Label")
        .setup(|props, _| {
            let props = props.clone();
            SetupResult::render(move |_| h("span", props! {}, props.get("text").to_display_string()))
        })
        .build();

    let word = rt.create_ref("one");
    let state = word.clone();
    let label_def = Rc::clone(&label);
    let parent = Component::new("Parent")
        .render(move |_| h(&label_def, props! { "text" => state.get() }, ()))
        .build();

    renderer.render(h(&parent, props! {}, ()), container).unwrap();
    assert_eq!(renderer.host().serialize(container), "<span>one</span>");

    word.set("two");
    rt.run_microtasks().unwrap();
    assert_eq!(renderer.host().serialize(container), "<span>two</span>");

    // Parent and child each rendered twice in total.
    assert_eq!(renderer.instance_count(), 2);
    let root = renderer.root(container).unwrap();
    let parent_instance = renderer.instance(root.component().unwrap()).unwrap();
    assert_eq!(parent_instance.render_count(), 2);
    let child_vnode = parent_instance.sub_tree().unwrap();
    let child = renderer.instance(child_vnode.component().unwrap()).unwrap();
    assert_eq!(child.render_count(), 2);
}

/// Test that props are readonly inside the child.
#[test]
fn props_are_readonly_in_setup() {
    let (rt, renderer, container) = setup();
    let writer = Component::new("Writer")
        .setup(|props, _| {
            props.set("value", 2);
            SetupResult::render(|_| h("i", props! {}, ()))
        })
        .build();

    renderer
        .render(h(&writer, props! { "value" => 1 }, ()), container)
        .unwrap();
    assert_eq!(
        rt.take_warnings(),
        vec![lattice_runtime::Warning::ReadonlyMutation { key: "value".into() }]
    );
}

/// Test that provided values reach descendants but not the provider.
#[test]
fn provide_and_inject() {
    let (_rt, renderer, container) = setup();
    let seen = Rc::new(RefCell::new(Vec::new()));

    let seen_clone = seen.clone();
    let child = Component::new("Child")
        .setup(move |_, ctx| {
            let theme = ctx.inject("theme").unwrap_or_default();
            let user = ctx.inject("user").unwrap_or_default();
            let missing = ctx.inject_or("missing", Value::from("fallback"));
            seen_clone.borrow_mut().extend([
                theme.to_display_string(),
                user.to_display_string(),
                missing.to_display_string(),
            ]);
            SetupResult::render(|_| h("i", props! {}, ()))
        })
        .build();

    let own = Rc::new(Cell::new(true));
    let own_clone = own.clone();
    let parent = Component::new("Parent")
        .setup(move |_, ctx| {
            ctx.provide("user", "ada");
            own_clone.set(ctx.inject("user").is_some());
            let child = Rc::clone(&child);
            SetupResult::render(move |_| h(&child, props! {}, ()))
        })
        .build();

    let app = renderer.create_app(parent);
    app.provide("theme", "dark");
    app.mount(container).unwrap();

    assert!(!own.get());
    assert_eq!(*seen.borrow(), vec!["dark", "ada", "fallback"]);
}

/// Test that `provide` outside of setup warns.
#[test]
fn provide_outside_setup_warns() {
    let (rt, renderer, _container) = setup();
    renderer.provide("key", 1);
    assert_eq!(
        rt.take_warnings(),
        vec![lattice_runtime::Warning::NoCurrentInstance { api: "provide" }]
    );
    assert!(renderer.current_instance().is_none());
}

/// Test that named and default slots render where the component asks.
#[test]
fn slots_render_in_place() {
    let (_rt, renderer, container) = setup();
    let card = Component::new("Card")
        .render(|ctx| {
            let header = ctx.render_slot("header", Value::Undefined).unwrap_or_else(|| fragment(()));
            let body = ctx
                .render_slot("default", Value::from("scoped"))
                .unwrap_or_else(|| fragment(()));
            h("section", props! {}, vec![header, body])
        })
        .build();

    let mut slots = Slots::new();
    slots.insert("header".into(), Rc::new(|_: &Value| vec![h("h1", props! {}, "title")]) as Slot);
    slots.insert(
        "default".into(),
        Rc::new(|props: &Value| vec![text(props.to_display_string())]) as Slot,
    );

    renderer.render(h(&card, props! {}, slots), container).unwrap();
    assert_eq!(
        renderer.host().serialize(container),
        "<section><h1>title</h1>scoped</section>"
    );
}

/// Test that plain children passed to a component become its default slot.
#[test]
fn plain_children_fill_default_slot() {
    let (_rt, renderer, container) = setup();
    let wrapper = Component::new("Wrapper")
        .render(|ctx| {
            let body = ctx.render_slot("default", Value::Undefined).unwrap_or_else(|| fragment(()));
            h("div", props! {}, vec![body])
        })
        .build();

    renderer
        .render(h(&wrapper, props! {}, vec![h("b", props! {}, "x")]), container)
        .unwrap();
    assert_eq!(renderer.host().serialize(container), "<div><b>x</b></div>");
}

/// Test that a component without any render function fails to mount.
#[test]
fn missing_render_function_is_an_error() {
    let (_rt, renderer, container) = setup();
    let broken = Component::new("Broken").build();

    let result = renderer.render(h(&broken, props! {}, ()), container);
    assert_eq!(
        result,
        Err(RenderError::MissingRenderFunction {
            component: "Broken".into()
        })
    );
    assert_eq!(renderer.instance_count(), 0);
}

/// Test that reordering keyed components moves their host nodes.
#[test]
fn keyed_components_move() {
    let (_rt, renderer, container) = setup();
    let item = Component::new("Item")
        .render(|ctx| h("li", props! {}, ctx.get("label").to_display_string()))
        .build();

    let list = |labels: &[&str]| {
        let items: Vec<VNode> = labels
            .iter()
            .map(|label| h(&item, props! { "key" => *label, "label" => *label }, ()))
            .collect();
        h("ul", props! {}, items)
    };

    renderer.render(list(&["a", "b"]), container).unwrap();
    let host = renderer.host();
    host.clear_ops();

    renderer.render(list(&["b", "a"]), container).unwrap();
    assert_eq!(host.serialize(container), "<ul><li>b</li><li>a</li></ul>");
    assert_eq!(host.move_count(), 1);
    assert_eq!(renderer.instance_count(), 2);
}

/// Test that unmounting a component stops its render effect.
#[test]
fn unmounted_component_no_longer_renders() {
    let (rt, renderer, container) = setup();
    let count = rt.create_ref(0);
    let state = count.clone();
    let view = Component::new("View")
        .render(move |_| h("p", props! {}, state.get().to_display_string()))
        .build();

    let app = renderer.create_app(view);
    let instance = app.mount(container).unwrap().unwrap();
    app.unmount().unwrap();

    count.set(1);
    rt.run_microtasks().unwrap();
    assert_eq!(instance.render_count(), 1);
    assert!(!instance.is_mounted());
    assert_eq!(renderer.instance_count(), 0);
    assert_eq!(app.unmount(), Err(RenderError::NotMounted));
}

/// Test that a parent re-render passing identical props skips the child.
#[test]
fn unchanged_props_skip_the_child() {
    let (rt, renderer, container) = setup();
    let child_renders = Rc::new(Cell::new(0));

    let renders = child_renders.clone();
    let child = Component::new("Child")
        .render(move |ctx| {
            renders.set(renders.get() + 1);
            h("span", props! {}, ctx.get("label").to_display_string())
        })
        .build();

    let tick = rt.create_ref(0);
    let state = tick.clone();
    let parent = Component::new("Parent")
        .render(move |_| {
            h(
                "div",
                props! {},
                vec![
                    text(state.get().to_display_string()),
                    h(&child, props! { "label" => "fixed" }, ()),
                ],
            )
        })
        .build();

    renderer.render(h(&parent, props! {}, ()), container).unwrap();
    tick.set(1);
    rt.run_microtasks().unwrap();

    assert_eq!(renderer.host().serialize(container), "<div>1<span>fixed</span></div>");
    assert_eq!(child_renders.get(), 1);
}

/// Test that dropping a prop key re-renders the child, which then sees the
/// key as absent.
#[test]
fn removed_prop_key_updates_the_child() {
    let (rt, renderer, container) = setup();
    let child_renders = Rc::new(Cell::new(0));

    let renders = child_renders.clone();
    let child = Component::new("Child")
        .render(move |ctx| {
            renders.set(renders.get() + 1);
            let label = if ctx.props().has("extra") { "with" } else { "without" };
            h("span", props! {}, label)
        })
        .build();

    let show = rt.create_ref(true);
    let state = show.clone();
    let parent = Component::new("Parent")
        .render(move |_| {
            let props = if state.get().as_bool().unwrap_or_default() {
                props! { "label" => "a", "extra" => 1 }
            } else {
                props! { "label" => "a" }
            };
            h(&child, props, ())
        })
        .build();

    renderer.render(h(&parent, props! {}, ()), container).unwrap();
    assert_eq!(renderer.host().serialize(container), "<span>with</span>");

    show.set(false);
    rt.run_microtasks().unwrap();
    assert_eq!(renderer.host().serialize(container), "<span>without</span>");
    assert_eq!(child_renders.get(), 2);
}

/// Test that unkeyed siblings of the same type are matched by scanning, so
/// swapping two of them is a single move.
#[test]
fn unkeyed_reorder_reuses_nodes() {
    let (_rt, renderer, container) = setup();
    let list = |tags: &[&str]| {
        let items: Vec<VNode> = tags.iter().map(|tag| h(*tag, props! {}, *tag)).collect();
        h("div", props! {}, items)
    };

    renderer.render(list(&["p", "span", "i"]), container).unwrap();
    let host = renderer.host();
    host.clear_ops();

    renderer.render(list(&["span", "p", "i"]), container).unwrap();
    assert_eq!(
        host.serialize(container),
        "<div><span>span</span><p>p</p><i>i</i></div>"
    );
    assert_eq!(count_ops(host, |op| matches!(op, HostOp::CreateElement { .. })), 0);
    assert_eq!(count_ops(host, |op| matches!(op, HostOp::Remove { .. })), 0);
    assert_eq!(host.move_count(), 1);
}

/// Test that a function fallback for a missing injection is called, and is
/// left alone when the key is provided.
#[test]
fn inject_or_calls_function_fallback() {
    let (_rt, renderer, container) = setup();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let made = Rc::new(Cell::new(0));

    let seen_clone = seen.clone();
    let made_clone = made.clone();
    let child = Component::new("Child")
        .setup(move |_, ctx| {
            let counter = made_clone.clone();
            let factory = callback(move |_| {
                counter.set(counter.get() + 1);
                Value::from("made")
            });
            let missing = ctx.inject_or("missing", factory.clone());
            let theme = ctx.inject_or("theme", factory);
            seen_clone
                .borrow_mut()
                .extend([missing.to_display_string(), theme.to_display_string()]);
            SetupResult::render(|_| h("i", props! {}, ()))
        })
        .build();

    let app = renderer.create_app(child);
    app.provide("theme", "dark");
    app.mount(container).unwrap();

    assert_eq!(*seen.borrow(), vec!["made", "dark"]);
    assert_eq!(made.get(), 1);
}

/// Test that a component whose root is another component keeps pointing at
/// the right host node after the inner component swaps its root on its own.
#[test]
fn nested_root_swap_keeps_sibling_order() {
    let (rt, renderer, container) = setup();
    let wide = rt.create_ref(false);

    let state = wide.clone();
    let inner = Component::new("Inner")
        .render(move |_| {
            let tag = if state.get().as_bool().unwrap_or_default() { "span" } else { "div" };
            h(tag, props! {}, "in")
        })
        .build();
    let outer = Component::new("Outer")
        .render(move |_| h(&inner, props! {}, ()))
        .build();

    let list = |keys: &[&str]| {
        let mut items: Vec<VNode> = keys
            .iter()
            .map(|key| h("li", props! { "key" => *key }, *key))
            .collect();
        items.push(h(&outer, props! { "key" => "o" }, ()));
        h("ul", props! {}, items)
    };

    renderer.render(list(&["x"]), container).unwrap();
    assert_eq!(
        renderer.host().serialize(container),
        "<ul><li>x</li><div>in</div></ul>"
    );

    wide.set(true);
    rt.run_microtasks().unwrap();
    assert_eq!(
        renderer.host().serialize(container),
        "<ul><li>x</li><span>in</span></ul>"
    );

    renderer.render(list(&["x", "y"]), container).unwrap();
    assert_eq!(
        renderer.host().serialize(container),
        "<ul><li>x</li><li>y</li><span>in</span></ul>"
    );
}

/// Test that app props reach the root component and that unmounting the app
/// frees its host nodes.
#[test]
fn app_props_reach_the_root() {
    let (_rt, renderer, container) = setup();
    let title = Component::new("Title")
        .render(|ctx| h("h1", props! {}, ctx.get("title").to_display_string()))
        .build();

    let app = renderer
        .create_app(title)
        .with_props(props! { "title" => "hello" });
    app.mount(container).unwrap();

    let host = renderer.host();
    assert_eq!(host.serialize(container), "<h1>hello</h1>");
    assert_eq!(host.node_count(), 3);

    app.unmount().unwrap();
    assert_eq!(host.serialize(container), "");
    assert_eq!(host.node_count(), 1);
}
