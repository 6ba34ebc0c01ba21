//! Integration tests for the object runtime
//!
//! These exercise ownership, teardown, references and deferred work together
//! the way a view layer drives them.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use coral_core::{
    event_names, Lifecycle, ListModel, LogLevel, ObjectError, ObjectId, Property, RecordingSink,
    Runtime, RuntimeConfig, Value,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A view holding a model through its `model` property and clearing it when
/// the model goes away
fn make_view(rt: &mut Runtime, parent: ObjectId) -> ObjectId {
    let view = rt.create("View");
    rt.declare_property(view, "model", Property::stored(Value::Null))
        .unwrap();
    rt.connect(view, event_names::REFERENCE_GONE, view, move |rt, args| {
        if rt.get_property(view, "model").ok() == args.first().cloned() {
            let _ = rt.set_property(view, "model", Value::Null);
        }
    })
    .unwrap();
    rt.add(parent, view).unwrap();
    view
}

#[test]
fn test_tree_teardown_is_depth_first() {
    init_tracing();
    let mut rt = Runtime::new();
    let order = Rc::new(RefCell::new(Vec::new()));

    let window = rt.create("Window");
    let panel = rt.create("Panel");
    let button = rt.create("Button");
    let label = rt.create("Label");
    rt.add(window, panel).unwrap();
    rt.add(panel, button).unwrap();
    rt.add(window, label).unwrap();
    rt.init(window).unwrap();

    for id in [window, panel, button, label] {
        let order = order.clone();
        rt.on_terminate(id, move |rt, id| {
            order
                .borrow_mut()
                .push(rt.type_name(id).unwrap_or_default().to_string());
        })
        .unwrap();
    }

    rt.destroy(window).unwrap();
    assert_eq!(*order.borrow(), vec!["Button", "Panel", "Label", "Window"]);
    assert_eq!(rt.object_count(), 0);
    for id in [window, panel, button, label] {
        assert_eq!(rt.lifecycle(id), Lifecycle::Terminated);
    }
}

#[test]
fn test_shared_model_outlives_one_view() {
    let mut rt = Runtime::new();
    let root = rt.create("Root");
    let model = ListModel::with_data(&mut rt, vec![Value::Int(1)]).unwrap();
    rt.set_auto_release(model.id(), true);

    let first = make_view(&mut rt, root);
    let second = make_view(&mut rt, root);
    rt.set_property(first, "model", model.id()).unwrap();
    rt.set_property(second, "model", model.id()).unwrap();
    rt.init(root).unwrap();
    assert_eq!(rt.reference_count(model.id()), 2);

    rt.destroy(first).unwrap();
    rt.run_until_idle();
    assert!(rt.is_alive(model.id()));
    assert_eq!(rt.reference_holders(model.id()), vec![second]);

    rt.destroy(second).unwrap();
    rt.run_until_idle();
    assert_eq!(rt.lifecycle(model.id()), Lifecycle::Terminated);
}

#[test]
fn test_reference_gone_clears_holder_property() {
    let mut rt = Runtime::new();
    let root = rt.create("Root");
    let view = make_view(&mut rt, root);
    let model = ListModel::new(&mut rt).unwrap();
    rt.set_property(view, "model", model.id()).unwrap();

    rt.destroy(model.id()).unwrap();
    assert!(rt.is_alive(view));
    assert_eq!(rt.get_property(view, "model").unwrap(), Value::Null);
}

#[test]
fn test_handlers_of_destroyed_receiver_never_run() {
    let mut rt = Runtime::new();
    let model = ListModel::new(&mut rt).unwrap();
    let root = rt.create("Root");
    let view = rt.create("View");
    rt.add(root, view).unwrap();
    let hits = Rc::new(Cell::new(0));

    let h = hits.clone();
    rt.connect(model.id(), "sizeChanged", view, move |_, _| h.set(h.get() + 1))
        .unwrap();
    model.append(&mut rt, 1);
    rt.destroy(root).unwrap();
    model.append(&mut rt, 2);

    assert_eq!(hits.get(), 1);
    assert_eq!(model.size(&rt), 2);
}

#[test]
fn test_deferred_work_of_destroyed_owner_is_dropped() {
    let mut rt = Runtime::new();
    let owner = rt.create("Owner");
    let hits = Rc::new(Cell::new(0));
    let h = hits.clone();
    rt.defer(owner, Some("refresh"), move |_| h.set(h.get() + 1));
    rt.destroy(owner).unwrap();
    assert_eq!(rt.tick(), 0);
    assert_eq!(hits.get(), 0);
}

#[test]
fn test_safe_callback_after_teardown() {
    let mut rt = Runtime::new();
    let owner = rt.create("Loader");
    let results = Rc::new(RefCell::new(Vec::new()));
    let r = results.clone();
    let mut on_loaded = rt.safe_callback(owner, move |_, args| r.borrow_mut().push(args.to_vec()));

    assert!(on_loaded.call(&mut rt, &[Value::from("first")]));
    rt.destroy(owner).unwrap();
    assert!(!on_loaded.call(&mut rt, &[Value::from("second")]));
    assert_eq!(*results.borrow(), vec![vec![Value::from("first")]]);
}

#[test]
fn test_reparent_failure_leaves_graph_untouched() {
    let mut rt = Runtime::new();
    let a = rt.create("A");
    let b = rt.create("B");
    let c = rt.create("C");
    rt.add(a, b).unwrap();
    rt.add(b, c).unwrap();

    assert_eq!(rt.add(c, a), Err(ObjectError::Cycle { child: a, parent: c }));
    assert_eq!(rt.parent(a), None);
    assert_eq!(rt.children(c), Vec::<ObjectId>::new());
    assert!(rt.is_ancestor_of(a, c));
}

#[test]
fn test_binding_loop_is_broken_and_logged() {
    let sink = RecordingSink::new();
    let mut rt = Runtime::with_config(RuntimeConfig::default()).with_sink(sink.clone());
    let left = rt.create("Left");
    let right = rt.create("Right");
    rt.declare_property(left, "value", Property::stored(0)).unwrap();
    rt.declare_property(right, "value", Property::stored(0)).unwrap();

    rt.connect(left, "valueChanged", right, move |rt, args| {
        let next = args[0].as_i64().unwrap_or_default() + 1;
        let _ = rt.set_property(right, "value", next);
    })
    .unwrap();
    rt.connect(right, "valueChanged", left, move |rt, args| {
        let next = args[0].as_i64().unwrap_or_default() + 1;
        let _ = rt.set_property(left, "value", next);
    })
    .unwrap();

    rt.set_property(left, "value", 1).unwrap();
    assert!(sink.contains(LogLevel::Warning, "binding loop"));
    assert_eq!(rt.get_property(right, "value").unwrap(), Value::Int(2));
    assert_eq!(rt.get_property(left, "value").unwrap(), Value::Int(3));
}

#[test]
fn test_root_sink_receives_descendant_logs() {
    let fallback = RecordingSink::new();
    let tree = RecordingSink::new();
    let mut rt = Runtime::new().with_sink(fallback.clone());
    let root = rt.create("Root");
    let leaf = rt.create("Leaf");
    rt.add(root, leaf).unwrap();
    rt.set_log_sink(root, Some(Rc::new(tree.clone())));

    rt.init(leaf).unwrap();
    rt.init(leaf).unwrap();
    assert!(tree.contains(LogLevel::Error, "initialized twice"));
    assert!(fallback.records().is_empty());
}
