//! Property-based invariant tests for `ListModel`.
//!
//! 1. The model matches a plain `Vec` under the out-of-range-is-ignored policy
//! 2. Every applied mutation emits exactly one structural event, then `sizeChanged`
//! 3. Handlers always observe the model after the mutation
//! 4. Ignored mutations emit nothing

use std::cell::RefCell;
use std::rc::Rc;

use coral_core::{model_events, ListModel, Runtime, Value};
use proptest::prelude::*;

#[derive(Clone, Debug)]
enum Op {
    Insert(usize, i64),
    BulkInsert(usize, Vec<i64>),
    Remove(usize),
    Replace(usize, i64),
    Reset(Vec<i64>),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0usize..12, any::<i64>()).prop_map(|(at, v)| Op::Insert(at, v)),
        (0usize..12, proptest::collection::vec(any::<i64>(), 1..4))
            .prop_map(|(at, vs)| Op::BulkInsert(at, vs)),
        (0usize..12).prop_map(Op::Remove),
        (0usize..12, any::<i64>()).prop_map(|(at, v)| Op::Replace(at, v)),
        proptest::collection::vec(any::<i64>(), 0..6).prop_map(Op::Reset),
    ]
}

fn values(items: &[i64]) -> Vec<Value> {
    items.iter().map(|v| Value::Int(*v)).collect()
}

/// Apply `op` to the reference vector; returns whether it was applied
fn apply_reference(reference: &mut Vec<i64>, op: &Op) -> bool {
    match op {
        Op::Insert(at, v) if *at <= reference.len() => {
            reference.insert(*at, *v);
            true
        }
        Op::BulkInsert(at, vs) if *at <= reference.len() => {
            reference.splice(*at..*at, vs.iter().copied());
            true
        }
        Op::Remove(at) if *at < reference.len() => {
            reference.remove(*at);
            true
        }
        Op::Replace(at, v) if *at < reference.len() => {
            reference[*at] = *v;
            true
        }
        Op::Reset(vs) => {
            *reference = vs.clone();
            true
        }
        _ => false,
    }
}

fn apply_model(rt: &mut Runtime, model: ListModel, op: &Op) {
    match op {
        Op::Insert(at, v) => model.insert(rt, *at, *v),
        Op::BulkInsert(at, vs) => model.bulk_insert(rt, *at, values(vs)),
        Op::Remove(at) => model.remove(rt, *at),
        Op::Replace(at, v) => {
            model.replace(rt, *at, *v);
        }
        Op::Reset(vs) => model.reset(rt, values(vs)),
    }
}

/// Connect a view that logs `(event, size seen by the handler)`
fn observe(rt: &mut Runtime, model: ListModel) -> Rc<RefCell<Vec<(&'static str, usize)>>> {
    let log = Rc::new(RefCell::new(Vec::new()));
    let view = rt.create("View");
    for event in [
        model_events::MODEL_RESET,
        model_events::MODEL_INSERT,
        model_events::MODEL_REMOVE,
        model_events::MODEL_REPLACE,
        "sizeChanged",
    ] {
        let log = log.clone();
        rt.connect(model.id(), event, view, move |rt, _| {
            log.borrow_mut().push((event, model.size(rt)));
        })
        .unwrap();
    }
    log
}

proptest! {
    #[test]
    fn matches_reference_vec(
        initial in proptest::collection::vec(any::<i64>(), 0..6),
        ops in proptest::collection::vec(arb_op(), 0..40),
    ) {
        let mut rt = Runtime::new();
        let model = ListModel::with_data(&mut rt, values(&initial)).unwrap();
        let mut reference = initial.clone();

        for op in &ops {
            apply_reference(&mut reference, op);
            apply_model(&mut rt, model, op);
            prop_assert_eq!(model.size(&rt), reference.len());
        }
        prop_assert_eq!(model.data(&rt), values(&reference));
    }
}

proptest! {
    #[test]
    fn one_structural_event_then_size(
        initial in proptest::collection::vec(any::<i64>(), 0..6),
        ops in proptest::collection::vec(arb_op(), 1..30),
    ) {
        let mut rt = Runtime::new();
        let model = ListModel::with_data(&mut rt, values(&initial)).unwrap();
        let log = observe(&mut rt, model);
        let mut reference = initial.clone();

        for op in &ops {
            log.borrow_mut().clear();
            let applied = apply_reference(&mut reference, op);
            apply_model(&mut rt, model, op);

            let events = log.borrow().clone();
            if !applied {
                prop_assert!(events.is_empty(), "ignored {:?} emitted {:?}", op, events);
                continue;
            }
            prop_assert_eq!(events.len(), 2);
            let expected = match op {
                Op::Insert(..) | Op::BulkInsert(..) => model_events::MODEL_INSERT,
                Op::Remove(_) => model_events::MODEL_REMOVE,
                Op::Replace(..) => model_events::MODEL_REPLACE,
                Op::Reset(_) => model_events::MODEL_RESET,
            };
            prop_assert_eq!(events[0].0, expected);
            prop_assert_eq!(events[1].0, "sizeChanged");
            for (_, seen) in &events {
                prop_assert_eq!(*seen, reference.len());
            }
        }
    }
}

proptest! {
    #[test]
    fn at_is_total(
        initial in proptest::collection::vec(any::<i64>(), 0..8),
        index in 0usize..16,
    ) {
        let mut rt = Runtime::new();
        let model = ListModel::with_data(&mut rt, values(&initial)).unwrap();
        let expected = initial.get(index).map_or(Value::Null, |v| Value::Int(*v));
        prop_assert_eq!(model.at(&rt, index), expected);
    }
}
