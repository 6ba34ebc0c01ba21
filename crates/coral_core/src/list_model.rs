//! List model
//!
//! An ordered sequence of records that views observe through structural
//! events. Each mutation is applied first and announced afterwards: the
//! structural event (`modelReset`, `modelInsert`, `modelRemove`,
//! `modelReplace`) is followed by `sizeChanged`, which fires on every
//! structural mutation even if the length did not change.
//!
//! Out-of-range indices are ignored without error; the `try_` variants
//! report them as [`ObjectError::InvalidIndex`] instead. Mutations requested
//! by a handler while the model is announcing a previous mutation are queued
//! and applied, in request order, once that announcement completes.

use std::cmp::Ordering;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use crate::error::{ObjectError, Result};
use crate::object::ObjectId;
use crate::property::Property;
use crate::runtime::Runtime;
use crate::value::Value;

/// Structural events of a list model
pub mod model_events {
    /// All indices are invalid; no arguments
    pub const MODEL_RESET: &str = "modelReset";
    /// `(at, count)`
    pub const MODEL_INSERT: &str = "modelInsert";
    /// `(at)`
    pub const MODEL_REMOVE: &str = "modelRemove";
    /// `(at)`
    pub const MODEL_REPLACE: &str = "modelReplace";
}

/// Ordering used by [`ListModel::insert_ordered`]
pub type Comparator = Rc<dyn Fn(&Value, &Value) -> Ordering>;

enum Mutation {
    Reset(Vec<Value>),
    Insert(usize, Vec<Value>),
    Remove(usize),
    Replace(usize, Value),
    InsertOrdered(Value, Comparator),
}

impl fmt::Debug for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mutation::Reset(items) => write!(f, "Reset({})", items.len()),
            Mutation::Insert(at, items) => write!(f, "Insert({at}, {})", items.len()),
            Mutation::Remove(at) => write!(f, "Remove({at})"),
            Mutation::Replace(at, _) => write!(f, "Replace({at})"),
            Mutation::InsertOrdered(..) => f.write_str("InsertOrdered"),
        }
    }
}

enum Applied {
    /// Applied; carries the index touched and the replaced record
    Done(Option<usize>, Option<Value>),
    Queued,
    Ignored,
}

#[derive(Default)]
struct ListModelState {
    items: Vec<Value>,
    notifying: bool,
    pending: VecDeque<Mutation>,
}

/// Handle to a list model object
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListModel(ObjectId);

impl ListModel {
    pub const TYPE_NAME: &'static str = "ListModel";

    /// Create an empty model
    pub fn new(rt: &mut Runtime) -> Result<Self> {
        Self::with_data(rt, Vec::new())
    }

    pub fn with_data(rt: &mut Runtime, items: Vec<Value>) -> Result<Self> {
        let id = rt.create_component(
            Self::TYPE_NAME,
            ListModelState {
                items,
                ..ListModelState::default()
            },
        );
        for event in [
            model_events::MODEL_RESET,
            model_events::MODEL_INSERT,
            model_events::MODEL_REMOVE,
            model_events::MODEL_REPLACE,
        ] {
            rt.register_event(id, event)?;
        }
        rt.declare_property(
            id,
            "size",
            Property::computed(|rt, id| {
                let len = rt.component::<ListModelState>(id).map_or(0, |s| s.items.len());
                Value::from(len)
            }),
        )?;
        rt.declare_property(
            id,
            "data",
            Property::computed(|rt, id| {
                let items = rt
                    .component::<ListModelState>(id)
                    .map(|s| s.items.clone())
                    .unwrap_or_default();
                Value::List(items)
            })
            .with_setter(|rt, id, value| {
                let items = match value {
                    Value::List(items) => items,
                    Value::Null => Vec::new(),
                    other => {
                        return Err(ObjectError::TypeMismatch {
                            expected: "list",
                            found: other.type_name().to_string(),
                        })
                    }
                };
                ListModel(id).reset(rt, items);
                Ok(())
            })
            .notify(false),
        )?;
        Ok(ListModel(id))
    }

    /// Wrap an existing object, if it is a list model
    pub fn from_id(rt: &Runtime, id: ObjectId) -> Option<Self> {
        rt.has_component::<ListModelState>(id).then_some(ListModel(id))
    }

    pub fn id(&self) -> ObjectId {
        self.0
    }

    fn state<'a>(&self, rt: &'a Runtime) -> Option<&'a ListModelState> {
        rt.component::<ListModelState>(self.0)
    }

    pub fn size(&self, rt: &Runtime) -> usize {
        self.state(rt).map_or(0, |s| s.items.len())
    }

    pub fn is_empty(&self, rt: &Runtime) -> bool {
        self.size(rt) == 0
    }

    /// Record at `index`, or null when out of range
    pub fn at(&self, rt: &Runtime, index: usize) -> Value {
        self.state(rt)
            .and_then(|s| s.items.get(index).cloned())
            .unwrap_or_default()
    }

    /// Copy of all records
    pub fn data(&self, rt: &Runtime) -> Vec<Value> {
        self.state(rt).map(|s| s.items.clone()).unwrap_or_default()
    }

    /// Up to `count` records starting at `from`
    pub fn sequence(&self, rt: &Runtime, from: usize, count: usize) -> Vec<Value> {
        self.state(rt)
            .map(|s| {
                let start = from.min(s.items.len());
                let end = from.saturating_add(count).min(s.items.len());
                s.items[start..end].to_vec()
            })
            .unwrap_or_default()
    }

    /// Write the `data` property, which resets the model
    pub fn set_data(&self, rt: &mut Runtime, items: Vec<Value>) -> Result<()> {
        rt.set_property(self.0, "data", Value::List(items))
    }

    /// Replace every record
    pub fn reset(&self, rt: &mut Runtime, items: Vec<Value>) {
        self.submit(rt, Mutation::Reset(items));
    }

    /// Insert one record before `at`; ignored unless `at <= size`
    pub fn insert(&self, rt: &mut Runtime, at: usize, item: impl Into<Value>) {
        self.submit(rt, Mutation::Insert(at, vec![item.into()]));
    }

    /// Insert `items` before `at`, announced as one `modelInsert(at, n)`
    pub fn bulk_insert(&self, rt: &mut Runtime, at: usize, items: Vec<Value>) {
        self.submit(rt, Mutation::Insert(at, items));
    }

    pub fn append(&self, rt: &mut Runtime, item: impl Into<Value>) {
        let at = self.pending_len(rt);
        self.insert(rt, at, item);
    }

    /// Insert keeping the records sorted by `cmp`, after any equal records.
    ///
    /// Returns the index used, or `None` if the insertion was queued.
    pub fn insert_ordered<F>(&self, rt: &mut Runtime, item: impl Into<Value>, cmp: F) -> Option<usize>
    where
        F: Fn(&Value, &Value) -> Ordering + 'static,
    {
        match self.submit(rt, Mutation::InsertOrdered(item.into(), Rc::new(cmp))) {
            Applied::Done(index, _) => index,
            _ => None,
        }
    }

    /// Remove the record at `at`; ignored unless `at < size`
    pub fn remove(&self, rt: &mut Runtime, at: usize) {
        self.submit(rt, Mutation::Remove(at));
    }

    /// Replace the record at `at`, returning the previous one.
    ///
    /// Returns null when `at` is out of range or the replacement was queued.
    pub fn replace(&self, rt: &mut Runtime, at: usize, item: impl Into<Value>) -> Value {
        match self.submit(rt, Mutation::Replace(at, item.into())) {
            Applied::Done(_, Some(previous)) => previous,
            _ => Value::Null,
        }
    }

    /// Like [`ListModel::insert`], but rejects an out-of-range index
    pub fn try_insert(&self, rt: &mut Runtime, at: usize, item: impl Into<Value>) -> Result<()> {
        let len = self.pending_len(rt);
        if at > len {
            return Err(ObjectError::InvalidIndex { index: at, len });
        }
        self.insert(rt, at, item);
        Ok(())
    }

    /// Like [`ListModel::remove`], but rejects an out-of-range index
    pub fn try_remove(&self, rt: &mut Runtime, at: usize) -> Result<()> {
        let len = self.pending_len(rt);
        if at >= len {
            return Err(ObjectError::InvalidIndex { index: at, len });
        }
        self.remove(rt, at);
        Ok(())
    }

    /// Length the model will have once queued mutations are applied
    fn pending_len(&self, rt: &Runtime) -> usize {
        let Some(state) = self.state(rt) else {
            return 0;
        };
        state.pending.iter().fold(state.items.len(), |len, m| match m {
            Mutation::Reset(items) => items.len(),
            Mutation::Insert(at, items) if *at <= len => len + items.len(),
            Mutation::InsertOrdered(..) => len + 1,
            Mutation::Remove(at) if *at < len => len - 1,
            _ => len,
        })
    }

    fn submit(&self, rt: &mut Runtime, mutation: Mutation) -> Applied {
        if !rt.is_alive(self.0) {
            return Applied::Ignored;
        }
        let Some(state) = rt.component_mut::<ListModelState>(self.0) else {
            return Applied::Ignored;
        };
        if state.notifying {
            tracing::debug!(model = ?self.0, ?mutation, "mutation queued during notification");
            state.pending.push_back(mutation);
            return Applied::Queued;
        }

        let applied = self.apply(rt, mutation);
        loop {
            let next = rt
                .component_mut::<ListModelState>(self.0)
                .and_then(|s| s.pending.pop_front());
            let Some(next) = next else {
                break;
            };
            self.apply(rt, next);
        }
        applied
    }

    fn apply(&self, rt: &mut Runtime, mutation: Mutation) -> Applied {
        let Some(state) = rt.component_mut::<ListModelState>(self.0) else {
            return Applied::Ignored;
        };
        let items = &mut state.items;
        let (event, args, applied) = match mutation {
            Mutation::Reset(new_items) => {
                *items = new_items;
                (model_events::MODEL_RESET, Vec::new(), Applied::Done(None, None))
            }
            Mutation::Insert(at, new_items) => {
                if at > items.len() || new_items.is_empty() {
                    return Applied::Ignored;
                }
                let count = new_items.len();
                items.splice(at..at, new_items);
                (
                    model_events::MODEL_INSERT,
                    vec![Value::from(at), Value::from(count)],
                    Applied::Done(Some(at), None),
                )
            }
            Mutation::InsertOrdered(item, cmp) => {
                let at = items.partition_point(|existing| cmp(existing, &item) != Ordering::Greater);
                items.insert(at, item);
                (
                    model_events::MODEL_INSERT,
                    vec![Value::from(at), Value::from(1usize)],
                    Applied::Done(Some(at), None),
                )
            }
            Mutation::Remove(at) => {
                if at >= items.len() {
                    return Applied::Ignored;
                }
                items.remove(at);
                (
                    model_events::MODEL_REMOVE,
                    vec![Value::from(at)],
                    Applied::Done(Some(at), None),
                )
            }
            Mutation::Replace(at, item) => {
                let Some(slot) = items.get_mut(at) else {
                    return Applied::Ignored;
                };
                let previous = std::mem::replace(slot, item);
                (
                    model_events::MODEL_REPLACE,
                    vec![Value::from(at)],
                    Applied::Done(Some(at), Some(previous)),
                )
            }
        };
        state.notifying = true;

        let _ = rt.emit(self.0, event, &args);
        let _ = rt.notify_changed(self.0, "size");

        if let Some(state) = rt.component_mut::<ListModelState>(self.0) {
            state.notifying = false;
        }
        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn record_events(rt: &mut Runtime, model: ListModel) -> Rc<RefCell<Vec<String>>> {
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
            rt.connect(model.id(), event, view, move |_, args| {
                let args: Vec<String> = args
                    .iter()
                    .map(|a| a.as_i64().map_or_else(|| format!("{a:?}"), |n| n.to_string()))
                    .collect();
                log.borrow_mut().push(format!("{}({})", event, args.join(",")));
            })
            .unwrap();
        }
        log
    }

    fn ints(values: &[i64]) -> Vec<Value> {
        values.iter().map(|v| Value::Int(*v)).collect()
    }

    #[test]
    fn test_insert_then_size() {
        let mut rt = Runtime::new();
        let model = ListModel::new(&mut rt).unwrap();
        let log = record_events(&mut rt, model);

        model.insert(&mut rt, 0, 7);
        assert_eq!(model.size(&rt), 1);
        assert_eq!(*log.borrow(), vec!["modelInsert(0,1)", "sizeChanged(1)"]);
    }

    #[test]
    fn test_size_notifies_on_replace() {
        let mut rt = Runtime::new();
        let model = ListModel::with_data(&mut rt, ints(&[1, 2])).unwrap();
        let log = record_events(&mut rt, model);

        let previous = model.replace(&mut rt, 1, 5);
        assert_eq!(previous, Value::Int(2));
        assert_eq!(*log.borrow(), vec!["modelReplace(1)", "sizeChanged(2)"]);
    }

    #[test]
    fn test_out_of_range_is_silent() {
        let mut rt = Runtime::new();
        let model = ListModel::with_data(&mut rt, ints(&[1, 2, 3])).unwrap();
        let log = record_events(&mut rt, model);

        model.remove(&mut rt, 5);
        model.insert(&mut rt, 4, 9);
        assert_eq!(model.replace(&mut rt, 3, 0), Value::Null);
        assert_eq!(model.at(&rt, 10), Value::Null);
        assert_eq!(model.data(&rt), ints(&[1, 2, 3]));
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_try_variants() {
        let mut rt = Runtime::new();
        let model = ListModel::with_data(&mut rt, ints(&[1])).unwrap();
        assert_eq!(
            model.try_remove(&mut rt, 1),
            Err(ObjectError::InvalidIndex { index: 1, len: 1 })
        );
        assert_eq!(
            model.try_insert(&mut rt, 3, 0),
            Err(ObjectError::InvalidIndex { index: 3, len: 1 })
        );
        model.try_insert(&mut rt, 1, 2).unwrap();
        model.try_remove(&mut rt, 0).unwrap();
        assert_eq!(model.data(&rt), ints(&[2]));
    }

    #[test]
    fn test_bulk_insert_and_sequence() {
        let mut rt = Runtime::new();
        let model = ListModel::with_data(&mut rt, ints(&[1, 5])).unwrap();
        let log = record_events(&mut rt, model);

        model.bulk_insert(&mut rt, 1, ints(&[2, 3, 4]));
        assert_eq!(model.data(&rt), ints(&[1, 2, 3, 4, 5]));
        assert_eq!(*log.borrow(), vec!["modelInsert(1,3)", "sizeChanged(5)"]);
        assert_eq!(model.sequence(&rt, 3, 10), ints(&[4, 5]));
        assert!(model.sequence(&rt, 9, 2).is_empty());
    }

    #[test]
    fn test_reset_and_data_property() {
        let mut rt = Runtime::new();
        let model = ListModel::with_data(&mut rt, ints(&[1, 2])).unwrap();
        let log = record_events(&mut rt, model);

        model.set_data(&mut rt, ints(&[9])).unwrap();
        assert_eq!(rt.get_property(model.id(), "data").unwrap(), Value::List(ints(&[9])));
        assert_eq!(rt.get_property(model.id(), "size").unwrap(), Value::Int(1));
        assert_eq!(*log.borrow(), vec!["modelReset()", "sizeChanged(1)"]);

        assert!(matches!(
            rt.set_property(model.id(), "data", 3),
            Err(ObjectError::TypeMismatch { .. })
        ));
        assert!(matches!(
            rt.set_property(model.id(), "size", 3),
            Err(ObjectError::ReadOnlyProperty { .. })
        ));
    }

    #[test]
    fn test_insert_ordered() {
        let mut rt = Runtime::new();
        let model = ListModel::with_data(&mut rt, ints(&[1, 3, 3, 7])).unwrap();
        let by_int = |a: &Value, b: &Value| a.as_i64().cmp(&b.as_i64());

        assert_eq!(model.insert_ordered(&mut rt, 3, by_int), Some(3));
        assert_eq!(model.insert_ordered(&mut rt, 0, by_int), Some(0));
        assert_eq!(model.insert_ordered(&mut rt, 9, by_int), Some(6));
        assert_eq!(model.data(&rt), ints(&[0, 1, 3, 3, 3, 7, 9]));
    }

    #[test]
    fn test_mutation_from_handler_is_queued() {
        let mut rt = Runtime::new();
        let model = ListModel::new(&mut rt).unwrap();
        let view = rt.create("View");
        let seen = Rc::new(RefCell::new(Vec::new()));

        let s = seen.clone();
        rt.connect(model.id(), model_events::MODEL_INSERT, view, move |rt, args| {
            let at = args[0].as_i64().unwrap_or_default();
            s.borrow_mut().push(model.size(rt));
            if at == 0 {
                model.append(rt, 100);
            }
        })
        .unwrap();

        model.insert(&mut rt, 0, 1);
        assert_eq!(model.data(&rt), ints(&[1, 100]));
        assert_eq!(*seen.borrow(), vec![1, 2]);
    }

    #[test]
    fn test_from_id() {
        let mut rt = Runtime::new();
        let model = ListModel::new(&mut rt).unwrap();
        let other = rt.create("Item");
        assert_eq!(ListModel::from_id(&rt, model.id()), Some(model));
        assert_eq!(ListModel::from_id(&rt, other), None);
    }

    #[test]
    fn test_destroyed_model_ignores_mutations() {
        let mut rt = Runtime::new();
        let model = ListModel::with_data(&mut rt, ints(&[1])).unwrap();
        rt.destroy(model.id()).unwrap();
        model.insert(&mut rt, 0, 2);
        assert_eq!(model.size(&rt), 0);
        assert!(model.is_empty(&rt));
    }
}
