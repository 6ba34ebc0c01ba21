//! Property registry
//!
//! Properties are declared per object, either as a stored value or as a
//! getter with an optional setter. A notifying property owns a
//! `<name>Changed` event that is emitted with the new value after each
//! effective write; writing an equal value is a no-op.

use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::error::{ObjectError, Result};
use crate::object::ObjectId;
use crate::runtime::Runtime;
use crate::value::Value;

/// Computes the current value of a property
pub type Getter = Rc<dyn Fn(&Runtime, ObjectId) -> Value>;

/// Applies a write to a property
pub type Setter = Rc<dyn Fn(&mut Runtime, ObjectId, Value) -> Result<()>>;

/// Pure interpolation `(from, to, t) -> value` with `t` in `[0, 1]`
pub type Interpolator = Rc<dyn Fn(&Value, &Value, f64) -> Value>;

/// Name of the change event of property `name`
pub fn changed_event(name: &str) -> String {
    format!("{name}Changed")
}

/// Name of the property holding the transition bound to property `name`
pub fn transition_property(name: &str) -> String {
    format!("{name}Transition")
}

enum Source {
    Stored(Value),
    Computed(Getter),
}

/// Declaration of a property
pub struct Property {
    source: Source,
    setter: Option<Setter>,
    writable: bool,
    notify: bool,
}

impl Property {
    /// A plain writable value
    pub fn stored(initial: impl Into<Value>) -> Self {
        Self {
            source: Source::Stored(initial.into()),
            setter: None,
            writable: true,
            notify: true,
        }
    }

    /// A value computed on every read; read-only unless a setter is added
    pub fn computed<G>(getter: G) -> Self
    where
        G: Fn(&Runtime, ObjectId) -> Value + 'static,
    {
        Self {
            source: Source::Computed(Rc::new(getter)),
            setter: None,
            writable: false,
            notify: true,
        }
    }

    /// Route writes through `setter`
    pub fn with_setter<S>(mut self, setter: S) -> Self
    where
        S: Fn(&mut Runtime, ObjectId, Value) -> Result<()> + 'static,
    {
        self.setter = Some(Rc::new(setter));
        self.writable = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.writable = false;
        self.setter = None;
        self
    }

    /// Whether the property owns a `<name>Changed` event
    pub fn notify(mut self, notify: bool) -> Self {
        self.notify = notify;
        self
    }
}

/// Per-object property table
#[derive(Default)]
pub struct PropertyRegistry {
    slots: FxHashMap<String, Property>,
    order: Vec<String>,
    interpolators: FxHashMap<String, Interpolator>,
}

impl PropertyRegistry {
    pub fn contains(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    /// Property names in declaration order
    pub fn names(&self) -> &[String] {
        &self.order
    }
}

enum Write {
    Store { old: Value, notify: bool },
    Custom { setter: Setter, notify: bool },
}

impl Runtime {
    /// Declare property `name` on `id`
    pub fn declare_property(&mut self, id: ObjectId, name: &str, decl: Property) -> Result<()> {
        self.ensure_alive(id)?;
        let initial = match &decl.source {
            Source::Stored(value) => value.as_object(),
            Source::Computed(_) => None,
        };
        if let Some(target) = initial {
            self.ensure_alive(target)?;
        }
        let record = self.objects.get_mut(id).ok_or(ObjectError::Destroyed(id))?;
        let changed = changed_event(name);
        let clash = record.properties.contains(name)
            || record.events.contains(name)
            || (decl.notify
                && (record.events.contains(&changed) || record.properties.contains(&changed)));
        if clash {
            return Err(ObjectError::DuplicateName {
                object: id,
                name: name.to_string(),
            });
        }

        let notify = decl.notify;
        record.properties.order.push(name.to_string());
        record.properties.slots.insert(name.to_string(), decl);
        if notify {
            self.register_event(id, &changed)?;
        }
        if let Some(target) = initial {
            self.hold_value(id, target)?;
        }
        Ok(())
    }

    pub fn has_property(&self, id: ObjectId, name: &str) -> bool {
        self.objects
            .get(id)
            .is_some_and(|r| r.properties.contains(name))
    }

    /// Declared property names in declaration order
    pub fn property_names(&self, id: ObjectId) -> Vec<String> {
        self.objects
            .get(id)
            .map(|r| r.properties.names().to_vec())
            .unwrap_or_default()
    }

    /// Current value of property `name`
    pub fn get_property(&self, id: ObjectId, name: &str) -> Result<Value> {
        let record = self.objects.get(id).ok_or(ObjectError::Destroyed(id))?;
        let slot = record
            .properties
            .slots
            .get(name)
            .ok_or_else(|| ObjectError::UnknownProperty {
                object: id,
                name: name.to_string(),
            })?;
        match &slot.source {
            Source::Stored(value) => Ok(value.clone()),
            Source::Computed(getter) => {
                let getter = Rc::clone(getter);
                Ok(getter(self, id))
            }
        }
    }

    /// Write property `name`.
    ///
    /// Writing an equal value does nothing. Object values are tracked as
    /// references held by `id`, except for ancestors of `id`.
    pub fn set_property(&mut self, id: ObjectId, name: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        self.ensure_alive(id)?;
        let record = self.objects.get(id).ok_or(ObjectError::Destroyed(id))?;
        let slot = record
            .properties
            .slots
            .get(name)
            .ok_or_else(|| ObjectError::UnknownProperty {
                object: id,
                name: name.to_string(),
            })?;
        if !slot.writable {
            return Err(ObjectError::ReadOnlyProperty {
                object: id,
                name: name.to_string(),
            });
        }
        let write = match (&slot.setter, &slot.source) {
            (Some(setter), _) => Write::Custom {
                setter: Rc::clone(setter),
                notify: slot.notify,
            },
            (None, Source::Stored(old)) => Write::Store {
                old: old.clone(),
                notify: slot.notify,
            },
            (None, Source::Computed(_)) => {
                return Err(ObjectError::ReadOnlyProperty {
                    object: id,
                    name: name.to_string(),
                })
            }
        };

        match write {
            Write::Store { old, notify } => {
                if old == value {
                    return Ok(());
                }
                if let Some(target) = value.as_object() {
                    self.ensure_alive(target)?;
                }
                if let Some(slot) = self
                    .objects
                    .get_mut(id)
                    .and_then(|r| r.properties.slots.get_mut(name))
                {
                    slot.source = Source::Stored(value.clone());
                }
                if let Some(target) = old.as_object() {
                    self.release_value(id, target);
                }
                if let Some(target) = value.as_object() {
                    self.hold_value(id, target)?;
                }
                if notify {
                    self.emit(id, &changed_event(name), &[value])?;
                }
            }
            Write::Custom { setter, notify } => {
                let before = if notify {
                    Some(self.get_property(id, name)?)
                } else {
                    None
                };
                setter(self, id, value)?;
                if let Some(before) = before {
                    if self.is_alive(id) {
                        let after = self.get_property(id, name)?;
                        if after != before {
                            self.emit(id, &changed_event(name), &[after])?;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Emit `<name>Changed` with the current value, whether or not it changed
    pub fn notify_changed(&mut self, id: ObjectId, name: &str) -> Result<()> {
        let value = self.get_property(id, name)?;
        self.emit(id, &changed_event(name), &[value])
    }

    fn hold_value(&mut self, holder: ObjectId, target: ObjectId) -> Result<()> {
        if self.is_ancestor_of(target, holder) {
            return Ok(());
        }
        self.reference_add(target, holder)
    }

    fn release_value(&mut self, holder: ObjectId, target: ObjectId) {
        if !self.objects.contains_key(target) || self.is_ancestor_of(target, holder) {
            return;
        }
        let _ = self.reference_remove(target, holder);
    }

    /// Make property `name` animatable.
    ///
    /// Declares `<name>Transition`, which holds the transition bound to the
    /// property (null by default), and records `interpolator` for computing
    /// intermediate values. Without one, [`Value::lerp`] is used.
    pub fn transitionable(
        &mut self,
        id: ObjectId,
        name: &str,
        interpolator: Option<Interpolator>,
    ) -> Result<()> {
        if !self.has_property(id, name) {
            return Err(ObjectError::UnknownProperty {
                object: id,
                name: name.to_string(),
            });
        }
        self.declare_property(id, &transition_property(name), Property::stored(Value::Null))?;
        if let Some(interpolator) = interpolator {
            if let Some(record) = self.objects.get_mut(id) {
                record
                    .properties
                    .interpolators
                    .insert(name.to_string(), interpolator);
            }
        }
        Ok(())
    }

    pub fn is_transitionable(&self, id: ObjectId, name: &str) -> bool {
        self.has_property(id, &transition_property(name))
    }

    /// Value of property `name` between `from` and `to` at `t`
    pub fn interpolate(&self, id: ObjectId, name: &str, from: &Value, to: &Value, t: f64) -> Value {
        let interpolator = self
            .objects
            .get(id)
            .and_then(|r| r.properties.interpolators.get(name));
        match interpolator {
            Some(f) => f(from, to, t),
            None => Value::lerp(from, to, t),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    fn counter(rt: &mut Runtime, id: ObjectId, name: &str) -> Rc<Cell<u32>> {
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        let observer = rt.create("Observer");
        rt.connect(id, &changed_event(name), observer, move |_, _| h.set(h.get() + 1))
            .unwrap();
        hits
    }

    #[test]
    fn test_stored_property_notifies_on_change_only() {
        let mut rt = Runtime::new();
        let id = rt.create("Item");
        rt.declare_property(id, "width", Property::stored(10)).unwrap();
        let hits = counter(&mut rt, id, "width");

        rt.set_property(id, "width", 10).unwrap();
        assert_eq!(hits.get(), 0);
        rt.set_property(id, "width", 20).unwrap();
        assert_eq!(hits.get(), 1);
        assert_eq!(rt.get_property(id, "width").unwrap(), Value::Int(20));
    }

    #[test]
    fn test_changed_event_carries_new_value() {
        let mut rt = Runtime::new();
        let id = rt.create("Item");
        rt.declare_property(id, "title", Property::stored("a")).unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        rt.connect(id, "titleChanged", id, move |_, args| s.borrow_mut().extend_from_slice(args))
            .unwrap();
        rt.set_property(id, "title", "b").unwrap();
        assert_eq!(*seen.borrow(), vec![Value::from("b")]);
    }

    #[test]
    fn test_errors() {
        let mut rt = Runtime::new();
        let id = rt.create("Item");
        rt.declare_property(id, "area", Property::computed(|_, _| Value::Int(4)))
            .unwrap();

        assert!(matches!(
            rt.get_property(id, "nope"),
            Err(ObjectError::UnknownProperty { .. })
        ));
        assert!(matches!(
            rt.set_property(id, "nope", 1),
            Err(ObjectError::UnknownProperty { .. })
        ));
        assert!(matches!(
            rt.set_property(id, "area", 1),
            Err(ObjectError::ReadOnlyProperty { .. })
        ));
        assert!(matches!(
            rt.declare_property(id, "area", Property::stored(0)),
            Err(ObjectError::DuplicateName { .. })
        ));
        assert!(matches!(
            rt.declare_property(id, "destruction", Property::stored(0)),
            Err(ObjectError::DuplicateName { .. })
        ));

        rt.destroy(id).unwrap();
        assert_eq!(rt.set_property(id, "area", 1), Err(ObjectError::Destroyed(id)));
    }

    #[test]
    fn test_computed_with_setter() {
        let mut rt = Runtime::new();
        let id = rt.create_component("Celsius", 0i64);
        rt.declare_property(
            id,
            "fahrenheit",
            Property::computed(|rt, id| {
                let c = rt.component::<i64>(id).copied().unwrap_or_default();
                Value::Int(c * 9 / 5 + 32)
            })
            .with_setter(|rt, id, value| {
                let f = value.as_i64().ok_or(ObjectError::TypeMismatch {
                    expected: "int",
                    found: value.type_name().to_string(),
                })?;
                if let Some(c) = rt.component_mut::<i64>(id) {
                    *c = (f - 32) * 5 / 9;
                }
                Ok(())
            }),
        )
        .unwrap();
        let hits = counter(&mut rt, id, "fahrenheit");

        rt.set_property(id, "fahrenheit", 212).unwrap();
        assert_eq!(rt.component::<i64>(id), Some(&100));
        assert_eq!(hits.get(), 1);
        rt.set_property(id, "fahrenheit", 212).unwrap();
        assert_eq!(hits.get(), 1);
        assert!(matches!(
            rt.set_property(id, "fahrenheit", "hot"),
            Err(ObjectError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_object_values_are_references() {
        let mut rt = Runtime::new();
        let view = rt.create("View");
        let first = rt.create("Model");
        let second = rt.create("Model");
        rt.declare_property(view, "model", Property::stored(Value::Null)).unwrap();

        rt.set_property(view, "model", first).unwrap();
        assert_eq!(rt.reference_holders(first), vec![view]);
        rt.set_property(view, "model", second).unwrap();
        assert_eq!(rt.reference_count(first), 0);
        assert_eq!(rt.reference_count(second), 1);
    }

    #[test]
    fn test_ancestor_values_are_not_references() {
        let mut rt = Runtime::new();
        let window = rt.create("Window");
        let button = rt.create("Button");
        rt.add(window, button).unwrap();
        rt.declare_property(button, "window", Property::stored(Value::Null)).unwrap();
        rt.set_property(button, "window", window).unwrap();
        assert_eq!(rt.reference_count(window), 0);
    }

    #[test]
    fn test_dead_object_value_rejected_before_write() {
        let mut rt = Runtime::new();
        let view = rt.create("View");
        let model = rt.create("Model");
        rt.declare_property(view, "model", Property::stored(Value::Null)).unwrap();
        rt.destroy(model).unwrap();
        assert_eq!(
            rt.set_property(view, "model", model),
            Err(ObjectError::Destroyed(model))
        );
        assert_eq!(rt.get_property(view, "model").unwrap(), Value::Null);
    }

    #[test]
    fn test_notify_changed_is_unconditional() {
        let mut rt = Runtime::new();
        let id = rt.create("Item");
        rt.declare_property(id, "size", Property::stored(3).read_only()).unwrap();
        let hits = counter(&mut rt, id, "size");
        rt.notify_changed(id, "size").unwrap();
        rt.notify_changed(id, "size").unwrap();
        assert_eq!(hits.get(), 2);
    }

    #[test]
    fn test_transitionable() {
        let mut rt = Runtime::new();
        let id = rt.create("Item");
        rt.declare_property(id, "opacity", Property::stored(0.0)).unwrap();
        rt.declare_property(id, "label", Property::stored("a")).unwrap();
        rt.transitionable(id, "opacity", None).unwrap();
        rt.transitionable(
            id,
            "label",
            Some(Rc::new(|a: &Value, b: &Value, t: f64| if t < 0.5 { a.clone() } else { b.clone() })),
        )
        .unwrap();

        assert!(rt.is_transitionable(id, "opacity"));
        assert_eq!(rt.get_property(id, "opacityTransition").unwrap(), Value::Null);
        assert_eq!(
            rt.interpolate(id, "opacity", &Value::Float(0.0), &Value::Float(1.0), 0.5),
            Value::Float(0.5)
        );
        assert_eq!(
            rt.interpolate(id, "label", &Value::from("a"), &Value::from("b"), 0.6),
            Value::from("b")
        );
        assert!(matches!(
            rt.transitionable(id, "missing", None),
            Err(ObjectError::UnknownProperty { .. })
        ));
    }

    #[test]
    fn test_property_names_in_order() {
        let mut rt = Runtime::new();
        let id = rt.create("Item");
        rt.declare_property(id, "x", Property::stored(0)).unwrap();
        rt.declare_property(id, "y", Property::stored(0).notify(false)).unwrap();
        assert_eq!(rt.property_names(id), vec!["x", "y"]);
        assert!(rt.has_event(id, "xChanged"));
        assert!(!rt.has_event(id, "yChanged"));
    }
}
