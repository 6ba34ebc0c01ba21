//! Single-resolution completions
//!
//! A [`Completion`] is handed to whoever wants to know when something is
//! done; the matching [`Resolver`] stays with the producer. Resolving
//! consumes the resolver, so a completion resolves at most once.
//! Continuations run synchronously at the point of resolution.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::runtime::Runtime;

type Waiter<T> = Box<dyn FnOnce(&mut Runtime, T)>;

struct Shared<T> {
    value: Option<T>,
    waiters: Vec<Waiter<T>>,
}

/// Observer side of a pending result
pub struct Completion<T> {
    shared: Rc<RefCell<Shared<T>>>,
}

/// Producer side of a pending result
pub struct Resolver<T> {
    shared: Rc<RefCell<Shared<T>>>,
}

impl<T> Clone for Completion<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Rc::clone(&self.shared),
        }
    }
}

impl<T: Clone + 'static> Completion<T> {
    /// Create an unresolved completion and its resolver
    pub fn pending() -> (Completion<T>, Resolver<T>) {
        let shared = Rc::new(RefCell::new(Shared {
            value: None,
            waiters: Vec::new(),
        }));
        (
            Completion {
                shared: Rc::clone(&shared),
            },
            Resolver { shared },
        )
    }

    /// A completion that is already resolved with `value`
    pub fn resolved(value: T) -> Self {
        Self {
            shared: Rc::new(RefCell::new(Shared {
                value: Some(value),
                waiters: Vec::new(),
            })),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.shared.borrow().value.is_some()
    }

    pub fn value(&self) -> Option<T> {
        self.shared.borrow().value.clone()
    }

    /// Run `f` once the completion resolves; immediately if it already has
    pub fn then<F>(&self, rt: &mut Runtime, f: F)
    where
        F: FnOnce(&mut Runtime, T) + 'static,
    {
        let ready = self.shared.borrow().value.clone();
        match ready {
            Some(value) => f(rt, value),
            None => self.shared.borrow_mut().waiters.push(Box::new(f)),
        }
    }
}

impl<T: Clone + 'static> Resolver<T> {
    /// Resolve the completion and run every continuation in registration order
    pub fn resolve(self, rt: &mut Runtime, value: T) {
        let waiters = {
            let mut shared = self.shared.borrow_mut();
            shared.value = Some(value.clone());
            std::mem::take(&mut shared.waiters)
        };
        for waiter in waiters {
            waiter(rt, value.clone());
        }
    }

    /// A completion observing this resolver
    pub fn completion(&self) -> Completion<T> {
        Completion {
            shared: Rc::clone(&self.shared),
        }
    }
}

impl<T> fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("resolved", &self.shared.borrow().value.is_some())
            .finish()
    }
}

impl<T> fmt::Debug for Resolver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("waiters", &self.shared.borrow().waiters.len())
            .finish()
    }
}
