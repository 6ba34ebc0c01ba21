//! Object runtime error types

use thiserror::Error;

use crate::object::ObjectId;

/// Errors raised by structural operations on managed objects.
///
/// Every fallible operation validates before it mutates, so an `Err` never
/// leaves the ownership graph half-updated.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ObjectError {
    /// Read or write of a property that was never declared
    #[error("object {object:?} has no property '{name}'")]
    UnknownProperty { object: ObjectId, name: String },

    /// Write to a property declared without a setter
    #[error("property '{name}' of object {object:?} is read-only")]
    ReadOnlyProperty { object: ObjectId, name: String },

    /// Connect or emit on an event that was never registered
    #[error("object {object:?} has no event '{name}'")]
    UnknownEvent { object: ObjectId, name: String },

    /// A property or event name collides with an existing one
    #[error("the name '{name}' is already in use on object {object:?}")]
    DuplicateName { object: ObjectId, name: String },

    /// Reparenting would make an object its own ancestor
    #[error("making {parent:?} the parent of {child:?} would create an ownership cycle")]
    Cycle { child: ObjectId, parent: ObjectId },

    /// Index outside the valid range of a sequence
    #[error("index {index} is out of range for a sequence of length {len}")]
    InvalidIndex { index: usize, len: usize },

    /// A value or object of the wrong kind was supplied
    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: String,
    },

    /// The handle refers to an object that is destroyed or gone
    #[error("object {0:?} has been destroyed")]
    Destroyed(ObjectId),
}

/// Result type for object runtime operations
pub type Result<T> = std::result::Result<T, ObjectError>;
