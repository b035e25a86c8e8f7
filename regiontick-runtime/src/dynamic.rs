//! Dynamic capability layer.
//!
//! The region-threaded host is never linked against directly. Its services
//! are reached by name through a [`HostSurface`], and every object it hands
//! back is a [`DynObject`] whose methods are looked up by name at call time.

use crate::error::InvokeError;
use crate::runnable::Task;
use crate::time_unit::TimeUnit;
use std::fmt;
use std::sync::Arc;

/// Shapes that cross the dynamic boundary
#[derive(Clone)]
pub enum Value {
    /// No value; a host returns this where it has nothing to hand back
    Unit,
    Bool(bool),
    Long(i64),
    TimeUnit(TimeUnit),
    Task(Task),
    Object(Arc<dyn DynObject>),
}

impl Value {
    pub fn object(object: impl DynObject + 'static) -> Self {
        Value::Object(Arc::new(object))
    }

    /// Clamp a tick or millisecond count into the host's signed integer shape
    pub fn long(value: u64) -> Self {
        Value::Long(i64::try_from(value).unwrap_or(i64::MAX))
    }

    pub fn as_object(&self) -> Option<&Arc<dyn DynObject>> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn is_unit(&self) -> bool {
        matches!(self, Value::Unit)
    }

    /// Short description used in error messages
    pub fn shape(&self) -> String {
        match self {
            Value::Unit => "unit".to_string(),
            Value::Bool(_) => "bool".to_string(),
            Value::Long(_) => "long".to_string(),
            Value::TimeUnit(_) => "time unit".to_string(),
            Value::Task(_) => "task".to_string(),
            Value::Object(object) => format!("object `{}`", object.type_name()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unit => f.write_str("Unit"),
            Value::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Value::Long(l) => f.debug_tuple("Long").field(l).finish(),
            Value::TimeUnit(unit) => f.debug_tuple("TimeUnit").field(unit).finish(),
            Value::Task(_) => f.write_str("Task(..)"),
            Value::Object(object) => f.debug_tuple("Object").field(&object.type_name()).finish(),
        }
    }
}

/// An object whose methods are resolved by name when they are called.
pub trait DynObject: Send + Sync {
    fn type_name(&self) -> &'static str;

    fn invoke(&self, method: &str, args: &[Value]) -> Result<Value, InvokeError>;
}

/// Zero-argument operation exposed on a host's top-level surface
pub type HostOperation = Arc<dyn Fn() -> Result<Value, InvokeError> + Send + Sync>;

/// A host's top-level API, searched by operation name.
pub trait HostSurface: Send + Sync {
    fn resolve(&self, name: &str) -> Option<HostOperation>;
}

/// Caller-side reference to a live entity.
///
/// On a region-threaded host the wrapped object answers `scheduler()` with the
/// entity's own scheduler; other hosts may hand out objects that answer
/// nothing at all.
#[derive(Clone)]
pub struct Entity {
    object: Arc<dyn DynObject>,
}

impl Entity {
    pub fn new(object: Arc<dyn DynObject>) -> Self {
        Self { object }
    }

    pub fn object(&self) -> &Arc<dyn DynObject> {
        &self.object
    }

    /// Host-assigned id, when the entity exposes one
    pub fn id(&self) -> Option<i64> {
        match self.object.invoke("id", &[]) {
            Ok(Value::Long(id)) => Some(id),
            _ => None,
        }
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("type", &self.object.type_name())
            .field("id", &self.id())
            .finish()
    }
}

/// Argument checker for `DynObject::invoke` implementations
pub struct Args<'a> {
    method: &'a str,
    values: &'a [Value],
}

impl<'a> Args<'a> {
    pub fn new(method: &'a str, values: &'a [Value]) -> Self {
        Self { method, values }
    }

    pub fn exact(self, expected: usize) -> Result<Self, InvokeError> {
        if self.values.len() == expected {
            Ok(self)
        } else {
            Err(InvokeError::Arity {
                method: self.method.to_string(),
                expected,
                actual: self.values.len(),
            })
        }
    }

    pub fn task(&self, index: usize) -> Result<Task, InvokeError> {
        match self.values.get(index) {
            Some(Value::Task(task)) => Ok(task.clone()),
            _ => Err(self.wrong_type(index, "a task")),
        }
    }

    pub fn long(&self, index: usize) -> Result<i64, InvokeError> {
        match self.values.get(index) {
            Some(Value::Long(value)) => Ok(*value),
            _ => Err(self.wrong_type(index, "a long")),
        }
    }

    pub fn time_unit(&self, index: usize) -> Result<TimeUnit, InvokeError> {
        match self.values.get(index) {
            Some(Value::TimeUnit(unit)) => Ok(*unit),
            _ => Err(self.wrong_type(index, "a time unit")),
        }
    }

    fn wrong_type(&self, index: usize, expected: &'static str) -> InvokeError {
        InvokeError::ArgumentType {
            method: self.method.to_string(),
            index,
            expected,
        }
    }
}

/// Shorthand for the error a `DynObject` returns on an unknown method
pub fn no_such_method(target: &str, method: &str) -> InvokeError {
    InvokeError::NoSuchMethod {
        target: target.to_string(),
        method: method.to_string(),
    }
}
