//! Property types
//!
//! A [`PropertyType`] validates the values one property may hold and
//! supplies its default. Association types (`One`, `Many`) are bound to a
//! target model; [`Target::This`] refers to the model being defined and is
//! resolved when the model is built.

use nodb_core::{Error, ModelId, Result, Value};

/// Model an association points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// The model declaring the property
    This,
    /// Another model
    Model(ModelId),
}

impl Target {
    fn resolve(self, this: ModelId) -> Target {
        match self {
            Target::This => Target::Model(this),
            other => other,
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (Target::Model(id), Value::Instance(instance)) => instance.is_instance_of(*id),
            _ => false,
        }
    }
}

/// Type of a single property
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyType {
    /// Any value
    Any,
    /// `Bool`
    Boolean,
    /// `Int` or `Null`
    Integer,
    /// `String` or `Null`
    String,
    /// `Date` or `Null`
    Date,
    /// Single association: an instance of the target, or `Null`
    One(Target),
    /// Association collection: a list of instances of the target
    ///
    /// Always initialized to an empty list and never assignable; edited
    /// through `Model::append` and `Model::detach`.
    Many(Target),
}

impl PropertyType {
    /// Bind `Target::This` to the model being built
    pub(crate) fn resolve(self, this: ModelId) -> PropertyType {
        match self {
            PropertyType::One(target) => PropertyType::One(target.resolve(this)),
            PropertyType::Many(target) => PropertyType::Many(target.resolve(this)),
            other => other,
        }
    }

    /// Check a value against this type
    pub fn validate(&self, value: &Value) -> bool {
        match self {
            PropertyType::Any => true,
            PropertyType::Boolean => matches!(value, Value::Bool(_)),
            PropertyType::Integer => matches!(value, Value::Int(_) | Value::Null),
            PropertyType::String => matches!(value, Value::String(_) | Value::Null),
            PropertyType::Date => matches!(value, Value::Date(_) | Value::Null),
            PropertyType::One(target) => value.is_null() || target.accepts(value),
            PropertyType::Many(target) => match value {
                Value::Null => true,
                Value::List(items) => items.iter().all(|v| v.is_null() || target.accepts(v)),
                _ => false,
            },
        }
    }

    /// Check that `member` may be stored in a `Many` list of this type
    pub fn validate_member(&self, member: &Value) -> bool {
        match self {
            PropertyType::Many(target) => target.accepts(member),
            _ => false,
        }
    }

    /// Value installed when neither a value nor a default is supplied
    pub fn default_value(&self) -> Value {
        match self {
            PropertyType::Boolean => Value::Bool(false),
            PropertyType::Many(_) => Value::List(Vec::new()),
            _ => Value::Null,
        }
    }

    /// Description of the accepted values, for error messages
    pub fn expected(&self) -> &'static str {
        match self {
            PropertyType::Any => "any value",
            PropertyType::Boolean => "Bool",
            PropertyType::Integer => "Int or Null",
            PropertyType::String => "String or Null",
            PropertyType::Date => "Date or Null",
            PropertyType::One(_) => "an instance of the associated model or Null",
            PropertyType::Many(_) => "a list of instances of the associated model",
        }
    }

    /// Check if this is a collection type
    pub fn is_collection(&self) -> bool {
        matches!(self, PropertyType::Many(_))
    }
}

/// A declared property: name, type and optional default
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    name: String,
    ty: PropertyType,
    default: Option<Value>,
}

impl Property {
    /// Declare a property
    pub fn new(name: impl Into<String>, ty: PropertyType) -> Self {
        Self {
            name: name.into(),
            ty,
            default: None,
        }
    }

    /// Set the value used when `create` is given none
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Property name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Property type
    pub fn ty(&self) -> PropertyType {
        self.ty
    }

    /// Declared default, if any
    pub fn default(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub(crate) fn resolve(mut self, this: ModelId) -> Self {
        self.ty = self.ty.resolve(this);
        self
    }

    /// Initial value from an optionally supplied one
    ///
    /// Collections always start empty.
    pub(crate) fn initial_value(&self, supplied: Option<Value>) -> Value {
        if self.ty.is_collection() {
            return self.ty.default_value();
        }
        supplied
            .or_else(|| self.default.clone())
            .unwrap_or_else(|| self.ty.default_value())
    }

    /// Validate `value`, naming `model` in the error
    pub(crate) fn check(&self, model: &str, value: &Value) -> Result<()> {
        if self.ty.validate(value) {
            Ok(())
        } else {
            Err(Error::InvalidProperty {
                model: model.to_string(),
                property: self.name.clone(),
                expected: self.ty.expected(),
                actual: value.type_name(),
            })
        }
    }
}
