//! Conditional queries over a model's instances

use crate::model::Model;
use nodb_concurrency::Revision;
use nodb_core::{Instance, Result, Sequence, Value};
use std::cmp::Ordering;
use std::sync::Arc;

/// Comparison applied by a query condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    /// Equal
    Eq,
    /// Greater than
    Gt,
    /// Greater than or equal
    Gte,
    /// Less than
    Lt,
    /// Less than or equal
    Lte,
    /// String prefix
    StartsWith,
    /// String suffix
    EndsWith,
}

impl Comparator {
    /// Apply the comparison to a property value and an operand
    ///
    /// Ordering comparators only match values that order against each
    /// other (same type, or Int against Float). String comparators only
    /// match strings.
    pub fn matches(self, actual: &Value, operand: &Value) -> bool {
        match self {
            Comparator::Eq => actual == operand,
            Comparator::Gt => actual.compare(operand) == Some(Ordering::Greater),
            Comparator::Gte => matches!(
                actual.compare(operand),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Comparator::Lt => actual.compare(operand) == Some(Ordering::Less),
            Comparator::Lte => matches!(
                actual.compare(operand),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Comparator::StartsWith => match (actual.as_str(), operand.as_str()) {
                (Some(s), Some(prefix)) => s.starts_with(prefix),
                _ => false,
            },
            Comparator::EndsWith => match (actual.as_str(), operand.as_str()) {
                (Some(s), Some(suffix)) => s.ends_with(suffix),
                _ => false,
            },
        }
    }
}

#[derive(Debug, Clone)]
struct Condition {
    key: String,
    comparator: Comparator,
    operand: Value,
}

/// A conjunction of conditions over one model, evaluated in one revision
///
/// Property reads are recorded in the revision's read set, so a
/// transaction that queries conflicts with concurrent changes to the
/// values it filtered on.
pub struct Query {
    model: Arc<Model>,
    revision: Arc<Revision>,
    conditions: Vec<Condition>,
}

impl Query {
    pub(crate) fn new(model: Arc<Model>, revision: Arc<Revision>) -> Self {
        Self {
            model,
            revision,
            conditions: Vec::new(),
        }
    }

    /// Require `key <comparator> operand`
    pub fn and(
        mut self,
        key: impl Into<String>,
        comparator: Comparator,
        operand: impl Into<Value>,
    ) -> Self {
        self.conditions.push(Condition {
            key: key.into(),
            comparator,
            operand: operand.into(),
        });
        self
    }

    /// Require `key == operand`
    pub fn and_eq(self, key: impl Into<String>, operand: impl Into<Value>) -> Self {
        self.and(key, Comparator::Eq, operand)
    }

    /// Evaluate lazily
    ///
    /// # Errors
    ///
    /// `UnknownProperty` if a condition names a property the model does
    /// not declare.
    pub fn run(self) -> Result<Sequence<Instance>> {
        for condition in &self.conditions {
            self.model.lookup(&condition.key)?;
        }
        let Query {
            model,
            revision,
            conditions,
        } = self;
        let instances = model.all(&revision);
        Ok(Box::new(instances.filter(move |instance| {
            conditions.iter().all(|condition| {
                let actual = revision
                    .get_value_for(instance, &condition.key)
                    .unwrap_or_default();
                condition.comparator.matches(&actual, &condition.operand)
            })
        })))
    }
}
