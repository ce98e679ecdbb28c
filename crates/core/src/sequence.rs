//! Lazy sequences
//!
//! Every query in NoDB (a model's instances, an index bucket, a projection)
//! is a pull-based [`Sequence`]. The element-wise combinators (`map`,
//! `filter`, `chain`, `fold`, `reduce`, `sum`, `min_by`, `max_by`,
//! `collect`) come from [`Iterator`]; [`SequenceExt`] adds the
//! materializing ones the standard library lacks.

use crate::value::Value;
use std::cmp::Ordering;

/// Boxed, owned, lazily evaluated sequence
pub type Sequence<T> = Box<dyn Iterator<Item = T> + Send>;

/// An empty sequence
pub fn empty<T: Send + 'static>() -> Sequence<T> {
    Box::new(std::iter::empty())
}

/// A sequence over an owned vector
pub fn from_vec<T: Send + 'static>(items: Vec<T>) -> Sequence<T> {
    Box::new(items.into_iter())
}

/// Extra combinators over any iterator
pub trait SequenceExt: Iterator + Sized {
    /// Drain the sequence, sort it with `compare`, and restart over the result
    ///
    /// The sort is stable.
    fn sorted_with<F>(self, compare: F) -> std::vec::IntoIter<Self::Item>
    where
        F: FnMut(&Self::Item, &Self::Item) -> Ordering,
    {
        let mut items: Vec<Self::Item> = self.collect();
        items.sort_by(compare);
        items.into_iter()
    }

    /// Sum the `Int` elements of a value sequence
    ///
    /// Non-integer elements (including `Null`) are skipped.
    fn sum_ints(self) -> i64
    where
        Self: Iterator<Item = Value>,
    {
        self.filter_map(|v| v.as_int()).sum()
    }

    /// Smallest value under [`Value::compare`]
    ///
    /// Values that do not order against the current minimum are skipped.
    fn min_value(self) -> Option<Value>
    where
        Self: Iterator<Item = Value>,
    {
        self.fold(None, |best: Option<Value>, v| match best {
            None if v.is_null() => None,
            None => Some(v),
            Some(b) => match v.compare(&b) {
                Some(Ordering::Less) => Some(v),
                _ => Some(b),
            },
        })
    }

    /// Largest value under [`Value::compare`]
    fn max_value(self) -> Option<Value>
    where
        Self: Iterator<Item = Value>,
    {
        self.fold(None, |best: Option<Value>, v| match best {
            None if v.is_null() => None,
            None => Some(v),
            Some(b) => match v.compare(&b) {
                Some(Ordering::Greater) => Some(v),
                _ => Some(b),
            },
        })
    }
}

impl<I: Iterator> SequenceExt for I {}
