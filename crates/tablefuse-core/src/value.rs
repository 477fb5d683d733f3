//! Cell values, labeled nulls, and canonical forms.
//!
//! Provides:
//! - The `Value` sum type stored in table cells
//! - `NullMinter` for run-scoped labeled-null generation
//! - `CanonValue`, the hashable canonical form used for tuple
//!   deduplication and stable row ordering

use serde::{Deserialize, Serialize};

/// A single cell value.
///
/// Equality is by tag then payload: comparisons between disparate
/// primitive types are simply not equal (`Int(1) != Real(1.0)`), never an
/// error, and there is no numeric promotion. Two labeled nulls are equal
/// iff their ids are equal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// String value. The empty string doubles as a legacy null sentinel.
    Str(String),
    /// 64-bit signed integer value.
    Int(i64),
    /// 64-bit floating point value.
    Real(f64),
    /// A plain missing value.
    Null,
    /// A distinguishable missing value carrying an opaque id minted by
    /// [`NullMinter`]. Labels from distinct origin cells never compare
    /// equal.
    LabeledNull(u64),
}

impl Value {
    /// Returns true for every value that counts as null during
    /// complementation: `Null`, any labeled null, and the empty-string
    /// sentinel.
    pub fn is_null_like(&self) -> bool {
        match self {
            Value::Null | Value::LabeledNull(_) => true,
            Value::Str(s) => s.is_empty(),
            _ => false,
        }
    }

    /// The canonical form of this value. All null-like cells collapse into
    /// one bucket; reals are keyed by bit pattern so the result is
    /// hashable and totally ordered.
    pub fn canonical(&self) -> CanonValue {
        match self {
            v if v.is_null_like() => CanonValue::Null,
            Value::Int(i) => CanonValue::Int(*i),
            Value::Real(r) => CanonValue::Real(r.to_bits()),
            Value::Str(s) => CanonValue::Str(s.clone()),
            // unreachable: Null/LabeledNull are caught by the null-like arm
            Value::Null | Value::LabeledNull(_) => CanonValue::Null,
        }
    }

    /// The text form used when embedding a value. Null-like cells have no
    /// text form.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Value::Str(s) if !s.is_empty() => Some(s.clone()),
            Value::Int(i) => Some(i.to_string()),
            Value::Real(r) => Some(r.to_string()),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(r: f64) -> Self {
        Value::Real(r)
    }
}

/// Canonical cell form: null-like values share one variant, reals are
/// represented by their bit pattern. Derives `Eq`, `Hash`, and `Ord`, so
/// canonical rows can be deduplicated in hash sets and sorted for
/// reproducible output order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CanonValue {
    Null,
    Int(i64),
    Real(u64),
    Str(String),
}

/// Canonical form of a whole row.
pub fn canonical_row(row: &[Value]) -> Vec<CanonValue> {
    row.iter().map(Value::canonical).collect()
}

/// Run-scoped generator of labeled-null ids.
///
/// One minter is created per end-to-end integration run and threaded
/// through labeled-null generation and outer-union filling, so labels
/// from distinct origin cells never collide. There is no process-wide
/// counter.
#[derive(Debug, Default)]
pub struct NullMinter {
    next: u64,
}

impl NullMinter {
    /// Create a fresh minter starting at id 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a labeled null with a fresh id.
    pub fn mint(&mut self) -> Value {
        let id = self.next;
        self.next += 1;
        Value::LabeledNull(id)
    }

    /// Number of labels minted so far.
    pub fn minted(&self) -> u64 {
        self.next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_like_values() {
        assert!(Value::Null.is_null_like());
        assert!(Value::LabeledNull(7).is_null_like());
        assert!(Value::Str(String::new()).is_null_like());
        assert!(!Value::Str("x".into()).is_null_like());
        assert!(!Value::Int(0).is_null_like());
        assert!(!Value::Real(0.0).is_null_like());
    }

    #[test]
    fn test_cross_type_equality_is_false() {
        assert_ne!(Value::Int(1), Value::Real(1.0));
        assert_ne!(Value::Str("1".into()), Value::Int(1));
    }

    #[test]
    fn test_labeled_nulls_equal_only_by_id() {
        assert_eq!(Value::LabeledNull(3), Value::LabeledNull(3));
        assert_ne!(Value::LabeledNull(3), Value::LabeledNull(4));
        assert_ne!(Value::LabeledNull(3), Value::Null);
    }

    #[test]
    fn test_canonical_buckets_null_likes() {
        assert_eq!(Value::Null.canonical(), CanonValue::Null);
        assert_eq!(Value::LabeledNull(9).canonical(), CanonValue::Null);
        assert_eq!(Value::Str(String::new()).canonical(), CanonValue::Null);
        assert_ne!(Value::Str("a".into()).canonical(), CanonValue::Null);
    }

    #[test]
    fn test_canonical_rows_ignore_label_identity() {
        let a = vec![Value::Str("x".into()), Value::LabeledNull(1)];
        let b = vec![Value::Str("x".into()), Value::LabeledNull(2)];
        assert_eq!(canonical_row(&a), canonical_row(&b));
    }

    #[test]
    fn test_minter_ids_are_unique() {
        let mut minter = NullMinter::new();
        let a = minter.mint();
        let b = minter.mint();
        assert_ne!(a, b);
        assert_eq!(minter.minted(), 2);
    }

    #[test]
    fn test_value_text_forms() {
        assert_eq!(Value::Str("abc".into()).as_text().as_deref(), Some("abc"));
        assert_eq!(Value::Int(42).as_text().as_deref(), Some("42"));
        assert_eq!(Value::Real(1.5).as_text().as_deref(), Some("1.5"));
        assert_eq!(Value::Null.as_text(), None);
        assert_eq!(Value::LabeledNull(1).as_text(), None);
    }
}
