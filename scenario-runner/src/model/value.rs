//! Parsed values that remember how they were written

use num_bigint::BigUint;
use num_traits::Zero;
use scenario_core::{ojson, OrderedJson};

/// Bytes from an expression, kept together with the JSON they came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonBytes {
    pub value: Vec<u8>,
    /// A string for most fields, any subtree for storage values and arguments
    pub original: OrderedJson,
}

impl Default for JsonBytes {
    fn default() -> Self {
        Self::from_string(Vec::new(), "")
    }
}

impl JsonBytes {
    pub fn from_string(value: Vec<u8>, original: impl Into<String>) -> Self {
        Self {
            value,
            original: OrderedJson::String(original.into()),
        }
    }

    pub fn from_tree(value: Vec<u8>, original: OrderedJson) -> Self {
        Self { value, original }
    }

    /// Bytes with no source text, written back as hex
    pub fn reconstructed(value: Vec<u8>) -> Self {
        Self::from_string(value, "")
    }

    pub fn original_is_empty(&self) -> bool {
        matches!(&self.original, OrderedJson::String(s) if s.is_empty())
    }

    /// Source text for messages and map keys
    pub fn original_text(&self) -> String {
        match &self.original {
            OrderedJson::String(s) if s.is_empty() && !self.value.is_empty() => {
                format!("0x{}", hex::encode(&self.value))
            }
            OrderedJson::String(s) => s.clone(),
            other => ojson::to_json_string(other),
        }
    }

    /// JSON to write back: the original, or hex when there is none
    pub fn to_json(&self) -> OrderedJson {
        if self.original_is_empty() && !self.value.is_empty() {
            OrderedJson::str(format!("0x{}", hex::encode(&self.value)))
        } else {
            self.original.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JsonBigInt {
    pub value: BigUint,
    pub original: String,
}

impl JsonBigInt {
    pub fn new(value: BigUint, original: impl Into<String>) -> Self {
        Self {
            value,
            original: original.into(),
        }
    }

    /// Source text, or `0x` hex for a value built without one. Zero
    /// without source text stays empty, as an empty expression is zero.
    pub fn original_text(&self) -> String {
        if self.original.is_empty() {
            if self.value.is_zero() {
                return String::new();
            }
            format!("0x{}", hex::encode(self.value.to_bytes_be()))
        } else {
            self.original.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JsonUint64 {
    pub value: u64,
    pub original: String,
}

impl JsonUint64 {
    pub fn new(value: u64, original: impl Into<String>) -> Self {
        Self {
            value,
            original: original.into(),
        }
    }

    pub fn original_text(&self) -> String {
        match (self.original.is_empty(), self.value) {
            (false, _) => self.original.clone(),
            (true, 0) => String::new(),
            (true, value) => value.to_string(),
        }
    }
}

/// A parsed value that can be compared against what the ledger holds
pub trait Expected {
    type Actual: ?Sized;

    fn matches(&self, actual: &Self::Actual) -> bool;

    fn original_text(&self) -> String;

    fn to_json(&self) -> OrderedJson {
        OrderedJson::str(self.original_text())
    }
}

impl Expected for JsonBytes {
    type Actual = [u8];

    fn matches(&self, actual: &[u8]) -> bool {
        self.value == actual
    }

    fn original_text(&self) -> String {
        JsonBytes::original_text(self)
    }

    fn to_json(&self) -> OrderedJson {
        JsonBytes::to_json(self)
    }
}

impl Expected for JsonBigInt {
    type Actual = BigUint;

    fn matches(&self, actual: &BigUint) -> bool {
        self.value == *actual
    }

    fn original_text(&self) -> String {
        JsonBigInt::original_text(self)
    }
}

impl Expected for JsonUint64 {
    type Actual = u64;

    fn matches(&self, actual: &u64) -> bool {
        self.value == *actual
    }

    fn original_text(&self) -> String {
        JsonUint64::original_text(self)
    }
}

/// Condition on one field of a check step
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CheckValue<T> {
    /// The field was absent; callers decide the default behavior
    #[default]
    Unspecified,
    /// `"*"`, anything matches
    Star,
    Exact(T),
}

impl<T: Expected> CheckValue<T> {
    pub fn is_unspecified(&self) -> bool {
        matches!(self, CheckValue::Unspecified)
    }

    pub fn is_star(&self) -> bool {
        matches!(self, CheckValue::Star)
    }

    pub fn exact(&self) -> Option<&T> {
        match self {
            CheckValue::Exact(value) => Some(value),
            _ => None,
        }
    }

    /// Whether `actual` satisfies the condition.
    ///
    /// Unspecified fields carry no condition; asking one is a bug in the
    /// caller, which must pick the field's default behavior first.
    pub fn check(&self, actual: &T::Actual) -> bool {
        match self {
            CheckValue::Unspecified => {
                debug_assert!(false, "unspecified check value used as a condition");
                false
            }
            CheckValue::Star => true,
            CheckValue::Exact(expected) => expected.matches(actual),
        }
    }

    /// Like [`CheckValue::check`], with unspecified fields passing
    pub fn check_if_specified(&self, actual: &T::Actual) -> bool {
        self.is_unspecified() || self.check(actual)
    }

    pub fn original_text(&self) -> String {
        match self {
            CheckValue::Unspecified => String::new(),
            CheckValue::Star => "*".to_string(),
            CheckValue::Exact(expected) => expected.original_text(),
        }
    }

    pub fn to_json(&self) -> Option<OrderedJson> {
        match self {
            CheckValue::Unspecified => None,
            CheckValue::Star => Some(OrderedJson::str("*")),
            CheckValue::Exact(expected) => Some(expected.to_json()),
        }
    }
}

/// Condition on an ordered list of byte values, such as return data
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CheckValueList {
    #[default]
    Unspecified,
    Star,
    Values(Vec<CheckValue<JsonBytes>>),
}

impl CheckValueList {
    pub fn is_unspecified(&self) -> bool {
        matches!(self, CheckValueList::Unspecified)
    }

    pub fn check_list(&self, actual: &[Vec<u8>]) -> bool {
        match self {
            CheckValueList::Unspecified => {
                debug_assert!(false, "unspecified check list used as a condition");
                false
            }
            CheckValueList::Star => true,
            CheckValueList::Values(values) => {
                values.len() == actual.len()
                    && values
                        .iter()
                        .zip(actual)
                        .all(|(expected, actual)| expected.check(actual))
            }
        }
    }

    /// `["a", "b"]` rendering of the expected values
    pub fn pretty(&self) -> String {
        match self {
            CheckValueList::Unspecified => String::new(),
            CheckValueList::Star => "*".to_string(),
            CheckValueList::Values(values) => {
                let items: Vec<String> = values
                    .iter()
                    .map(|value| match value.to_json() {
                        Some(json) => ojson::to_json_string(&json),
                        None => "\"\"".to_string(),
                    })
                    .collect();
                format!("[{}]", items.join(", "))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exact_u64(value: u64) -> CheckValue<JsonUint64> {
        CheckValue::Exact(JsonUint64::new(value, value.to_string()))
    }

    #[test]
    fn test_star_accepts_anything() {
        let star: CheckValue<JsonBigInt> = CheckValue::Star;
        assert!(star.check(&BigUint::from(0u32)));
        assert!(star.check(&BigUint::from(123_456u32)));
        let star_bytes: CheckValue<JsonBytes> = CheckValue::Star;
        assert!(star_bytes.check(&[]));
        assert_eq!(star_bytes.original_text(), "*");
    }

    #[test]
    fn test_exact_compares_value() {
        assert!(exact_u64(5).check(&5));
        assert!(!exact_u64(5).check(&6));
        let bytes = CheckValue::Exact(JsonBytes::from_string(b"abc".to_vec(), "str:abc"));
        assert!(bytes.check(b"abc"));
        assert!(!bytes.check(b"abd"));
        assert_eq!(bytes.original_text(), "str:abc");
    }

    #[test]
    fn test_unspecified_passes_only_when_asked_leniently() {
        let unspecified: CheckValue<JsonUint64> = CheckValue::Unspecified;
        assert!(unspecified.check_if_specified(&42));
        assert_eq!(unspecified.to_json(), None);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "unspecified check value")]
    fn test_unspecified_as_condition_is_a_bug() {
        let unspecified: CheckValue<JsonUint64> = CheckValue::Unspecified;
        unspecified.check(&0);
    }

    #[test]
    fn test_check_list() {
        let list = CheckValueList::Values(vec![
            CheckValue::Exact(JsonBytes::from_string(vec![1], "1")),
            CheckValue::Star,
        ]);
        assert!(list.check_list(&[vec![1], vec![9, 9]]));
        assert!(!list.check_list(&[vec![2], vec![9]]));
        assert!(!list.check_list(&[vec![1]]));
        assert_eq!(list.pretty(), "[\"1\", \"*\"]");
        assert!(CheckValueList::Star.check_list(&[]));
    }

    #[test]
    fn test_original_text_falls_back_to_hex() {
        assert_eq!(JsonBytes::reconstructed(vec![0xab, 0x01]).original_text(), "0xab01");
        assert_eq!(JsonBigInt::new(BigUint::from(255u32), "").original_text(), "0xff");
        assert_eq!(JsonUint64::new(7, "").original_text(), "7");
        assert_eq!(JsonUint64::new(0, "").original_text(), "");
        assert_eq!(JsonBigInt::default().original_text(), "");
        let tree = JsonBytes::from_tree(
            vec![1, 2],
            OrderedJson::List(vec![OrderedJson::str("1"), OrderedJson::str("2")]),
        );
        assert_eq!(tree.original_text(), scenario_core::ojson::to_json_string(&tree.original));
    }
}
