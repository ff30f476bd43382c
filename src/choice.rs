//! Closed string enumerations on the wire.
//!
//! Request fields such as `dist_metric` arrive as strings. They are parsed
//! into typed enums once, at the dispatcher boundary, and the engines only
//! ever see the typed value.

use crate::error::{Error, Result};

/// An enumeration whose wire form is one of a fixed set of strings.
pub trait Choice: Sized + Copy + 'static {
    /// Wire name of the request field carrying this value.
    const FIELD: &'static str;

    /// Every accepted wire value, in documentation order.
    const ALLOWED: &'static [&'static str];

    /// Parse an exact wire value.
    fn from_wire(value: &str) -> Option<Self>;

    /// The wire value for this variant.
    fn as_wire(self) -> &'static str;
}

/// Parse an optional wire value, falling back to `default` when absent.
///
/// An unknown value is rejected with [`Error::InvalidOption`] naming the
/// field and the allowed set.
pub fn parse_or<T: Choice>(raw: Option<&str>, default: T) -> Result<T> {
    match raw {
        None => Ok(default),
        Some(value) => T::from_wire(value).ok_or_else(|| Error::InvalidOption {
            field: T::FIELD,
            value: value.to_string(),
            allowed: T::ALLOWED,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{FlatClusterCriterion, LinkageMethod};
    use crate::distance::DistanceMetric;

    fn assert_round_trip<T: Choice + PartialEq + std::fmt::Debug>() {
        for name in T::ALLOWED {
            let parsed = T::from_wire(name).expect("allowed value parses");
            assert_eq!(parsed.as_wire(), *name);
        }
    }

    #[test]
    fn test_all_allowed_values_parse() {
        assert_round_trip::<DistanceMetric>();
        assert_round_trip::<LinkageMethod>();
        assert_round_trip::<FlatClusterCriterion>();
    }

    #[test]
    fn test_absent_uses_default() {
        let m = parse_or(None, DistanceMetric::Euclidean).unwrap();
        assert_eq!(m, DistanceMetric::Euclidean);
    }

    #[test]
    fn test_unknown_value_names_field() {
        let err = parse_or(Some("bogus"), DistanceMetric::Euclidean).unwrap_err();
        match err {
            Error::InvalidOption {
                field,
                value,
                allowed,
            } => {
                assert_eq!(field, "dist_metric");
                assert_eq!(value, "bogus");
                assert_eq!(allowed.len(), 18);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_wire_values_are_case_sensitive() {
        assert!(LinkageMethod::from_wire("Ward").is_none());
    }
}
