//! Child cardinality rules: how many children of a tag a scope may hold.

use std::fmt;

use tracing::instrument;

use crate::domain::error::{DomainError, DomainResult};

/// `(min, max)` pair; `max = None` means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cardinality {
    pub min: u32,
    pub max: Option<u32>,
}

impl Cardinality {
    /// Zero or more.
    pub const ANY: Cardinality = Cardinality { min: 0, max: None };

    pub fn new(min: u32, max: Option<u32>) -> Self {
        Self { min, max }
    }

    pub fn exactly(n: u32) -> Self {
        Self {
            min: n,
            max: Some(n),
        }
    }

    pub fn is_mandatory(&self) -> bool {
        self.min > 0
    }

    /// True when `count` children already exhaust the maximum.
    pub fn is_full(&self, count: u32) -> bool {
        self.max.is_some_and(|max| count >= max)
    }

    /// Parse the textual form: `"n"`, `"min:max"`, `"min:"`, `":max"`.
    ///
    /// `tag` is only used for the error message.
    #[instrument(level = "trace")]
    pub fn parse(tag: &str, spec: &str) -> DomainResult<Self> {
        let malformed = || DomainError::MalformedCardinalitySpec {
            tag: tag.to_string(),
            spec: format!("{spec:?}"),
        };
        let bound = |part: &str| -> DomainResult<Option<u32>> {
            let part = part.trim();
            if part.is_empty() {
                Ok(None)
            } else {
                part.parse::<u32>().map(Some).map_err(|_| malformed())
            }
        };

        let parsed = match spec.split_once(':') {
            None => {
                let n = bound(spec)?.ok_or_else(malformed)?;
                Self::exactly(n)
            }
            Some((min, max)) => {
                if max.contains(':') {
                    return Err(malformed());
                }
                Self::new(bound(min)?.unwrap_or(0), bound(max)?)
            }
        };

        if parsed.max.is_some_and(|max| max < parsed.min) {
            return Err(malformed());
        }
        Ok(parsed)
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            Some(max) => write!(f, "{}:{}", self.min, max),
            None => write!(f, "{}:", self.min),
        }
    }
}

/// Raw cardinality specification as written at registration time.
#[derive(Debug, Clone, PartialEq)]
pub enum CardinalitySpec {
    /// `true` means zero or more, `false` means none allowed
    Flag(bool),
    /// Exact count
    Count(i64),
    /// `"n"` or `"min:max"`
    Text(String),
    /// Any other shape, named by kind (e.g. "float", "array"); always rejected
    Other(String),
}

impl CardinalitySpec {
    /// Resolve into a rule for `tag`.
    pub fn resolve(&self, tag: &str) -> DomainResult<Cardinality> {
        match self {
            CardinalitySpec::Flag(true) => Ok(Cardinality::ANY),
            CardinalitySpec::Flag(false) => Ok(Cardinality::exactly(0)),
            CardinalitySpec::Count(n) => u32::try_from(*n).map(Cardinality::exactly).map_err(|_| {
                DomainError::MalformedCardinalitySpec {
                    tag: tag.to_string(),
                    spec: n.to_string(),
                }
            }),
            CardinalitySpec::Text(s) => Cardinality::parse(tag, s),
            CardinalitySpec::Other(kind) => Err(DomainError::MalformedCardinalitySpec {
                tag: tag.to_string(),
                spec: format!("unsupported {kind}"),
            }),
        }
    }
}

impl From<bool> for CardinalitySpec {
    fn from(b: bool) -> Self {
        CardinalitySpec::Flag(b)
    }
}

impl From<i64> for CardinalitySpec {
    fn from(n: i64) -> Self {
        CardinalitySpec::Count(n)
    }
}

impl From<i32> for CardinalitySpec {
    fn from(n: i32) -> Self {
        CardinalitySpec::Count(i64::from(n))
    }
}

impl From<u32> for CardinalitySpec {
    fn from(n: u32) -> Self {
        CardinalitySpec::Count(i64::from(n))
    }
}

impl From<&str> for CardinalitySpec {
    fn from(s: &str) -> Self {
        CardinalitySpec::Text(s.to_string())
    }
}

impl From<String> for CardinalitySpec {
    fn from(s: String) -> Self {
        CardinalitySpec::Text(s)
    }
}

impl From<Cardinality> for CardinalitySpec {
    fn from(c: Cardinality) -> Self {
        CardinalitySpec::Text(c.to_string())
    }
}

impl From<&toml::Value> for CardinalitySpec {
    fn from(v: &toml::Value) -> Self {
        match v {
            toml::Value::Boolean(b) => CardinalitySpec::Flag(*b),
            toml::Value::Integer(n) => CardinalitySpec::Count(*n),
            toml::Value::String(s) => CardinalitySpec::Text(s.clone()),
            other => CardinalitySpec::Other(other.type_str().to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("1", Cardinality::exactly(1))]
    #[case("5", Cardinality::exactly(5))]
    #[case("0:", Cardinality::ANY)]
    #[case("1:", Cardinality::new(1, None))]
    #[case("1:3", Cardinality::new(1, Some(3)))]
    #[case(":5", Cardinality::new(0, Some(5)))]
    #[case("0:10", Cardinality::new(0, Some(10)))]
    #[case(":", Cardinality::ANY)]
    fn given_text_spec_when_parsing_then_returns_bounds(
        #[case] spec: &str,
        #[case] expected: Cardinality,
    ) {
        assert_eq!(Cardinality::parse("t", spec).unwrap(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("abc")]
    #[case("1:x")]
    #[case("-1")]
    #[case("1:2:3")]
    #[case("3:1")]
    fn given_bad_text_spec_when_parsing_then_malformed(#[case] spec: &str) {
        assert!(matches!(
            Cardinality::parse("t", spec),
            Err(DomainError::MalformedCardinalitySpec { .. })
        ));
    }

    #[test]
    fn given_flag_and_count_specs_when_resolving_then_maps_to_bounds() {
        assert_eq!(CardinalitySpec::from(true).resolve("t").unwrap(), Cardinality::ANY);
        assert_eq!(
            CardinalitySpec::from(false).resolve("t").unwrap(),
            Cardinality::exactly(0)
        );
        assert_eq!(
            CardinalitySpec::from(3).resolve("t").unwrap(),
            Cardinality::exactly(3)
        );
    }

    #[test]
    fn given_negative_count_when_resolving_then_malformed() {
        let err = CardinalitySpec::from(-2).resolve("item").unwrap_err();
        assert_eq!(
            err,
            DomainError::MalformedCardinalitySpec {
                tag: "item".into(),
                spec: "-2".into()
            }
        );
    }

    #[test]
    fn given_float_toml_value_when_resolving_then_malformed() {
        let spec = CardinalitySpec::from(&toml::Value::Float(1.5));
        assert!(matches!(
            spec.resolve("x"),
            Err(DomainError::MalformedCardinalitySpec { .. })
        ));
    }

    #[test]
    fn given_rule_when_checking_capacity_then_respects_max() {
        let rule = Cardinality::new(0, Some(2));
        assert!(!rule.is_full(1));
        assert!(rule.is_full(2));
        assert!(!Cardinality::ANY.is_full(1000));
        assert!(!rule.is_mandatory());
        assert!(Cardinality::exactly(1).is_mandatory());
    }
}
