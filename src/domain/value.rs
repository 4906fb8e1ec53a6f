//! Scalar values, attribute maps and the plain mapping projection.

use std::fmt;

use indexmap::IndexMap;
use serde::de::{self, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

/// Ordered attribute bag attached to a node.
pub type Attributes = IndexMap<String, Value>;

/// Plain nested mapping: the projection of a tree and the shape config sources load into.
pub type Mapping = IndexMap<String, Entry>;

/// Closed scalar variant stored in leaves and attributes.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Empty strings count as empty; every other scalar does not.
    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Str(s) if s.is_empty())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s}"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            // none (not unit) so TOML tables drop the key instead of failing
            Value::Null => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(x) => serializer.serialize_f64(*x),
            Value::Str(s) => serializer.serialize_str(s),
        }
    }
}

/// One value of a [`Mapping`]: a scalar or a nested mapping.
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    Scalar(Value),
    Map(Mapping),
}

impl Entry {
    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            Entry::Scalar(v) => Some(v),
            Entry::Map(_) => None,
        }
    }

    pub fn as_map(&self) -> Option<&Mapping> {
        match self {
            Entry::Map(m) => Some(m),
            Entry::Scalar(_) => None,
        }
    }

    pub fn is_map(&self) -> bool {
        matches!(self, Entry::Map(_))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Entry::Scalar(Value::Null))
    }

    /// Empty strings and empty maps.
    pub fn is_empty(&self) -> bool {
        match self {
            Entry::Scalar(v) => v.is_empty(),
            Entry::Map(m) => m.is_empty(),
        }
    }
}

macro_rules! entry_from_scalar {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Entry {
                fn from(v: $t) -> Self {
                    Entry::Scalar(v.into())
                }
            }
        )*
    };
}

entry_from_scalar!(Value, &str, String, bool, i64, i32, u32, f64);

impl From<Mapping> for Entry {
    fn from(m: Mapping) -> Self {
        Entry::Map(m)
    }
}

impl Serialize for Entry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Entry::Scalar(v) => v.serialize(serializer),
            Entry::Map(m) => {
                let mut map = serializer.serialize_map(Some(m.len()))?;
                for (k, v) in m {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

/// Folds a sequence into a mapping, since a [`Mapping`] has no list variant.
///
/// - all strings: feature flags `{item: true}`
/// - all maps: indexed by the value of the first key of the first element
/// - anything else: keyed by position (`"0"`, `"1"`, ...)
pub fn fold_list(items: Vec<Entry>) -> Mapping {
    if items.is_empty() {
        return Mapping::new();
    }

    if items
        .iter()
        .all(|e| matches!(e, Entry::Scalar(Value::Str(_))))
    {
        return items
            .into_iter()
            .filter_map(|e| match e {
                Entry::Scalar(Value::Str(s)) => Some((s, Entry::Scalar(Value::Bool(true)))),
                _ => None,
            })
            .collect();
    }

    if items.iter().all(Entry::is_map) {
        let index_key = match items.first().and_then(Entry::as_map).and_then(|m| m.keys().next()) {
            Some(k) => k.clone(),
            None => return Mapping::new(),
        };
        let mut indexed = Mapping::new();
        for item in items {
            if let Entry::Map(m) = item {
                let key = match m.get(&index_key) {
                    Some(Entry::Scalar(v)) => v.to_string(),
                    _ => continue,
                };
                indexed.insert(key, Entry::Map(m));
            }
        }
        return indexed;
    }

    items
        .into_iter()
        .enumerate()
        .map(|(i, e)| (i.to_string(), e))
        .collect()
}

const TOML_DATETIME_KEY: &str = "$__toml_private_datetime";

struct EntryVisitor;

impl<'de> Visitor<'de> for EntryVisitor {
    type Value = Entry;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a scalar, a map or a list")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Entry, E> {
        Ok(Entry::Scalar(Value::Bool(v)))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Entry, E> {
        Ok(Entry::Scalar(Value::Int(v)))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Entry, E> {
        Ok(Entry::Scalar(match i64::try_from(v) {
            Ok(i) => Value::Int(i),
            Err(_) => Value::Float(v as f64),
        }))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Entry, E> {
        Ok(Entry::Scalar(Value::Float(v)))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Entry, E> {
        Ok(Entry::Scalar(Value::Str(v.to_string())))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Entry, E> {
        Ok(Entry::Scalar(Value::Str(v)))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Entry, E> {
        Ok(Entry::Scalar(Value::Null))
    }

    fn visit_none<E: de::Error>(self) -> Result<Entry, E> {
        Ok(Entry::Scalar(Value::Null))
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Entry, D::Error> {
        Entry::deserialize(deserializer)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Entry, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element::<Entry>()? {
            items.push(item);
        }
        Ok(Entry::Map(fold_list(items)))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Entry, A::Error> {
        let mut map = Mapping::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((key, value)) = access.next_entry::<MapKey, Entry>()? {
            map.insert(key.0, value);
        }
        // toml hands datetimes over as a one-entry map under a private key
        if map.len() == 1 {
            if let Some(Entry::Scalar(Value::Str(stamp))) = map.get(TOML_DATETIME_KEY) {
                return Ok(Entry::Scalar(Value::Str(stamp.clone())));
            }
        }
        Ok(Entry::Map(map))
    }
}

impl<'de> Deserialize<'de> for Entry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(EntryVisitor)
    }
}

/// Map key that tolerates non-string scalars (YAML allows `1: x`).
struct MapKey(String);

impl<'de> Deserialize<'de> for MapKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct KeyVisitor;

        impl Visitor<'_> for KeyVisitor {
            type Value = MapKey;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a scalar map key")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<MapKey, E> {
                Ok(MapKey(v.to_string()))
            }

            fn visit_string<E: de::Error>(self, v: String) -> Result<MapKey, E> {
                Ok(MapKey(v))
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<MapKey, E> {
                Ok(MapKey(v.to_string()))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<MapKey, E> {
                Ok(MapKey(v.to_string()))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<MapKey, E> {
                Ok(MapKey(v.to_string()))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<MapKey, E> {
                Ok(MapKey(v.to_string()))
            }
        }

        deserializer.deserialize_any(KeyVisitor)
    }
}
