//! Option merging over [`Mapping`]s: defaults, filtered overrides and prefix extraction.

use std::fmt;
use std::ops::Add;

use crate::domain::{Entry, Mapping};

type EntryFilter = Box<dyn Fn(&str, &Entry) -> bool>;

/// Which incoming entries survive a merge.
#[derive(Default)]
pub struct MergeFilter {
    /// Drop `Null` values
    pub ignore_none: bool,
    /// Drop empty strings and empty maps
    pub ignore_empty: bool,
    /// Keep the pair only when this returns true
    pub filter_fn: Option<EntryFilter>,
}

impl fmt::Debug for MergeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MergeFilter")
            .field("ignore_none", &self.ignore_none)
            .field("ignore_empty", &self.ignore_empty)
            .field("filter_fn", &self.filter_fn.as_ref().map(|_| ".."))
            .finish()
    }
}

impl MergeFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ignore_none(mut self, yes: bool) -> Self {
        self.ignore_none = yes;
        self
    }

    pub fn ignore_empty(mut self, yes: bool) -> Self {
        self.ignore_empty = yes;
        self
    }

    pub fn with_filter(mut self, f: impl Fn(&str, &Entry) -> bool + 'static) -> Self {
        self.filter_fn = Some(Box::new(f));
        self
    }

    pub fn keeps(&self, key: &str, entry: &Entry) -> bool {
        if self.ignore_none && entry.is_null() {
            return false;
        }
        if self.ignore_empty && entry.is_empty() {
            return false;
        }
        self.filter_fn.as_ref().map_or(true, |f| f(key, entry))
    }
}

/// Copy `defaults`, then lay the surviving `incoming` entries over them.
pub fn merge_options(incoming: &Mapping, defaults: &Mapping, filter: &MergeFilter) -> Mapping {
    let mut merged = defaults.clone();
    for (key, entry) in incoming {
        if filter.keeps(key, entry) {
            merged.insert(key.clone(), entry.clone());
        }
    }
    merged
}

/// Entries of `map` whose key starts with `prefix`.
///
/// With `pop` they are removed from `map`. With `slice_prefix` the prefix is
/// cut from the returned keys, and a sliced key equal to `class` comes back
/// as `_class`.
pub fn extract_prefixed(
    map: &mut Mapping,
    prefix: &str,
    pop: bool,
    slice_prefix: bool,
) -> Mapping {
    let keys: Vec<String> = map
        .keys()
        .filter(|k| k.starts_with(prefix))
        .cloned()
        .collect();

    let mut out = Mapping::with_capacity(keys.len());
    for key in keys {
        let entry = if pop {
            map.shift_remove(&key)
        } else {
            map.get(&key).cloned()
        };
        let Some(entry) = entry else { continue };

        let out_key = if slice_prefix {
            match &key[prefix.len()..] {
                "class" => "_class".to_string(),
                rest => rest.to_string(),
            }
        } else {
            key
        };
        out.insert(out_key, entry);
    }
    out
}

/// Option bag over a [`Mapping`]; a missing key reads as `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Options {
    data: Mapping,
}

impl Options {
    pub fn new(incoming: &Mapping, defaults: &Mapping, filter: &MergeFilter) -> Self {
        Self {
            data: merge_options(incoming, defaults, filter),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Entry> {
        self.data.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn set(&mut self, key: impl Into<String>, entry: impl Into<Entry>) {
        self.data.insert(key.into(), entry.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Entry> {
        self.data.shift_remove(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Entry)> {
        self.data.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Independent copy of the current options.
    pub fn as_mapping(&self) -> Mapping {
        self.data.clone()
    }

    /// New options with `other` laid over `self`.
    pub fn merge(&self, other: &Mapping) -> Self {
        let mut data = self.data.clone();
        data.extend(other.iter().map(|(k, v)| (k.clone(), v.clone())));
        Self { data }
    }
}

impl From<Mapping> for Options {
    fn from(data: Mapping) -> Self {
        Self { data }
    }
}

impl Add for Options {
    type Output = Options;

    fn add(self, rhs: Options) -> Options {
        self.merge(&rhs.data)
    }
}

impl Add<&Mapping> for Options {
    type Output = Options;

    fn add(self, rhs: &Mapping) -> Options {
        self.merge(rhs)
    }
}
