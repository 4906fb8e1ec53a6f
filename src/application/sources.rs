//! Layered sources: inline mappings, files and environment prefixes merged in order.

use std::fmt;
use std::path::PathBuf;

use tracing::{debug, instrument, warn};

use crate::application::loaders::{load_env, load_file};
use crate::application::{ApplicationError, ApplicationResult};
use crate::domain::{Entry, Mapping, Value};

const ENV_MARKER: &str = "ENV:";

/// Convert a raw string (ini value, environment variable) into a typed [`Value`].
///
/// Checked in order, case-insensitive and ignoring surrounding whitespace:
/// `none`/`null`/empty, `true`/`yes`/`on`/`1`, `false`/`no`/`off`/`0`,
/// signed integer, decimal with a single dot. Anything else is returned
/// unchanged.
pub fn auto_convert(raw: &str) -> Value {
    let stripped = raw.trim();
    let lower = stripped.to_lowercase();

    match lower.as_str() {
        "" | "none" | "null" => return Value::Null,
        "true" | "yes" | "on" | "1" => return Value::Bool(true),
        "false" | "no" | "off" | "0" => return Value::Bool(false),
        _ => {}
    }

    let unsigned = stripped.strip_prefix('-').unwrap_or(stripped);
    let is_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());

    if is_digits(unsigned) {
        if let Ok(n) = stripped.parse::<i64>() {
            return Value::Int(n);
        }
    }

    if let Some((int, frac)) = unsigned.split_once('.') {
        let part_ok = |s: &str| s.is_empty() || is_digits(s);
        if part_ok(int) && part_ok(frac) && !(int.is_empty() && frac.is_empty()) {
            if let Ok(f) = stripped.parse::<f64>() {
                return Value::Float(f);
            }
        }
    }

    Value::Str(raw.to_string())
}

/// Flatten nested maps by joining keys with `separator`.
pub fn flatten(mapping: &Mapping, separator: &str) -> Mapping {
    let mut out = Mapping::new();
    flatten_into(&mut out, mapping, separator, None);
    out
}

fn flatten_into(out: &mut Mapping, mapping: &Mapping, separator: &str, parent: Option<&str>) {
    for (key, entry) in mapping {
        let full = match parent {
            Some(p) => format!("{p}{separator}{key}"),
            None => key.clone(),
        };
        match entry {
            Entry::Map(inner) => flatten_into(out, inner, separator, Some(&full)),
            Entry::Scalar(v) => {
                out.insert(full, Entry::Scalar(v.clone()));
            }
        }
    }
}

/// Recursive merge; maps merge key by key, anything else is replaced by `overlay`.
pub fn deep_merge(base: &mut Mapping, overlay: Mapping) {
    for (key, entry) in overlay {
        match (base.get_mut(&key), entry) {
            (Some(Entry::Map(existing)), Entry::Map(incoming)) => deep_merge(existing, incoming),
            (_, entry) => {
                base.insert(key, entry);
            }
        }
    }
}

/// One configuration source.
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    Mapping(Mapping),
    File(PathBuf),
    /// Environment variables `{prefix}_*`
    Env(String),
}

impl Source {
    /// `ENV:PREFIX` selects the environment, anything else is a file path.
    pub fn parse(spec: &str) -> ApplicationResult<Self> {
        match spec.strip_prefix(ENV_MARKER) {
            Some("") => Err(ApplicationError::InvalidSource(spec.to_string())),
            Some(prefix) => Ok(Source::Env(prefix.to_string())),
            None if spec.is_empty() => Err(ApplicationError::InvalidSource(spec.to_string())),
            None => {
                let expanded = shellexpand::full(spec)
                    .map_err(|e| ApplicationError::InvalidSource(e.to_string()))?;
                Ok(Source::File(PathBuf::from(expanded.as_ref())))
            }
        }
    }

    fn load(&self, convert: bool) -> ApplicationResult<Mapping> {
        match self {
            Source::Mapping(m) => Ok(m.clone()),
            Source::File(path) => load_file(path, convert),
            Source::Env(prefix) => load_env(prefix, convert),
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Mapping(m) => write!(f, "<mapping: {} keys>", m.len()),
            Source::File(p) => write!(f, "{}", p.display()),
            Source::Env(prefix) => write!(f, "{ENV_MARKER}{prefix}"),
        }
    }
}

impl From<Mapping> for Source {
    fn from(m: Mapping) -> Self {
        Source::Mapping(m)
    }
}

impl From<PathBuf> for Source {
    fn from(p: PathBuf) -> Self {
        Source::File(p)
    }
}

/// Ordered list of sources; later sources win.
#[derive(Debug, Clone)]
pub struct MultiSource {
    sources: Vec<Source>,
    skip_missing: bool,
    separator: String,
    auto_convert: bool,
}

impl MultiSource {
    pub fn new(sources: impl IntoIterator<Item = Source>) -> Self {
        Self {
            sources: sources.into_iter().collect(),
            skip_missing: false,
            separator: "_".to_string(),
            auto_convert: true,
        }
    }

    /// Silently skip files that do not exist.
    pub fn skip_missing(mut self, yes: bool) -> Self {
        self.skip_missing = yes;
        self
    }

    pub fn separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    pub fn auto_convert(mut self, yes: bool) -> Self {
        self.auto_convert = yes;
        self
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    /// Load every source, flatten each and merge them into one flat mapping.
    #[instrument(level = "debug", skip(self))]
    pub fn resolve(&self) -> ApplicationResult<Mapping> {
        let mut result = Mapping::new();
        for data in self.load_all()? {
            result.extend(flatten(&data, &self.separator));
        }
        Ok(result)
    }

    /// Load every source and deep-merge them, keeping the nesting.
    #[instrument(level = "debug", skip(self))]
    pub fn resolve_nested(&self) -> ApplicationResult<Mapping> {
        let mut result = Mapping::new();
        for data in self.load_all()? {
            deep_merge(&mut result, data);
        }
        Ok(result)
    }

    fn load_all(&self) -> ApplicationResult<Vec<Mapping>> {
        let mut loaded = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            match source.load(self.auto_convert) {
                Ok(data) => {
                    debug!(%source, keys = data.len(), "source loaded");
                    loaded.push(data);
                }
                Err(ApplicationError::FileNotFound(path)) if self.skip_missing => {
                    warn!("skipping missing source: {}", path.display());
                }
                Err(e) => return Err(e),
            }
        }
        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("none", Value::Null)]
    #[case("", Value::Null)]
    #[case("  NULL ", Value::Null)]
    #[case("Yes", Value::Bool(true))]
    #[case("1", Value::Bool(true))]
    #[case("off", Value::Bool(false))]
    #[case("0", Value::Bool(false))]
    #[case("8000", Value::Int(8000))]
    #[case("-42", Value::Int(-42))]
    #[case("12.5", Value::Float(12.5))]
    #[case("-0.5", Value::Float(-0.5))]
    #[case(".5", Value::Float(0.5))]
    #[case("1.2.3", Value::Str("1.2.3".into()))]
    #[case("--5", Value::Str("--5".into()))]
    #[case(".", Value::Str(".".into()))]
    #[case("hello", Value::Str("hello".into()))]
    fn given_raw_string_when_auto_converting_then_typed(#[case] raw: &str, #[case] expected: Value) {
        assert_eq!(auto_convert(raw), expected);
    }

    #[test]
    fn given_unrecognized_string_when_auto_converting_then_whitespace_is_kept() {
        assert_eq!(auto_convert(" hi "), Value::Str(" hi ".into()));
    }

    #[test]
    fn given_nested_mapping_when_flattening_then_keys_joined() {
        let entry: Entry =
            serde_json::from_str(r#"{"debug": true, "server": {"host": "x", "tls": {"on": 1}}}"#)
                .unwrap();
        let flat = flatten(entry.as_map().unwrap(), ".");
        assert_eq!(
            flat.keys().collect::<Vec<_>>(),
            vec!["debug", "server.host", "server.tls.on"]
        );
    }

    #[rstest]
    #[case("ENV:MYAPP", Source::Env("MYAPP".into()))]
    #[case("conf/app.toml", Source::File("conf/app.toml".into()))]
    fn given_spec_when_parsing_source_then_kind_detected(#[case] spec: &str, #[case] expected: Source) {
        assert_eq!(Source::parse(spec).unwrap(), expected);
    }

    #[test]
    fn given_bare_env_marker_when_parsing_source_then_invalid() {
        assert!(matches!(
            Source::parse("ENV:"),
            Err(ApplicationError::InvalidSource(_))
        ));
    }
}
