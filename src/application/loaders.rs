//! File, environment and schema loaders producing [`Mapping`]s.
//!
//! Format is chosen by extension:
//!
//! | extension       | parser        | values            |
//! |-----------------|---------------|-------------------|
//! | `.ini`          | `config`      | auto-converted    |
//! | `.json`         | `serde_json`  | typed             |
//! | `.toml`         | `toml`        | typed             |
//! | `.yaml`, `.yml` | `serde_yaml`  | typed             |
//!
//! Key order of the file is kept. Lists are folded into mappings
//! (see [`fold_list`](crate::domain::fold_list)).

use std::fs;
use std::path::Path;

use config::{Environment, FileFormat, Source, ValueKind};
use indexmap::IndexMap;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::application::error_ext::IoResultExt;
use crate::application::sources::auto_convert;
use crate::application::{ApplicationError, ApplicationResult};
use crate::domain::{fold_list, CardinalitySpec, Entry, Mapping, Schema, Value};

/// Load a configuration file by extension.
///
/// `convert` applies [`auto_convert`] to string values of untyped formats (ini).
#[instrument(level = "debug")]
pub fn load_file(path: &Path, convert: bool) -> ApplicationResult<Mapping> {
    if !path.is_file() {
        return Err(ApplicationError::FileNotFound(path.to_path_buf()));
    }
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    let mapping = match ext.as_str() {
        "ini" => load_ini(path, convert)?,
        "json" => load_json(path)?,
        "toml" => load_toml(path)?,
        "yaml" | "yml" => load_yaml(path)?,
        _ => return Err(ApplicationError::UnsupportedFormat(path.to_path_buf())),
    };
    debug!(keys = mapping.len(), "loaded {}", path.display());
    Ok(mapping)
}

/// Sections become nested maps; keys outside any section stay top-level.
///
/// Option names are lowercased, section names keep their case.
pub fn load_ini(path: &Path, convert: bool) -> ApplicationResult<Mapping> {
    let text = fs::read_to_string(path).with_path_context("read", path)?;
    let table = config::File::from_str(&text, FileFormat::Ini)
        .collect()
        .map_err(|e| ApplicationError::parse(path, e))?;

    Ok(table
        .into_iter()
        .map(|(k, v)| match from_config_value(v, convert) {
            Entry::Map(section) => (
                k,
                Entry::Map(
                    section
                        .into_iter()
                        .map(|(option, value)| (option.to_lowercase(), value))
                        .collect(),
                ),
            ),
            scalar => (k.to_lowercase(), scalar),
        })
        .collect())
}

pub fn load_json(path: &Path) -> ApplicationResult<Mapping> {
    let text = fs::read_to_string(path).with_path_context("read", path)?;
    let entry: Entry = serde_json::from_str(&text).map_err(|e| ApplicationError::parse(path, e))?;
    top_level(path, entry)
}

pub fn load_toml(path: &Path) -> ApplicationResult<Mapping> {
    let text = fs::read_to_string(path).with_path_context("read", path)?;
    let entry: Entry = toml::from_str(&text).map_err(|e| ApplicationError::parse(path, e))?;
    top_level(path, entry)
}

pub fn load_yaml(path: &Path) -> ApplicationResult<Mapping> {
    let text = fs::read_to_string(path).with_path_context("read", path)?;
    if text.trim().is_empty() {
        return Ok(Mapping::new());
    }
    let entry: Entry = serde_yaml::from_str(&text).map_err(|e| ApplicationError::parse(path, e))?;
    top_level(path, entry)
}

/// Environment variables starting with `{prefix}_`, prefix stripped, keys lowercased.
///
/// The prefix match is case-sensitive. The result is flat: `MYAPP_SERVER_HOST`
/// becomes `server_host`.
pub fn load_env(prefix: &str, convert: bool) -> ApplicationResult<Mapping> {
    load_env_from(prefix, convert, None)
}

/// [`load_env`] over an explicit variable set instead of the process environment.
#[instrument(level = "debug", skip(vars))]
pub fn load_env_from(
    prefix: &str,
    convert: bool,
    vars: Option<config::Map<String, String>>,
) -> ApplicationResult<Mapping> {
    if prefix.is_empty() {
        return Err(ApplicationError::InvalidSource(
            "ENV: source needs a prefix".to_string(),
        ));
    }
    // config::Environment matches the prefix case-insensitively
    let marker = format!("{prefix}_");
    let scoped: config::Map<String, String> = match vars {
        Some(vars) => vars
            .into_iter()
            .filter(|(key, _)| key.starts_with(&marker))
            .collect(),
        None => std::env::vars_os()
            .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
            .filter(|(key, _)| key.starts_with(&marker))
            .collect(),
    };
    let vars = Environment::with_prefix(prefix)
        .source(Some(scoped))
        .collect()
        .map_err(|e| ApplicationError::Config {
            message: e.to_string(),
        })?;

    Ok(vars
        .into_iter()
        .map(|(k, v)| (k.to_lowercase(), from_config_value(v, convert)))
        .collect())
}

fn top_level(path: &Path, entry: Entry) -> ApplicationResult<Mapping> {
    match entry {
        Entry::Map(m) => Ok(m),
        Entry::Scalar(Value::Null) => Ok(Mapping::new()),
        Entry::Scalar(v) => Err(ApplicationError::parse(
            path,
            format!("top level must be a table, found scalar '{v}'"),
        )),
    }
}

fn from_config_value(value: config::Value, convert: bool) -> Entry {
    match value.kind {
        ValueKind::Nil => Entry::Scalar(Value::Null),
        ValueKind::Boolean(b) => Entry::Scalar(Value::Bool(b)),
        ValueKind::I64(n) => Entry::Scalar(Value::Int(n)),
        ValueKind::I128(n) => Entry::Scalar(int_or_float(i64::try_from(n), n as f64)),
        ValueKind::U64(n) => Entry::Scalar(int_or_float(i64::try_from(n), n as f64)),
        ValueKind::U128(n) => Entry::Scalar(int_or_float(i64::try_from(n), n as f64)),
        ValueKind::Float(f) => Entry::Scalar(Value::Float(f)),
        ValueKind::String(s) if convert => Entry::Scalar(auto_convert(&s)),
        ValueKind::String(s) => Entry::Scalar(Value::Str(s)),
        ValueKind::Table(t) => Entry::Map(
            t.into_iter()
                .map(|(k, v)| (k, from_config_value(v, convert)))
                .collect(),
        ),
        ValueKind::Array(items) => Entry::Map(fold_list(
            items
                .into_iter()
                .map(|v| from_config_value(v, convert))
                .collect(),
        )),
    }
}

fn int_or_float<E>(n: Result<i64, E>, fallback: f64) -> Value {
    n.map(Value::Int).unwrap_or(Value::Float(fallback))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSchema {
    allowed_tags: Option<Vec<String>>,
    #[serde(default)]
    rules: IndexMap<String, RawRule>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawRule {
    Bare(Vec<String>),
    Constrained(IndexMap<String, toml::Value>),
}

/// Parse a schema from TOML text.
///
/// ```toml
/// allowed_tags = ["document", "title", "body"]
///
/// [rules]
/// ul = ["li"]
///
/// [rules.document]
/// title = "1"
/// body = 1
/// meta = true
/// section = "0:3"
/// ```
pub fn parse_schema(text: &str) -> ApplicationResult<Schema> {
    let raw: RawSchema = toml::from_str(text).map_err(|e| ApplicationError::parse("<schema>", e))?;

    let mut schema = Schema::new();
    for (scope, rule) in raw.rules {
        schema = match rule {
            RawRule::Bare(tags) => schema.valid_children(&scope, tags),
            RawRule::Constrained(specs) => schema.constrain(
                &scope,
                specs
                    .iter()
                    .map(|(tag, v)| (tag.as_str(), CardinalitySpec::from(v))),
            )?,
        };
    }
    if let Some(tags) = raw.allowed_tags {
        schema = schema.allow_tags(tags);
    }
    Ok(schema)
}

/// Read and parse a schema file.
#[instrument(level = "debug")]
pub fn load_schema(path: &Path) -> ApplicationResult<Schema> {
    let text = fs::read_to_string(path).with_path_context("read schema", path)?;
    parse_schema(&text).map_err(|e| match e {
        ApplicationError::Parse { message, .. } => ApplicationError::parse(path, message),
        other => other,
    })
}
