//! Command dispatch

use std::io;
use std::path::{Path, PathBuf};

use clap::CommandFactory;
use clap_complete::{generate, Shell};
use itertools::Itertools;
use tracing::{debug, instrument};

use crate::application::{
    auto_convert, build_tree, deep_merge, flatten, load_schema, ApplicationError, MultiSource,
    Source,
};
use crate::cli::args::{Cli, Commands, ConfigCommands, SourceArgs};
use crate::cli::output;
use crate::cli::{CliError, CliResult};
use crate::config::{global_config_path, OutputFormat, Settings};
use crate::domain::{Entry, Mapping, Schema, TreeStore, Value};
use crate::tree_traits::ToTermTree;

pub fn execute_command(cli: &Cli) -> CliResult<()> {
    let settings = Settings::load(cli.config.as_deref())?;
    debug!(?settings, "effective settings");

    match &cli.command {
        Some(Commands::Show {
            source,
            schema,
            format,
        }) => cmd_show(&settings, source, schema.as_deref(), *format),
        Some(Commands::Check { source, schema }) => cmd_check(&settings, source, schema.as_deref()),
        Some(Commands::Flatten { source, separator }) => {
            cmd_flatten(&settings, source, separator.as_deref())
        }
        Some(Commands::Config { command }) => cmd_config(&settings, command),
        Some(Commands::Completion { shell }) => cmd_completion(*shell),
        None => Err(CliError::Usage(
            "no command given, see --help".to_string(),
        )),
    }
}

#[instrument(skip(settings))]
fn cmd_show(
    settings: &Settings,
    args: &SourceArgs,
    schema: Option<&Path>,
    format: Option<OutputFormat>,
) -> CliResult<()> {
    let mapping = resolve_nested(settings, args)?;
    let schema = resolve_schema(settings, schema)?.unwrap_or_default();
    let tree = build_tree(&mapping, schema)?;
    let rendered = render(&tree, format.unwrap_or(settings.output), &settings.separator)?;
    output::data(rendered.trim_end());
    Ok(())
}

#[instrument(skip(settings))]
fn cmd_check(settings: &Settings, args: &SourceArgs, schema: Option<&Path>) -> CliResult<()> {
    let Some(schema) = resolve_schema(settings, schema)? else {
        return Err(CliError::Usage(
            "check needs a schema: --schema FILE or `schema` in settings".to_string(),
        ));
    };
    let mapping = resolve_nested(settings, args)?;
    let summary = schema_summary(&schema);
    match build_tree(&mapping, schema) {
        Ok(tree) => {
            output::verdict(true, &format!("valid ({} nodes, {summary})", tree.node_count()));
            Ok(())
        }
        Err(e) => {
            output::verdict(false, "invalid");
            Err(e.into())
        }
    }
}

#[instrument(skip(settings))]
fn cmd_flatten(settings: &Settings, args: &SourceArgs, separator: Option<&str>) -> CliResult<()> {
    let separator = separator.unwrap_or(&settings.separator);
    let flat = multi_source(settings, args)?
        .separator(separator)
        .resolve()?;
    for (key, entry) in &flat {
        output::data(&format!("{key}={}", scalar_text(entry)));
    }
    Ok(())
}

fn cmd_config(settings: &Settings, command: &ConfigCommands) -> CliResult<()> {
    match command {
        ConfigCommands::Show => {
            output::header("# effective settings");
            output::data(settings.to_toml()?.trim_end());
        }
        ConfigCommands::Template => output::data(&Settings::template()),
        ConfigCommands::Path => match global_config_path() {
            Some(path) => {
                output::data(&path.display());
                if !path.exists() {
                    output::note("(does not exist)");
                }
            }
            None => output::warning("no home directory, global config disabled"),
        },
    }
    Ok(())
}

fn cmd_completion(shell: Shell) -> CliResult<()> {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut io::stdout());
    Ok(())
}

/// Sources in order: positional sources, environment prefix, `--set` overrides.
fn multi_source(settings: &Settings, args: &SourceArgs) -> CliResult<MultiSource> {
    let mut sources: Vec<Source> = args
        .sources
        .iter()
        .map(|s| Source::parse(s))
        .collect::<Result<_, _>>()?;

    if let Some(prefix) = args.env_prefix.as_ref().or(settings.env_prefix.as_ref()) {
        sources.push(Source::Env(prefix.clone()));
    }
    if !args.overrides.is_empty() {
        sources.push(Source::Mapping(parse_overrides(
            &args.overrides,
            settings.auto_convert,
        )?));
    }

    Ok(MultiSource::new(sources)
        .skip_missing(args.skip_missing || settings.skip_missing)
        .separator(settings.separator.clone())
        .auto_convert(settings.auto_convert))
}

fn resolve_nested(settings: &Settings, args: &SourceArgs) -> CliResult<Mapping> {
    Ok(multi_source(settings, args)?.resolve_nested()?)
}

fn resolve_schema(settings: &Settings, explicit: Option<&Path>) -> CliResult<Option<Schema>> {
    let path: Option<PathBuf> = explicit
        .map(Path::to_path_buf)
        .or_else(|| settings.schema.clone());
    match path {
        Some(p) => Ok(Some(load_schema(&p)?)),
        None => Ok(None),
    }
}

/// `a.b=1` pairs into a nested mapping; later pairs win.
pub fn parse_overrides(pairs: &[String], convert: bool) -> CliResult<Mapping> {
    let mut out = Mapping::new();
    for pair in pairs {
        let Some((key, raw)) = pair.split_once('=') else {
            return Err(CliError::InvalidArgs(format!("expected KEY=VALUE, got '{pair}'")));
        };
        let parts: Vec<&str> = key.trim().split('.').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(CliError::InvalidArgs(format!("empty key segment in '{pair}'")));
        }
        let value = if convert {
            auto_convert(raw)
        } else {
            Value::Str(raw.to_string())
        };
        let nested = parts
            .iter()
            .rev()
            .fold(Entry::Scalar(value), |inner, part| {
                let mut m = Mapping::new();
                m.insert(part.to_string(), inner);
                Entry::Map(m)
            });
        if let Entry::Map(m) = nested {
            deep_merge(&mut out, m);
        }
    }
    Ok(out)
}

/// Projection of `tree` in the requested format.
pub fn render(tree: &TreeStore, format: OutputFormat, separator: &str) -> CliResult<String> {
    let mapping = tree.as_mapping();
    let text = match format {
        OutputFormat::Tree => tree.to_term_tree().to_string(),
        OutputFormat::Json => serde_json::to_string_pretty(&mapping).map_err(serialize_err("json"))?,
        OutputFormat::Toml => toml::to_string_pretty(&mapping).map_err(serialize_err("toml"))?,
        OutputFormat::Yaml => serde_yaml::to_string(&mapping).map_err(serialize_err("yaml"))?,
        OutputFormat::Flat => flatten(&mapping, separator)
            .iter()
            .map(|(k, v)| format!("{k}={}", scalar_text(v)))
            .join("\n"),
    };
    Ok(text)
}

/// `"2 rule scopes, 5 allowed tags"`; the tag count is omitted without a whitelist.
fn schema_summary(schema: &Schema) -> String {
    let scopes = schema.scopes().count();
    match schema.allowed_tags() {
        Some(tags) => format!("{scopes} rule scopes, {} allowed tags", tags.len()),
        None => format!("{scopes} rule scopes"),
    }
}

fn scalar_text(entry: &Entry) -> String {
    match entry {
        Entry::Scalar(Value::Null) => String::new(),
        Entry::Scalar(v) => v.to_string(),
        Entry::Map(_) => String::new(),
    }
}

fn serialize_err<E>(format: &'static str) -> impl FnOnce(E) -> CliError
where
    E: std::error::Error + Send + Sync + 'static,
{
    move |e| {
        CliError::Application(ApplicationError::OperationFailed {
            context: format!("serialize {format}"),
            source: Box::new(e),
        })
    }
}
