//! Output formatting for `rc` commands.
//!
//! Handlers build one serializable result and hand it to [`render`] or
//! [`render_mode`] with closures for the human forms. JSON mode always
//! serializes the result itself, so the JSON shape is the struct's serde
//! shape and nothing else.
//!
//! The mode is picked, first match wins, from `--format`/`--json`, the
//! `FORMAT` environment variable, `output` in the user config, and finally
//! whether stdout is a terminal (pretty) or a pipe (text).

use clap::ValueEnum;
use runcard_core::RunCardError;
use runcard_core::config;
use serde::Serialize;
use std::io::{self, Write};

/// Width of the dashed rule under pretty headings.
pub const RULE_WIDTH: usize = 72;

pub fn pretty_rule(w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "{}", "-".repeat(RULE_WIDTH))
}

pub fn pretty_section(w: &mut dyn Write, heading: &str) -> io::Result<()> {
    writeln!(w, "{heading}")?;
    pretty_rule(w)
}

/// `Key:` padded to a fixed column, then the value.
pub fn pretty_kv(w: &mut dyn Write, key: &str, value: impl AsRef<str>) -> io::Result<()> {
    let label = format!("{key}:");
    writeln!(w, "{label:<14} {}", value.as_ref())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputMode {
    /// Aligned tables and sections for a terminal.
    Pretty,
    /// Tab-separated lines for pipes and scripts.
    Text,
    /// Pretty-printed JSON of the command result.
    Json,
}

impl OutputMode {
    pub const fn is_json(self) -> bool {
        matches!(self, Self::Json)
    }

    fn from_name(name: &str) -> Self {
        match name {
            "json" => Self::Json,
            "pretty" => Self::Pretty,
            _ => Self::Text,
        }
    }
}

/// Pick the output mode. A user config that fails to load is logged and
/// skipped; the remaining sources still apply.
pub fn resolve_output_mode(format_flag: Option<OutputMode>, json_flag: bool) -> OutputMode {
    if let Some(mode) = format_flag {
        return mode;
    }
    let name = config::resolve_output_from_env(json_flag).unwrap_or_else(|err| {
        tracing::warn!("ignoring user config: {err:#}");
        let env_format = std::env::var("FORMAT").ok();
        config::resolve_output(json_flag, None, env_format.as_deref())
    });
    OutputMode::from_name(name)
}

fn write_json(out: &mut dyn Write, value: &impl Serialize) -> anyhow::Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

/// Print `value` to stdout with separate text and pretty renderers.
pub fn render_mode<T: Serialize>(
    mode: OutputMode,
    value: &T,
    text_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
    pretty_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
) -> anyhow::Result<()> {
    let mut out = io::stdout().lock();
    match mode {
        OutputMode::Json => write_json(&mut out, value),
        OutputMode::Text => Ok(text_fn(value, &mut out)?),
        OutputMode::Pretty => Ok(pretty_fn(value, &mut out)?),
    }
}

/// Print `value` to stdout; text and pretty share `human_fn`.
pub fn render<T: Serialize>(
    mode: OutputMode,
    value: &T,
    human_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
) -> anyhow::Result<()> {
    let mut out = io::stdout().lock();
    if mode.is_json() {
        write_json(&mut out, value)
    } else {
        Ok(human_fn(value, &mut out)?)
    }
}

#[derive(Serialize)]
struct Success<'a> {
    ok: bool,
    message: &'a str,
}

/// `✓ message` for humans, `{"ok": true, "message": ...}` for JSON.
pub fn render_success(mode: OutputMode, message: &str) -> anyhow::Result<()> {
    let success = Success { ok: true, message };
    render(mode, &success, |s, w| writeln!(w, "✓ {}", s.message))
}

/// What a failed command reports: the message, plus a stable `E####` code
/// and a remediation hint when the failure came from the engine.
#[derive(Debug, Serialize)]
pub struct CliError {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl From<&RunCardError> for CliError {
    fn from(err: &RunCardError) -> Self {
        Self {
            message: err.to_string(),
            suggestion: Some(err.suggestion()),
            error_code: Some(err.code().code().to_string()),
        }
    }
}

impl From<&anyhow::Error> for CliError {
    /// The first [`RunCardError`] anywhere in the context chain supplies the
    /// code; otherwise only the formatted chain is reported.
    fn from(err: &anyhow::Error) -> Self {
        err.chain()
            .find_map(|cause| cause.downcast_ref::<RunCardError>())
            .map_or_else(
                || Self {
                    message: format!("{err:#}"),
                    suggestion: None,
                    error_code: None,
                },
                Self::from,
            )
    }
}

#[derive(Serialize)]
struct ErrorEnvelope<'a> {
    error: &'a CliError,
}

/// Print an error to stderr: `error[E####]: message` and an indented
/// suggestion, or `{"error": {...}}` in JSON mode.
pub fn render_error(mode: OutputMode, error: &CliError) -> anyhow::Result<()> {
    let mut out = io::stderr().lock();
    if mode.is_json() {
        return write_json(&mut out, &ErrorEnvelope { error });
    }
    match &error.error_code {
        Some(code) => writeln!(out, "error[{code}]: {}", error.message)?,
        None => writeln!(out, "error: {}", error.message)?,
    }
    if let Some(suggestion) = &error.suggestion {
        writeln!(out, "  suggestion: {suggestion}")?;
    }
    Ok(())
}
