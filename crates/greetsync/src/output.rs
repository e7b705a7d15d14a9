//! Rendering for `--output`.
//!
//! A [`Renderer`] is built once per command from the global flags. Tables
//! come from `tabled` rows, json/yaml serialize the domain value itself and
//! plain prints one key per line for scripts.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use serde::Serialize;
use tabled::{Table, Tabled, settings::Style};

use crate::cli::{ColorMode, GlobalOpts, OutputFormat};

pub struct Renderer {
    format: OutputFormat,
    color: bool,
    quiet: bool,
}

impl Renderer {
    pub fn new(global: &GlobalOpts) -> Self {
        Self {
            format: global.output.clone(),
            color: color_enabled(&global.color),
            quiet: global.quiet,
        }
    }

    pub fn color(&self) -> bool {
        self.color
    }

    /// True for the formats meant to be parsed by another program.
    pub fn is_structured(&self) -> bool {
        matches!(
            self.format,
            OutputFormat::Json | OutputFormat::JsonCompact | OutputFormat::Yaml
        )
    }

    /// Print a collection: one table row per item, or the serialized slice.
    pub fn list<T, R>(&self, items: &[T], row: impl Fn(&T, bool) -> R, key: impl Fn(&T) -> String)
    where
        T: Serialize,
        R: Tabled,
    {
        let text = match self.format {
            OutputFormat::Table => {
                let rows: Vec<R> = items.iter().map(|item| row(item, self.color)).collect();
                Table::new(rows).with(Style::rounded()).to_string()
            }
            OutputFormat::Plain => items.iter().map(key).collect::<Vec<_>>().join("\n"),
            _ => self.serialize(items),
        };
        self.emit(&text);
    }

    /// Print one value as a detail block, or serialized.
    pub fn one<T>(&self, item: &T, detail: impl Fn(&T, bool) -> String, key: impl Fn(&T) -> String)
    where
        T: Serialize,
    {
        let text = match self.format {
            OutputFormat::Table => detail(item, self.color),
            OutputFormat::Plain => key(item),
            _ => self.serialize(item),
        };
        self.emit(&text);
    }

    /// Status line on stderr, so stdout stays clean for pipes.
    pub fn note(&self, message: &str) {
        if !self.quiet {
            eprintln!("{message}");
        }
    }

    fn serialize<T: Serialize + ?Sized>(&self, data: &T) -> String {
        let rendered = match self.format {
            OutputFormat::Yaml => serde_yaml::to_string(data).map_err(|e| e.to_string()),
            OutputFormat::JsonCompact => serde_json::to_string(data).map_err(|e| e.to_string()),
            _ => serde_json::to_string_pretty(data).map_err(|e| e.to_string()),
        };
        rendered.unwrap_or_else(|e| format!("error: serialization failed: {e}"))
    }

    fn emit(&self, text: &str) {
        if self.quiet || text.is_empty() {
            return;
        }
        let _ = writeln!(io::stdout().lock(), "{text}");
    }
}

fn color_enabled(mode: &ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none(),
    }
}

// ── Styling ─────────────────────────────────────────────────────────

/// Variant tag, colored by severity.
pub fn paint_variant(variant: &str, color: bool) -> String {
    if !color {
        return variant.to_owned();
    }
    match variant {
        "warning" => variant.yellow().to_string(),
        "danger" | "error" => variant.red().to_string(),
        "success" => variant.green().to_string(),
        "info" => variant.cyan().to_string(),
        _ => variant.to_owned(),
    }
}

pub fn dim(text: &str, color: bool) -> String {
    if color {
        text.dimmed().to_string()
    } else {
        text.to_owned()
    }
}
