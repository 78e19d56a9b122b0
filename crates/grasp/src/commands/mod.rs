//! CLI command implementations

pub mod check;
pub mod desugar;
pub mod explain;

use anyhow::Result;
use grasp_diagnostics::{
    DiagnosticEmitter, Diagnostics, JsonEmitter, Severity, SimpleEmitter, SourceCache,
    TerminalEmitter,
};
use grasp_parser::Fragment;
use grasp_transform::{transform_fragment, DesugarOptions, TransformOutput};
use grasp_types::TypeTable;

use crate::config::Config;
use crate::OutputFormat;

/// Options shared by the fragment-processing commands.
#[derive(Debug, Clone)]
pub struct Settings {
    pub format: OutputFormat,
    pub use_color: bool,
    pub quiet: bool,
    /// Structs declared in the config
    pub types: TypeTable,
    pub options: DesugarOptions,
}

impl Settings {
    pub fn new(config: &Config, format: OutputFormat, use_color: bool, quiet: bool) -> Result<Self> {
        let mut options = DesugarOptions::default();
        if let Some(prefix) = &config.desugar.binding_prefix {
            options.binding_prefix = prefix.clone();
        }
        Ok(Self {
            format,
            use_color,
            quiet,
            types: config.type_table()?,
            options,
        })
    }

    /// Run the pipeline on one fragment. Structs declared in the fragment
    /// header take precedence over same-named ones from the config.
    pub fn transform(&self, fragment: &Fragment) -> TransformOutput {
        let mut types = self.types.clone();
        types.extend(fragment.type_table());
        transform_fragment(fragment, &types, &self.options)
    }
}

/// Diagnostics `quiet` mode still shows.
fn visible(diagnostics: &Diagnostics, quiet: bool) -> Diagnostics {
    diagnostics
        .iter()
        .filter(|d| !quiet || d.severity == Severity::Error)
        .cloned()
        .collect()
}

/// Write diagnostics in the selected format: human-readable on stderr (one
/// line each when quiet), JSON lines on stdout.
pub fn emit_diagnostics(
    diagnostics: &Diagnostics,
    cache: &SourceCache,
    settings: &Settings,
) -> Result<()> {
    let diagnostics = visible(diagnostics, settings.quiet);
    match settings.format {
        OutputFormat::Text if settings.quiet => {
            let mut emitter = SimpleEmitter::new(std::io::stderr().lock());
            emitter.emit_all(&diagnostics, cache)?;
        }
        OutputFormat::Text => {
            let mut emitter = TerminalEmitter::new(std::io::stderr().lock(), settings.use_color);
            emitter.emit_all(&diagnostics, cache)?;
        }
        OutputFormat::Json => {
            let mut emitter = JsonEmitter::new(std::io::stdout().lock());
            emitter.emit_all(&diagnostics, cache)?;
        }
    }
    Ok(())
}
