//! Desugar command - print a fragment with its capture clauses expanded

use anyhow::{anyhow, Context, Result};
use clap::Args;
use grasp_capture::{CaptureTable, Strategy};
use grasp_diagnostics::{Diagnostics, SourceCache};
use grasp_parser::{parse_fragment_with_cache, print_expr};
use grasp_transform::ClosureReport;
use std::io::Read;
use std::path::PathBuf;

use super::{emit_diagnostics, Settings};
use crate::OutputFormat;

#[derive(Args, Debug)]
pub struct DesugarArgs {
    /// Fragment file; reads stdin when omitted or `-`
    pub input: Option<PathBuf>,

    /// Also print the capture table of every closure
    #[arg(long)]
    pub show_table: bool,

    /// Print a unified diff of original and desugared code instead
    #[arg(long)]
    pub diff: bool,
}

fn read_input(input: Option<&PathBuf>) -> Result<(String, String)> {
    match input {
        Some(path) if path.as_os_str() != "-" => {
            let source = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            Ok((path.display().to_string(), source))
        }
        _ => {
            let mut source = String::new();
            std::io::stdin()
                .read_to_string(&mut source)
                .context("failed to read stdin")?;
            Ok(("<stdin>".to_string(), source))
        }
    }
}

pub fn run(args: DesugarArgs, settings: &Settings) -> Result<()> {
    let (filename, source) = read_input(args.input.as_ref())?;
    let mut cache = SourceCache::new();

    let parsed = match parse_fragment_with_cache(&source, &filename, &mut cache) {
        Ok(parsed) => parsed,
        Err(e) => {
            let diagnostics: Diagnostics = std::iter::once(e.to_diagnostic()).collect();
            emit_diagnostics(&diagnostics, &cache, settings)?;
            return Err(anyhow!("could not parse {}", filename));
        }
    };

    let out = settings.transform(&parsed.fragment);
    let original = print_expr(&parsed.fragment.expr);
    let desugared = print_expr(&out.expr);
    log::info!(
        "{}: {} closure(s), {} transformed",
        filename,
        out.closures.len(),
        out.closures.iter().filter(|c| c.transformed).count()
    );

    emit_diagnostics(&out.diagnostics, &cache, settings)?;

    match settings.format {
        OutputFormat::Text => {
            if args.show_table {
                for report in &out.closures {
                    println!("// {}", describe(report, &cache));
                }
            }
            if args.diff {
                print!("{}", render_diff(&original, &desugared, &filename, settings.use_color));
            } else {
                println!("{}", desugared);
            }
        }
        OutputFormat::Json => {
            let mut result = serde_json::json!({
                "type": "result",
                "file": filename,
                "output": desugared,
                "errors": out.diagnostics.error_count(),
                "warnings": out.diagnostics.warning_count(),
                "hints": out.diagnostics.hint_count(),
            });
            if args.show_table {
                result["closures"] = out
                    .closures
                    .iter()
                    .map(|report| closure_json(report, &cache))
                    .collect();
            }
            if args.diff {
                result["diff"] = render_diff(&original, &desugared, &filename, false).into();
            }
            println!("{}", serde_json::to_string(&result)?);
        }
    }

    if out.has_errors() {
        Err(anyhow!(
            "desugaring failed with {} error(s)",
            out.diagnostics.error_count()
        ))
    } else {
        Ok(())
    }
}

/// `line:col: {name: Mode, ...}` for one closure.
fn describe(report: &ClosureReport, cache: &SourceCache) -> String {
    let at = cache
        .location(report.span)
        .map(|loc| format!("{}:{}", loc.line, loc.column))
        .unwrap_or_else(|| "?".to_string());
    match &report.table {
        Some(table) => format!("{} {} {}", at, strategy_name(table), table),
        None => format!("{} invalid clause", at),
    }
}

fn strategy_name(table: &CaptureTable) -> &'static str {
    match table.strategy() {
        Strategy::Legacy { is_move: true } => "legacy move",
        Strategy::Legacy { is_move: false } => "legacy",
        Strategy::Explicit => "explicit",
    }
}

fn closure_json(report: &ClosureReport, cache: &SourceCache) -> serde_json::Value {
    let loc = cache.location(report.span);
    let table = report.table.as_ref().map(|table| {
        serde_json::json!({
            "strategy": strategy_name(table),
            "entries": table.entries().iter().map(|entry| serde_json::json!({
                "name": entry.name,
                "path": entry.path.to_string(),
                "mode": entry.mode.as_str(),
                "explicit": entry.is_explicit(),
            })).collect::<Vec<_>>(),
        })
    });
    serde_json::json!({
        "line": loc.as_ref().map(|l| l.line),
        "column": loc.as_ref().map(|l| l.column),
        "transformed": report.transformed,
        "table": table,
    })
}

fn render_diff(original: &str, desugared: &str, filename: &str, use_color: bool) -> String {
    let original = format!("{}\n", original);
    let desugared = format!("{}\n", desugared);
    let diff = similar::TextDiff::from_lines(&original, &desugared);
    let text = diff
        .unified_diff()
        .context_radius(3)
        .header(filename, &format!("{} (desugared)", filename))
        .to_string();
    if !use_color {
        return text;
    }
    text.lines()
        .map(|line| {
            let styled = if line.starts_with("+++") || line.starts_with("---") {
                console::style(line).bold()
            } else if line.starts_with('+') {
                console::style(line).green()
            } else if line.starts_with('-') {
                console::style(line).red()
            } else if line.starts_with("@@") {
                console::style(line).cyan()
            } else {
                console::style(line)
            };
            format!("{}\n", styled)
        })
        .collect()
}
