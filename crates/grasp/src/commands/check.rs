//! Check command - report capture diagnostics for fragment files

use anyhow::{anyhow, bail, Result};
use clap::Args;
use grasp_diagnostics::{Diagnostic, DiagnosticCode, Diagnostics, SourceCache};
use grasp_parser::{parse_fragment_with_cache, Fragment};
use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;
use walkdir::WalkDir;

use super::{emit_diagnostics, Settings};
use crate::OutputFormat;

pub const FRAGMENT_EXTENSION: &str = "grasp";

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Fragment files or directories to scan for `.grasp` files
    #[arg(default_value = ".")]
    pub paths: Vec<PathBuf>,

    /// Fail on warnings and hints too
    #[arg(long)]
    pub strict: bool,
}

/// Named files are taken as given; directories are walked for `.grasp`
/// files. The result is sorted and free of duplicates.
fn collect_fragment_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = BTreeSet::new();
    for path in paths {
        if path.is_file() {
            files.insert(path.clone());
            continue;
        }
        if !path.is_dir() {
            bail!("no such file or directory: {}", path.display());
        }
        for entry in WalkDir::new(path)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if path.is_file() && path.extension().map_or(false, |ext| ext == FRAGMENT_EXTENSION) {
                files.insert(path.to_path_buf());
            }
        }
    }
    Ok(files.into_iter().collect())
}

struct Parsed {
    path: PathBuf,
    fragment: Fragment,
}

/// Analyze every fragment, spreading them over scoped worker threads.
/// Output order follows input order.
fn analyze_all(parsed: &[Parsed], settings: &Settings) -> Vec<Diagnostics> {
    if parsed.is_empty() {
        return Vec::new();
    }
    let workers = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    let chunk_size = parsed.len().div_ceil(workers);

    std::thread::scope(|scope| {
        let handles: Vec<_> = parsed
            .chunks(chunk_size)
            .map(|chunk| {
                let handle = scope.spawn(move || {
                    chunk
                        .iter()
                        .map(|p| settings.transform(&p.fragment).diagnostics)
                        .collect::<Vec<_>>()
                });
                (chunk, handle)
            })
            .collect();

        handles
            .into_iter()
            .flat_map(|(chunk, handle)| match handle.join() {
                Ok(results) => results,
                Err(_) => chunk
                    .iter()
                    .map(|p| {
                        log::error!("worker panicked while analyzing {}", p.path.display());
                        std::iter::once(
                            Diagnostic::error(
                                DiagnosticCode::InternalError,
                                format!("internal error while analyzing {}", p.path.display()),
                            )
                            .build(),
                        )
                        .collect()
                    })
                    .collect(),
            })
            .collect()
    })
}

pub fn run(args: CheckArgs, settings: &Settings, verbose: u8) -> Result<()> {
    let files = collect_fragment_files(&args.paths)?;

    if files.is_empty() {
        match settings.format {
            OutputFormat::Text => {
                if !settings.quiet {
                    println!("No fragment files found.");
                }
            }
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({
                        "type": "summary",
                        "success": true,
                        "files_checked": 0,
                        "errors": 0,
                        "warnings": 0,
                        "hints": 0,
                    })
                );
            }
        }
        return Ok(());
    }

    if matches!(settings.format, OutputFormat::Text) && !settings.quiet {
        println!("Checking {} file(s)...", files.len());
    }

    let mut cache = SourceCache::new();
    let mut all_diagnostics = Diagnostics::new();
    let mut parsed = Vec::with_capacity(files.len());

    for path in &files {
        let source = fs::read_to_string(path)
            .map_err(|e| anyhow!("could not read {}: {}", path.display(), e))?;
        let filename = path.display().to_string();
        match parse_fragment_with_cache(&source, &filename, &mut cache) {
            Ok(result) => parsed.push(Parsed {
                path: path.clone(),
                fragment: result.fragment,
            }),
            Err(e) => {
                if verbose > 0 {
                    eprintln!("Parse error in {}: {}", filename, e);
                }
                all_diagnostics.push(e.to_diagnostic());
            }
        }
    }

    for diagnostics in analyze_all(&parsed, settings) {
        all_diagnostics.extend(diagnostics);
    }
    let all_diagnostics = all_diagnostics.into_sorted();

    emit_diagnostics(&all_diagnostics, &cache, settings)?;

    let errors = all_diagnostics.error_count();
    let warnings = all_diagnostics.warning_count();
    let hints = all_diagnostics.hint_count();
    let failed = errors > 0 || (args.strict && warnings + hints > 0);

    match settings.format {
        OutputFormat::Text => {
            if !settings.quiet {
                print_summary(&args, settings, files.len(), errors, warnings, hints);
            }
        }
        OutputFormat::Json => {
            let summary = serde_json::json!({
                "type": "summary",
                "success": !failed,
                "files_checked": files.len(),
                "errors": errors,
                "warnings": warnings,
                "hints": hints,
                "strict": args.strict,
            });
            println!("{}", serde_json::to_string(&summary)?);
        }
    }

    if failed {
        Err(anyhow!("Check failed with errors"))
    } else {
        Ok(())
    }
}

fn print_summary(
    args: &CheckArgs,
    settings: &Settings,
    files: usize,
    errors: usize,
    warnings: usize,
    hints: usize,
) {
    let notes = warnings + hints;
    println!();
    if errors > 0 {
        let label = "Check failed";
        let label = if settings.use_color {
            console::style(label).red().bold().to_string()
        } else {
            label.to_string()
        };
        println!("{}: {} error(s), {} warning(s), {} hint(s)", label, errors, warnings, hints);
    } else if notes > 0 && args.strict {
        let label = "Check failed";
        let label = if settings.use_color {
            console::style(label).yellow().bold().to_string()
        } else {
            label.to_string()
        };
        println!("{}: {} warning(s), {} hint(s) (strict mode)", label, warnings, hints);
    } else if notes > 0 {
        let label = "Check passed";
        let label = if settings.use_color {
            console::style(label).yellow().to_string()
        } else {
            label.to_string()
        };
        println!("{}: {} warning(s), {} hint(s)", label, warnings, hints);
    } else {
        let label = "All checks passed!";
        let label = if settings.use_color {
            console::style(label).green().bold().to_string()
        } else {
            label.to_string()
        };
        println!("{} - {} file(s) checked", label, files);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn touch(path: &Path, text: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    }

    #[test]
    fn test_collects_fragments_recursively_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("b.grasp"), "x");
        touch(&dir.path().join("nested/a.grasp"), "x");
        touch(&dir.path().join("notes.txt"), "x");

        let files = collect_fragment_files(&[dir.path().to_path_buf()]).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|f| f.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(names, [PathBuf::from("b.grasp"), PathBuf::from("nested/a.grasp")]);
    }

    #[test]
    fn test_explicit_file_and_its_directory_are_deduplicated() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("one.grasp");
        touch(&file, "x");
        let files = collect_fragment_files(&[file.clone(), dir.path().to_path_buf()]).unwrap();
        assert_eq!(files, [file]);
    }

    #[test]
    fn test_missing_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(collect_fragment_files(&[dir.path().join("missing")]).is_err());
    }

    #[test]
    fn test_parallel_results_keep_input_order() {
        let settings = Settings {
            format: OutputFormat::Text,
            use_color: false,
            quiet: true,
            types: Default::default(),
            options: Default::default(),
        };
        let parsed: Vec<_> = (0..16)
            .map(|i| {
                let source = if i % 2 == 0 { "[] || x" } else { "[&x] || x" };
                Parsed {
                    path: PathBuf::from(format!("{}.grasp", i)),
                    fragment: grasp_parser::parse_fragment(source).unwrap(),
                }
            })
            .collect();
        let results = analyze_all(&parsed, &settings);
        assert_eq!(results.len(), 16);
        for (i, diagnostics) in results.iter().enumerate() {
            assert_eq!(diagnostics.has_errors(), i % 2 == 0, "fragment {}", i);
        }
    }
}
