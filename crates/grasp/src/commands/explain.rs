//! Explain command - explain diagnostic codes

use anyhow::{anyhow, Result};
use clap::Args;
use grasp_diagnostics::DiagnosticCode;

use crate::OutputFormat;

#[derive(Args, Debug)]
pub struct ExplainArgs {
    /// Diagnostic code to explain (e.g. C002, W001)
    pub code: String,
}

struct Explanation {
    code: DiagnosticCode,
    title: &'static str,
    description: &'static str,
    example: Option<&'static str>,
    suggestion: Option<&'static str>,
    related: &'static [&'static str],
}

const EXPLANATIONS: &[Explanation] = &[
    Explanation {
        code: DiagnosticCode::SyntaxError,
        title: "Syntax Error",
        description: r#"The fragment or one of its capture clauses is malformed.

A broken capture clause does not stop the rest of the fragment from being
processed: every problem in the clause is reported, the closure is left as
written, and sibling closures are still checked and desugared."#,
        example: Some("[&mut counter] || counter += 1  // mutable reference captures are not supported"),
        suggestion: Some("Fix the entry the caret points at. Clause entries are `&x`, `x`, `+x`, `+x.*`, `name = expr` or one of the wildcards `&`, `=`, `+`."),
        related: &["C001"],
    },
    Explanation {
        code: DiagnosticCode::DuplicateCaptureEntry,
        title: "Duplicate Capture Entry",
        description: "The same name appears more than once in one capture clause, whatever the capture modes. A wildcard repeated in the same clause is reported the same way.",
        example: Some("[a, &a] || a.len()"),
        suggestion: Some("Keep a single entry per name and choose one capture mode for it."),
        related: &["P001", "C003"],
    },
    Explanation {
        code: DiagnosticCode::UnauthorizedCapture,
        title: "Unauthorized Capture",
        description: r#"The closure body uses an outer variable that its capture clause does not
authorize. With an explicit clause, nothing is captured implicitly: every
outer variable must be named by an entry, covered by an entry for one of its
prefixes, or picked up by a wildcard."#,
        example: Some("[my_vec] || (my_vec, other_var)  // `other_var` is not listed"),
        suggestion: Some(r#"Either:
1. Add an entry for the variable: [my_vec, &other_var]
2. Add a wildcard that fits: [my_vec, &]"#),
        related: &["C004"],
    },
    Explanation {
        code: DiagnosticCode::AmbiguousCapture,
        title: "Ambiguous Capture",
        description: "A use in the body is covered by more than one capture entry at the same precedence level, so it is unclear which binding it should go through.",
        example: Some("[+self.*, &self.some_a] || self.some_a"),
        suggestion: Some("Remove one of the overlapping entries, or narrow them so exactly one covers the path."),
        related: &["C001"],
    },
    Explanation {
        code: DiagnosticCode::UnknownField,
        title: "Unknown Field",
        description: "A capture entry names a field the type metadata does not know, a field wildcard targets something that is not a struct with known fields, or the body uses a field missing from a field-wildcard expansion.",
        example: Some("struct S { a: u8 }\nimpl S;\n[+self.*] || self.b"),
        suggestion: Some("Check the field name against the struct declaration, or declare the struct in the fragment header or in grasp.toml."),
        related: &["C005"],
    },
    Explanation {
        code: DiagnosticCode::IllegalSelfWildcardOutsideAggregateContext,
        title: "Self Field Wildcard Outside a Method",
        description: "`+self.*` clones every field of the receiver, which only makes sense when there is a receiver. The fragment declares no `impl` context.",
        example: Some("[+self.*] || self.count"),
        suggestion: Some("Declare the receiver type with an `impl Type;` header, or capture the needed values by name."),
        related: &["C004"],
    },
    Explanation {
        code: DiagnosticCode::MutationThroughReferenceCapture,
        title: "Mutation Through Reference Capture",
        description: "The body assigns to (or takes `&mut` of) a path that is captured by shared reference. Reference captures are read-only.",
        example: Some("[&count] || count += 1"),
        suggestion: Some("Capture by value (`count` or `+count`) to mutate a private copy."),
        related: &["C002"],
    },
    Explanation {
        code: DiagnosticCode::BorrowedBoundExpression,
        title: "Bound Expression Borrows an Outer Place",
        description: r#"A bound expression must produce a value the closure owns. `name = &x` or
`name = &mut x` only hands the closure a new name for the outer storage, so
writes through either side would be visible on the other."#,
        example: Some("[c = &mut count] || { *c += 10; *c }"),
        suggestion: Some(r#"Either:
1. Capture the variable itself by reference: [&count]
2. Bind an independent copy: [+count] or [c = count.clone()]"#),
        related: &["C006"],
    },
    Explanation {
        code: DiagnosticCode::UnusedCaptureEntry,
        title: "Unused Capture Entry",
        description: "An explicit capture entry is never used by the closure body. The value is still captured (moved, cloned or borrowed), so the entry has an effect, but it is usually a leftover.",
        example: Some("[&a, &unused] || a"),
        suggestion: Some("Remove the entry, unless capturing it is intentional (e.g. to move ownership into the closure)."),
        related: &[],
    },
    Explanation {
        code: DiagnosticCode::InternalError,
        title: "Internal Error",
        description: "The analysis of a fragment failed unexpectedly. This is a bug in grasp.",
        example: None,
        suggestion: Some("Re-run with -vvv and report the fragment together with the log output."),
        related: &[],
    },
];

fn lookup(code: &str) -> Option<&'static Explanation> {
    let code = DiagnosticCode::from_code_str(code)?;
    EXPLANATIONS.iter().find(|e| e.code == code)
}

pub fn run(args: ExplainArgs, format: OutputFormat, use_color: bool) -> Result<()> {
    let explanation =
        lookup(&args.code).ok_or_else(|| anyhow!("Unknown diagnostic code: {}", args.code))?;
    let code = explanation.code.as_str();

    match format {
        OutputFormat::Text => {
            let underline = "=".repeat(code.len() + explanation.title.len() + 2);
            if use_color {
                println!(
                    "\n{}: {}\n{}",
                    console::style(code).bold().cyan(),
                    console::style(explanation.title).bold(),
                    underline
                );
            } else {
                println!("\n{}: {}\n{}", code, explanation.title, underline);
            }
            println!(
                "\nKind: {} ({})",
                explanation.code.kind_name(),
                explanation.code.default_severity()
            );
            println!("\n{}\n", explanation.description);

            for (heading, body) in [
                ("Example", explanation.example),
                ("Suggestion", explanation.suggestion),
            ] {
                let Some(body) = body else { continue };
                if use_color {
                    println!("{}:", console::style(heading).bold());
                } else {
                    println!("{}:", heading);
                }
                for line in body.lines() {
                    println!("  {}", line);
                }
                println!();
            }

            if !explanation.related.is_empty() {
                if use_color {
                    println!(
                        "{}: {}",
                        console::style("Related").dim(),
                        explanation.related.join(", ")
                    );
                } else {
                    println!("Related: {}", explanation.related.join(", "));
                }
            }
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "code": code,
                "kind": explanation.code.kind_name(),
                "severity": explanation.code.default_severity().as_str(),
                "title": explanation.title,
                "description": explanation.description,
                "example": explanation.example,
                "suggestion": explanation.suggestion,
                "related": explanation.related,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
