//! Host fragment parser for grasp
//!
//! Parses fragments of a small Rust-like host language into an AST, with
//! capture clauses (`[&v, +self.*] move || ...`) attached to the closures they
//! precede. Malformed clauses are recorded on the closure instead of failing
//! the whole fragment.

pub mod ast;
pub mod clause;
pub mod error;
pub mod lexer;
mod parser;
pub mod printer;

pub use ast::*;
pub use clause::parse_clause;
pub use error::{ClauseError, ClauseErrorKind, SyntaxError};
pub use printer::{print_clause, print_expr};

use grasp_diagnostics::{FileId, SourceCache};
use grasp_types::Type;
use parser::Parser;

/// Result of parsing a fragment registered in a [`SourceCache`].
#[derive(Debug)]
pub struct ParseResult {
    pub fragment: Fragment,
    /// The file ID in the source cache
    pub file_id: FileId,
}

/// Parse a fragment and add its source to `cache` so diagnostics can quote it.
pub fn parse_fragment_with_cache(
    source: &str,
    filename: &str,
    cache: &mut SourceCache,
) -> Result<ParseResult, SyntaxError> {
    let file_id = cache.add_file(filename, source.to_string());
    let fragment = parse_fragment_in(source, file_id)?;
    log::debug!("parsed fragment `{}`", filename);
    Ok(ParseResult { fragment, file_id })
}

/// Parse a fragment without registering it anywhere. Spans use `FileId(0)`.
pub fn parse_fragment(source: &str) -> Result<Fragment, SyntaxError> {
    parse_fragment_in(source, FileId(0))
}

fn parse_fragment_in(source: &str, file_id: FileId) -> Result<Fragment, SyntaxError> {
    let tokens = lexer::lex(source, file_id)?;
    Parser::new(tokens, source).parse_fragment()
}

/// Parse a single expression.
pub fn parse_expr(source: &str) -> Result<Expr, SyntaxError> {
    let tokens = lexer::lex(source, FileId(0))?;
    let mut parser = Parser::new(tokens, source);
    let expr = parser.parse_expr()?;
    if !parser.at_eof() {
        return Err(parser.unexpected("end of input"));
    }
    Ok(expr)
}

/// Parse a type such as `&mut Vec<u8>`.
pub fn parse_type(source: &str) -> Result<Type, SyntaxError> {
    let tokens = lexer::lex(source, FileId(0))?;
    let mut parser = Parser::new(tokens, source);
    let ty = parser.parse_type()?;
    if !parser.at_eof() {
        return Err(parser.unexpected("end of input"));
    }
    Ok(ty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use grasp_types::FieldProvider;

    #[test]
    fn test_parse_with_cache() {
        let mut cache = SourceCache::new();
        let result = parse_fragment_with_cache("[] || 5", "demo.grasp", &mut cache).unwrap();
        assert!(cache.get_file(result.file_id).is_some());
        assert!(matches!(result.fragment.expr.kind, ExprKind::Closure(_)));
    }

    #[test]
    fn test_fragment_context() {
        let fragment = parse_fragment(
            "struct S { some_a: A, some_b: B }\nimpl S;\nlet my_vec: Vec<u8>;\n[+self.*] || self.some_a",
        )
        .unwrap();
        let table = fragment.type_table();
        let ctx = fragment.host_context();

        let self_ty = ctx.self_type().unwrap();
        assert_eq!(self_ty.to_string(), "&S");
        let fields = table.enumerate_fields(self_ty).unwrap();
        assert_eq!(fields.len(), 2);
        assert!(ctx.declares("my_vec"));
    }

    #[test]
    fn test_syntax_error_diagnostic() {
        let err = parse_fragment("|x| x +").unwrap_err();
        let diag = err.to_diagnostic();
        assert_eq!(diag.code.as_str(), "P001");
        assert_eq!(diag.message, "expected expression, found end of input");
    }

    #[test]
    fn test_parse_type_rejects_trailing_input() {
        assert!(parse_type("Vec<u8>").is_ok());
        assert!(parse_type("Vec<u8> x").is_err());
    }
}
