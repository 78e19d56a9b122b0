//! Capture clause parsing.
//!
//! Entries are split at top-level commas and parsed one at a time, so a
//! malformed entry does not hide problems in the entries after it.

use crate::ast::{CaptureClause, CaptureEntry, CaptureMode, CapturePath, WildcardMode};
use crate::error::{ClauseError, ClauseErrorKind};
use crate::lexer::{lex, Token, TokenKind};
use crate::parser::Parser;
use grasp_diagnostics::{FileId, Span};
use std::collections::BTreeMap;

/// Parse standalone clause text such as `[&v, +self.*]`.
///
/// Empty (or whitespace-only) text means "no clause" and yields `Ok(None)`,
/// which is distinct from the empty clause `[]`.
pub fn parse_clause(text: &str, file_id: FileId) -> Result<Option<CaptureClause>, Vec<ClauseError>> {
    if text.trim().is_empty() {
        return Ok(None);
    }
    let tokens = lex(text, file_id).map_err(|e| vec![ClauseError::from(e)])?;

    let open = &tokens[0];
    if open.kind != TokenKind::LBracket {
        return Err(vec![ClauseError::syntax(
            format!("expected `[`, found {}", open.kind.describe()),
            open.span,
        )]);
    }

    let mut depth = 0usize;
    let mut close = None;
    for (idx, token) in tokens.iter().enumerate() {
        match token.kind {
            TokenKind::LBracket | TokenKind::LParen | TokenKind::LBrace => depth += 1,
            TokenKind::RBracket | TokenKind::RParen | TokenKind::RBrace => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    close = Some(idx);
                    break;
                }
            }
            _ => {}
        }
    }
    let Some(close) = close else {
        return Err(vec![ClauseError::syntax("unclosed capture clause", open.span)]);
    };
    if tokens[close].kind != TokenKind::RBracket {
        return Err(vec![ClauseError::syntax(
            format!("mismatched closing delimiter {}", tokens[close].kind.describe()),
            tokens[close].span,
        )]);
    }
    let trailing = &tokens[close + 1];
    if trailing.kind != TokenKind::Eof {
        return Err(vec![ClauseError::syntax(
            format!("unexpected {} after capture clause", trailing.kind.describe()),
            trailing.span,
        )]);
    }

    let span = open.span.merge(tokens[close].span);
    parse_entries(tokens[1..close].to_vec(), tokens[close].span, span, text).map(Some)
}

enum Item {
    Wildcard(WildcardMode, Span),
    Entry(CaptureEntry),
}

/// Parse the tokens between `[` and `]`.
pub(crate) fn parse_entries(
    tokens: Vec<Token>,
    close_span: Span,
    clause_span: Span,
    source: &str,
) -> Result<CaptureClause, Vec<ClauseError>> {
    let segments = split_top_level(tokens);
    let last = segments.len().saturating_sub(1);

    let mut errors = Vec::new();
    let mut items = Vec::new();
    for (idx, (segment, comma)) in segments.into_iter().enumerate() {
        if segment.is_empty() {
            // `[]` and a trailing comma are fine; `[a,,b]` and `[,]` are not.
            if idx != last {
                let span = comma.unwrap_or(close_span);
                errors.push(ClauseError::syntax("expected capture entry, found `,`", span));
            }
            continue;
        }
        let end = comma.unwrap_or(close_span);
        match parse_segment(segment, end, source) {
            Ok(item) => items.push(item),
            Err(err) => errors.push(err),
        }
    }

    let mut wildcard = WildcardMode::None;
    let mut wildcard_span: Option<Span> = None;
    let mut seen: BTreeMap<String, Span> = BTreeMap::new();
    let mut entries = Vec::new();

    for item in items {
        match item {
            Item::Wildcard(mode, span) => match wildcard_span {
                None => {
                    wildcard = mode;
                    wildcard_span = Some(span);
                }
                Some(first) if mode == wildcard => errors.push(ClauseError {
                    kind: ClauseErrorKind::DuplicateEntry,
                    message: format!("wildcard `{}` appears more than once", mode.symbol()),
                    span,
                    help: Some("remove one of the wildcards".to_string()),
                    related: Some(first),
                }),
                Some(first) => errors.push(ClauseError {
                    kind: ClauseErrorKind::Syntax,
                    message: format!(
                        "wildcard `{}` conflicts with wildcard `{}`",
                        mode.symbol(),
                        wildcard.symbol()
                    ),
                    span,
                    help: Some("a clause can have at most one wildcard".to_string()),
                    related: Some(first),
                }),
            },
            Item::Entry(entry) => {
                if let Some(first) = seen.get(&entry.name) {
                    errors.push(ClauseError::duplicate(&entry.name, entry.span, *first));
                    continue;
                }
                seen.insert(entry.name.clone(), entry.span);
                entries.push(entry);
            }
        }
    }

    if errors.is_empty() {
        Ok(CaptureClause {
            entries,
            wildcard,
            span: clause_span,
        })
    } else {
        errors.sort_by_key(|e| e.span);
        Err(errors)
    }
}

/// Split at commas outside any delimiter. Each segment carries the span of
/// the comma that ended it.
fn split_top_level(tokens: Vec<Token>) -> Vec<(Vec<Token>, Option<Span>)> {
    let mut segments = Vec::new();
    let mut current = Vec::new();
    let mut depth = 0usize;
    for token in tokens {
        match token.kind {
            TokenKind::LBracket | TokenKind::LParen | TokenKind::LBrace => depth += 1,
            TokenKind::RBracket | TokenKind::RParen | TokenKind::RBrace => {
                depth = depth.saturating_sub(1)
            }
            TokenKind::Comma if depth == 0 => {
                segments.push((std::mem::take(&mut current), Some(token.span)));
                continue;
            }
            _ => {}
        }
        current.push(token);
    }
    segments.push((current, None));
    segments
}

fn parse_segment(mut tokens: Vec<Token>, end: Span, source: &str) -> Result<Item, ClauseError> {
    tokens.push(Token {
        kind: TokenKind::Eof,
        span: Span::new(end.file_id, end.start, end.start),
    });
    let mut p = Parser::new(tokens, source);
    let item = parse_entry(&mut p)?;
    if !p.at_eof() {
        return Err(ClauseError::syntax(
            format!("unexpected {} in capture entry", p.peek().describe()),
            p.current_span(),
        ));
    }
    Ok(item)
}

fn parse_entry(p: &mut Parser<'_>) -> Result<Item, ClauseError> {
    let start = p.current_span();
    match p.peek().clone() {
        TokenKind::Amp => {
            p.bump();
            if p.at_eof() {
                return Ok(Item::Wildcard(WildcardMode::ReferenceAll, start));
            }
            if p.check(&TokenKind::Mut) {
                return Err(ClauseError::syntax(
                    "mutable reference captures are not supported",
                    start.merge(p.current_span()),
                )
                .with_help("capture with `&path`, or move the value with a bare `path`"));
            }
            let path = parse_path(p)?;
            reject_field_wildcard(p)?;
            Ok(entry(path, CaptureMode::Reference, start.merge(p.prev_span())))
        }
        TokenKind::AmpAmp => Err(ClauseError::syntax(
            "expected a path after `&`, found `&&`",
            start,
        )),
        TokenKind::Eq => {
            p.bump();
            if p.at_eof() {
                Ok(Item::Wildcard(WildcardMode::MoveAll, start))
            } else {
                Err(ClauseError::syntax(
                    format!("expected `,` or `]` after `=`, found {}", p.peek().describe()),
                    p.current_span(),
                ))
            }
        }
        TokenKind::Plus => {
            p.bump();
            if p.at_eof() {
                return Ok(Item::Wildcard(WildcardMode::CloneAll, start));
            }
            let path = parse_path(p)?;
            if at_field_wildcard(p) {
                p.bump();
                p.bump();
                let span = start.merge(p.prev_span());
                return Ok(Item::Entry(CaptureEntry {
                    name: format!("{}.*", path),
                    path,
                    mode: CaptureMode::FieldWildcardClone,
                    value: None,
                    span,
                }));
            }
            Ok(entry(path, CaptureMode::Clone, start.merge(p.prev_span())))
        }
        TokenKind::SelfValue if p.peek_at(1) == &TokenKind::Eq => Err(ClauseError::syntax(
            "`self` cannot be rebound in a capture clause",
            start,
        )),
        TokenKind::Ident(name) if p.peek_at(1) == &TokenKind::Eq => {
            p.bump();
            p.bump();
            if p.at_eof() {
                return Err(ClauseError::syntax(
                    format!("expected an expression to bind to `{}`", name),
                    p.current_span(),
                ));
            }
            let value = p.parse_binary(0)?;
            let span = start.merge(value.span);
            Ok(Item::Entry(CaptureEntry {
                path: CapturePath::root(name.clone()),
                name,
                mode: CaptureMode::BoundExpression,
                value: Some(value),
                span,
            }))
        }
        TokenKind::Ident(_) | TokenKind::SelfValue => {
            let path = parse_path(p)?;
            reject_field_wildcard(p)?;
            // The receiver is already a borrow; naming it captures that borrow.
            let mode = if path.fields.is_empty() && path.is_self_rooted() {
                CaptureMode::Reference
            } else {
                CaptureMode::Move
            };
            Ok(entry(path, mode, start.merge(p.prev_span())))
        }
        other => Err(ClauseError::syntax(
            format!("expected capture entry, found {}", other.describe()),
            start,
        )),
    }
}

fn entry(path: CapturePath, mode: CaptureMode, span: Span) -> Item {
    Item::Entry(CaptureEntry {
        name: path.to_string(),
        path,
        mode,
        value: None,
        span,
    })
}

fn at_field_wildcard(p: &Parser<'_>) -> bool {
    p.check(&TokenKind::Dot) && p.peek_at(1) == &TokenKind::Star
}

fn reject_field_wildcard(p: &Parser<'_>) -> Result<(), ClauseError> {
    if at_field_wildcard(p) {
        return Err(ClauseError::syntax(
            "field wildcards can only be cloned",
            p.current_span(),
        )
        .with_help("write `+path.*`"));
    }
    Ok(())
}

fn parse_path(p: &mut Parser<'_>) -> Result<CapturePath, ClauseError> {
    let root = match p.peek().clone() {
        TokenKind::Ident(name) => name,
        TokenKind::SelfValue => "self".to_string(),
        other => {
            return Err(ClauseError::syntax(
                format!("expected a path, found {}", other.describe()),
                p.current_span(),
            ))
        }
    };
    p.bump();

    let mut fields = Vec::new();
    while p.check(&TokenKind::Dot) && !at_field_wildcard(p) {
        p.bump();
        match p.peek().clone() {
            TokenKind::Ident(name) => fields.push(name),
            TokenKind::Int(index) => fields.push(index.to_string()),
            other => {
                return Err(ClauseError::syntax(
                    format!("expected field name after `.`, found {}", other.describe()),
                    p.current_span(),
                ))
            }
        }
        p.bump();
    }
    Ok(CapturePath::new(root, fields))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clause(text: &str) -> CaptureClause {
        parse_clause(text, FileId(0)).unwrap().unwrap()
    }

    fn errors(text: &str) -> Vec<ClauseError> {
        parse_clause(text, FileId(0)).unwrap_err()
    }

    fn modes(clause: &CaptureClause) -> Vec<(String, CaptureMode)> {
        clause
            .entries
            .iter()
            .map(|e| (e.name.clone(), e.mode))
            .collect()
    }

    #[test]
    fn test_absent_vs_empty() {
        assert_eq!(parse_clause("", FileId(0)), Ok(None));
        assert_eq!(parse_clause("  ", FileId(0)), Ok(None));
        let empty = clause("[]");
        assert!(empty.is_empty());
    }

    #[test]
    fn test_entry_forms() {
        let c = clause("[my_vec, &my_string, +my_arc, some_var, n = a + 1, +self.*]");
        assert_eq!(
            modes(&c),
            vec![
                ("my_vec".to_string(), CaptureMode::Move),
                ("my_string".to_string(), CaptureMode::Reference),
                ("my_arc".to_string(), CaptureMode::Clone),
                ("some_var".to_string(), CaptureMode::Move),
                ("n".to_string(), CaptureMode::BoundExpression),
                ("self.*".to_string(), CaptureMode::FieldWildcardClone),
            ]
        );
        assert!(c.entries[4].value.is_some());
        assert_eq!(c.entries[5].path, CapturePath::root("self"));
        assert_eq!(c.wildcard, WildcardMode::None);
    }

    #[test]
    fn test_paths() {
        let c = clause("[&self.some_a, +pair.0]");
        assert_eq!(
            c.entries[0].path,
            CapturePath::new("self", vec!["some_a".to_string()])
        );
        assert_eq!(c.entries[1].name, "pair.0");
    }

    #[test]
    fn test_bare_self_is_reference() {
        let c = clause("[self]");
        assert_eq!(modes(&c), vec![("self".to_string(), CaptureMode::Reference)]);
    }

    #[test]
    fn test_wildcards() {
        assert_eq!(clause("[&]").wildcard, WildcardMode::ReferenceAll);
        assert_eq!(clause("[=, &v]").wildcard, WildcardMode::MoveAll);
        assert_eq!(clause("[+v, +,]").wildcard, WildcardMode::CloneAll);
    }

    #[test]
    fn test_duplicate_entry() {
        let errs = errors("[my_vec, &my_vec]");
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].kind, ClauseErrorKind::DuplicateEntry);
        assert_eq!(errs[0].span, Span::new(FileId(0), 9, 16));
        assert_eq!(errs[0].related, Some(Span::new(FileId(0), 1, 7)));
    }

    #[test]
    fn test_bound_name_duplicates_path_entry() {
        let errs = errors("[x, x = 1]");
        assert_eq!(errs[0].kind, ClauseErrorKind::DuplicateEntry);
    }

    #[test]
    fn test_wildcard_conflicts() {
        let same = errors("[&, &]");
        assert_eq!(same[0].kind, ClauseErrorKind::DuplicateEntry);
        let conflicting = errors("[&, =]");
        assert_eq!(conflicting[0].kind, ClauseErrorKind::Syntax);
        assert_eq!(
            conflicting[0].message,
            "wildcard `=` conflicts with wildcard `&`"
        );
    }

    #[test]
    fn test_every_bad_entry_is_reported() {
        let errs = errors("[&mut a, b, 3, &c.*]");
        let messages: Vec<_> = errs.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "mutable reference captures are not supported",
                "expected capture entry, found integer `3`",
                "field wildcards can only be cloned",
            ]
        );
    }

    #[test]
    fn test_malformed_entries() {
        assert_eq!(
            errors("[self = 1]")[0].message,
            "`self` cannot be rebound in a capture clause"
        );
        assert_eq!(
            errors("[a,,b]")[0].message,
            "expected capture entry, found `,`"
        );
        assert_eq!(
            errors("[+self.*.x]")[0].message,
            "unexpected `.` in capture entry"
        );
        assert_eq!(
            errors("[a.]")[0].message,
            "expected field name after `.`, found end of input"
        );
        assert_eq!(errors("[a b]")[0].message, "unexpected identifier `b` in capture entry");
    }

    #[test]
    fn test_unbalanced_text() {
        assert_eq!(errors("[a, b")[0].message, "unclosed capture clause");
        assert_eq!(
            errors("[a] x")[0].message,
            "unexpected identifier `x` after capture clause"
        );
        assert_eq!(errors("a")[0].message, "expected `[`, found identifier `a`");
    }

    #[test]
    fn test_bound_expression_may_contain_commas_in_calls() {
        let c = clause("[total = sum(a, b), &a]");
        assert_eq!(c.entries.len(), 2);
        assert_eq!(c.entries[0].mode, CaptureMode::BoundExpression);
    }
}
