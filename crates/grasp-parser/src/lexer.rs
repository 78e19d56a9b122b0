//! Tokenizer for host fragments.

use crate::error::SyntaxError;
use grasp_diagnostics::{FileId, Span};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Ident(String),
    Int(u64),
    Str(String),

    // Keywords
    SelfValue,
    Move,
    Let,
    Mut,
    If,
    Else,
    For,
    In,
    While,
    Struct,
    Impl,
    True,
    False,

    // Delimiters
    LBracket,
    RBracket,
    LParen,
    RParen,
    LBrace,
    RBrace,

    // Punctuation and operators
    Comma,
    Semi,
    Colon,
    ColonColon,
    Dot,
    Star,
    Plus,
    Minus,
    Slash,
    Percent,
    Bang,
    Eq,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Amp,
    AmpAmp,
    Pipe,
    PipePipe,
    PlusEq,
    MinusEq,
    StarEq,
    SlashEq,

    Eof,
}

impl TokenKind {
    /// Human readable form for "expected ..., found ..." messages.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Ident(name) => format!("identifier `{}`", name),
            TokenKind::Int(value) => format!("integer `{}`", value),
            TokenKind::Str(_) => "string literal".to_string(),
            TokenKind::Eof => "end of input".to_string(),
            other => format!("`{}`", other.symbol()),
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            TokenKind::SelfValue => "self",
            TokenKind::Move => "move",
            TokenKind::Let => "let",
            TokenKind::Mut => "mut",
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::For => "for",
            TokenKind::In => "in",
            TokenKind::While => "while",
            TokenKind::Struct => "struct",
            TokenKind::Impl => "impl",
            TokenKind::True => "true",
            TokenKind::False => "false",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::Comma => ",",
            TokenKind::Semi => ";",
            TokenKind::Colon => ":",
            TokenKind::ColonColon => "::",
            TokenKind::Dot => ".",
            TokenKind::Star => "*",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::Bang => "!",
            TokenKind::Eq => "=",
            TokenKind::EqEq => "==",
            TokenKind::NotEq => "!=",
            TokenKind::Lt => "<",
            TokenKind::Le => "<=",
            TokenKind::Gt => ">",
            TokenKind::Ge => ">=",
            TokenKind::Amp => "&",
            TokenKind::AmpAmp => "&&",
            TokenKind::Pipe => "|",
            TokenKind::PipePipe => "||",
            TokenKind::PlusEq => "+=",
            TokenKind::MinusEq => "-=",
            TokenKind::StarEq => "*=",
            TokenKind::SlashEq => "/=",
            TokenKind::Ident(_) | TokenKind::Int(_) | TokenKind::Str(_) | TokenKind::Eof => "",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

pub fn lex(source: &str, file_id: FileId) -> Result<Vec<Token>, SyntaxError> {
    Lexer::new(source, file_id).run()
}

struct Lexer<'a> {
    src: &'a str,
    chars: std::str::Chars<'a>,
    current: Option<char>,
    offset: usize,
    file_id: FileId,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str, file_id: FileId) -> Self {
        let mut chars = src.chars();
        let current = chars.next();
        Self {
            src,
            chars,
            current,
            offset: 0,
            file_id,
            tokens: Vec::new(),
        }
    }

    fn run(mut self) -> Result<Vec<Token>, SyntaxError> {
        while let Some(ch) = self.current {
            match ch {
                '/' if self.peek() == Some('/') => self.eat_line_comment(),
                '/' if self.peek() == Some('*') => self.eat_block_comment()?,
                ch if ch.is_whitespace() => {
                    self.bump();
                }
                ch if ch.is_alphabetic() || ch == '_' => self.lex_word(),
                ch if ch.is_ascii_digit() => self.lex_number()?,
                '"' => self.lex_string()?,
                _ => self.lex_symbol()?,
            }
        }
        self.push(TokenKind::Eof, self.offset, self.offset);
        Ok(self.tokens)
    }

    fn bump(&mut self) -> Option<char> {
        if let Some(ch) = self.current {
            self.offset += ch.len_utf8();
        }
        self.current = self.chars.next();
        self.current
    }

    fn peek(&self) -> Option<char> {
        self.chars.clone().next()
    }

    fn span(&self, start: usize, end: usize) -> Span {
        Span::new(self.file_id, start as u32, end as u32)
    }

    fn push(&mut self, kind: TokenKind, start: usize, end: usize) {
        let span = self.span(start, end);
        self.tokens.push(Token { kind, span });
    }

    fn eat_line_comment(&mut self) {
        while let Some(ch) = self.current {
            if ch == '\n' {
                break;
            }
            self.bump();
        }
    }

    fn eat_block_comment(&mut self) -> Result<(), SyntaxError> {
        let start = self.offset;
        self.bump();
        self.bump();
        while let Some(ch) = self.current {
            if ch == '*' && self.peek() == Some('/') {
                self.bump();
                self.bump();
                return Ok(());
            }
            self.bump();
        }
        Err(SyntaxError::new(
            "unterminated block comment",
            self.span(start, self.offset),
        ))
    }

    fn lex_word(&mut self) {
        let start = self.offset;
        while let Some(ch) = self.current {
            if ch.is_alphanumeric() || ch == '_' {
                self.bump();
            } else {
                break;
            }
        }
        let word = &self.src[start..self.offset];
        let kind = match word {
            "self" => TokenKind::SelfValue,
            "move" => TokenKind::Move,
            "let" => TokenKind::Let,
            "mut" => TokenKind::Mut,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "for" => TokenKind::For,
            "in" => TokenKind::In,
            "while" => TokenKind::While,
            "struct" => TokenKind::Struct,
            "impl" => TokenKind::Impl,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            _ => TokenKind::Ident(word.to_string()),
        };
        self.push(kind, start, self.offset);
    }

    fn lex_number(&mut self) -> Result<(), SyntaxError> {
        let start = self.offset;
        while let Some(ch) = self.current {
            if ch.is_ascii_digit() || ch == '_' {
                self.bump();
            } else {
                break;
            }
        }
        let digits: String = self.src[start..self.offset]
            .chars()
            .filter(|c| *c != '_')
            .collect();
        let value = digits.parse::<u64>().map_err(|_| {
            SyntaxError::new("integer literal is too large", self.span(start, self.offset))
        })?;
        self.push(TokenKind::Int(value), start, self.offset);
        Ok(())
    }

    fn lex_string(&mut self) -> Result<(), SyntaxError> {
        let start = self.offset;
        let mut value = String::new();
        self.bump();
        loop {
            match self.current {
                None => {
                    return Err(SyntaxError::new(
                        "unterminated string literal",
                        self.span(start, self.offset),
                    ))
                }
                Some('"') => {
                    self.bump();
                    break;
                }
                Some('\\') => {
                    let escape_start = self.offset;
                    let escaped = match self.bump() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('r') => '\r',
                        Some('0') => '\0',
                        Some('\\') => '\\',
                        Some('"') => '"',
                        _ => {
                            return Err(SyntaxError::new(
                                "unknown escape sequence",
                                self.span(escape_start, self.offset + 1),
                            ))
                        }
                    };
                    value.push(escaped);
                    self.bump();
                }
                Some(ch) => {
                    value.push(ch);
                    self.bump();
                }
            }
        }
        self.push(TokenKind::Str(value), start, self.offset);
        Ok(())
    }

    fn lex_symbol(&mut self) -> Result<(), SyntaxError> {
        let start = self.offset;
        let ch = self.current.unwrap_or('\0');
        let next = self.peek();

        let (kind, width) = match (ch, next) {
            (':', Some(':')) => (TokenKind::ColonColon, 2),
            ('=', Some('=')) => (TokenKind::EqEq, 2),
            ('!', Some('=')) => (TokenKind::NotEq, 2),
            ('<', Some('=')) => (TokenKind::Le, 2),
            ('>', Some('=')) => (TokenKind::Ge, 2),
            ('&', Some('&')) => (TokenKind::AmpAmp, 2),
            ('|', Some('|')) => (TokenKind::PipePipe, 2),
            ('+', Some('=')) => (TokenKind::PlusEq, 2),
            ('-', Some('=')) => (TokenKind::MinusEq, 2),
            ('*', Some('=')) => (TokenKind::StarEq, 2),
            ('/', Some('=')) => (TokenKind::SlashEq, 2),
            ('[', _) => (TokenKind::LBracket, 1),
            (']', _) => (TokenKind::RBracket, 1),
            ('(', _) => (TokenKind::LParen, 1),
            (')', _) => (TokenKind::RParen, 1),
            ('{', _) => (TokenKind::LBrace, 1),
            ('}', _) => (TokenKind::RBrace, 1),
            (',', _) => (TokenKind::Comma, 1),
            (';', _) => (TokenKind::Semi, 1),
            (':', _) => (TokenKind::Colon, 1),
            ('.', _) => (TokenKind::Dot, 1),
            ('*', _) => (TokenKind::Star, 1),
            ('+', _) => (TokenKind::Plus, 1),
            ('-', _) => (TokenKind::Minus, 1),
            ('/', _) => (TokenKind::Slash, 1),
            ('%', _) => (TokenKind::Percent, 1),
            ('!', _) => (TokenKind::Bang, 1),
            ('=', _) => (TokenKind::Eq, 1),
            ('<', _) => (TokenKind::Lt, 1),
            ('>', _) => (TokenKind::Gt, 1),
            ('&', _) => (TokenKind::Amp, 1),
            ('|', _) => (TokenKind::Pipe, 1),
            (other, _) => {
                return Err(SyntaxError::new(
                    format!("unexpected character `{}`", other),
                    self.span(start, start + other.len_utf8()),
                ))
            }
        };

        for _ in 0..width {
            self.bump();
        }
        self.push(kind, start, self.offset);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source, FileId(0))
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_clause_tokens() {
        assert_eq!(
            kinds("[&v, +self.*, =] move ||"),
            vec![
                TokenKind::LBracket,
                TokenKind::Amp,
                TokenKind::Ident("v".to_string()),
                TokenKind::Comma,
                TokenKind::Plus,
                TokenKind::SelfValue,
                TokenKind::Dot,
                TokenKind::Star,
                TokenKind::Comma,
                TokenKind::Eq,
                TokenKind::RBracket,
                TokenKind::Move,
                TokenKind::PipePipe,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_comments_and_strings() {
        assert_eq!(
            kinds("// header\nx /* inline */ += \"a\\\"b\""),
            vec![
                TokenKind::Ident("x".to_string()),
                TokenKind::PlusEq,
                TokenKind::Str("a\"b".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_tuple_index_lexes_as_int() {
        assert_eq!(
            kinds("pair.0"),
            vec![
                TokenKind::Ident("pair".to_string()),
                TokenKind::Dot,
                TokenKind::Int(0),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_spans_are_byte_offsets() {
        let tokens = lex("  my_vec", FileId(3)).unwrap();
        assert_eq!(tokens[0].span, Span::new(FileId(3), 2, 8));
    }

    #[test]
    fn test_unexpected_character() {
        let err = lex("a @ b", FileId(0)).unwrap_err();
        assert_eq!(err.message, "unexpected character `@`");
        assert_eq!(err.span, Span::new(FileId(0), 2, 3));
    }

    #[test]
    fn test_unterminated_string() {
        let err = lex("\"abc", FileId(0)).unwrap_err();
        assert_eq!(err.message, "unterminated string literal");
    }
}
