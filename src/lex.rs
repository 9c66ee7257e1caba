use std::{borrow::Cow, fmt::Display};

use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

#[derive(Error, Debug, Diagnostic, Clone, PartialEq)]
pub enum LexError {
    #[error("unexpected character '{token}'")]
    #[diagnostic(
        code(lex::unexpected_character),
        help("remove or correct the character: `{token}`")
    )]
    UnexpectedCharacter {
        token: char,
        line: usize,
        column: usize,
        #[label("this character")]
        span: SourceSpan,
    },

    #[error("unterminated string")]
    #[diagnostic(code(lex::unterminated_string))]
    UnterminatedString {
        line: usize,
        column: usize,
        #[label("missing trailing `\"` to terminate the string literal")]
        span: SourceSpan,
    },

    #[error("invalid escape sequence '\\{escape}'")]
    #[diagnostic(
        code(lex::invalid_escape),
        help("the supported escapes are \\\", \\\\, \\n and \\t")
    )]
    InvalidEscape {
        escape: char,
        line: usize,
        column: usize,
        #[label("this escape")]
        span: SourceSpan,
    },

    #[error("numeric literal `{literal}` is out of range")]
    #[diagnostic(code(lex::number_out_of_range))]
    NumberTooLarge {
        literal: String,
        line: usize,
        column: usize,
        #[label("this numeric literal")]
        span: SourceSpan,
    },
}

impl LexError {
    pub fn line(&self) -> usize {
        match self {
            Self::UnexpectedCharacter { line, .. }
            | Self::UnterminatedString { line, .. }
            | Self::InvalidEscape { line, .. }
            | Self::NumberTooLarge { line, .. } => *line,
        }
    }

    pub fn column(&self) -> usize {
        match self {
            Self::UnexpectedCharacter { column, .. }
            | Self::UnterminatedString { column, .. }
            | Self::InvalidEscape { column, .. }
            | Self::NumberTooLarge { column, .. } => *column,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Token<'de> {
    pub kind: TokenKind,
    /// Source text of the token; string lexemes keep their quotes and escapes.
    pub lexeme: &'de str,
    pub line: usize,
    pub column: usize,
    /// Byte offset of the lexeme in the source text.
    pub offset: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TokenKind {
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    LeftBrace,
    RightBrace,
    Colon,
    Comma,
    Semicolon,
    Plus,
    Minus,
    Star,
    Slash,
    String,
    Integer(i64),
    Real(f64),
    /// Uppercase constant name.
    Name,
    /// Lowercase record key.
    Key,
    Array,
    Def,
    Chr,
    Len,
    Eof,
}

impl TokenKind {
    pub fn tag(&self) -> &'static str {
        match self {
            TokenKind::LeftParen => "LEFT_PAREN",
            TokenKind::RightParen => "RIGHT_PAREN",
            TokenKind::LeftBracket => "LEFT_BRACKET",
            TokenKind::RightBracket => "RIGHT_BRACKET",
            TokenKind::LeftBrace => "LEFT_BRACE",
            TokenKind::RightBrace => "RIGHT_BRACE",
            TokenKind::Colon => "COLON",
            TokenKind::Comma => "COMMA",
            TokenKind::Semicolon => "SEMICOLON",
            TokenKind::Plus => "PLUS",
            TokenKind::Minus => "MINUS",
            TokenKind::Star => "STAR",
            TokenKind::Slash => "SLASH",
            TokenKind::String => "STRING",
            TokenKind::Integer(_) => "INTEGER",
            TokenKind::Real(_) => "REAL",
            TokenKind::Name => "NAME",
            TokenKind::Key => "KEY",
            TokenKind::Array => "ARRAY",
            TokenKind::Def => "DEF",
            TokenKind::Chr => "CHR",
            TokenKind::Len => "LEN",
            TokenKind::Eof => "EOF",
        }
    }
}

/// Human readable form used in parse error messages.
impl Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenKind::LeftParen => write!(f, "`(`"),
            TokenKind::RightParen => write!(f, "`)`"),
            TokenKind::LeftBracket => write!(f, "`[`"),
            TokenKind::RightBracket => write!(f, "`]`"),
            TokenKind::LeftBrace => write!(f, "`{{`"),
            TokenKind::RightBrace => write!(f, "`}}`"),
            TokenKind::Colon => write!(f, "`:`"),
            TokenKind::Comma => write!(f, "`,`"),
            TokenKind::Semicolon => write!(f, "`;`"),
            TokenKind::Plus => write!(f, "`+`"),
            TokenKind::Minus => write!(f, "`-`"),
            TokenKind::Star => write!(f, "`*`"),
            TokenKind::Slash => write!(f, "`/`"),
            TokenKind::String => write!(f, "string"),
            TokenKind::Integer(_) | TokenKind::Real(_) => write!(f, "number"),
            TokenKind::Name => write!(f, "constant name"),
            TokenKind::Key => write!(f, "key"),
            TokenKind::Array => write!(f, "`array`"),
            TokenKind::Def => write!(f, "`def`"),
            TokenKind::Chr => write!(f, "`chr`"),
            TokenKind::Len => write!(f, "`len`"),
            TokenKind::Eof => write!(f, "end of input"),
        }
    }
}

impl Display for Token<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ", self.kind.tag())?;
        if self.kind == TokenKind::String {
            // raw line breaks inside a literal would split the line
            for c in self.lexeme.chars() {
                match c {
                    '\n' => f.write_str("\\n")?,
                    '\r' => f.write_str("\\r")?,
                    '\t' => f.write_str("\\t")?,
                    c => write!(f, "{c}")?,
                }
            }
        } else {
            f.write_str(self.lexeme)?;
        }
        write!(f, " {}:{}", self.line, self.column)
    }
}

impl<'de> Token<'de> {
    pub fn span(&self) -> SourceSpan {
        SourceSpan::from(self.offset..self.offset + self.lexeme.len())
    }

    /// Content of a string token with quotes removed and escapes resolved.
    ///
    /// The lexer only produces string tokens whose escapes are valid, so this
    /// never fails. For any other kind of token the lexeme is returned as is.
    pub fn unescape(&self) -> Cow<'de, str> {
        if self.kind != TokenKind::String {
            return Cow::Borrowed(self.lexeme);
        }
        let inner = &self.lexeme[1..self.lexeme.len() - 1];
        if !inner.contains('\\') {
            return Cow::Borrowed(inner);
        }

        let mut text = String::with_capacity(inner.len());
        let mut chars = inner.chars();
        while let Some(c) = chars.next() {
            if c != '\\' {
                text.push(c);
                continue;
            }
            match chars.next() {
                Some('n') => text.push('\n'),
                Some('t') => text.push('\t'),
                Some(other) => text.push(other),
                None => {}
            }
        }
        Cow::Owned(text)
    }
}

/// Moves a 1-based line/column pair past `text`.
pub(crate) fn locate(mut line: usize, mut column: usize, text: &str) -> (usize, usize) {
    for c in text.chars() {
        if c == '\n' {
            line += 1;
            column = 1;
        } else {
            column += 1;
        }
    }
    (line, column)
}

pub struct Lexer<'de> {
    rest: &'de str,
    pub byte: usize,
    line: usize,
    column: usize,
    finished: bool,
}

impl<'de> Lexer<'de> {
    pub fn new(input: &'de str) -> Self {
        Lexer {
            rest: input,
            byte: 0,
            line: 1,
            column: 1,
            finished: false,
        }
    }

    /// Consumes `len` bytes of input, keeping line and column in step.
    fn bump(&mut self, len: usize) -> &'de str {
        let (taken, rest) = self.rest.split_at(len);
        (self.line, self.column) = locate(self.line, self.column, taken);
        self.byte += len;
        self.rest = rest;
        taken
    }

    /// Length in bytes of the string literal at the start of the input,
    /// quotes included.
    fn scan_string(&self) -> Result<usize, LexError> {
        let cur = self.rest;
        let mut chars = cur.char_indices().skip(1);
        while let Some((i, c)) = chars.next() {
            match c {
                '"' => return Ok(i + 1),
                '\\' => match chars.next() {
                    Some((_, '"' | '\\' | 'n' | 't')) => {}
                    Some((j, escape)) => {
                        let (line, column) = locate(self.line, self.column, &cur[..i]);
                        return Err(LexError::InvalidEscape {
                            escape,
                            line,
                            column,
                            span: SourceSpan::from(
                                self.byte + i..self.byte + j + escape.len_utf8(),
                            ),
                        });
                    }
                    None => break,
                },
                _ => {}
            }
        }
        Err(LexError::UnterminatedString {
            line: self.line,
            column: self.column,
            span: SourceSpan::from(self.byte..self.byte + cur.len()),
        })
    }
}

impl<'de> Iterator for Lexer<'de> {
    type Item = Result<Token<'de>, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        loop {
            let (line, column, offset) = (self.line, self.column, self.byte);
            let token = move |kind: TokenKind, lexeme: &'de str| Token {
                kind,
                lexeme,
                line,
                column,
                offset,
            };

            let Some(c) = self.rest.chars().next() else {
                self.finished = true;
                return Some(Ok(token(TokenKind::Eof, "")));
            };
            let cur = self.rest;

            enum Start {
                Single(TokenKind),
                Comment,
                String,
                Name,
                Key,
                Number,
            }

            let started = match c {
                '(' => Start::Single(TokenKind::LeftParen),
                ')' => Start::Single(TokenKind::RightParen),
                '[' => Start::Single(TokenKind::LeftBracket),
                ']' => Start::Single(TokenKind::RightBracket),
                '{' => Start::Single(TokenKind::LeftBrace),
                '}' => Start::Single(TokenKind::RightBrace),
                ':' => Start::Single(TokenKind::Colon),
                ',' => Start::Single(TokenKind::Comma),
                ';' => Start::Single(TokenKind::Semicolon),
                '+' => Start::Single(TokenKind::Plus),
                '-' => Start::Single(TokenKind::Minus),
                '*' => Start::Single(TokenKind::Star),
                '/' => Start::Single(TokenKind::Slash),
                '%' => Start::Comment,
                '"' => Start::String,
                'A'..='Z' | '_' => Start::Name,
                'a'..='z' => Start::Key,
                '0'..='9' => Start::Number,
                c if c.is_whitespace() => {
                    self.bump(c.len_utf8());
                    continue;
                }
                c => {
                    self.finished = true;
                    return Some(Err(LexError::UnexpectedCharacter {
                        token: c,
                        line,
                        column,
                        span: SourceSpan::from(offset..offset + c.len_utf8()),
                    }));
                }
            };

            match started {
                Start::Single(kind) => {
                    let lexeme = self.bump(c.len_utf8());
                    return Some(Ok(token(kind, lexeme)));
                }
                Start::Comment => {
                    let end = cur.find('\n').unwrap_or(cur.len());
                    self.bump(end);
                    continue;
                }
                Start::String => {
                    return match self.scan_string() {
                        Ok(len) => Some(Ok(token(TokenKind::String, self.bump(len)))),
                        Err(e) => {
                            self.finished = true;
                            Some(Err(e))
                        }
                    };
                }
                Start::Name => {
                    let end = cur
                        .find(|c: char| !matches!(c, 'A'..='Z' | '0'..='9' | '_'))
                        .unwrap_or(cur.len());
                    let lexeme = self.bump(end);
                    return Some(Ok(token(TokenKind::Name, lexeme)));
                }
                Start::Key => {
                    let end = cur
                        .find(|c: char| !matches!(c, 'a'..='z' | '0'..='9' | '_'))
                        .unwrap_or(cur.len());
                    let lexeme = self.bump(end);

                    let kind = match lexeme {
                        "array" => TokenKind::Array,
                        "def" => TokenKind::Def,
                        "chr" => TokenKind::Chr,
                        "len" => TokenKind::Len,
                        _ => TokenKind::Key,
                    };

                    return Some(Ok(token(kind, lexeme)));
                }
                Start::Number => {
                    let digits =
                        |s: &str| s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());

                    // a fraction needs at least one digit after the dot
                    let whole = digits(cur);
                    let fraction = cur[whole..]
                        .strip_prefix('.')
                        .map(digits)
                        .filter(|&n| n > 0);
                    let end = fraction.map_or(whole, |n| whole + 1 + n);
                    let lexeme = self.bump(end);

                    let kind = match fraction {
                        Some(_) => lexeme
                            .parse::<f64>()
                            .ok()
                            .filter(|n| n.is_finite())
                            .map(TokenKind::Real),
                        None => lexeme.parse::<i64>().ok().map(TokenKind::Integer),
                    };

                    return match kind {
                        Some(kind) => Some(Ok(token(kind, lexeme))),
                        None => {
                            self.finished = true;
                            Some(Err(LexError::NumberTooLarge {
                                literal: lexeme.to_string(),
                                line,
                                column,
                                span: SourceSpan::from(offset..offset + lexeme.len()),
                            }))
                        }
                    };
                }
            }
        }
    }
}

/// Tokenizes the whole input. The last token is always [`TokenKind::Eof`].
pub fn tokenize(input: &str) -> Result<Vec<Token<'_>>, LexError> {
    Lexer::new(input).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input)
            .expect("input should tokenize")
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn punctuation_and_operators() {
        assert_eq!(
            kinds("( ) [ ] { } : , ; + - * /"),
            vec![
                TokenKind::LeftParen,
                TokenKind::RightParen,
                TokenKind::LeftBracket,
                TokenKind::RightBracket,
                TokenKind::LeftBrace,
                TokenKind::RightBrace,
                TokenKind::Colon,
                TokenKind::Comma,
                TokenKind::Semicolon,
                TokenKind::Plus,
                TokenKind::Minus,
                TokenKind::Star,
                TokenKind::Slash,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn keywords_keys_and_names() {
        assert_eq!(
            kinds("array def chr len arrays keep_alive MAX_SIZE2 _HIDDEN"),
            vec![
                TokenKind::Array,
                TokenKind::Def,
                TokenKind::Chr,
                TokenKind::Len,
                TokenKind::Key,
                TokenKind::Key,
                TokenKind::Name,
                TokenKind::Name,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn keywords_are_lowercase_only() {
        assert_eq!(
            kinds("DEF"),
            vec![TokenKind::Name, TokenKind::Eof],
        );
        // an uppercase run followed by lowercase letters splits into two tokens
        assert_eq!(
            kinds("Array"),
            vec![TokenKind::Name, TokenKind::Key, TokenKind::Eof],
        );
    }

    #[test]
    fn numbers() {
        assert_eq!(
            kinds("0 42 3.25 007"),
            vec![
                TokenKind::Integer(0),
                TokenKind::Integer(42),
                TokenKind::Real(3.25),
                TokenKind::Integer(7),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn dot_without_digits_is_not_part_of_a_number() {
        let err = tokenize("7.").unwrap_err();
        assert_eq!(
            err,
            LexError::UnexpectedCharacter {
                token: '.',
                line: 1,
                column: 2,
                span: SourceSpan::from(1..2),
            }
        );
    }

    #[test]
    fn integer_out_of_range() {
        let err = tokenize("99999999999999999999").unwrap_err();
        assert!(matches!(err, LexError::NumberTooLarge { line: 1, column: 1, .. }));
    }

    #[test]
    fn comments_and_whitespace_are_discarded() {
        assert_eq!(
            kinds("% a comment\n  1 % trailing ) comment\n\t2"),
            vec![TokenKind::Integer(1), TokenKind::Integer(2), TokenKind::Eof]
        );
    }

    #[test]
    fn positions_track_lines_and_columns() {
        let tokens = tokenize("% header\n(def A 1);\n  \"π\" B").unwrap();
        let positions: Vec<_> = tokens
            .iter()
            .map(|token| (token.lexeme, token.line, token.column))
            .collect();
        assert_eq!(
            positions,
            vec![
                ("(", 2, 1),
                ("def", 2, 2),
                ("A", 2, 6),
                ("1", 2, 8),
                (")", 2, 9),
                (";", 2, 10),
                ("\"π\"", 3, 3),
                ("B", 3, 7),
                ("", 3, 8),
            ]
        );
    }

    #[test]
    fn byte_offsets_account_for_multibyte_characters() {
        let tokens = tokenize("\"é\" X").unwrap();
        assert_eq!(tokens[1].offset, 5);
        assert_eq!(tokens[1].column, 5);
        assert_eq!(tokens[1].span(), SourceSpan::from(5..6));
    }

    #[test]
    fn strings_are_unescaped() {
        let tokens = tokenize(r#""plain" "a\"b\\c\nd\te""#).unwrap();
        assert_eq!(tokens[0].unescape(), "plain");
        assert!(matches!(tokens[0].unescape(), Cow::Borrowed(_)));
        assert_eq!(tokens[1].unescape(), "a\"b\\c\nd\te");
    }

    #[test]
    fn string_may_span_lines() {
        let tokens = tokenize("\"a\nb\" X").unwrap();
        assert_eq!(tokens[0].unescape(), "a\nb");
        assert_eq!((tokens[1].line, tokens[1].column), (2, 4));
    }

    #[test]
    fn unterminated_string() {
        let err = tokenize("1\n  \"abc").unwrap_err();
        assert_eq!(
            err,
            LexError::UnterminatedString {
                line: 2,
                column: 3,
                span: SourceSpan::from(4..8),
            }
        );
    }

    #[test]
    fn escaped_quote_does_not_terminate_string() {
        assert!(matches!(
            tokenize(r#""abc\""#),
            Err(LexError::UnterminatedString { .. })
        ));
    }

    #[test]
    fn invalid_escape() {
        let err = tokenize(r#""ab\qc""#).unwrap_err();
        assert_eq!(
            err,
            LexError::InvalidEscape {
                escape: 'q',
                line: 1,
                column: 4,
                span: SourceSpan::from(3..5),
            }
        );
    }

    #[test]
    fn unexpected_character_reports_position() {
        let err = tokenize("(def A 1);\n  @").unwrap_err();
        assert_eq!(err.line(), 2);
        assert_eq!(err.column(), 3);
        assert!(matches!(err, LexError::UnexpectedCharacter { token: '@', .. }));
    }

    #[test]
    fn lexer_stops_after_an_error() {
        let mut lexer = Lexer::new("@ 1");
        assert!(matches!(lexer.next(), Some(Err(_))));
        assert!(lexer.next().is_none());
    }

    #[test]
    fn token_display() {
        let tokens = tokenize("(def A 12);").unwrap();
        let lines: Vec<_> = tokens.iter().map(ToString::to_string).collect();
        assert_eq!(
            lines,
            vec![
                "LEFT_PAREN ( 1:1",
                "DEF def 1:2",
                "NAME A 1:6",
                "INTEGER 12 1:8",
                "RIGHT_PAREN ) 1:10",
                "SEMICOLON ; 1:11",
                "EOF  1:12",
            ]
        );
    }

    #[test]
    fn multi_line_string_displays_on_one_line() {
        let tokens = tokenize("\"a\n\tb\" 1").unwrap();
        assert_eq!(tokens[0].to_string(), "STRING \"a\\n\\tb\" 1:1");
        assert_eq!(tokens[1].to_string(), "INTEGER 1 2:5");
    }
}
