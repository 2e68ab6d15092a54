//! Tokens and source positions
//!
//! A token is a type tag, the lexeme text it needs to carry (decoded
//! contents for strings, raw spelling for numbers and symbols, nothing
//! for punctuation and keywords), and the source position of its first
//! character. Numeric values are parsed on demand from the spelling.

use crate::error::LexError;

/// Position of a character in some input: file id plus 1-based line
/// and column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourcePos {
    pub file_id: u32,
    pub line: u32,
    pub col: u32,
}

impl SourcePos {
    pub fn new(file_id: u32, line: u32, col: u32) -> Self {
        SourcePos { file_id, line, col }
    }

    pub fn origin(file_id: u32) -> Self {
        SourcePos {
            file_id,
            line: 1,
            col: 1,
        }
    }

    /// Advance past one character.
    pub fn advance(&mut self, c: char) {
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
    }
}

impl std::fmt::Display for SourcePos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

/// The closed token set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    // literals
    Bool,
    I64,
    F64,
    Str,
    // identifier
    Symbol,
    // punctuation
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    LeftBrace,
    RightBrace,
    LeftAngle,
    RightAngle,
    Dot,
    Comma,
    Colon,
    DoubleColon,
    Semicolon,
    /// `=`
    SingleAssign,
    /// `:=`
    Assign,
    /// `->`
    Yields,
    Plus,
    Minus,
    Star,
    Slash,
    /// `==`
    CmpEq,
    /// `!=`
    CmpNe,
    // keywords
    Type,
    Def,
    Lambda,
    If,
    Then,
    Else,
    Let,
    In,
    End,
}

impl TokenType {
    /// Spelling for diagnostics and untokenized output.
    pub fn spelling(&self) -> &'static str {
        match self {
            TokenType::Bool => "<bool>",
            TokenType::I64 => "<i64>",
            TokenType::F64 => "<f64>",
            TokenType::Str => "<string>",
            TokenType::Symbol => "<symbol>",
            TokenType::LeftParen => "(",
            TokenType::RightParen => ")",
            TokenType::LeftBracket => "[",
            TokenType::RightBracket => "]",
            TokenType::LeftBrace => "{",
            TokenType::RightBrace => "}",
            TokenType::LeftAngle => "<",
            TokenType::RightAngle => ">",
            TokenType::Dot => ".",
            TokenType::Comma => ",",
            TokenType::Colon => ":",
            TokenType::DoubleColon => "::",
            TokenType::Semicolon => ";",
            TokenType::SingleAssign => "=",
            TokenType::Assign => ":=",
            TokenType::Yields => "->",
            TokenType::Plus => "+",
            TokenType::Minus => "-",
            TokenType::Star => "*",
            TokenType::Slash => "/",
            TokenType::CmpEq => "==",
            TokenType::CmpNe => "!=",
            TokenType::Type => "type",
            TokenType::Def => "def",
            TokenType::Lambda => "lambda",
            TokenType::If => "if",
            TokenType::Then => "then",
            TokenType::Else => "else",
            TokenType::Let => "let",
            TokenType::In => "in",
            TokenType::End => "end",
        }
    }
}

/// Keyword table; applied to a completed symbol lexeme.
pub fn keyword_of(lexeme: &str) -> Option<TokenType> {
    match lexeme {
        "type" => Some(TokenType::Type),
        "def" => Some(TokenType::Def),
        "lambda" => Some(TokenType::Lambda),
        "if" => Some(TokenType::If),
        "then" => Some(TokenType::Then),
        "else" => Some(TokenType::Else),
        "let" => Some(TokenType::Let),
        "in" => Some(TokenType::In),
        "end" => Some(TokenType::End),
        _ => None,
    }
}

/// One lexed token.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    ty: TokenType,
    text: String,
    pos: SourcePos,
}

impl Token {
    pub fn new(ty: TokenType, text: impl Into<String>, pos: SourcePos) -> Self {
        Token {
            ty,
            text: text.into(),
            pos,
        }
    }

    /// Punctuation or keyword token (carries no lexeme).
    pub fn punct(ty: TokenType, pos: SourcePos) -> Self {
        Token {
            ty,
            text: String::new(),
            pos,
        }
    }

    pub fn bool_token(value: bool, pos: SourcePos) -> Self {
        Token::new(
            TokenType::Bool,
            if value { "true" } else { "false" },
            pos,
        )
    }

    pub fn i64_token(text: impl Into<String>, pos: SourcePos) -> Self {
        Token::new(TokenType::I64, text, pos)
    }

    pub fn f64_token(text: impl Into<String>, pos: SourcePos) -> Self {
        Token::new(TokenType::F64, text, pos)
    }

    pub fn string_token(decoded: impl Into<String>, pos: SourcePos) -> Self {
        Token::new(TokenType::Str, decoded, pos)
    }

    pub fn symbol_token(text: impl Into<String>, pos: SourcePos) -> Self {
        Token::new(TokenType::Symbol, text, pos)
    }

    pub fn ty(&self) -> TokenType {
        self.ty
    }

    /// Lexeme text: decoded contents for strings, spelling for numbers
    /// and symbols, empty for punctuation and keywords.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn pos(&self) -> SourcePos {
        self.pos
    }

    /// Parsed value of an i64 literal: optional sign, decimal digits;
    /// leading zeros accepted.
    pub fn i64_value(&self) -> Result<i64, LexError> {
        debug_assert_eq!(self.ty, TokenType::I64);
        self.text.parse::<i64>().map_err(|e| {
            LexError::new(
                "token::i64_value",
                format!("malformed i64 literal '{}': {}", self.text, e),
                self.pos,
            )
        })
    }

    /// Parsed value of an f64 literal.
    pub fn f64_value(&self) -> Result<f64, LexError> {
        debug_assert_eq!(self.ty, TokenType::F64);
        self.text.parse::<f64>().map_err(|e| {
            LexError::new(
                "token::f64_value",
                format!("malformed f64 literal '{}': {}", self.text, e),
                self.pos,
            )
        })
    }

    pub fn bool_value(&self) -> bool {
        debug_assert_eq!(self.ty, TokenType::Bool);
        self.text == "true"
    }

    /// Canonical source spelling, such that untokenizing a token
    /// stream and re-scanning it reproduces the stream.
    pub fn untokenize(&self) -> String {
        match self.ty {
            TokenType::Bool | TokenType::I64 | TokenType::F64 | TokenType::Symbol => {
                self.text.clone()
            }
            TokenType::Str => format!("\"{}\"", skm_core::value::escape_str(&self.text)),
            _ => self.ty.spelling().to_string(),
        }
    }

    /// Display form for diagnostics.
    pub fn describe(&self) -> String {
        match self.ty {
            TokenType::Bool
            | TokenType::I64
            | TokenType::F64
            | TokenType::Symbol => format!("'{}'", self.text),
            TokenType::Str => format!("\"{}\"", self.text),
            _ => format!("'{}'", self.ty.spelling()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos() -> SourcePos {
        SourcePos::origin(0)
    }

    #[test]
    fn test_i64_value_parses_sign_and_leading_zeros() {
        assert_eq!(Token::i64_token("0012", pos()).i64_value().unwrap(), 12);
        assert_eq!(Token::i64_token("-7", pos()).i64_value().unwrap(), -7);
        assert_eq!(Token::i64_token("+7", pos()).i64_value().unwrap(), 7);
    }

    #[test]
    fn test_f64_value_fraction_and_exponent_forms() {
        for (text, want) in [
            ("12.", 12.0),
            (".12", 0.12),
            ("1e0", 1.0),
            ("1e-1", 0.1),
            ("+.5", 0.5),
            ("-2.5e2", -250.0),
        ] {
            assert_eq!(Token::f64_token(text, pos()).f64_value().unwrap(), want);
        }
    }

    #[test]
    fn test_keyword_table() {
        assert_eq!(keyword_of("lambda"), Some(TokenType::Lambda));
        assert_eq!(keyword_of("deffo"), None);
    }

    #[test]
    fn test_untokenize_string_restores_escapes() {
        let tk = Token::string_token("say \"hi\"\n", pos());
        assert_eq!(tk.untokenize(), "\"say \\\"hi\\\"\\n\"");
    }

    #[test]
    fn test_source_pos_advance() {
        let mut p = SourcePos::origin(0);
        p.advance('a');
        assert_eq!((p.line, p.col), (1, 2));
        p.advance('\n');
        assert_eq!((p.line, p.col), (2, 1));
    }
}
