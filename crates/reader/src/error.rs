//! Reader error types
//!
//! Lexical and syntactic diagnostics both carry the source function
//! that detected the problem and the position of the offending input,
//! and both render the standard caret display:
//!
//! ```text
//! syntax error (detected in define_ssm::on_token): expected expression, got ';'
//! def foo : f64 = ;
//!                 ^
//! ```

use crate::token::SourcePos;

/// Lexical error from the tokenizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    /// Scanner function that detected the problem
    pub src_fn: &'static str,
    pub message: String,
    pub pos: SourcePos,
}

impl LexError {
    pub fn new(src_fn: &'static str, message: impl Into<String>, pos: SourcePos) -> Self {
        LexError {
            src_fn,
            message: message.into(),
            pos,
        }
    }

    /// Render with the offending source line and a caret under the
    /// detection column.
    pub fn report(&self, line_text: &str) -> String {
        format!("{}\n{}", self, caret_display(line_text, self.pos.col))
    }
}

impl std::fmt::Display for LexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "lexical error (detected in {}): {} at {}",
            self.src_fn, self.message, self.pos
        )
    }
}

impl std::error::Error for LexError {}

/// Syntactic error from the parser: a token the current syntax state
/// does not admit, an unbound symbol, an unknown type name, or EOF
/// with an incomplete form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// Syntax-state handler that rejected the input
    pub src_fn: &'static str,
    /// What the rejecting state was waiting for
    pub expect: &'static str,
    pub message: String,
    pub pos: SourcePos,
}

impl ParseError {
    pub fn new(
        src_fn: &'static str,
        expect: &'static str,
        message: impl Into<String>,
        pos: SourcePos,
    ) -> Self {
        ParseError {
            src_fn,
            expect,
            message: message.into(),
            pos,
        }
    }

    pub fn report(&self, line_text: &str) -> String {
        format!("{}\n{}", self, caret_display(line_text, self.pos.col))
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "syntax error (detected in {}): {} at {}",
            self.src_fn, self.message, self.pos
        )
    }
}

impl std::error::Error for ParseError {}

/// Either reader-stage failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderError {
    Lex(LexError),
    Parse(ParseError),
}

impl ReaderError {
    pub fn pos(&self) -> SourcePos {
        match self {
            ReaderError::Lex(e) => e.pos,
            ReaderError::Parse(e) => e.pos,
        }
    }

    pub fn report(&self, line_text: &str) -> String {
        match self {
            ReaderError::Lex(e) => e.report(line_text),
            ReaderError::Parse(e) => e.report(line_text),
        }
    }
}

impl std::fmt::Display for ReaderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReaderError::Lex(e) => e.fmt(f),
            ReaderError::Parse(e) => e.fmt(f),
        }
    }
}

impl std::error::Error for ReaderError {}

impl From<LexError> for ReaderError {
    fn from(e: LexError) -> Self {
        ReaderError::Lex(e)
    }
}

impl From<ParseError> for ReaderError {
    fn from(e: ParseError) -> Self {
        ReaderError::Parse(e)
    }
}

/// The source line followed by a caret under `col` (1-based).
pub fn caret_display(line_text: &str, col: u32) -> String {
    let line = line_text.trim_end_matches(['\n', '\r']);
    let pad = col.saturating_sub(1) as usize;
    format!("{}\n{}^", line, " ".repeat(pad))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caret_under_column() {
        let display = caret_display("def foo : f64 = ;", 17);
        let mut lines = display.lines();
        assert_eq!(lines.next(), Some("def foo : f64 = ;"));
        let caret = lines.next().unwrap();
        assert_eq!(caret.len(), 17);
        assert!(caret.ends_with('^'));
    }

    #[test]
    fn test_lex_error_display() {
        let e = LexError::new(
            "tokenizer::scan",
            "unterminated string literal",
            SourcePos::new(0, 2, 5),
        );
        let s = e.to_string();
        assert!(s.starts_with("lexical error (detected in tokenizer::scan)"));
        assert!(s.contains("2:5"));
    }

    #[test]
    fn test_parse_error_report_has_caret() {
        let e = ParseError::new(
            "define_ssm::on_token",
            "expression",
            "expected expression, got ';'",
            SourcePos::new(0, 1, 17),
        );
        let r = e.report("def foo : f64 = ;");
        assert!(r.contains('^'));
        assert!(r.starts_with("syntax error"));
    }
}
