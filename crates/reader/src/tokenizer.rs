//! Resumable lexical scanner
//!
//! `scan` consumes a byte span and classifies a prefix of it as one
//! token. The scanner's state is an explicit object, so input may be
//! cut at any byte boundary: when a span runs out mid-lexeme the
//! partial prefix stays in the scanner and the next call resumes as if
//! the spans had been concatenated. `notify_eof` flushes the final
//! lexeme or reports it unfinishable.
//!
//! Boundary rules: numeric lexemes end at the first character that is
//! not a digit, dot, or exponent part; symbols end at the first
//! non-identifier character; punctuation is greedy (`::` beats `:`,
//! `:=` beats `:`, `->` beats `-`, `==` beats `=`, `!=` beats `!`).
//! `+` and `-` begin a numeric literal when a digit or dot follows.

use crate::error::LexError;
use crate::span::Span;
use crate::token::{SourcePos, Token, TokenType, keyword_of};
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FloatPhase {
    /// Consuming digits after the decimal point
    Fraction,
    /// Just consumed `e` / `E`
    ExpMark,
    /// Consumed the exponent sign
    ExpSign,
    /// Consuming exponent digits
    ExpDigits,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StrPhase {
    Normal,
    Backslash,
    /// Seen `\0`; only `\033` is admitted
    Oct0,
    /// Seen `\03`
    Oct3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Start,
    InInteger,
    InFloat(FloatPhase),
    InSymbol,
    InString(StrPhase),
    /// Single pending punctuation character that may extend: one of
    /// `: = - + ! .`
    InOperator,
}

/// Result of one `scan` call.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanOutput {
    /// Completed token, if the span held one
    pub token: Option<Token>,
    /// Prefix of the input that was consumed
    pub consumed: Span,
    pub error: Option<LexError>,
}

enum Step {
    /// Character absorbed into the current lexeme
    Consume,
    /// Character absorbed and a token completed
    Emit(Token),
    /// Token completed; the character belongs to the next lexeme
    EmitKeep(Token),
    Error(LexError),
}

/// The resumable scanner.
pub struct Tokenizer {
    state: ScanState,
    /// Raw lexeme retained across spans
    prefix: String,
    /// Decoded string-literal contents
    decoded: String,
    tk_start: SourcePos,
    pos: SourcePos,
}

impl Tokenizer {
    pub fn new(file_id: u32) -> Self {
        let origin = SourcePos::origin(file_id);
        Tokenizer {
            state: ScanState::Start,
            prefix: String::new(),
            decoded: String::new(),
            tk_start: origin,
            pos: origin,
        }
    }

    /// Current input cursor.
    pub fn position(&self) -> SourcePos {
        self.pos
    }

    /// Whether a partial lexeme is pending from an earlier span.
    pub fn has_partial(&self) -> bool {
        self.state != ScanState::Start
    }

    /// Discard any partial lexeme. Used for error recovery; the
    /// scanner returns to `Start`.
    pub fn discard_partial(&mut self) {
        self.state = ScanState::Start;
        self.prefix.clear();
        self.decoded.clear();
    }

    /// Advance the position cursor over `text` without scanning it.
    /// Used when the reader discards the rest of an offending line.
    pub fn skip_bytes(&mut self, text: &str) {
        for c in text.chars() {
            self.pos.advance(c);
        }
    }

    /// Scan one token from `input` (offsets into `buf`).
    ///
    /// Exactly one of the following holds on return:
    /// - `token` is set: a token completed; `consumed` covers it,
    /// - `error` is set: the consumed prefix was not scannable,
    /// - neither: the span ran out mid-lexeme (or held only
    ///   whitespace); state is retained for the next call.
    pub fn scan(&mut self, buf: &str, input: Span) -> ScanOutput {
        let text = input.text(buf);
        let mut consumed = 0usize;
        for (ix, c) in text.char_indices() {
            match self.step(c) {
                Step::Consume => {
                    consumed = ix + c.len_utf8();
                    self.pos.advance(c);
                }
                Step::Emit(tok) => {
                    consumed = ix + c.len_utf8();
                    self.pos.advance(c);
                    trace!(token = ?tok.ty(), "scan emit");
                    return ScanOutput {
                        token: Some(tok),
                        consumed: input.prefix(consumed),
                        error: None,
                    };
                }
                Step::EmitKeep(tok) => {
                    trace!(token = ?tok.ty(), "scan emit (keep terminator)");
                    return ScanOutput {
                        token: Some(tok),
                        consumed: input.prefix(consumed),
                        error: None,
                    };
                }
                Step::Error(e) => {
                    consumed = ix + c.len_utf8();
                    self.pos.advance(c);
                    self.reset_lexeme();
                    return ScanOutput {
                        token: None,
                        consumed: input.prefix(consumed),
                        error: Some(e),
                    };
                }
            }
        }
        // span exhausted; partial state (if any) is retained
        ScanOutput {
            token: None,
            consumed: input.prefix(consumed),
            error: None,
        }
    }

    /// Assert end of input: complete the pending lexeme if it forms a
    /// token, report an error if it cannot.
    pub fn notify_eof(&mut self) -> Result<Option<Token>, LexError> {
        match self.state {
            ScanState::Start => Ok(None),
            ScanState::InString(_) => {
                let e = LexError::new(
                    "tokenizer::notify_eof",
                    "unterminated string literal",
                    self.tk_start,
                );
                self.reset_lexeme();
                Err(e)
            }
            _ => {
                let r = self.classify_pending();
                self.reset_lexeme();
                r.map(Some)
            }
        }
    }

    fn reset_lexeme(&mut self) {
        self.state = ScanState::Start;
        self.prefix.clear();
        self.decoded.clear();
    }

    fn step(&mut self, c: char) -> Step {
        match self.state {
            ScanState::Start => self.step_start(c),
            ScanState::InInteger => self.step_integer(c),
            ScanState::InFloat(phase) => self.step_float(phase, c),
            ScanState::InSymbol => self.step_symbol(c),
            ScanState::InString(phase) => self.step_string(phase, c),
            ScanState::InOperator => self.step_operator(c),
        }
    }

    fn step_start(&mut self, c: char) -> Step {
        if c.is_whitespace() {
            return Step::Consume;
        }
        self.tk_start = self.pos;
        match c {
            '0'..='9' => {
                self.prefix.push(c);
                self.state = ScanState::InInteger;
                Step::Consume
            }
            c if c.is_alphabetic() || c == '_' => {
                self.prefix.push(c);
                self.state = ScanState::InSymbol;
                Step::Consume
            }
            '"' => {
                self.state = ScanState::InString(StrPhase::Normal);
                Step::Consume
            }
            ':' | '=' | '-' | '+' | '!' | '.' => {
                self.prefix.push(c);
                self.state = ScanState::InOperator;
                Step::Consume
            }
            '(' => Step::Emit(Token::punct(TokenType::LeftParen, self.tk_start)),
            ')' => Step::Emit(Token::punct(TokenType::RightParen, self.tk_start)),
            '[' => Step::Emit(Token::punct(TokenType::LeftBracket, self.tk_start)),
            ']' => Step::Emit(Token::punct(TokenType::RightBracket, self.tk_start)),
            '{' => Step::Emit(Token::punct(TokenType::LeftBrace, self.tk_start)),
            '}' => Step::Emit(Token::punct(TokenType::RightBrace, self.tk_start)),
            '<' => Step::Emit(Token::punct(TokenType::LeftAngle, self.tk_start)),
            '>' => Step::Emit(Token::punct(TokenType::RightAngle, self.tk_start)),
            ',' => Step::Emit(Token::punct(TokenType::Comma, self.tk_start)),
            ';' => Step::Emit(Token::punct(TokenType::Semicolon, self.tk_start)),
            '*' => Step::Emit(Token::punct(TokenType::Star, self.tk_start)),
            '/' => Step::Emit(Token::punct(TokenType::Slash, self.tk_start)),
            _ => Step::Error(LexError::new(
                "tokenizer::scan",
                format!("stray character '{c}'"),
                self.pos,
            )),
        }
    }

    fn step_integer(&mut self, c: char) -> Step {
        match c {
            '0'..='9' => {
                self.prefix.push(c);
                Step::Consume
            }
            '.' => {
                self.prefix.push(c);
                self.state = ScanState::InFloat(FloatPhase::Fraction);
                Step::Consume
            }
            'e' | 'E' => {
                self.prefix.push(c);
                self.state = ScanState::InFloat(FloatPhase::ExpMark);
                Step::Consume
            }
            _ => self.finish_keep(),
        }
    }

    fn step_float(&mut self, phase: FloatPhase, c: char) -> Step {
        match (phase, c) {
            (FloatPhase::Fraction, '0'..='9') => {
                self.prefix.push(c);
                Step::Consume
            }
            (FloatPhase::Fraction, 'e' | 'E') => {
                self.prefix.push(c);
                self.state = ScanState::InFloat(FloatPhase::ExpMark);
                Step::Consume
            }
            (FloatPhase::ExpMark, '+' | '-') => {
                self.prefix.push(c);
                self.state = ScanState::InFloat(FloatPhase::ExpSign);
                Step::Consume
            }
            (FloatPhase::ExpMark | FloatPhase::ExpSign | FloatPhase::ExpDigits, '0'..='9') => {
                self.prefix.push(c);
                self.state = ScanState::InFloat(FloatPhase::ExpDigits);
                Step::Consume
            }
            _ => self.finish_keep(),
        }
    }

    fn step_symbol(&mut self, c: char) -> Step {
        if c.is_alphanumeric() || c == '_' {
            self.prefix.push(c);
            Step::Consume
        } else {
            self.finish_keep()
        }
    }

    fn step_string(&mut self, phase: StrPhase, c: char) -> Step {
        match (phase, c) {
            (StrPhase::Normal, '"') => {
                let tok = Token::string_token(std::mem::take(&mut self.decoded), self.tk_start);
                self.reset_lexeme();
                Step::Emit(tok)
            }
            (StrPhase::Normal, '\\') => {
                self.state = ScanState::InString(StrPhase::Backslash);
                Step::Consume
            }
            (StrPhase::Normal, _) => {
                self.decoded.push(c);
                Step::Consume
            }
            (StrPhase::Backslash, 'n') => self.push_decoded('\n'),
            (StrPhase::Backslash, 'r') => self.push_decoded('\r'),
            (StrPhase::Backslash, 't') => self.push_decoded('\t'),
            (StrPhase::Backslash, '"') => self.push_decoded('"'),
            (StrPhase::Backslash, '\\') => self.push_decoded('\\'),
            (StrPhase::Backslash, '0') => {
                self.state = ScanState::InString(StrPhase::Oct0);
                Step::Consume
            }
            (StrPhase::Backslash, other) => Step::Error(LexError::new(
                "tokenizer::scan",
                format!("unknown escape sequence '\\{other}' in string literal"),
                self.pos,
            )),
            (StrPhase::Oct0, '3') => {
                self.state = ScanState::InString(StrPhase::Oct3);
                Step::Consume
            }
            (StrPhase::Oct3, '3') => self.push_decoded('\x1b'),
            (StrPhase::Oct0 | StrPhase::Oct3, other) => Step::Error(LexError::new(
                "tokenizer::scan",
                format!("unknown escape sequence '\\0..{other}' in string literal"),
                self.pos,
            )),
        }
    }

    fn push_decoded(&mut self, c: char) -> Step {
        self.decoded.push(c);
        self.state = ScanState::InString(StrPhase::Normal);
        Step::Consume
    }

    fn step_operator(&mut self, c: char) -> Step {
        let pending = self.prefix.chars().next().expect("operator state has a pending char");
        match (pending, c) {
            (':', ':') => self.emit_operator(TokenType::DoubleColon),
            (':', '=') => self.emit_operator(TokenType::Assign),
            ('=', '=') => self.emit_operator(TokenType::CmpEq),
            ('-', '>') => self.emit_operator(TokenType::Yields),
            ('!', '=') => self.emit_operator(TokenType::CmpNe),
            ('-' | '+', '0'..='9') => {
                self.prefix.push(c);
                self.state = ScanState::InInteger;
                Step::Consume
            }
            ('-' | '+' | '.', '0'..='9') | ('-' | '+', '.') => {
                self.prefix.push(c);
                self.state = ScanState::InFloat(FloatPhase::Fraction);
                Step::Consume
            }
            ('!', _) => Step::Error(LexError::new(
                "tokenizer::scan",
                "stray character '!'".to_string(),
                self.tk_start,
            )),
            _ => self.finish_keep(),
        }
    }

    fn emit_operator(&mut self, ty: TokenType) -> Step {
        let tok = Token::punct(ty, self.tk_start);
        self.reset_lexeme();
        Step::Emit(tok)
    }

    /// Terminator character seen: classify the pending lexeme and keep
    /// the character for the next call.
    fn finish_keep(&mut self) -> Step {
        match self.classify_pending() {
            Ok(tok) => {
                self.reset_lexeme();
                Step::EmitKeep(tok)
            }
            Err(e) => Step::Error(e),
        }
    }

    /// Turn the pending lexeme into a token.
    fn classify_pending(&mut self) -> Result<Token, LexError> {
        match self.state {
            ScanState::InInteger => Ok(Token::i64_token(self.prefix.clone(), self.tk_start)),
            ScanState::InFloat(phase) => {
                let well_formed = !matches!(phase, FloatPhase::ExpMark | FloatPhase::ExpSign)
                    && self.prefix.parse::<f64>().is_ok();
                if well_formed {
                    Ok(Token::f64_token(self.prefix.clone(), self.tk_start))
                } else {
                    Err(LexError::new(
                        "tokenizer::scan",
                        format!("malformed numeric literal '{}'", self.prefix),
                        self.tk_start,
                    ))
                }
            }
            ScanState::InSymbol => {
                if let Some(kw) = keyword_of(&self.prefix) {
                    Ok(Token::punct(kw, self.tk_start))
                } else if self.prefix == "true" || self.prefix == "false" {
                    Ok(Token::bool_token(self.prefix == "true", self.tk_start))
                } else {
                    Ok(Token::symbol_token(self.prefix.clone(), self.tk_start))
                }
            }
            ScanState::InOperator => {
                let ty = match self.prefix.as_str() {
                    ":" => TokenType::Colon,
                    "=" => TokenType::SingleAssign,
                    "-" => TokenType::Minus,
                    "+" => TokenType::Plus,
                    "." => TokenType::Dot,
                    "!" => {
                        return Err(LexError::new(
                            "tokenizer::scan",
                            "stray character '!'".to_string(),
                            self.tk_start,
                        ));
                    }
                    other => {
                        return Err(LexError::new(
                            "tokenizer::scan",
                            format!("stray character '{other}'"),
                            self.tk_start,
                        ));
                    }
                };
                Ok(Token::punct(ty, self.tk_start))
            }
            ScanState::Start | ScanState::InString(_) => {
                unreachable!("classify_pending on state without a pending lexeme")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Scan every token out of `input` in one pass, asserting EOF at
    /// the end.
    fn scan_all(input: &str) -> Vec<Token> {
        let mut tkz = Tokenizer::new(0);
        let mut tokens = Vec::new();
        let mut rest = Span::all(input);
        loop {
            let out = tkz.scan(input, rest);
            assert!(out.error.is_none(), "unexpected error: {:?}", out.error);
            rest = rest.suffix_after(out.consumed);
            match out.token {
                Some(tok) => tokens.push(tok),
                None => break,
            }
        }
        if let Some(tok) = tkz.notify_eof().unwrap() {
            tokens.push(tok);
        }
        tokens
    }

    fn types(tokens: &[Token]) -> Vec<TokenType> {
        tokens.iter().map(|t| t.ty()).collect()
    }

    #[test]
    fn test_punctuation_tokens() {
        let toks = scan_all("( ) [ ] { } < > . , : :: ; = := -> + - * / == !=");
        assert_eq!(
            types(&toks),
            vec![
                TokenType::LeftParen,
                TokenType::RightParen,
                TokenType::LeftBracket,
                TokenType::RightBracket,
                TokenType::LeftBrace,
                TokenType::RightBrace,
                TokenType::LeftAngle,
                TokenType::RightAngle,
                TokenType::Dot,
                TokenType::Comma,
                TokenType::Colon,
                TokenType::DoubleColon,
                TokenType::Semicolon,
                TokenType::SingleAssign,
                TokenType::Assign,
                TokenType::Yields,
                TokenType::Plus,
                TokenType::Minus,
                TokenType::Star,
                TokenType::Slash,
                TokenType::CmpEq,
                TokenType::CmpNe,
            ]
        );
    }

    #[test]
    fn test_keywords_and_symbols() {
        let toks = scan_all("type def lambda if then else let in end frobnicate");
        assert_eq!(
            types(&toks),
            vec![
                TokenType::Type,
                TokenType::Def,
                TokenType::Lambda,
                TokenType::If,
                TokenType::Then,
                TokenType::Else,
                TokenType::Let,
                TokenType::In,
                TokenType::End,
                TokenType::Symbol,
            ]
        );
        assert_eq!(toks[9].text(), "frobnicate");
    }

    #[test]
    fn test_bool_literals() {
        let toks = scan_all("true false");
        assert_eq!(types(&toks), vec![TokenType::Bool, TokenType::Bool]);
        assert!(toks[0].bool_value());
        assert!(!toks[1].bool_value());
    }

    #[test]
    fn test_integer_literals() {
        for text in ["0", "1", "12", "123", "0012"] {
            let toks = scan_all(text);
            assert_eq!(toks.len(), 1, "{text}");
            assert_eq!(toks[0].ty(), TokenType::I64);
            assert_eq!(toks[0].text(), text);
        }
    }

    #[test]
    fn test_integer_terminated_by_punctuation() {
        for punct in ["<", ">", "(", ")", "[", "]", "{", "}", ";", ":", ","] {
            let input = format!("1{punct}");
            let toks = scan_all(&input);
            assert_eq!(toks.len(), 2, "{input}");
            assert_eq!(toks[0].ty(), TokenType::I64);
            assert_eq!(toks[0].text(), "1");
        }
    }

    #[test]
    fn test_float_literals() {
        for text in [
            ".1", ".12", "+.1", "-.123", "1.", "1.2", "1.23", "1e0", "1e-1", "1e+1", "12.5e3",
        ] {
            let toks = scan_all(text);
            assert_eq!(toks.len(), 1, "{text}");
            assert_eq!(toks[0].ty(), TokenType::F64, "{text}");
            assert_eq!(toks[0].text(), text);
        }
    }

    #[test]
    fn test_signed_integers() {
        let toks = scan_all("-7 +42");
        assert_eq!(types(&toks), vec![TokenType::I64, TokenType::I64]);
        assert_eq!(toks[0].i64_value().unwrap(), -7);
        assert_eq!(toks[1].i64_value().unwrap(), 42);
    }

    #[test]
    fn test_string_escapes_decode() {
        let toks = scan_all(r#""\"hi\", she said""#);
        assert_eq!(toks.len(), 1);
        assert_eq!(toks[0].text(), "\"hi\", she said");

        let toks = scan_all(r#""tab[\t] nl[\n] esc[\033]""#);
        assert_eq!(toks[0].text(), "tab[\t] nl[\n] esc[\x1b]");
    }

    #[test]
    fn test_unknown_escape_is_error() {
        let input = r#""bad \x escape""#;
        let mut tkz = Tokenizer::new(0);
        let out = tkz.scan(input, Span::all(input));
        let err = out.error.expect("unknown escape must error");
        assert!(err.message.contains("unknown escape"));
    }

    #[test]
    fn test_unterminated_string_at_eof() {
        let input = "\"unfinished";
        let mut tkz = Tokenizer::new(0);
        let out = tkz.scan(input, Span::all(input));
        assert!(out.token.is_none());
        assert!(out.error.is_none());
        let err = tkz.notify_eof().unwrap_err();
        assert!(err.message.contains("unterminated string"));
        assert_eq!(err.pos.col, 1);
    }

    #[test]
    fn test_malformed_exponent() {
        let input = "1e) ";
        let mut tkz = Tokenizer::new(0);
        let out = tkz.scan(input, Span::all(input));
        let err = out.error.expect("dangling exponent must error");
        assert!(err.message.contains("malformed numeric literal"));
    }

    #[test]
    fn test_stray_character() {
        let input = "#";
        let mut tkz = Tokenizer::new(0);
        let out = tkz.scan(input, Span::all(input));
        assert!(out.error.unwrap().message.contains("stray character"));
    }

    #[test]
    fn test_positions_one_based() {
        let toks = scan_all("def pi\n  = 3.14;");
        let positions: Vec<(u32, u32)> = toks.iter().map(|t| (t.pos().line, t.pos().col)).collect();
        assert_eq!(positions, vec![(1, 1), (1, 5), (2, 3), (2, 5), (2, 9)]);
    }

    #[test]
    fn test_empty_input_no_tokens_no_errors() {
        let toks = scan_all("");
        assert!(toks.is_empty());
        let toks = scan_all("   \n\t  ");
        assert!(toks.is_empty());
    }

    #[test]
    fn test_numeric_partial_then_eof_completes() {
        let input = "3.14";
        let mut tkz = Tokenizer::new(0);
        let out = tkz.scan(input, Span::all(input));
        // buffer ended mid-literal: partial, no token, no error
        assert!(out.token.is_none());
        assert!(out.error.is_none());
        assert_eq!(out.consumed, Span::all(input));
        // EOF asserts the literal is complete
        let tok = tkz.notify_eof().unwrap().unwrap();
        assert_eq!(tok.ty(), TokenType::F64);
        assert_eq!(tok.f64_value().unwrap(), 3.14);
    }

    #[test]
    fn test_split_resumption_identical_stream() {
        let input = "def sq = lambda (x : f64) { x * x; }; sq(4.0) != 16.0;";
        let whole = scan_all(input);
        for cut in 0..=input.len() {
            if !input.is_char_boundary(cut) {
                continue;
            }
            let (a, b) = input.split_at(cut);
            // feed the halves through one scanner, resuming across the cut
            let mut tkz = Tokenizer::new(0);
            let mut tokens = Vec::new();
            for chunk in [a, b] {
                let mut rest = Span::all(chunk);
                loop {
                    let out = tkz.scan(chunk, rest);
                    assert!(out.error.is_none());
                    rest = rest.suffix_after(out.consumed);
                    match out.token {
                        Some(t) => tokens.push(t),
                        None => break,
                    }
                }
            }
            if let Some(t) = tkz.notify_eof().unwrap() {
                tokens.push(t);
            }
            assert_eq!(tokens, whole, "split at byte {cut} diverged");
        }
    }

    #[test]
    fn test_untokenize_rescans_identically() {
        let input = "def sq = lambda (x : f64) { x * \"a\\\"b\"; };";
        let toks = scan_all(input);
        let rendered = toks
            .iter()
            .map(Token::untokenize)
            .collect::<Vec<_>>()
            .join(" ");
        let again = scan_all(&rendered);
        assert_eq!(types(&again), types(&toks));
        for (x, y) in toks.iter().zip(again.iter()) {
            assert_eq!(x.text(), y.text());
        }
    }

    #[test]
    fn test_span_conservation() {
        let input = "def x = 1; ";
        let mut tkz = Tokenizer::new(0);
        let mut rest = Span::all(input);
        loop {
            let out = tkz.scan(input, rest);
            let remaining = rest.suffix_after(out.consumed);
            assert_eq!(out.consumed.len() + remaining.len(), rest.len());
            rest = remaining;
            if out.token.is_none() {
                break;
            }
        }
    }
}
