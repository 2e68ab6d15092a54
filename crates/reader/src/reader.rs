//! Reader: tokenizer and parser wired for streaming input
//!
//! `read_expr` consumes as much of the given span as it can. It
//! returns when a toplevel form completes, when an error is detected,
//! or when the input runs out with a form still open (the caller
//! supplies more input and calls again; all scanner and parser state
//! is retained in between).
//!
//! Sessions come in two flavors, matching how the driver recovers: an
//! interactive session discards the remainder of the offending line
//! after an error and keeps going; a batch session surfaces the error
//! and expects the caller to stop.

use crate::error::{ParseError, ReaderError};
use crate::parser::{ParseCtx, ParserStateMachine};
use crate::span::Span;
use crate::tokenizer::Tokenizer;
use skm_core::gc::GcRef;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    Interactive,
    Batch,
}

/// Outcome of one `read_expr` call.
#[derive(Debug)]
pub struct ReadResult {
    /// Completed toplevel form, if one landed
    pub expr: Option<GcRef>,
    /// Prefix of the input that was consumed
    pub consumed: Span,
    pub error: Option<ReaderError>,
}

pub struct Reader {
    tokenizer: Tokenizer,
    psm: ParserStateMachine,
    mode: SessionMode,
    /// Error recovery is mid-flight: skip input until a newline
    discarding_line: bool,
}

impl Reader {
    pub fn new() -> Self {
        Reader::with_parser_arena(256 * 1024)
    }

    /// Reader whose parser-stack arena has the given reserve.
    pub fn with_parser_arena(parser_arena_z: usize) -> Self {
        Reader {
            tokenizer: Tokenizer::new(0),
            psm: ParserStateMachine::with_arena_reserve(parser_arena_z),
            mode: SessionMode::Batch,
            discarding_line: false,
        }
    }

    pub fn begin_interactive_session(&mut self) {
        self.mode = SessionMode::Interactive;
    }

    pub fn begin_batch_session(&mut self) {
        self.mode = SessionMode::Batch;
    }

    pub fn session_mode(&self) -> SessionMode {
        self.mode
    }

    /// Depth of the parser stack; 1 means idle at toplevel. Drives the
    /// REPL's continuation prompt.
    pub fn parser_stack_depth(&self) -> usize {
        self.psm.depth()
    }

    pub fn is_incomplete(&self) -> bool {
        self.psm.is_incomplete() || self.tokenizer.has_partial()
    }

    /// Read at most one toplevel form out of `input` (offsets into
    /// `buf`). With `eof` set, pending scanner and parser state is
    /// flushed: a pending lexeme completes or errors, and an
    /// incomplete form is an error.
    pub fn read_expr(
        &mut self,
        ctx: &mut ParseCtx<'_>,
        buf: &str,
        input: Span,
        eof: bool,
    ) -> ReadResult {
        let mut rest = input;

        if self.discarding_line {
            let (skipped, found_newline) = self.skip_to_newline(buf, rest);
            rest = rest.suffix_after(skipped);
            if !found_newline {
                return self.result_at(input, rest, None, None);
            }
            self.discarding_line = false;
        }

        loop {
            let out = self.tokenizer.scan(buf, rest);
            rest = rest.suffix_after(out.consumed);

            if let Some(e) = out.error {
                return self.recover(buf, input, rest, ReaderError::Lex(e));
            }

            let Some(tok) = out.token else {
                // span exhausted
                if !eof {
                    return self.result_at(input, rest, None, None);
                }
                match self.tokenizer.notify_eof() {
                    Err(e) => {
                        return self.recover(buf, input, rest, ReaderError::Lex(e));
                    }
                    Ok(Some(tok)) => {
                        if let Err(e) = self.psm.on_token(&tok, ctx) {
                            return self.recover(buf, input, rest, ReaderError::Parse(e));
                        }
                        if let Some(expr) = self.psm.take_emitted() {
                            return self.result_at(input, rest, Some(expr), None);
                        }
                    }
                    Ok(None) => {}
                }
                if self.psm.is_incomplete() {
                    let e = ParseError::new(
                        "reader::read_expr",
                        "complete toplevel form",
                        "incomplete expression at end of input".to_string(),
                        self.tokenizer.position(),
                    );
                    self.psm.reset();
                    return self.result_at(input, rest, None, Some(ReaderError::Parse(e)));
                }
                return self.result_at(input, rest, None, None);
            };

            if let Err(e) = self.psm.on_token(&tok, ctx) {
                return self.recover(buf, input, rest, ReaderError::Parse(e));
            }
            if let Some(expr) = self.psm.take_emitted() {
                debug!(depth = self.psm.depth(), "toplevel form complete");
                return self.result_at(input, rest, Some(expr), None);
            }
        }
    }

    fn result_at(
        &self,
        input: Span,
        rest: Span,
        expr: Option<GcRef>,
        error: Option<ReaderError>,
    ) -> ReadResult {
        ReadResult {
            expr,
            consumed: Span::new(input.lo(), rest.lo()),
            error,
        }
    }

    /// Error recovery: the parser stack resets to an idle toplevel; in
    /// an interactive session the rest of the current line is
    /// discarded so the next line starts clean.
    fn recover(
        &mut self,
        buf: &str,
        input: Span,
        mut rest: Span,
        error: ReaderError,
    ) -> ReadResult {
        self.psm.reset();
        self.tokenizer.discard_partial();
        if self.mode == SessionMode::Interactive {
            let (skipped, found_newline) = self.skip_to_newline(buf, rest);
            rest = rest.suffix_after(skipped);
            self.discarding_line = !found_newline;
        }
        self.result_at(input, rest, None, Some(error))
    }

    /// Consume characters through the tokenizer's position tracking
    /// until just past a newline. Returns the consumed prefix and
    /// whether a newline was found.
    fn skip_to_newline(&mut self, buf: &str, rest: Span) -> (Span, bool) {
        let text = rest.text(buf);
        match text.find('\n') {
            Some(ix) => {
                self.tokenizer.skip_bytes(&text[..=ix]);
                (rest.prefix(ix + 1), true)
            }
            None => {
                self.tokenizer.skip_bytes(text);
                (rest.prefix(text.len()), false)
            }
        }
    }
}

impl Default for Reader {
    fn default() -> Self {
        Reader::new()
    }
}
