//! Schematika front end
//!
//! Source text to expressions in three layers:
//!
//! - `tokenizer`: a resumable scanner over byte spans, producing the
//!   closed token set with source positions
//! - `parser`: a pushdown stack of syntax state machines consuming
//!   tokens and emitting heap-allocated expression nodes
//! - `reader`: the streaming driver wiring the two, suspendable at any
//!   input boundary
//!
//! Supporting tables: declared types (`types`), global and local
//! symbols with binding-path resolution (`symtab`), and the expression
//! node model itself (`ast`).

pub mod ast;
pub mod error;
pub mod parser;
pub mod reader;
pub mod span;
pub mod symtab;
pub mod token;
pub mod tokenizer;
pub mod types;

pub use ast::{AstPrinter, Expr, Formal, expr_eq};
pub use error::{LexError, ParseError, ReaderError};
pub use parser::{ParseCtx, ParserStateMachine};
pub use reader::{ReadResult, Reader, SessionMode};
pub use span::Span;
pub use token::{SourcePos, Token, TokenType};
pub use tokenizer::{ScanOutput, Tokenizer};
pub use types::{TypeKind, TypeRef, TypeTable};

/// One-shot initialization for this crate and its dependencies.
pub mod init {
    use std::sync::Once;

    /// Register reader-level facets. Idempotent.
    pub fn require() {
        static ONCE: Once = Once::new();
        ONCE.call_once(|| {
            skm_core::init::require();
        });
    }
}
