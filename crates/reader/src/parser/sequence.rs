//! Block machine: `{ (define ";" | expr ";")* expr? }`
//!
//! Collects the elements of a block in order and emits a sequence
//! node; the block's value is its last element's.

use super::define::DefineSsm;
use super::expect_expr::ExpectExprSsm;
use super::{Action, Emission, ParseCtx, ParserStateMachine, Ssm, SsmKind};
use crate::ast::make_sequence;
use crate::error::ParseError;
use crate::token::{Token, TokenType};
use skm_core::gc::GcRef;

pub struct SequenceSsm {
    exprs: Vec<GcRef>,
}

impl SequenceSsm {
    pub fn new() -> Self {
        SequenceSsm { exprs: Vec::new() }
    }
}

impl Ssm for SequenceSsm {
    fn kind(&self) -> SsmKind {
        SsmKind::Sequence
    }

    fn expect_str(&self) -> &'static str {
        "block element or '}'"
    }

    fn on_token(
        &mut self,
        tk: &Token,
        _psm: &mut ParserStateMachine,
        ctx: &mut ParseCtx<'_>,
    ) -> Result<Action, ParseError> {
        match tk.ty() {
            TokenType::RightBrace => {
                if self.exprs.is_empty() {
                    return Err(ParseError::new(
                        "sequence_ssm::on_token",
                        self.expect_str(),
                        "empty block has no value".to_string(),
                        tk.pos(),
                    ));
                }
                let node = make_sequence(ctx.gc, std::mem::take(&mut self.exprs))
                    .map_err(|e| ctx.alloc_failed(e, tk.pos()))?;
                Ok(Action::Emit(Emission::Expr(node)))
            }
            TokenType::Def => Ok(Action::Push(Box::new(DefineSsm::new()))),
            // stray separators between elements are harmless
            TokenType::Semicolon => Ok(Action::Keep),
            _ => Ok(Action::PushFeed(
                Box::new(ExpectExprSsm::new("block element")),
                tk.clone(),
            )),
        }
    }

    fn on_parsed_expression(
        &mut self,
        expr: GcRef,
        _psm: &mut ParserStateMachine,
        _ctx: &mut ParseCtx<'_>,
    ) -> Result<Action, ParseError> {
        // trailing element without `;`; the `}` arrives next
        self.exprs.push(expr);
        Ok(Action::Keep)
    }

    fn on_parsed_expression_with_semicolon(
        &mut self,
        expr: GcRef,
        _psm: &mut ParserStateMachine,
        _ctx: &mut ParseCtx<'_>,
    ) -> Result<Action, ParseError> {
        self.exprs.push(expr);
        Ok(Action::Keep)
    }
}
