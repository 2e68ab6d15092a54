//! Toplevel sequence machine
//!
//! Resident at the bottom of the stack for the life of the parser.
//! Accepts `def` forms and bare expressions, each terminated by `;`,
//! and lands every completed form in the machine's emitted slot.

use super::{Action, ParseCtx, ParserStateMachine, Ssm, SsmKind};
use super::define::DefineSsm;
use super::expect_expr::ExpectExprSsm;
use crate::error::ParseError;
use crate::token::{Token, TokenType};
use skm_core::gc::GcRef;

pub struct ToplevelSsm {
    /// Completed expression still waiting for its `;`
    pending: Option<GcRef>,
}

impl ToplevelSsm {
    pub fn new() -> Self {
        ToplevelSsm { pending: None }
    }
}

impl Default for ToplevelSsm {
    fn default() -> Self {
        ToplevelSsm::new()
    }
}

impl Ssm for ToplevelSsm {
    fn kind(&self) -> SsmKind {
        SsmKind::ToplevelSequence
    }

    fn expect_str(&self) -> &'static str {
        if self.pending.is_some() {
            "';' ending toplevel form"
        } else {
            "toplevel form"
        }
    }

    fn is_idle(&self) -> bool {
        self.pending.is_none()
    }

    fn on_token(
        &mut self,
        tk: &Token,
        psm: &mut ParserStateMachine,
        _ctx: &mut ParseCtx<'_>,
    ) -> Result<Action, ParseError> {
        if self.pending.is_some() {
            return match tk.ty() {
                TokenType::Semicolon => {
                    let expr = self.pending.take().expect("pending form present");
                    psm.set_emitted(expr);
                    Ok(Action::Keep)
                }
                _ => Err(self.illegal_token(tk)),
            };
        }
        match tk.ty() {
            // a lone `;` is an empty form: no expression, no error
            TokenType::Semicolon => Ok(Action::Keep),
            TokenType::Def => Ok(Action::Push(Box::new(DefineSsm::new()))),
            _ => Ok(Action::PushFeed(
                Box::new(ExpectExprSsm::new("toplevel expression")),
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
        // the form is complete but its `;` has not been seen yet
        self.pending = Some(expr);
        Ok(Action::Keep)
    }

    fn on_parsed_expression_with_semicolon(
        &mut self,
        expr: GcRef,
        psm: &mut ParserStateMachine,
        _ctx: &mut ParseCtx<'_>,
    ) -> Result<Action, ParseError> {
        psm.set_emitted(expr);
        Ok(Action::Keep)
    }
}
