//! Parenthesized-expression machine
//!
//! `(` expr `)` contributes grouping only; the inner expression is
//! emitted unchanged.

use super::expect_expr::ExpectExprSsm;
use super::{Action, Emission, ParseCtx, ParserStateMachine, Ssm, SsmKind};
use crate::error::ParseError;
use crate::token::{Token, TokenType};
use skm_core::gc::GcRef;

pub struct ParenSsm {
    inner: Option<GcRef>,
}

impl ParenSsm {
    pub fn new() -> Self {
        ParenSsm { inner: None }
    }
}

impl Ssm for ParenSsm {
    fn kind(&self) -> SsmKind {
        SsmKind::Paren
    }

    fn expect_str(&self) -> &'static str {
        if self.inner.is_some() {
            "')'"
        } else {
            "parenthesized expression"
        }
    }

    fn on_token(
        &mut self,
        tk: &Token,
        _psm: &mut ParserStateMachine,
        _ctx: &mut ParseCtx<'_>,
    ) -> Result<Action, ParseError> {
        match (self.inner, tk.ty()) {
            (Some(expr), TokenType::RightParen) => Ok(Action::Emit(Emission::Expr(expr))),
            (Some(_), _) => Err(self.illegal_token(tk)),
            (None, _) => Ok(Action::PushFeed(
                Box::new(ExpectExprSsm::new("parenthesized expression")),
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
        self.inner = Some(expr);
        Ok(Action::Keep)
    }
}
