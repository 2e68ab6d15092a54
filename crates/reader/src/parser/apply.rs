//! Application-argument machine
//!
//! Pushed by a progress machine when `(` follows a completed operand.
//! Collects comma-separated argument expressions until `)` and emits
//! the finished application.

use super::expect_expr::ExpectExprSsm;
use super::{Action, Emission, ParseCtx, ParserStateMachine, Ssm, SsmKind};
use crate::ast::make_apply;
use crate::error::ParseError;
use crate::token::{Token, TokenType};
use skm_core::gc::GcRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ApplyState {
    /// After `(`: first argument or `)`
    AwaitFirst,
    /// After an argument: `,` or `)`
    AwaitSeparator,
    /// After `,`: the next argument
    AwaitArg,
}

pub struct ApplySsm {
    func: GcRef,
    args: Vec<GcRef>,
    state: ApplyState,
}

impl ApplySsm {
    pub fn new(func: GcRef) -> Self {
        ApplySsm {
            func,
            args: Vec::new(),
            state: ApplyState::AwaitFirst,
        }
    }
}

impl Ssm for ApplySsm {
    fn kind(&self) -> SsmKind {
        SsmKind::Apply
    }

    fn expect_str(&self) -> &'static str {
        match self.state {
            ApplyState::AwaitFirst => "argument expression or ')'",
            ApplyState::AwaitSeparator => "',' or ')'",
            ApplyState::AwaitArg => "argument expression",
        }
    }

    fn on_token(
        &mut self,
        tk: &Token,
        _psm: &mut ParserStateMachine,
        ctx: &mut ParseCtx<'_>,
    ) -> Result<Action, ParseError> {
        match (self.state, tk.ty()) {
            (ApplyState::AwaitFirst | ApplyState::AwaitSeparator, TokenType::RightParen) => {
                let node = make_apply(ctx.gc, self.func, std::mem::take(&mut self.args))
                    .map_err(|e| ctx.alloc_failed(e, tk.pos()))?;
                Ok(Action::Emit(Emission::Expr(node)))
            }
            (ApplyState::AwaitSeparator, TokenType::Comma) => {
                self.state = ApplyState::AwaitArg;
                Ok(Action::Push(Box::new(ExpectExprSsm::new(
                    "argument expression",
                ))))
            }
            (ApplyState::AwaitFirst | ApplyState::AwaitArg, _) => Ok(Action::PushFeed(
                Box::new(ExpectExprSsm::new("argument expression")),
                tk.clone(),
            )),
            (ApplyState::AwaitSeparator, _) => Err(self.illegal_token(tk)),
        }
    }

    fn on_parsed_expression(
        &mut self,
        expr: GcRef,
        _psm: &mut ParserStateMachine,
        _ctx: &mut ParseCtx<'_>,
    ) -> Result<Action, ParseError> {
        self.args.push(expr);
        self.state = ApplyState::AwaitSeparator;
        Ok(Action::Keep)
    }
}
