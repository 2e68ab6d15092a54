//! If machine: `if ( test ) then expr else expr`
//!
//! The else branch is mandatory; a dangling `else` binds to the
//! innermost `if`.

use super::expect_expr::ExpectExprSsm;
use super::{Action, Emission, ParseCtx, ParserStateMachine, Ssm, SsmKind};
use crate::ast::make_if;
use crate::error::ParseError;
use crate::token::{Token, TokenType};
use skm_core::gc::GcRef;

enum IfState {
    /// After `if`: `(`
    AwaitLeftParen,
    /// Test machine running
    InTest,
    /// Test complete: `)`
    AwaitRightParen { test: GcRef },
    /// After `)`: `then`
    AwaitThen { test: GcRef },
    /// Then-branch machine running
    InThen { test: GcRef },
    /// Then complete: `else`
    AwaitElse { test: GcRef, then_expr: GcRef },
    /// Else-branch machine running
    InElse { test: GcRef, then_expr: GcRef },
}

pub struct IfSsm {
    state: IfState,
}

impl IfSsm {
    pub fn new() -> Self {
        IfSsm {
            state: IfState::AwaitLeftParen,
        }
    }
}

impl Ssm for IfSsm {
    fn kind(&self) -> SsmKind {
        SsmKind::IfElse
    }

    fn expect_str(&self) -> &'static str {
        match self.state {
            IfState::AwaitLeftParen => "'(' starting if-test",
            IfState::InTest => "if-test",
            IfState::AwaitRightParen { .. } => "')' ending if-test",
            IfState::AwaitThen { .. } => "'then'",
            IfState::InThen { .. } => "then-branch",
            IfState::AwaitElse { .. } => "'else'",
            IfState::InElse { .. } => "else-branch",
        }
    }

    fn on_token(
        &mut self,
        tk: &Token,
        _psm: &mut ParserStateMachine,
        _ctx: &mut ParseCtx<'_>,
    ) -> Result<Action, ParseError> {
        match self.state {
            IfState::AwaitLeftParen => match tk.ty() {
                TokenType::LeftParen => {
                    self.state = IfState::InTest;
                    Ok(Action::Push(Box::new(ExpectExprSsm::new("if-test"))))
                }
                _ => Err(self.illegal_token(tk)),
            },
            IfState::AwaitRightParen { test } => match tk.ty() {
                TokenType::RightParen => {
                    self.state = IfState::AwaitThen { test };
                    Ok(Action::Keep)
                }
                _ => Err(self.illegal_token(tk)),
            },
            IfState::AwaitThen { test } => match tk.ty() {
                TokenType::Then => {
                    self.state = IfState::InThen { test };
                    Ok(Action::Push(Box::new(ExpectExprSsm::new("then-branch"))))
                }
                _ => Err(self.illegal_token(tk)),
            },
            IfState::AwaitElse { test, then_expr } => match tk.ty() {
                TokenType::Else => {
                    self.state = IfState::InElse { test, then_expr };
                    Ok(Action::Push(Box::new(ExpectExprSsm::new("else-branch"))))
                }
                _ => Err(self.illegal_token(tk)),
            },
            _ => Err(self.illegal_token(tk)),
        }
    }

    fn on_parsed_expression(
        &mut self,
        expr: GcRef,
        psm: &mut ParserStateMachine,
        ctx: &mut ParseCtx<'_>,
    ) -> Result<Action, ParseError> {
        match self.state {
            IfState::InTest => {
                self.state = IfState::AwaitRightParen { test: expr };
                Ok(Action::Keep)
            }
            IfState::InThen { test } => {
                self.state = IfState::AwaitElse {
                    test,
                    then_expr: expr,
                };
                Ok(Action::Keep)
            }
            IfState::InElse { test, then_expr } => {
                let node = make_if(ctx.gc, test, then_expr, expr)
                    .map_err(|e| ctx.alloc_failed(e, psm.last_pos()))?;
                Ok(Action::Emit(Emission::Expr(node)))
            }
            _ => Err(self.unexpected_completion("expression", psm)),
        }
    }

    fn on_parsed_expression_with_semicolon(
        &mut self,
        expr: GcRef,
        psm: &mut ParserStateMachine,
        ctx: &mut ParseCtx<'_>,
    ) -> Result<Action, ParseError> {
        match self.state {
            IfState::InElse { test, then_expr } => {
                let node = make_if(ctx.gc, test, then_expr, expr)
                    .map_err(|e| ctx.alloc_failed(e, psm.last_pos()))?;
                Ok(Action::Emit(Emission::ExprSemicolon(node)))
            }
            _ => Err(self.unexpected_completion("expression ending in ';'", psm)),
        }
    }
}
