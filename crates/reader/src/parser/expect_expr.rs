//! Expect-expression machine
//!
//! Pushed wherever the grammar needs one expression. Operand tokens
//! resolve immediately (literals box into constants, symbols resolve
//! to variables) and hand off to a progress machine that watches for
//! infix continuation; compound openers push the matching machine.

use super::{Action, ParseCtx, ParserStateMachine, Ssm, SsmKind};
use super::if_else::IfSsm;
use super::lambda::LambdaSsm;
use super::paren::ParenSsm;
use super::progress::ProgressSsm;
use super::sequence::SequenceSsm;
use crate::ast::{make_constant, make_variable};
use crate::error::ParseError;
use crate::token::{Token, TokenType};
use skm_core::gc::GcRef;
use skm_core::value::Value;

pub struct ExpectExprSsm {
    what: &'static str,
}

impl ExpectExprSsm {
    pub fn new(what: &'static str) -> Self {
        ExpectExprSsm { what }
    }
}

impl Ssm for ExpectExprSsm {
    fn kind(&self) -> SsmKind {
        SsmKind::ExpectExpr
    }

    fn expect_str(&self) -> &'static str {
        self.what
    }

    fn on_token(
        &mut self,
        tk: &Token,
        psm: &mut ParserStateMachine,
        ctx: &mut ParseCtx<'_>,
    ) -> Result<Action, ParseError> {
        match tk.ty() {
            TokenType::Bool => {
                let expr = make_constant(ctx.gc, Value::Bool(tk.bool_value()))
                    .map_err(|e| ctx.alloc_failed(e, tk.pos()))?;
                Ok(Action::Replace(Box::new(ProgressSsm::new(expr))))
            }
            TokenType::I64 => {
                let n = tk.i64_value().map_err(|e| {
                    ParseError::new("expect_expr_ssm::on_token", self.what, e.message, e.pos)
                })?;
                let expr = make_constant(ctx.gc, Value::I64(n))
                    .map_err(|e| ctx.alloc_failed(e, tk.pos()))?;
                Ok(Action::Replace(Box::new(ProgressSsm::new(expr))))
            }
            TokenType::F64 => {
                let x = tk.f64_value().map_err(|e| {
                    ParseError::new("expect_expr_ssm::on_token", self.what, e.message, e.pos)
                })?;
                let expr = make_constant(ctx.gc, Value::F64(x))
                    .map_err(|e| ctx.alloc_failed(e, tk.pos()))?;
                Ok(Action::Replace(Box::new(ProgressSsm::new(expr))))
            }
            TokenType::Str => {
                let expr = make_constant(ctx.gc, Value::Str(tk.text().to_string()))
                    .map_err(|e| ctx.alloc_failed(e, tk.pos()))?;
                Ok(Action::Replace(Box::new(ProgressSsm::new(expr))))
            }
            TokenType::Symbol => {
                let name = ctx.names.intern(tk.text());
                let binding = psm.resolve_name(ctx.globals, name).ok_or_else(|| {
                    ParseError::new(
                        "expect_expr_ssm::on_token",
                        self.what,
                        format!("unbound symbol '{}'", tk.text()),
                        tk.pos(),
                    )
                })?;
                let expr = make_variable(ctx.gc, name, binding)
                    .map_err(|e| ctx.alloc_failed(e, tk.pos()))?;
                Ok(Action::Replace(Box::new(ProgressSsm::new(expr))))
            }
            TokenType::LeftParen => Ok(Action::Push(Box::new(ParenSsm::new()))),
            TokenType::Lambda => Ok(Action::Push(Box::new(LambdaSsm::new()))),
            TokenType::If => Ok(Action::Push(Box::new(IfSsm::new()))),
            TokenType::LeftBrace => Ok(Action::Push(Box::new(SequenceSsm::new()))),
            _ => Err(ParseError::new(
                "expect_expr_ssm::on_token",
                self.what,
                format!("expected expression, got {}", tk.describe()),
                tk.pos(),
            )),
        }
    }

    fn on_parsed_expression(
        &mut self,
        expr: GcRef,
        _psm: &mut ParserStateMachine,
        _ctx: &mut ParseCtx<'_>,
    ) -> Result<Action, ParseError> {
        // a compound child (paren, lambda, if, block) finished; watch
        // for infix continuation
        Ok(Action::Replace(Box::new(ProgressSsm::new(expr))))
    }
}
