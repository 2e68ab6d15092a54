//! Progress machine: an operand in hand, watching what follows
//!
//! Holds a completed operand and reacts to the next token:
//!
//! - an infix operator starts a right-hand side, unless an enclosing
//!   progress machine holds an operator of equal or higher precedence,
//!   in which case the operand folds outward first (this yields left
//!   associativity and `* /` over `+ -` over comparisons),
//! - `(` starts an application with the operand as callee,
//! - a terminator (`;` `)` `}` `,` `then` `else`) releases the operand
//!   to the enclosing machine, re-feeding the terminator where the
//!   enclosing construct still needs it.

use super::apply::ApplySsm;
use super::expect_expr::ExpectExprSsm;
use super::{Action, Emission, ParseCtx, ParserStateMachine, Ssm, SsmKind};
use crate::ast::{make_apply, make_primitive};
use crate::error::ParseError;
use crate::token::{SourcePos, Token, TokenType};
use skm_core::gc::GcRef;
use skm_core::value::{PrimOp, Primitive};

fn op_of(ty: TokenType) -> Option<PrimOp> {
    match ty {
        TokenType::Plus => Some(PrimOp::Add),
        TokenType::Minus => Some(PrimOp::Sub),
        TokenType::Star => Some(PrimOp::Mul),
        TokenType::Slash => Some(PrimOp::Div),
        TokenType::CmpEq => Some(PrimOp::CmpEq),
        TokenType::CmpNe => Some(PrimOp::CmpNe),
        TokenType::LeftAngle => Some(PrimOp::CmpLt),
        TokenType::RightAngle => Some(PrimOp::CmpGt),
        _ => None,
    }
}

fn prec(op: PrimOp) -> u8 {
    match op {
        PrimOp::Mul | PrimOp::Div => 3,
        PrimOp::Add | PrimOp::Sub => 2,
        PrimOp::CmpEq | PrimOp::CmpNe | PrimOp::CmpLt | PrimOp::CmpGt => 1,
    }
}

pub struct ProgressSsm {
    lhs: GcRef,
    op: Option<PrimOp>,
    op_pos: SourcePos,
}

impl ProgressSsm {
    pub fn new(operand: GcRef) -> Self {
        ProgressSsm {
            lhs: operand,
            op: None,
            op_pos: SourcePos::origin(0),
        }
    }

    fn fold(
        &mut self,
        rhs: GcRef,
        ctx: &mut ParseCtx<'_>,
    ) -> Result<(), ParseError> {
        let op = self.op.take().expect("fold with a pending operator");
        let prim = make_primitive(ctx.gc, Primitive::new(op))
            .map_err(|e| ctx.alloc_failed(e, self.op_pos))?;
        self.lhs = make_apply(ctx.gc, prim, vec![self.lhs, rhs])
            .map_err(|e| ctx.alloc_failed(e, self.op_pos))?;
        Ok(())
    }
}

impl Ssm for ProgressSsm {
    fn kind(&self) -> SsmKind {
        SsmKind::Progress
    }

    fn expect_str(&self) -> &'static str {
        if self.op.is_some() {
            "right-hand operand"
        } else {
            "operator or terminator after expression"
        }
    }

    fn pending_op_prec(&self) -> Option<u8> {
        self.op.map(prec)
    }

    fn on_token(
        &mut self,
        tk: &Token,
        psm: &mut ParserStateMachine,
        _ctx: &mut ParseCtx<'_>,
    ) -> Result<Action, ParseError> {
        if let Some(newop) = op_of(tk.ty()) {
            if self.op.is_some() {
                return Err(ParseError::new(
                    "progress_ssm::on_token",
                    self.expect_str(),
                    format!("consecutive operators: {}", tk.describe()),
                    tk.pos(),
                ));
            }
            // an enclosing operator of equal or higher precedence binds
            // the operand first
            if let Some(enclosing) = psm.enclosing_pending_prec()
                && enclosing >= prec(newop)
            {
                return Ok(Action::EmitFeed(Emission::Expr(self.lhs), tk.clone()));
            }
            self.op = Some(newop);
            self.op_pos = tk.pos();
            return Ok(Action::Push(Box::new(ExpectExprSsm::new("operand"))));
        }
        match tk.ty() {
            TokenType::LeftParen => {
                debug_assert!(self.op.is_none(), "operator pending implies a child machine");
                Ok(Action::Push(Box::new(ApplySsm::new(self.lhs))))
            }
            TokenType::Semicolon => {
                if self.op.is_some() {
                    return Err(self.illegal_token(tk));
                }
                Ok(Action::Emit(Emission::ExprSemicolon(self.lhs)))
            }
            TokenType::RightParen
            | TokenType::RightBrace
            | TokenType::Comma
            | TokenType::Then
            | TokenType::Else => {
                if self.op.is_some() {
                    return Err(self.illegal_token(tk));
                }
                Ok(Action::EmitFeed(Emission::Expr(self.lhs), tk.clone()))
            }
            _ => Err(ParseError::new(
                "progress_ssm::on_token",
                self.expect_str(),
                format!(
                    "consecutive expressions are not legal; got {}",
                    tk.describe()
                ),
                tk.pos(),
            )),
        }
    }

    fn on_parsed_expression(
        &mut self,
        expr: GcRef,
        _psm: &mut ParserStateMachine,
        ctx: &mut ParseCtx<'_>,
    ) -> Result<Action, ParseError> {
        if self.op.is_some() {
            self.fold(expr, ctx)?;
        } else {
            // a completed application replaces the callee operand
            self.lhs = expr;
        }
        Ok(Action::Keep)
    }

    fn on_parsed_expression_with_semicolon(
        &mut self,
        expr: GcRef,
        psm: &mut ParserStateMachine,
        ctx: &mut ParseCtx<'_>,
    ) -> Result<Action, ParseError> {
        if self.op.is_none() {
            return Err(self.unexpected_completion("expression ending in ';'", psm));
        }
        self.fold(expr, ctx)?;
        Ok(Action::Emit(Emission::ExprSemicolon(self.lhs)))
    }
}
