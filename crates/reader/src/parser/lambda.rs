//! Lambda machine: `lambda ( formal_list ) ["->" type] body`
//!
//! While the body parses, a fresh frame holding the formals sits on
//! the parser's environment stack, so body symbols resolve to
//! `(i_link, j_slot)` paths. Block-level defines inside the body
//! append slots to that frame; its final width becomes the lambda's
//! runtime frame size.

use super::expect_expr::ExpectExprSsm;
use super::expect_type::ExpectTypeSsm;
use super::formal_arglist::FormalArglistSsm;
use super::sequence::SequenceSsm;
use super::{Action, Emission, ParseCtx, ParserStateMachine, Ssm, SsmKind};
use crate::ast::{Formal, make_lambda};
use crate::error::ParseError;
use crate::symtab::LocalFrame;
use crate::token::{Token, TokenType};
use crate::types::TypeRef;
use skm_core::gc::GcRef;

enum LambdaState {
    /// After `lambda`: the formal list's `(`
    AwaitArglist,
    /// Formal list machine running
    InArglist,
    /// Formals known: `->`, block body, or bare-expression body
    AwaitBody {
        formals: Vec<Formal>,
        ret_ty: Option<TypeRef>,
    },
    /// Return-type machine running
    InRetType { formals: Vec<Formal> },
    /// Body machine running; frame pushed
    InBody {
        formals: Vec<Formal>,
        ret_ty: Option<TypeRef>,
    },
}

pub struct LambdaSsm {
    state: LambdaState,
}

impl LambdaSsm {
    pub fn new() -> Self {
        LambdaSsm {
            state: LambdaState::AwaitArglist,
        }
    }

    fn enter_body(&mut self, formals: Vec<Formal>, ret_ty: Option<TypeRef>, psm: &mut ParserStateMachine) {
        psm.push_env_frame(LocalFrame::new(
            formals.iter().map(|f| (f.name, f.ty)),
        ));
        self.state = LambdaState::InBody { formals, ret_ty };
    }

    fn finish_body(
        &mut self,
        body: GcRef,
        psm: &mut ParserStateMachine,
        ctx: &mut ParseCtx<'_>,
    ) -> Result<GcRef, ParseError> {
        let LambdaState::InBody { formals, ret_ty } =
            std::mem::replace(&mut self.state, LambdaState::AwaitArglist)
        else {
            return Err(self.unexpected_completion("expression", psm));
        };
        let frame = psm.pop_env_frame();
        make_lambda(ctx.gc, formals, ret_ty, body, frame.n_slots())
            .map_err(|e| ctx.alloc_failed(e, psm.last_pos()))
    }
}

impl Ssm for LambdaSsm {
    fn kind(&self) -> SsmKind {
        SsmKind::Lambda
    }

    fn expect_str(&self) -> &'static str {
        match self.state {
            LambdaState::AwaitArglist => "'(' starting formal parameter list",
            LambdaState::InArglist => "formal parameter list",
            LambdaState::AwaitBody { .. } => "'->', '{', or body expression",
            LambdaState::InRetType { .. } => "return type",
            LambdaState::InBody { .. } => "lambda body",
        }
    }

    fn on_token(
        &mut self,
        tk: &Token,
        psm: &mut ParserStateMachine,
        _ctx: &mut ParseCtx<'_>,
    ) -> Result<Action, ParseError> {
        match &mut self.state {
            LambdaState::AwaitArglist => match tk.ty() {
                TokenType::LeftParen => {
                    self.state = LambdaState::InArglist;
                    Ok(Action::Push(Box::new(FormalArglistSsm::new())))
                }
                _ => Err(self.illegal_token(tk)),
            },
            LambdaState::AwaitBody { formals, ret_ty } => {
                let formals = std::mem::take(formals);
                let ret_ty = ret_ty.take();
                match tk.ty() {
                    TokenType::Yields => {
                        if ret_ty.is_some() {
                            return Err(self.illegal_token(tk));
                        }
                        self.state = LambdaState::InRetType { formals };
                        Ok(Action::Push(Box::new(ExpectTypeSsm::new())))
                    }
                    TokenType::LeftBrace => {
                        self.enter_body(formals, ret_ty, psm);
                        Ok(Action::Push(Box::new(SequenceSsm::new())))
                    }
                    _ => {
                        self.enter_body(formals, ret_ty, psm);
                        Ok(Action::PushFeed(
                            Box::new(ExpectExprSsm::new("lambda body")),
                            tk.clone(),
                        ))
                    }
                }
            }
            _ => Err(self.illegal_token(tk)),
        }
    }

    fn on_parsed_formal_arglist(
        &mut self,
        formals: Vec<Formal>,
        psm: &mut ParserStateMachine,
        _ctx: &mut ParseCtx<'_>,
    ) -> Result<Action, ParseError> {
        match self.state {
            LambdaState::InArglist => {
                self.state = LambdaState::AwaitBody {
                    formals,
                    ret_ty: None,
                };
                Ok(Action::Keep)
            }
            _ => Err(self.unexpected_completion("formal parameter list", psm)),
        }
    }

    fn on_parsed_typedescr(
        &mut self,
        td: TypeRef,
        psm: &mut ParserStateMachine,
        _ctx: &mut ParseCtx<'_>,
    ) -> Result<Action, ParseError> {
        match &mut self.state {
            LambdaState::InRetType { formals } => {
                let formals = std::mem::take(formals);
                self.state = LambdaState::AwaitBody {
                    formals,
                    ret_ty: Some(td),
                };
                Ok(Action::Keep)
            }
            _ => Err(self.unexpected_completion("type", psm)),
        }
    }

    fn on_parsed_expression(
        &mut self,
        body: GcRef,
        psm: &mut ParserStateMachine,
        ctx: &mut ParseCtx<'_>,
    ) -> Result<Action, ParseError> {
        let lam = self.finish_body(body, psm, ctx)?;
        Ok(Action::Emit(Emission::Expr(lam)))
    }

    fn on_parsed_expression_with_semicolon(
        &mut self,
        body: GcRef,
        psm: &mut ParserStateMachine,
        ctx: &mut ParseCtx<'_>,
    ) -> Result<Action, ParseError> {
        // a bare-expression body ended at `;`; the `;` also terminates
        // the enclosing form, so it propagates with the lambda
        let lam = self.finish_body(body, psm, ctx)?;
        Ok(Action::Emit(Emission::ExprSemicolon(lam)))
    }
}
