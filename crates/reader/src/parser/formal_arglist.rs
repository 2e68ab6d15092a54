//! Formal-argument-list machine: `( formal ("," formal)* )` or `()`

use super::expect_formal::ExpectFormalSsm;
use super::{Action, Emission, ParseCtx, ParserStateMachine, Ssm, SsmKind};
use crate::ast::Formal;
use crate::error::ParseError;
use crate::token::{Token, TokenType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArglistState {
    /// After `(`: first formal or `)`
    AwaitFirst,
    /// After a formal: `,` or `)`
    AwaitSeparator,
}

pub struct FormalArglistSsm {
    formals: Vec<Formal>,
    state: ArglistState,
}

impl FormalArglistSsm {
    pub fn new() -> Self {
        FormalArglistSsm {
            formals: Vec::new(),
            state: ArglistState::AwaitFirst,
        }
    }
}

impl Ssm for FormalArglistSsm {
    fn kind(&self) -> SsmKind {
        SsmKind::ExpectFormalArglist
    }

    fn expect_str(&self) -> &'static str {
        match self.state {
            ArglistState::AwaitFirst => "formal parameter or ')'",
            ArglistState::AwaitSeparator => "',' or ')'",
        }
    }

    fn on_token(
        &mut self,
        tk: &Token,
        _psm: &mut ParserStateMachine,
        _ctx: &mut ParseCtx<'_>,
    ) -> Result<Action, ParseError> {
        match (self.state, tk.ty()) {
            (_, TokenType::RightParen) => Ok(Action::Emit(Emission::FormalList(
                std::mem::take(&mut self.formals),
            ))),
            (ArglistState::AwaitFirst, TokenType::Symbol) => Ok(Action::PushFeed(
                Box::new(ExpectFormalSsm::new()),
                tk.clone(),
            )),
            (ArglistState::AwaitSeparator, TokenType::Comma) => {
                Ok(Action::Push(Box::new(ExpectFormalSsm::new())))
            }
            _ => Err(self.illegal_token(tk)),
        }
    }

    fn on_parsed_formal(
        &mut self,
        formal: Formal,
        _psm: &mut ParserStateMachine,
        _ctx: &mut ParseCtx<'_>,
    ) -> Result<Action, ParseError> {
        self.formals.push(formal);
        self.state = ArglistState::AwaitSeparator;
        Ok(Action::Keep)
    }
}
