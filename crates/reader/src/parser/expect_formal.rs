//! Expect-formal machine: `symbol : type`

use super::expect_type::ExpectTypeSsm;
use super::{Action, Emission, ParseCtx, ParserStateMachine, Ssm, SsmKind};
use crate::ast::Formal;
use crate::error::ParseError;
use crate::token::{Token, TokenType};
use crate::types::TypeRef;
use skm_core::intern::Name;

enum FormalState {
    AwaitName,
    AwaitColon { name: Name },
    AwaitType { name: Name },
}

pub struct ExpectFormalSsm {
    state: FormalState,
}

impl ExpectFormalSsm {
    pub fn new() -> Self {
        ExpectFormalSsm {
            state: FormalState::AwaitName,
        }
    }
}

impl Ssm for ExpectFormalSsm {
    fn kind(&self) -> SsmKind {
        SsmKind::ExpectFormal
    }

    fn expect_str(&self) -> &'static str {
        match self.state {
            FormalState::AwaitName => "formal parameter name",
            FormalState::AwaitColon { .. } => "':' after formal parameter name",
            FormalState::AwaitType { .. } => "formal parameter type",
        }
    }

    fn on_token(
        &mut self,
        tk: &Token,
        _psm: &mut ParserStateMachine,
        ctx: &mut ParseCtx<'_>,
    ) -> Result<Action, ParseError> {
        match (&self.state, tk.ty()) {
            (FormalState::AwaitName, TokenType::Symbol) => {
                let name = ctx.names.intern(tk.text());
                self.state = FormalState::AwaitColon { name };
                Ok(Action::Keep)
            }
            (FormalState::AwaitColon { name }, TokenType::Colon) => {
                let name = *name;
                self.state = FormalState::AwaitType { name };
                Ok(Action::Push(Box::new(ExpectTypeSsm::new())))
            }
            _ => Err(self.illegal_token(tk)),
        }
    }

    fn on_parsed_typedescr(
        &mut self,
        td: TypeRef,
        psm: &mut ParserStateMachine,
        _ctx: &mut ParseCtx<'_>,
    ) -> Result<Action, ParseError> {
        match self.state {
            FormalState::AwaitType { name } => {
                Ok(Action::Emit(Emission::Formal(Formal { name, ty: td })))
            }
            _ => Err(self.unexpected_completion("type", psm)),
        }
    }
}
