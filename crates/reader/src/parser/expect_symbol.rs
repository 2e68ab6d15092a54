//! Expect-symbol machine: exactly one identifier

use super::{Action, Emission, ParseCtx, ParserStateMachine, Ssm, SsmKind};
use crate::error::ParseError;
use crate::token::{Token, TokenType};

pub struct ExpectSymbolSsm {
    what: &'static str,
}

impl ExpectSymbolSsm {
    pub fn new(what: &'static str) -> Self {
        ExpectSymbolSsm { what }
    }
}

impl Ssm for ExpectSymbolSsm {
    fn kind(&self) -> SsmKind {
        SsmKind::ExpectSymbol
    }

    fn expect_str(&self) -> &'static str {
        self.what
    }

    fn on_token(
        &mut self,
        tk: &Token,
        _psm: &mut ParserStateMachine,
        ctx: &mut ParseCtx<'_>,
    ) -> Result<Action, ParseError> {
        match tk.ty() {
            TokenType::Symbol => {
                let name = ctx.names.intern(tk.text());
                Ok(Action::Emit(Emission::Symbol(name)))
            }
            _ => Err(self.illegal_token(tk)),
        }
    }
}
