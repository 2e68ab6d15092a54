//! Expect-type machine: a type name in declared-type position

use super::{Action, Emission, ParseCtx, ParserStateMachine, Ssm, SsmKind};
use crate::error::ParseError;
use crate::token::{Token, TokenType};

pub struct ExpectTypeSsm;

impl ExpectTypeSsm {
    pub fn new() -> Self {
        ExpectTypeSsm
    }
}

impl Ssm for ExpectTypeSsm {
    fn kind(&self) -> SsmKind {
        SsmKind::ExpectType
    }

    fn expect_str(&self) -> &'static str {
        "type name"
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
                let td = ctx.types.lookup(name).ok_or_else(|| {
                    ParseError::new(
                        "expect_type_ssm::on_token",
                        "type name",
                        format!("unknown type name '{}'", tk.text()),
                        tk.pos(),
                    )
                })?;
                Ok(Action::Emit(Emission::TypeDescr(td)))
            }
            _ => Err(self.illegal_token(tk)),
        }
    }
}
