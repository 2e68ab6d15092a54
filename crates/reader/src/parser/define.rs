//! Define machine: `def` symbol `[: type]` `=` expr `;`
//!
//! At toplevel the binding installs into the global symbol table as
//! soon as the `=` is consumed, so a lambda right-hand side may refer
//! to the name it is defining (recursion). Inside a block the binding
//! appends a slot to the innermost frame only once the right-hand side
//! is complete, so the defined name shadows from the next element on.

use super::expect_expr::ExpectExprSsm;
use super::expect_symbol::ExpectSymbolSsm;
use super::expect_type::ExpectTypeSsm;
use super::{Action, Emission, ParseCtx, ParserStateMachine, Ssm, SsmKind};
use crate::ast::make_define;
use crate::error::ParseError;
use crate::symtab::Binding;
use crate::token::{Token, TokenType};
use crate::types::TypeRef;
use skm_core::gc::GcRef;
use skm_core::intern::Name;

enum DefineState {
    /// After `def`: the defined symbol
    AwaitSymbol,
    /// After the symbol: `:` or `=`
    AwaitColonOrAssign { name: Name },
    /// After `:`: the declared type
    AwaitType { name: Name },
    /// After the type: `=`
    AwaitAssign { name: Name, ty: TypeRef },
    /// After `=`: the right-hand side
    AwaitRhs {
        name: Name,
        ty: Option<TypeRef>,
        /// Global slot pre-installed at `=` (toplevel only)
        global_slot: Option<u32>,
    },
    /// Right-hand side complete; its `;` has not been seen
    AwaitSemicolon {
        name: Name,
        ty: Option<TypeRef>,
        global_slot: Option<u32>,
        rhs: GcRef,
    },
}

pub struct DefineSsm {
    state: DefineState,
}

impl DefineSsm {
    pub fn new() -> Self {
        DefineSsm {
            state: DefineState::AwaitSymbol,
        }
    }

    fn finish(
        &mut self,
        name: Name,
        ty: Option<TypeRef>,
        global_slot: Option<u32>,
        rhs: GcRef,
        psm: &mut ParserStateMachine,
        ctx: &mut ParseCtx<'_>,
    ) -> Result<GcRef, ParseError> {
        let site = match global_slot {
            Some(slot) => Binding::Global { slot },
            None => {
                let j_slot = psm.innermost_frame_mut().add_local(name, ty);
                Binding::Local { i_link: 0, j_slot }
            }
        };
        make_define(ctx.gc, name, ty, rhs, site)
            .map_err(|e| ctx.alloc_failed(e, psm.last_pos()))
    }
}

impl Ssm for DefineSsm {
    fn kind(&self) -> SsmKind {
        SsmKind::Define
    }

    fn expect_str(&self) -> &'static str {
        match self.state {
            DefineState::AwaitSymbol => "defined symbol",
            DefineState::AwaitColonOrAssign { .. } => "':' or '='",
            DefineState::AwaitType { .. } => "declared type",
            DefineState::AwaitAssign { .. } => "'='",
            DefineState::AwaitRhs { .. } => "definition right-hand side",
            DefineState::AwaitSemicolon { .. } => "';' ending definition",
        }
    }

    fn on_token(
        &mut self,
        tk: &Token,
        psm: &mut ParserStateMachine,
        ctx: &mut ParseCtx<'_>,
    ) -> Result<Action, ParseError> {
        match self.state {
            DefineState::AwaitSymbol => Ok(Action::PushFeed(
                Box::new(ExpectSymbolSsm::new("defined symbol")),
                tk.clone(),
            )),
            DefineState::AwaitColonOrAssign { name } => match tk.ty() {
                TokenType::Colon => {
                    self.state = DefineState::AwaitType { name };
                    Ok(Action::Push(Box::new(ExpectTypeSsm::new())))
                }
                TokenType::SingleAssign => {
                    let global_slot = (!psm.in_local_scope())
                        .then(|| ctx.globals.define(name, None));
                    self.state = DefineState::AwaitRhs {
                        name,
                        ty: None,
                        global_slot,
                    };
                    Ok(Action::Keep)
                }
                _ => Err(self.illegal_token(tk)),
            },
            DefineState::AwaitType { .. } => Err(self.illegal_token(tk)),
            DefineState::AwaitAssign { name, ty } => match tk.ty() {
                TokenType::SingleAssign => {
                    let global_slot = (!psm.in_local_scope())
                        .then(|| ctx.globals.define(name, Some(ty)));
                    self.state = DefineState::AwaitRhs {
                        name,
                        ty: Some(ty),
                        global_slot,
                    };
                    Ok(Action::Keep)
                }
                _ => Err(self.illegal_token(tk)),
            },
            DefineState::AwaitRhs { .. } => Ok(Action::PushFeed(
                Box::new(ExpectExprSsm::new("definition right-hand side")),
                tk.clone(),
            )),
            DefineState::AwaitSemicolon { .. } => Err(self.illegal_token(tk)),
        }
    }

    fn on_parsed_symbol(
        &mut self,
        name: Name,
        _psm: &mut ParserStateMachine,
        _ctx: &mut ParseCtx<'_>,
    ) -> Result<Action, ParseError> {
        match self.state {
            DefineState::AwaitSymbol => {
                self.state = DefineState::AwaitColonOrAssign { name };
                Ok(Action::Keep)
            }
            _ => Err(self.unexpected_completion("symbol", _psm)),
        }
    }

    fn on_parsed_typedescr(
        &mut self,
        td: TypeRef,
        psm: &mut ParserStateMachine,
        _ctx: &mut ParseCtx<'_>,
    ) -> Result<Action, ParseError> {
        match self.state {
            DefineState::AwaitType { name } => {
                self.state = DefineState::AwaitAssign { name, ty: td };
                Ok(Action::Keep)
            }
            _ => Err(self.unexpected_completion("type", psm)),
        }
    }

    fn on_parsed_expression(
        &mut self,
        expr: GcRef,
        psm: &mut ParserStateMachine,
        _ctx: &mut ParseCtx<'_>,
    ) -> Result<Action, ParseError> {
        match self.state {
            DefineState::AwaitRhs {
                name,
                ty,
                global_slot,
            } => {
                self.state = DefineState::AwaitSemicolon {
                    name,
                    ty,
                    global_slot,
                    rhs: expr,
                };
                Ok(Action::Keep)
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
            DefineState::AwaitRhs {
                name,
                ty,
                global_slot,
            } => {
                let node = self.finish(name, ty, global_slot, expr, psm, ctx)?;
                Ok(Action::Emit(Emission::ExprSemicolon(node)))
            }
            _ => Err(self.unexpected_completion("expression ending in ';'", psm)),
        }
    }
}
