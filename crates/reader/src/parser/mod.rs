//! Pushdown syntax state machines
//!
//! The parser is a stack of small state machines, one per partially
//! assembled construct. Each incoming token goes to the top machine,
//! which reacts with an [`Action`]: stay put, push a child for a
//! sub-construct, or pop itself and deliver a completed result to its
//! parent through one of the `on_parsed_*` callbacks. Terminator
//! tokens that close more than one construct cascade: a machine can
//! emit its result and re-feed the terminator to whatever is on top
//! afterwards.
//!
//! The [`ParserStateMachine`] owns the stack, the environment stack
//! used for lexical resolution, and the slot where a completed
//! toplevel form lands.

mod apply;
mod define;
mod expect_expr;
mod expect_formal;
mod expect_symbol;
mod expect_type;
mod formal_arglist;
mod if_else;
mod lambda;
mod paren;
mod progress;
mod sequence;
mod toplevel;

pub use toplevel::ToplevelSsm;

use crate::error::ParseError;
use crate::symtab::{Binding, GlobalSymtab, LocalFrame, resolve};
use crate::token::{SourcePos, Token};
use crate::types::{TypeRef, TypeTable};
use crate::ast::Formal;
use skm_core::arena::Arena;
use skm_core::AllocError;
use skm_core::gc::{Collector, GcRef};
use skm_core::intern::{Name, StringTable};
use tracing::trace;

/// Shared mutable surroundings of a parse: the heap the nodes land in,
/// the name and type tables, and the global symbol table.
pub struct ParseCtx<'a> {
    pub gc: &'a mut Collector,
    pub names: &'a mut StringTable,
    pub types: &'a TypeTable,
    pub globals: &'a mut GlobalSymtab,
}

impl ParseCtx<'_> {
    /// Wrap an allocation failure as a parse-surface error.
    pub fn alloc_failed(&self, e: AllocError, pos: SourcePos) -> ParseError {
        ParseError::new("parser::alloc", "allocation", e.to_string(), pos)
    }
}

/// Which concrete machine a stack entry is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SsmKind {
    ToplevelSequence,
    ExpectExpr,
    ExpectSymbol,
    ExpectType,
    Define,
    Paren,
    Lambda,
    IfElse,
    Sequence,
    ExpectFormal,
    ExpectFormalArglist,
    Progress,
    Apply,
}

/// A completed sub-result handed up the stack.
#[derive(Debug)]
pub enum Emission {
    Expr(GcRef),
    /// Expression whose terminating `;` has been consumed
    ExprSemicolon(GcRef),
    Symbol(Name),
    TypeDescr(TypeRef),
    Formal(Formal),
    FormalList(Vec<Formal>),
}

impl Emission {
    fn describe(&self) -> &'static str {
        match self {
            Emission::Expr(_) => "expression",
            Emission::ExprSemicolon(_) => "expression with ';'",
            Emission::Symbol(_) => "symbol",
            Emission::TypeDescr(_) => "type",
            Emission::Formal(_) => "formal parameter",
            Emission::FormalList(_) => "formal parameter list",
        }
    }
}

/// What a machine wants done after handling an event.
pub enum Action {
    /// Stay on the stack unchanged
    Keep,
    /// Stay; push a child machine
    Push(Box<dyn Ssm>),
    /// Stay; push a child and feed it this token
    PushFeed(Box<dyn Ssm>, Token),
    /// Pop self; push a successor in place
    Replace(Box<dyn Ssm>),
    /// Pop self and deliver a result to the parent
    Emit(Emission),
    /// Pop self, deliver, then feed the token to whatever is on top
    EmitFeed(Emission, Token),
}

/// One syntax state machine.
///
/// `on_token` receives the next token. The `on_parsed_*` callbacks
/// receive completed sub-results from a popped child; the defaults
/// reject them, so each machine implements exactly the completions its
/// grammar position admits.
pub trait Ssm {
    fn kind(&self) -> SsmKind;

    /// What this machine is waiting for, for diagnostics.
    fn expect_str(&self) -> &'static str;

    fn on_token(
        &mut self,
        tk: &Token,
        psm: &mut ParserStateMachine,
        ctx: &mut ParseCtx<'_>,
    ) -> Result<Action, ParseError>;

    fn on_parsed_symbol(
        &mut self,
        _name: Name,
        psm: &mut ParserStateMachine,
        _ctx: &mut ParseCtx<'_>,
    ) -> Result<Action, ParseError> {
        Err(self.unexpected_completion("symbol", psm))
    }

    fn on_parsed_typedescr(
        &mut self,
        _td: TypeRef,
        psm: &mut ParserStateMachine,
        _ctx: &mut ParseCtx<'_>,
    ) -> Result<Action, ParseError> {
        Err(self.unexpected_completion("type", psm))
    }

    fn on_parsed_formal(
        &mut self,
        _formal: Formal,
        psm: &mut ParserStateMachine,
        _ctx: &mut ParseCtx<'_>,
    ) -> Result<Action, ParseError> {
        Err(self.unexpected_completion("formal parameter", psm))
    }

    fn on_parsed_formal_arglist(
        &mut self,
        _formals: Vec<Formal>,
        psm: &mut ParserStateMachine,
        _ctx: &mut ParseCtx<'_>,
    ) -> Result<Action, ParseError> {
        Err(self.unexpected_completion("formal parameter list", psm))
    }

    fn on_parsed_expression(
        &mut self,
        _expr: GcRef,
        psm: &mut ParserStateMachine,
        _ctx: &mut ParseCtx<'_>,
    ) -> Result<Action, ParseError> {
        Err(self.unexpected_completion("expression", psm))
    }

    fn on_parsed_expression_with_semicolon(
        &mut self,
        _expr: GcRef,
        psm: &mut ParserStateMachine,
        _ctx: &mut ParseCtx<'_>,
    ) -> Result<Action, ParseError> {
        Err(self.unexpected_completion("expression ending in ';'", psm))
    }

    /// Precedence of a pending infix operator, for the progress
    /// machine's fold-or-defer decision.
    fn pending_op_prec(&self) -> Option<u8> {
        None
    }

    /// Whether this machine is at rest with nothing half-built.
    /// Only meaningful for the toplevel machine.
    fn is_idle(&self) -> bool {
        true
    }

    /// Illegal-input error naming this machine, its expectation, and
    /// the offending token.
    fn illegal_token(&self, tk: &Token) -> ParseError {
        ParseError::new(
            ssm_fn_name(self.kind()),
            self.expect_str(),
            format!("expected {}, got {}", self.expect_str(), tk.describe()),
            tk.pos(),
        )
    }

    fn unexpected_completion(&self, what: &str, psm: &ParserStateMachine) -> ParseError {
        ParseError::new(
            ssm_fn_name(self.kind()),
            self.expect_str(),
            format!(
                "expected {}, got completed {what}",
                self.expect_str()
            ),
            psm.last_pos(),
        )
    }
}

fn ssm_fn_name(kind: SsmKind) -> &'static str {
    match kind {
        SsmKind::ToplevelSequence => "toplevel_ssm::on_token",
        SsmKind::ExpectExpr => "expect_expr_ssm::on_token",
        SsmKind::ExpectSymbol => "expect_symbol_ssm::on_token",
        SsmKind::ExpectType => "expect_type_ssm::on_token",
        SsmKind::Define => "define_ssm::on_token",
        SsmKind::Paren => "paren_ssm::on_token",
        SsmKind::Lambda => "lambda_ssm::on_token",
        SsmKind::IfElse => "if_ssm::on_token",
        SsmKind::Sequence => "sequence_ssm::on_token",
        SsmKind::ExpectFormal => "expect_formal_ssm::on_token",
        SsmKind::ExpectFormalArglist => "formal_arglist_ssm::on_token",
        SsmKind::Progress => "progress_ssm::on_token",
        SsmKind::Apply => "apply_ssm::on_token",
    }
}

/// The pushdown machine driving a parse.
///
/// Syntax-state machines are charged against a dedicated arena that is
/// destructively cleared after each toplevel form, so a runaway
/// nesting depth surfaces as resource exhaustion instead of unbounded
/// growth.
pub struct ParserStateMachine {
    stack: Vec<Box<dyn Ssm>>,
    stack_arena: Arena,
    env_stack: Vec<LocalFrame>,
    emitted: Option<GcRef>,
    last_pos: SourcePos,
}

impl ParserStateMachine {
    pub fn new() -> Self {
        ParserStateMachine::with_arena_reserve(256 * 1024)
    }

    pub fn with_arena_reserve(parser_arena_z: usize) -> Self {
        ParserStateMachine {
            stack: vec![Box::new(ToplevelSsm::new())],
            stack_arena: Arena::with_reserve(parser_arena_z),
            env_stack: Vec::new(),
            emitted: None,
            last_pos: SourcePos::origin(0),
        }
    }

    fn charge_ssm(&mut self, ssm: &dyn Ssm) -> Result<(), ParseError> {
        self.stack_arena
            .charge(std::mem::size_of_val(ssm).max(1), std::mem::align_of::<usize>())
            .map(|_| ())
            .map_err(|e| {
                ParseError::new(
                    "parser::charge_ssm",
                    "parser stack space",
                    format!("parser stack arena exhausted: {e}"),
                    self.last_pos,
                )
            })
    }

    /// Feed one token through the stack.
    pub fn on_token(&mut self, tk: &Token, ctx: &mut ParseCtx<'_>) -> Result<(), ParseError> {
        self.last_pos = tk.pos();
        trace!(token = ?tk.ty(), depth = self.stack.len(), "psm token");
        self.dispatch_token(tk.clone(), ctx)
    }

    fn dispatch_token(&mut self, tk: Token, ctx: &mut ParseCtx<'_>) -> Result<(), ParseError> {
        let mut top = self
            .stack
            .pop()
            .expect("parser stack always holds the toplevel machine");
        match top.on_token(&tk, self, ctx) {
            Ok(action) => self.apply_action(top, action, ctx),
            Err(e) => {
                self.stack.push(top);
                Err(e)
            }
        }
    }

    fn apply_action(
        &mut self,
        top: Box<dyn Ssm>,
        action: Action,
        ctx: &mut ParseCtx<'_>,
    ) -> Result<(), ParseError> {
        match action {
            Action::Keep => {
                self.stack.push(top);
                Ok(())
            }
            Action::Push(child) => {
                self.charge_ssm(child.as_ref())?;
                self.stack.push(top);
                self.stack.push(child);
                Ok(())
            }
            Action::PushFeed(child, tk) => {
                self.charge_ssm(child.as_ref())?;
                self.stack.push(top);
                self.stack.push(child);
                self.dispatch_token(tk, ctx)
            }
            Action::Replace(successor) => {
                self.charge_ssm(successor.as_ref())?;
                self.stack.push(successor);
                Ok(())
            }
            Action::Emit(em) => {
                drop(top);
                self.deliver(em, ctx)
            }
            Action::EmitFeed(em, tk) => {
                drop(top);
                self.deliver(em, ctx)?;
                self.dispatch_token(tk, ctx)
            }
        }
    }

    fn deliver(&mut self, em: Emission, ctx: &mut ParseCtx<'_>) -> Result<(), ParseError> {
        trace!(emission = em.describe(), depth = self.stack.len(), "psm deliver");
        let mut parent = self
            .stack
            .pop()
            .expect("emission always has a parent machine");
        let result = match em {
            Emission::Expr(e) => parent.on_parsed_expression(e, self, ctx),
            Emission::ExprSemicolon(e) => {
                parent.on_parsed_expression_with_semicolon(e, self, ctx)
            }
            Emission::Symbol(n) => parent.on_parsed_symbol(n, self, ctx),
            Emission::TypeDescr(t) => parent.on_parsed_typedescr(t, self, ctx),
            Emission::Formal(f) => parent.on_parsed_formal(f, self, ctx),
            Emission::FormalList(fs) => parent.on_parsed_formal_arglist(fs, self, ctx),
        };
        match result {
            Ok(action) => self.apply_action(parent, action, ctx),
            Err(e) => {
                self.stack.push(parent);
                Err(e)
            }
        }
    }

    /// A completed toplevel form, if one has landed.
    pub fn take_emitted(&mut self) -> Option<GcRef> {
        self.emitted.take()
    }

    pub(crate) fn set_emitted(&mut self, expr: GcRef) {
        debug_assert!(self.emitted.is_none(), "emitted form overwritten unread");
        self.emitted = Some(expr);
        // the stack is back to the resident toplevel machine; the
        // syntax-state objects of the completed form are dead
        self.stack_arena.clear();
    }

    /// Stack depth, counting the resident toplevel machine.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Whether a form is partially assembled.
    pub fn is_incomplete(&self) -> bool {
        self.stack.len() > 1 || !self.stack[0].is_idle()
    }

    /// Abandon the current form: the stack resets to an idle toplevel
    /// and the environment stack empties. Emitted forms already
    /// completed are retained.
    pub fn reset(&mut self) {
        self.stack.clear();
        self.stack.push(Box::new(ToplevelSsm::new()));
        self.stack_arena.clear();
        self.env_stack.clear();
    }

    pub fn last_pos(&self) -> SourcePos {
        self.last_pos
    }

    // environment stack, used while lambda bodies parse

    pub(crate) fn push_env_frame(&mut self, frame: LocalFrame) {
        self.env_stack.push(frame);
    }

    pub(crate) fn pop_env_frame(&mut self) -> LocalFrame {
        self.env_stack
            .pop()
            .expect("environment stack underflow")
    }

    pub(crate) fn in_local_scope(&self) -> bool {
        !self.env_stack.is_empty()
    }

    pub(crate) fn innermost_frame_mut(&mut self) -> &mut LocalFrame {
        self.env_stack
            .last_mut()
            .expect("no innermost frame outside a lambda body")
    }

    /// Lexical resolution against the frame stack, then the globals.
    pub(crate) fn resolve_name(&self, globals: &GlobalSymtab, name: Name) -> Option<Binding> {
        resolve(&self.env_stack, globals, name)
    }

    /// Precedence of the nearest enclosing pending operator, if the
    /// machine below the current handler is mid-infix.
    pub(crate) fn enclosing_pending_prec(&self) -> Option<u8> {
        self.stack.last().and_then(|s| s.pending_op_prec())
    }
}

impl Default for ParserStateMachine {
    fn default() -> Self {
        ParserStateMachine::new()
    }
}
