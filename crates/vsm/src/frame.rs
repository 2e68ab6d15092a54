//! Machine opcodes and continuation frames
//!
//! The machine's continuation is its `cont` register plus a chain of
//! frames in the GC heap. Each frame captures the expression parts
//! still to process, the environment to restore, the opcode to resume
//! at, and the link to the frame below.

use skm_core::gc::{Forwarder, GcObject, GcRef};
use skm_core::intern::Name;
use std::any::Any;

/// What the machine does on its next step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Eval,
    EvalArgs,
    ApplyCont,
    IfElseCont,
    SeqCont,
    DefineCont,
    Halt,
}

/// One continuation frame.
#[derive(Debug)]
pub enum Frame {
    /// Application in progress: callee, then arguments left to right
    EvalArgs {
        /// Callee value once evaluated
        callee: Option<GcRef>,
        /// Argument expressions
        pending: Vec<GcRef>,
        next: usize,
        /// Accumulated argument values
        done: Vec<GcRef>,
        env: Option<GcRef>,
        cont: Opcode,
        parent: Option<GcRef>,
    },
    IfElse {
        then_expr: GcRef,
        else_expr: GcRef,
        env: Option<GcRef>,
        cont: Opcode,
        parent: Option<GcRef>,
    },
    Seq {
        /// Elements after the first
        rest: Vec<GcRef>,
        next: usize,
        env: Option<GcRef>,
        cont: Opcode,
        parent: Option<GcRef>,
    },
    /// Awaiting a definition's right-hand side
    Define {
        name: Name,
        /// -1 installs into the global table
        i_link: i32,
        j_slot: u32,
        env: Option<GcRef>,
        cont: Opcode,
        parent: Option<GcRef>,
    },
}

impl Frame {
    pub fn parent(&self) -> Option<GcRef> {
        match self {
            Frame::EvalArgs { parent, .. }
            | Frame::IfElse { parent, .. }
            | Frame::Seq { parent, .. }
            | Frame::Define { parent, .. } => *parent,
        }
    }
}

impl GcObject for Frame {
    fn shallow_size(&self) -> usize {
        let extra = match self {
            Frame::EvalArgs { pending, done, .. } => {
                (pending.len() + done.len()) * std::mem::size_of::<GcRef>()
            }
            Frame::Seq { rest, .. } => rest.len() * std::mem::size_of::<GcRef>(),
            _ => 0,
        };
        std::mem::size_of::<Frame>() + extra
    }

    fn forward_children(&mut self, fwd: &mut Forwarder<'_>) {
        match self {
            Frame::EvalArgs {
                callee,
                pending,
                done,
                env,
                parent,
                ..
            } => {
                if let Some(c) = callee.as_mut() {
                    fwd.forward_inplace(c);
                }
                for e in pending.iter_mut() {
                    fwd.forward_inplace(e);
                }
                for v in done.iter_mut() {
                    fwd.forward_inplace(v);
                }
                if let Some(e) = env.as_mut() {
                    fwd.forward_inplace(e);
                }
                if let Some(p) = parent.as_mut() {
                    fwd.forward_inplace(p);
                }
            }
            Frame::IfElse {
                then_expr,
                else_expr,
                env,
                parent,
                ..
            } => {
                fwd.forward_inplace(then_expr);
                fwd.forward_inplace(else_expr);
                if let Some(e) = env.as_mut() {
                    fwd.forward_inplace(e);
                }
                if let Some(p) = parent.as_mut() {
                    fwd.forward_inplace(p);
                }
            }
            Frame::Seq {
                rest, env, parent, ..
            } => {
                for e in rest.iter_mut() {
                    fwd.forward_inplace(e);
                }
                if let Some(e) = env.as_mut() {
                    fwd.forward_inplace(e);
                }
                if let Some(p) = parent.as_mut() {
                    fwd.forward_inplace(p);
                }
            }
            Frame::Define { env, parent, .. } => {
                if let Some(e) = env.as_mut() {
                    fwd.forward_inplace(e);
                }
                if let Some(p) = parent.as_mut() {
                    fwd.forward_inplace(p);
                }
            }
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
