//! The Virtual Schematika Machine
//!
//! An explicit-continuation interpreter: registers `pc`, `expr`,
//! `value`, `cont`, the current environment, and a heap-allocated
//! frame chain. Each step reads one register state and produces the
//! next; nothing recurses into the Rust stack, so deeply nested
//! programs cost heap frames, not stack depth.
//!
//! The machine's registers are registered as GC roots. At the top of
//! every step the machine offers the collector a safepoint: registers
//! sync into the root table, a pending collection runs, and the
//! (possibly forwarded) roots sync back.
//!
//! A toplevel `def` evaluates its right-hand side, installs the value
//! in the global slot, and leaves that value in the `value` register,
//! so a definition evaluates to the defined value.

use crate::closure::{Closure, Procedure};
use crate::env::{GlobalEnv, LocalEnv};
use crate::error::EvalError;
use crate::frame::{Frame, Opcode};
use crate::primitive::apply_prim;
use skm_core::facet::FacetRegistry;
use skm_core::gc::{Collector, GcRef, RootId};
use skm_core::intern::StringTable;
use skm_core::value::{Primitive, Value};
use skm_reader::ast::Expr;
use tracing::trace;

pub struct Machine {
    pc: Opcode,
    expr: Option<GcRef>,
    value: Option<GcRef>,
    cont: Opcode,
    env: Option<GcRef>,
    frame: Option<GcRef>,
    global_env: GcRef,

    r_expr: RootId,
    r_value: RootId,
    r_env: RootId,
    r_frame: RootId,
    r_global: RootId,
}

impl Machine {
    pub fn new(gc: &mut Collector) -> Result<Self, EvalError> {
        crate::init::require();
        let global_env = gc
            .alloc(GlobalEnv::new())
            .map_err(|e| EvalError::new("machine::new", e.to_string()))?;
        let r_global = gc.add_gc_root(global_env);
        Ok(Machine {
            pc: Opcode::Halt,
            expr: None,
            value: None,
            cont: Opcode::Halt,
            env: None,
            frame: None,
            global_env,
            r_expr: gc.add_empty_root(),
            r_value: gc.add_empty_root(),
            r_env: gc.add_empty_root(),
            r_frame: gc.add_empty_root(),
            r_global,
        })
    }

    /// Reduce `expr` to a value. Runs until `Halt` or an error; on
    /// error the machine halts with its registers reset.
    pub fn start_eval(
        &mut self,
        gc: &mut Collector,
        names: &StringTable,
        expr: GcRef,
    ) -> Result<GcRef, EvalError> {
        self.pc = Opcode::Eval;
        self.expr = Some(expr);
        self.value = None;
        self.cont = Opcode::Halt;
        self.env = None;
        self.frame = None;

        let result = self.run(gc, names);
        if result.is_err() {
            self.pc = Opcode::Halt;
            self.expr = None;
            self.value = None;
            self.env = None;
            self.frame = None;
        }
        result
    }

    fn run(&mut self, gc: &mut Collector, names: &StringTable) -> Result<GcRef, EvalError> {
        loop {
            self.safepoint(gc);
            trace!(pc = ?self.pc, "vsm step");
            match self.pc {
                Opcode::Halt => {
                    return self
                        .value
                        .ok_or_else(|| EvalError::new("machine::run", "halted without a value"));
                }
                Opcode::Eval => self.step_eval(gc, names)?,
                Opcode::EvalArgs => self.step_eval_args(gc)?,
                Opcode::ApplyCont => self.step_apply_cont(gc)?,
                Opcode::IfElseCont => self.step_if_else_cont(gc)?,
                Opcode::SeqCont => self.step_seq_cont(gc)?,
                Opcode::DefineCont => self.step_define_cont(gc)?,
            }
        }
    }

    /// Offer the collector a chance to run with all registers rooted.
    fn safepoint(&mut self, gc: &mut Collector) {
        if gc.needs_gc().is_none() {
            return;
        }
        self.sync_root(gc, self.r_expr, self.expr);
        self.sync_root(gc, self.r_value, self.value);
        self.sync_root(gc, self.r_env, self.env);
        self.sync_root(gc, self.r_frame, self.frame);
        gc.set_root(self.r_global, self.global_env);
        gc.maybe_collect();
        self.expr = gc.root(self.r_expr);
        self.value = gc.root(self.r_value);
        self.env = gc.root(self.r_env);
        self.frame = gc.root(self.r_frame);
        self.global_env = gc.root(self.r_global).expect("global environment rooted");
    }

    fn sync_root(&self, gc: &mut Collector, id: RootId, r: Option<GcRef>) {
        match r {
            Some(r) => gc.set_root(id, r),
            None => gc.clear_root(id),
        }
    }

    fn alloc<T: skm_core::gc::GcObject>(
        &self,
        gc: &mut Collector,
        obj: T,
    ) -> Result<GcRef, EvalError> {
        gc.alloc(obj)
            .map_err(|e| EvalError::new("machine::alloc", e.to_string()))
    }

    fn current_expr(&self) -> GcRef {
        self.expr.expect("eval step without an expression")
    }

    fn take_value(&mut self) -> GcRef {
        self.value.take().expect("continuation step without a value")
    }

    fn step_eval(&mut self, gc: &mut Collector, names: &StringTable) -> Result<(), EvalError> {
        let expr_ref = self.current_expr();
        let node = gc
            .get_as::<Expr>(expr_ref)
            .ok_or_else(|| EvalError::new("machine::step_eval", "expression register does not hold an expression"))?;
        match node {
            Expr::Constant { value } => {
                self.value = Some(*value);
                self.pc = self.cont;
            }
            Expr::Variable {
                name,
                i_link,
                j_slot,
            } => {
                let (name, i_link, j_slot) = (*name, *i_link, *j_slot);
                let v = if i_link < 0 {
                    gc.get_as::<GlobalEnv>(self.global_env)
                        .expect("global environment")
                        .get(j_slot)
                        .ok_or_else(|| {
                            EvalError::new(
                                "machine::step_eval",
                                format!("global '{}' has no value", names.resolve(name)),
                            )
                        })?
                } else {
                    let env = self.env_at(gc, i_link as u32)?;
                    gc.get_as::<LocalEnv>(env)
                        .expect("local environment")
                        .get(j_slot)
                        .ok_or_else(|| {
                            EvalError::new(
                                "machine::step_eval",
                                format!("variable '{}' is uninitialized", names.resolve(name)),
                            )
                        })?
                };
                self.value = Some(v);
                self.pc = self.cont;
            }
            Expr::Lambda { formals, .. } => {
                let arity = formals.len();
                let closure = self.alloc(
                    gc,
                    Closure {
                        lambda: expr_ref,
                        env: self.env,
                        arity,
                    },
                )?;
                self.value = Some(closure);
                self.pc = self.cont;
            }
            Expr::Apply { func, args } => {
                let (func, pending) = (*func, args.clone());
                let frame = self.alloc(
                    gc,
                    Frame::EvalArgs {
                        callee: None,
                        pending,
                        next: 0,
                        done: Vec::new(),
                        env: self.env,
                        cont: self.cont,
                        parent: self.frame,
                    },
                )?;
                self.frame = Some(frame);
                self.expr = Some(func);
                self.cont = Opcode::EvalArgs;
                self.pc = Opcode::Eval;
            }
            Expr::If {
                test,
                then_expr,
                else_expr,
            } => {
                let (test, then_expr, else_expr) = (*test, *then_expr, *else_expr);
                let frame = self.alloc(
                    gc,
                    Frame::IfElse {
                        then_expr,
                        else_expr,
                        env: self.env,
                        cont: self.cont,
                        parent: self.frame,
                    },
                )?;
                self.frame = Some(frame);
                self.expr = Some(test);
                self.cont = Opcode::IfElseCont;
                self.pc = Opcode::Eval;
            }
            Expr::Sequence { exprs } => {
                debug_assert!(!exprs.is_empty(), "parser emits no empty sequences");
                let head = exprs[0];
                let rest = exprs[1..].to_vec();
                let frame = self.alloc(
                    gc,
                    Frame::Seq {
                        rest,
                        next: 0,
                        env: self.env,
                        cont: self.cont,
                        parent: self.frame,
                    },
                )?;
                self.frame = Some(frame);
                self.expr = Some(head);
                self.cont = Opcode::SeqCont;
                self.pc = Opcode::Eval;
            }
            Expr::Define {
                name, rhs, site, ..
            } => {
                let (name, rhs) = (*name, *rhs);
                let (i_link, j_slot) = match site {
                    crate::Binding::Global { slot } => (-1, *slot),
                    crate::Binding::Local { i_link, j_slot } => (*i_link as i32, *j_slot),
                };
                let frame = self.alloc(
                    gc,
                    Frame::Define {
                        name,
                        i_link,
                        j_slot,
                        env: self.env,
                        cont: self.cont,
                        parent: self.frame,
                    },
                )?;
                self.frame = Some(frame);
                self.expr = Some(rhs);
                self.cont = Opcode::DefineCont;
                self.pc = Opcode::Eval;
            }
        }
        Ok(())
    }

    fn current_frame(&self) -> GcRef {
        self.frame.expect("continuation step without a frame")
    }

    fn step_eval_args(&mut self, gc: &mut Collector) -> Result<(), EvalError> {
        let frame_ref = self.current_frame();
        let v = self.take_value();
        gc.record_write(frame_ref, v);
        let frame = gc
            .get_as_mut::<Frame>(frame_ref)
            .expect("eval-args frame");
        let Frame::EvalArgs {
            callee,
            pending,
            next,
            done,
            env,
            ..
        } = frame
        else {
            return Err(EvalError::new("machine::step_eval_args", "mismatched frame"));
        };
        if callee.is_none() {
            *callee = Some(v);
        } else {
            done.push(v);
        }
        if *next < pending.len() {
            let arg = pending[*next];
            *next += 1;
            self.env = *env;
            self.expr = Some(arg);
            self.cont = Opcode::EvalArgs;
            self.pc = Opcode::Eval;
        } else {
            self.pc = Opcode::ApplyCont;
        }
        Ok(())
    }

    fn step_apply_cont(&mut self, gc: &mut Collector) -> Result<(), EvalError> {
        let frame_ref = self.current_frame();
        let (callee, args, env, cont, parent) = {
            let Some(Frame::EvalArgs {
                callee,
                done,
                env,
                cont,
                parent,
                ..
            }) = gc.get_as::<Frame>(frame_ref)
            else {
                return Err(EvalError::new("machine::step_apply_cont", "mismatched frame"));
            };
            (
                callee.expect("callee evaluated before apply"),
                done.clone(),
                *env,
                *cont,
                *parent,
            )
        };
        self.frame = parent;

        let callee_obj = gc.get(callee).as_any();
        let Some(proc) = FacetRegistry::instance().variant::<dyn Procedure>(callee_obj) else {
            return Err(EvalError::new(
                "machine::step_apply_cont",
                "callee is not a procedure",
            ));
        };
        if proc.arity() != args.len() {
            return Err(EvalError::new(
                "machine::step_apply_cont",
                format!(
                    "arity mismatch: {} applied to {} arguments",
                    proc.describe(),
                    args.len()
                ),
            ));
        }

        if let Some(prim) = gc.get_as::<Primitive>(callee) {
            let op = prim.op;
            let a = gc
                .get_as::<Value>(args[0])
                .ok_or_else(|| non_numeric_operand(op, gc, args[0]))?;
            let b = gc
                .get_as::<Value>(args[1])
                .ok_or_else(|| non_numeric_operand(op, gc, args[1]))?;
            let result = apply_prim(op, a, b)?;
            self.env = env;
            self.value = Some(self.alloc(gc, result)?);
            self.pc = cont;
            return Ok(());
        }

        let closure = gc
            .get_as::<Closure>(callee)
            .expect("procedure facet implies closure or primitive");
        let (lambda, captured) = (closure.lambda, closure.env);
        let Some(Expr::Lambda { body, n_slots, .. }) = gc.get_as::<Expr>(lambda) else {
            return Err(EvalError::new(
                "machine::step_apply_cont",
                "closure lambda is not a lambda expression",
            ));
        };
        let (body, n_slots) = (*body, *n_slots);
        let new_env = self.alloc(gc, LocalEnv::bind(captured, n_slots, &args))?;
        self.env = Some(new_env);
        self.expr = Some(body);
        self.cont = cont;
        self.pc = Opcode::Eval;
        Ok(())
    }

    fn step_if_else_cont(&mut self, gc: &mut Collector) -> Result<(), EvalError> {
        let frame_ref = self.current_frame();
        let (then_expr, else_expr, env, cont, parent) = {
            let Some(Frame::IfElse {
                then_expr,
                else_expr,
                env,
                cont,
                parent,
            }) = gc.get_as::<Frame>(frame_ref)
            else {
                return Err(EvalError::new("machine::step_if_else_cont", "mismatched frame"));
            };
            (*then_expr, *else_expr, *env, *cont, *parent)
        };
        let v = self.take_value();
        let test = gc
            .get_as::<Value>(v)
            .and_then(Value::as_bool)
            .ok_or_else(|| {
                EvalError::new("machine::step_if_else_cont", "if-test is not a boolean")
            })?;
        self.frame = parent;
        self.env = env;
        self.expr = Some(if test { then_expr } else { else_expr });
        self.cont = cont;
        self.pc = Opcode::Eval;
        Ok(())
    }

    fn step_seq_cont(&mut self, gc: &mut Collector) -> Result<(), EvalError> {
        let frame_ref = self.current_frame();
        let frame = gc.get_as_mut::<Frame>(frame_ref).expect("seq frame");
        let Frame::Seq {
            rest,
            next,
            env,
            cont,
            parent,
        } = frame
        else {
            return Err(EvalError::new("machine::step_seq_cont", "mismatched frame"));
        };
        if *next < rest.len() {
            let e = rest[*next];
            *next += 1;
            let env = *env;
            self.env = env;
            self.expr = Some(e);
            self.cont = Opcode::SeqCont;
            self.pc = Opcode::Eval;
            // the previous element's value is discarded
            self.value = None;
        } else {
            let (env, cont, parent) = (*env, *cont, *parent);
            self.frame = parent;
            self.env = env;
            self.pc = cont;
        }
        Ok(())
    }

    fn step_define_cont(&mut self, gc: &mut Collector) -> Result<(), EvalError> {
        let frame_ref = self.current_frame();
        let (i_link, j_slot, env, cont, parent) = {
            let Some(Frame::Define {
                i_link,
                j_slot,
                env,
                cont,
                parent,
                ..
            }) = gc.get_as::<Frame>(frame_ref)
            else {
                return Err(EvalError::new("machine::step_define_cont", "mismatched frame"));
            };
            (*i_link, *j_slot, *env, *cont, *parent)
        };
        let v = *self.value.as_ref().expect("defined value present");
        self.frame = parent;
        self.env = env;
        if i_link < 0 {
            gc.get_as_mut::<GlobalEnv>(self.global_env)
                .expect("global environment")
                .set(j_slot, v);
            gc.record_write(self.global_env, v);
        } else {
            let target = self.env_at(gc, i_link as u32)?;
            gc.get_as_mut::<LocalEnv>(target)
                .expect("local environment")
                .set(j_slot, v);
            gc.record_write(target, v);
        }
        // the defined value stays in the value register: a definition
        // evaluates to its right-hand side
        self.pc = cont;
        Ok(())
    }

    fn env_at(&self, gc: &Collector, i_link: u32) -> Result<GcRef, EvalError> {
        let mut cur = self.env.ok_or_else(|| {
            EvalError::new("machine::env_at", "local binding referenced outside any environment")
        })?;
        for _ in 0..i_link {
            cur = gc
                .get_as::<LocalEnv>(cur)
                .expect("environment chain")
                .parent()
                .ok_or_else(|| {
                    EvalError::new("machine::env_at", "environment chain shorter than binding path")
                })?;
        }
        Ok(cur)
    }

    /// The global environment object; values installed by toplevel
    /// defines live here.
    pub fn global_env(&self) -> GcRef {
        self.global_env
    }
}

fn non_numeric_operand(
    op: skm_core::value::PrimOp,
    gc: &Collector,
    arg: GcRef,
) -> EvalError {
    let got = if gc.get_as::<Closure>(arg).is_some() {
        "a closure"
    } else if gc.get_as::<Primitive>(arg).is_some() {
        "a primitive"
    } else {
        "a non-value object"
    };
    EvalError::new(
        "machine::step_apply_cont",
        format!("operator '{}' applied to {}", op.spelling(), got),
    )
}
