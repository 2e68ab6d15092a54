//! Closures and the Procedure facet

use skm_core::gc::{Forwarder, GcObject, GcRef};
use skm_core::printable::{Printable, Printer};
use skm_core::value::Primitive;
use std::any::Any;

/// A lambda paired with the environment it closed over.
#[derive(Debug)]
pub struct Closure {
    /// The lambda expression node
    pub lambda: GcRef,
    /// Captured environment; `None` for toplevel lambdas
    pub env: Option<GcRef>,
    /// Formal count, denormalized from the lambda node for arity
    /// checks without a heap walk
    pub arity: usize,
}

impl GcObject for Closure {
    fn shallow_size(&self) -> usize {
        std::mem::size_of::<Closure>()
    }

    fn forward_children(&mut self, fwd: &mut Forwarder<'_>) {
        fwd.forward_inplace(&mut self.lambda);
        if let Some(env) = self.env.as_mut() {
            fwd.forward_inplace(env);
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl Printable for Closure {
    fn pretty(&self, p: &mut Printer<'_>) {
        p.write("#<closure/");
        p.write(&self.arity.to_string());
        p.write(">");
    }
}

/// The invocation facet: anything the machine may apply.
pub trait Procedure {
    fn arity(&self) -> usize;
    fn describe(&self) -> String;
}

impl Procedure for Closure {
    fn arity(&self) -> usize {
        self.arity
    }

    fn describe(&self) -> String {
        format!("closure of {} arguments", self.arity)
    }
}

impl Procedure for Primitive {
    fn arity(&self) -> usize {
        2
    }

    fn describe(&self) -> String {
        format!("primitive '{}'", self.op.spelling())
    }
}
