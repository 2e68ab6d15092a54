//! Virtual Schematika Machine
//!
//! Reduces expression nodes to values with an explicit-continuation
//! machine: registers plus heap-allocated frames, closures capturing
//! environments, and typeseq-keyed numeric dispatch for the primitive
//! operators. The [`interp::Schematika`] facade bundles a machine with
//! a collector, tables, and a streaming reader into one interpreter
//! instance.

pub mod closure;
pub mod config;
pub mod env;
pub mod error;
pub mod frame;
pub mod interp;
pub mod machine;
pub mod primitive;

pub use closure::{Closure, Procedure};
pub use config::VsmConfig;
pub use env::{GlobalEnv, LocalEnv};
pub use error::{EvalError, VsmError};
pub use frame::{Frame, Opcode};
pub use interp::{FormResult, Schematika};
pub use machine::Machine;
pub use skm_reader::symtab::Binding;

/// One-shot initialization: facet registrations for machine-level
/// representations, plus everything the reader and core register.
pub mod init {
    use crate::closure::{Closure, Procedure};
    use skm_core::impl_facet;
    use skm_core::printable::Printable;
    use skm_core::value::Primitive;
    use std::sync::Once;

    /// Register machine facets. Idempotent.
    pub fn require() {
        static ONCE: Once = Once::new();
        ONCE.call_once(|| {
            skm_reader::init::require();
            impl_facet!(dyn Printable, Closure);
            impl_facet!(dyn Procedure, Closure);
            impl_facet!(dyn Procedure, Primitive);
        });
    }
}
