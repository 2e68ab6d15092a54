//! Schematika core: the memory substrate under the toolchain
//!
//! Everything the reader and the machine allocate lives here:
//!
//! - `arena`: bump allocation with reserve, redline, checkpoint, clear
//! - `gc`: generational copying collector over [`gc::GcObject`] heap
//!   types, with forwarding, roots, a write barrier, and promotion
//! - `typeseq`: dense process-wide type sequence numbers
//! - `facet`: the (facet, representation) registry for open dispatch
//! - `intern`: the unique-string table behind every symbol
//! - `value`: boxed built-in runtime values
//! - `printable`: the printing facet and indent-aware printer
//!
//! Call [`init::require`] before using the facet registry.

pub mod arena;
pub mod facet;
pub mod gc;
pub mod init;
pub mod intern;
pub mod printable;
pub mod typeseq;
pub mod value;

pub use arena::{AllocError, Arena, ArenaConfig};
pub use facet::FacetRegistry;
pub use gc::{Collector, Forwarder, GcConfig, GcObject, GcRef, MemoryStats, RootId};
pub use intern::{Name, StringTable};
pub use printable::{PrintConfig, Printable, Printer, pretty_string};
pub use typeseq::{TypeSeq, typeseq_of};
pub use value::{PrimOp, Primitive, Value, ValueKind, format_f64};
