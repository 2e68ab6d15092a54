//! Schematika interpreter facade
//!
//! One value of [`Schematika`] is a complete interpreter instance:
//! collector, string and type tables, global symtab, streaming reader,
//! and machine. `read_eval` drives the read side over a span of input
//! and evaluates each toplevel form as it completes; the REPL and the
//! batch driver are thin loops over it.

use crate::config::VsmConfig;
use crate::error::VsmError;
use crate::machine::Machine;
use skm_core::facet::FacetRegistry;
use skm_core::gc::{Collector, GcRef, MemoryStats};
use skm_core::intern::StringTable;
use skm_core::printable::{Printable, Printer};
use skm_reader::ast::AstPrinter;
use skm_reader::parser::ParseCtx;
use skm_reader::reader::Reader;
use skm_reader::span::Span;
use skm_reader::symtab::GlobalSymtab;
use skm_reader::types::TypeTable;

/// What one toplevel form produced.
pub type FormResult = Result<GcRef, VsmError>;

pub struct Schematika {
    config: VsmConfig,
    gc: Collector,
    names: StringTable,
    types: TypeTable,
    globals: GlobalSymtab,
    reader: Reader,
    machine: Machine,
    /// Reusable root slots keeping the current batch of form results
    /// alive across the collections later forms may trigger
    result_roots: Vec<skm_core::gc::RootId>,
    n_result_roots: usize,
}

impl Schematika {
    pub fn new(config: VsmConfig) -> Self {
        crate::init::require();
        let mut gc = Collector::new(config.gc_config());
        let mut names = StringTable::with_reserve(config.arena.stable_z);
        let types = TypeTable::new(&mut names);
        let machine = Machine::new(&mut gc).expect("fresh heap admits the global environment");
        Schematika {
            reader: Reader::with_parser_arena(config.arena.parser_z),
            config,
            gc,
            names,
            types,
            globals: GlobalSymtab::new(),
            machine,
            result_roots: Vec::new(),
            n_result_roots: 0,
        }
    }

    /// Root a result value for the remainder of this `read_eval` call,
    /// reusing slots from earlier calls.
    fn root_result(&mut self, r: GcRef) -> usize {
        let ix = self.n_result_roots;
        if ix < self.result_roots.len() {
            self.gc.set_root(self.result_roots[ix], r);
        } else {
            self.result_roots.push(self.gc.add_gc_root(r));
        }
        self.n_result_roots = ix + 1;
        ix
    }

    fn clear_result_roots(&mut self) {
        for id in &self.result_roots {
            self.gc.clear_root(*id);
        }
        self.n_result_roots = 0;
    }

    pub fn config(&self) -> &VsmConfig {
        &self.config
    }

    pub fn begin_interactive_session(&mut self) {
        self.reader.begin_interactive_session();
    }

    pub fn begin_batch_session(&mut self) {
        self.reader.begin_batch_session();
    }

    /// Parser stack depth; 1 when idle. Drives the REPL prompt.
    pub fn parser_stack_depth(&self) -> usize {
        self.reader.parser_stack_depth()
    }

    pub fn is_incomplete(&self) -> bool {
        self.reader.is_incomplete()
    }

    /// Feed `input` through the reader, evaluating each completed
    /// toplevel form in order. Returns one result per form (or per
    /// error); the returned references stay valid until the next
    /// `read_eval` call. With `eof` set, pending reader state is
    /// flushed first.
    pub fn read_eval(&mut self, input: &str, eof: bool) -> Vec<FormResult> {
        self.clear_result_roots();
        // later forms may trigger collections that move earlier forms'
        // results; hold root indices and resolve them at the end
        let mut rooted: Vec<Result<usize, VsmError>> = Vec::new();
        let mut rest = Span::all(input);
        let mut stop = false;
        while !stop {
            let r = {
                let mut ctx = ParseCtx {
                    gc: &mut self.gc,
                    names: &mut self.names,
                    types: &self.types,
                    globals: &mut self.globals,
                };
                self.reader.read_expr(&mut ctx, input, rest, eof)
            };
            rest = rest.suffix_after(r.consumed);
            if let Some(e) = r.error {
                rooted.push(Err(VsmError::Read(e)));
                if self.reader.session_mode() != skm_reader::reader::SessionMode::Interactive {
                    // batch sessions stop at the first error
                    stop = true;
                }
                continue;
            }
            let Some(expr) = r.expr else {
                break;
            };
            match self.machine.start_eval(&mut self.gc, &self.names, expr) {
                Ok(value) => {
                    let ix = self.root_result(value);
                    rooted.push(Ok(ix));
                }
                Err(e) => rooted.push(Err(VsmError::Eval(e))),
            }
        }
        rooted
            .into_iter()
            .map(|r| {
                r.map(|ix| {
                    self.gc
                        .root(self.result_roots[ix])
                        .expect("result root held for the call")
                })
            })
            .collect()
    }

    /// Evaluate a complete source text, asserting EOF.
    pub fn eval_source(&mut self, source: &str) -> Vec<FormResult> {
        self.read_eval(source, true)
    }

    /// Parse a complete source text without evaluating: one entry per
    /// toplevel form or error.
    pub fn parse_source(&mut self, source: &str) -> Vec<FormResult> {
        let mut results = Vec::new();
        let mut rest = Span::all(source);
        loop {
            let r = {
                let mut ctx = ParseCtx {
                    gc: &mut self.gc,
                    names: &mut self.names,
                    types: &self.types,
                    globals: &mut self.globals,
                };
                self.reader.read_expr(&mut ctx, source, rest, true)
            };
            rest = rest.suffix_after(r.consumed);
            if let Some(e) = r.error {
                results.push(Err(VsmError::Read(e)));
                if self.reader.session_mode() != skm_reader::reader::SessionMode::Interactive {
                    return results;
                }
                continue;
            }
            match r.expr {
                Some(expr) => results.push(Ok(expr)),
                None => return results,
            }
        }
    }

    /// The boxed built-in value behind `r`, if that is what it holds.
    pub fn value_of(&self, r: GcRef) -> Option<skm_core::value::Value> {
        self.gc.get_as::<skm_core::value::Value>(r).cloned()
    }

    /// Render a runtime value through its Printable facet.
    pub fn render_value(&self, r: GcRef) -> String {
        let obj = self.gc.get(r).as_any();
        match FacetRegistry::instance().variant::<dyn Printable>(obj) {
            Some(pr) => {
                let mut out = String::new();
                let mut p = Printer::new(&mut out, self.config.print_config());
                pr.pretty(&mut p);
                out
            }
            None => "#<opaque>".to_string(),
        }
    }

    /// Render an expression node back to source form.
    pub fn render_expr(&self, r: GcRef) -> String {
        AstPrinter {
            gc: &self.gc,
            names: &self.names,
            types: &self.types,
        }
        .to_string(r, self.config.print_config())
    }

    /// Per-generation collector statistics.
    pub fn memory_stats(&self) -> Vec<MemoryStats> {
        (0..self.gc.n_store())
            .map(|g| self.gc.store_info(g))
            .collect()
    }

    /// Request and run a full collection.
    pub fn collect_now(&mut self) {
        let oldest = self.gc.n_store() - 1;
        self.gc.request_gc(oldest);
        self.gc.maybe_collect();
    }
}
