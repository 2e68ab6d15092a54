//! Printable facet and indent-aware printer
//!
//! Anything user-visible renders through [`Printable`], writing into a
//! [`Printer`] that tracks nesting depth against a configurable indent
//! width. Closed types implement the trait directly; open extensions
//! register it in the facet registry so drivers can print values they
//! do not know concretely.

/// Printer settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrintConfig {
    /// Spaces per nesting level
    pub indent_w: usize,
}

impl Default for PrintConfig {
    fn default() -> Self {
        PrintConfig { indent_w: 2 }
    }
}

/// Sink with indentation state.
pub struct Printer<'a> {
    out: &'a mut String,
    config: PrintConfig,
    depth: usize,
    at_line_start: bool,
}

impl<'a> Printer<'a> {
    pub fn new(out: &'a mut String, config: PrintConfig) -> Self {
        Printer {
            out,
            config,
            depth: 0,
            at_line_start: true,
        }
    }

    pub fn write(&mut self, s: &str) {
        if self.at_line_start && !s.is_empty() {
            for _ in 0..self.depth * self.config.indent_w {
                self.out.push(' ');
            }
            self.at_line_start = false;
        }
        self.out.push_str(s);
    }

    pub fn newline(&mut self) {
        self.out.push('\n');
        self.at_line_start = true;
    }

    pub fn indent(&mut self) {
        self.depth += 1;
    }

    pub fn dedent(&mut self) {
        debug_assert!(self.depth > 0, "dedent below zero");
        self.depth = self.depth.saturating_sub(1);
    }

    pub fn config(&self) -> &PrintConfig {
        &self.config
    }
}

/// The printing facet.
pub trait Printable {
    fn pretty(&self, p: &mut Printer<'_>);
}

/// Render any printable to a string.
pub fn pretty_string(x: &dyn Printable, config: PrintConfig) -> String {
    let mut out = String::new();
    let mut p = Printer::new(&mut out, config);
    x.pretty(&mut p);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Pair(&'static str, &'static str);

    impl Printable for Pair {
        fn pretty(&self, p: &mut Printer<'_>) {
            p.write("{");
            p.newline();
            p.indent();
            p.write(self.0);
            p.newline();
            p.write(self.1);
            p.dedent();
            p.newline();
            p.write("}");
        }
    }

    #[test]
    fn test_indent_width_applied() {
        let s = pretty_string(&Pair("a", "b"), PrintConfig { indent_w: 4 });
        assert_eq!(s, "{\n    a\n    b\n}");
    }

    #[test]
    fn test_default_indent() {
        let s = pretty_string(&Pair("x", "y"), PrintConfig::default());
        assert_eq!(s, "{\n  x\n  y\n}");
    }
}
