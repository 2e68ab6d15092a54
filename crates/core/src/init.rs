//! One-shot subsystem initialization
//!
//! Facet registrations happen once, at startup, before any interpreter
//! runs. Each crate exposes a `require()` that first requires the
//! subsystems it depends on and then performs its own registrations
//! exactly once.

use crate::impl_facet;
use crate::printable::Printable;
use crate::value::{Primitive, Value};
use std::sync::Once;

/// Register the core facet implementations. Idempotent.
pub fn require() {
    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        impl_facet!(dyn Printable, Value);
        impl_facet!(dyn Printable, Primitive);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facet::FacetRegistry;
    use crate::printable::{PrintConfig, Printable, pretty_string};
    use crate::value::Value;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_value_printable_via_registry() {
        require();
        let v = Value::I64(7);
        let pr = FacetRegistry::instance()
            .variant::<dyn Printable>(&v)
            .expect("Value registers Printable");
        assert_eq!(pretty_string(pr, PrintConfig::default()), "7");
    }

    #[test]
    #[serial]
    fn test_require_idempotent() {
        require();
        require();
    }
}
