//! Interpreter configuration
//!
//! One struct covers every tunable of an interpreter instance: logging
//! verbosity, arena reserves, collector shape, printer indentation,
//! and the REPL's history handling. All fields default, and a TOML
//! file may override any subset:
//!
//! ```toml
//! debug_flag = true
//! indent_w = 4
//!
//! [gc]
//! n_generations = 2
//! space_z = 8388608
//! ```

use serde::Deserialize;
use skm_core::gc::GcConfig;
use skm_core::printable::PrintConfig;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArenaSizes {
    /// Stable arena backing the string table
    pub stable_z: usize,
    /// Parser syntax-state stack arena, cleared per toplevel form
    pub parser_z: usize,
}

impl Default for ArenaSizes {
    fn default() -> Self {
        ArenaSizes {
            stable_z: 256 * 1024,
            parser_z: 256 * 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GcSettings {
    pub n_generations: usize,
    /// Byte reserve per generation space
    pub space_z: usize,
    /// Reserved tail per space
    pub redline_z: usize,
    /// Used-byte threshold that requests a collection
    pub trigger_z: usize,
    /// Collections survived before promotion
    pub promote_age: u8,
}

impl Default for GcSettings {
    fn default() -> Self {
        let d = GcConfig::default();
        GcSettings {
            n_generations: d.n_generations,
            space_z: d.space_reserve_z,
            redline_z: d.space_redline_z,
            trigger_z: d.trigger_z,
            promote_age: d.promote_age,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReplSettings {
    pub history_size: usize,
    /// History file path; defaults to `.skm_history` under home
    pub history_file: Option<PathBuf>,
    /// Print the welcome banner on interactive startup
    pub welcome: bool,
}

impl Default for ReplSettings {
    fn default() -> Self {
        ReplSettings {
            history_size: 500,
            history_file: None,
            welcome: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VsmConfig {
    /// Verbose machine and collector logging
    pub debug_flag: bool,
    /// Pretty-printer indent width
    pub indent_w: Option<usize>,
    pub arena: ArenaSizes,
    pub gc: GcSettings,
    pub repl: ReplSettings,
}

impl VsmConfig {
    pub fn load(path: &Path) -> Result<Self, String> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read config '{}': {}", path.display(), e))?;
        toml::from_str(&text)
            .map_err(|e| format!("failed to parse config '{}': {}", path.display(), e))
    }

    pub fn gc_config(&self) -> GcConfig {
        GcConfig {
            n_generations: self.gc.n_generations,
            space_reserve_z: self.gc.space_z,
            space_redline_z: self.gc.redline_z,
            trigger_z: self.gc.trigger_z,
            promote_age: self.gc.promote_age,
        }
    }

    pub fn print_config(&self) -> PrintConfig {
        let mut cfg = PrintConfig::default();
        if let Some(w) = self.indent_w {
            cfg.indent_w = w;
        }
        cfg
    }
}
