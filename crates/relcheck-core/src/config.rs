//! # Checker Configuration
//!
//! Policy switches of the composite checker. Deserialized from the
//! `[checker]` table of the binary's TOML configuration; every field has a
//! default so partial tables are accepted.

use serde::{Deserialize, Serialize};

/// Policy switches of [`crate::CompositeChecker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckerConfig {
    /// Discard loops over more than two composites.
    pub allow_complex_loops: bool,
    /// Skip role checks on `type=multipolygon|boundary` composites.
    pub skip_multipolygons: bool,
    /// Skip role checks on `type=restriction` composites.
    pub skip_turn_restrictions: bool,
    /// Push "N of M elements done" progress text.
    pub show_element_count: bool,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            allow_complex_loops: false,
            skip_multipolygons: false,
            skip_turn_restrictions: false,
            show_element_count: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_table_keeps_defaults() {
        let config: CheckerConfig =
            toml::from_str("allow_complex_loops = true").expect("parse");
        assert!(config.allow_complex_loops);
        assert!(!config.skip_multipolygons);
        assert!(config.show_element_count);
    }

    #[test]
    fn empty_table_is_default() {
        let config: CheckerConfig = toml::from_str("").expect("parse");
        assert_eq!(config, CheckerConfig::default());
    }
}
