//! Optional TOML configuration
//!
//! ```toml
//! [contraction]
//! max_settled = 500
//! parallel_witness = true
//!
//! [router]
//! resolve_radius_m = 75.0
//! strategy = "contraction_hierarchy"
//! ```
//!
//! Missing sections and keys take their defaults. Command-line flags
//! override what the file says.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use wayroute_routing::{ContractionConfig, RouterConfig};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WayrouteConfig {
    pub contraction: ContractionConfig,
    pub router: RouterConfig,
}

impl WayrouteConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).context("invalid configuration")?;
        config.contraction.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("in {}", path.display()))
    }

    /// Defaults when no file is given
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use wayroute_routing::SearchStrategy;

    #[test]
    fn test_empty_file_gives_defaults() {
        assert_eq!(WayrouteConfig::from_toml_str("").unwrap(), WayrouteConfig::default());
    }

    #[test]
    fn test_partial_sections() {
        let config = WayrouteConfig::from_toml_str(
            r#"
            [contraction]
            max_settled = 500

            [router]
            resolve_radius_m = 75.0
            strategy = "plain_dijkstra"
            "#,
        )
        .unwrap();
        assert_eq!(config.contraction.max_settled, Some(500));
        assert!(config.contraction.parallel_witness);
        assert_eq!(config.router.resolve_radius_m, 75.0);
        assert_eq!(config.router.strategy, SearchStrategy::PlainDijkstra);
        assert!(config.router.parallel_matrix);
    }

    #[test]
    fn test_rejects_unknown_section_and_bad_values() {
        assert!(WayrouteConfig::from_toml_str("[server]\nport = 1").is_err());
        assert!(WayrouteConfig::from_toml_str("[contraction]\nmax_settled = 0").is_err());
        assert!(WayrouteConfig::from_toml_str("[router]\nstrategy = \"astar\"").is_err());
        assert!(WayrouteConfig::from_toml_str("[router]\nresolve_radius = 75.0").is_err());
        assert!(WayrouteConfig::from_toml_str("[contraction]\nmax_setled = 500").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[contraction]\nparallel_witness = false").unwrap();
        let config = WayrouteConfig::load_or_default(Some(file.path())).unwrap();
        assert!(!config.contraction.parallel_witness);

        let missing = WayrouteConfig::load(Path::new("/nonexistent/wayroute.toml"));
        assert!(missing.is_err());
    }
}
