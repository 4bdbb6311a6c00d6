//! Dotted-path addressing
//!
//! Paths take the form `config.section[.option]`. Two-part paths address a
//! whole section; three-part paths address a single option. For named
//! sections the middle segment is the section name; for anonymous sections
//! it is the section type and resolves positionally to the first section
//! of that type.

use crate::errors::{not_found, Result};

/// A parsed dotted path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigPath {
    /// Config document name, e.g. `network`
    pub config: String,
    /// Section name (or type, for anonymous sections)
    pub section: String,
    /// Option key; `None` when the path addresses a whole section
    pub option: Option<String>,
}

impl ConfigPath {
    /// Parse a dotted path like `network.wan.ipaddr`
    ///
    /// Empty segments are discarded, so `network..wan` is malformed. Paths
    /// with fewer than two or more than three segments are rejected.
    pub fn parse(path: &str) -> Result<Self> {
        let parts: Vec<&str> = path.split('.').filter(|p| !p.is_empty()).collect();

        if parts.len() < 2 || parts.len() > 3 {
            return Err(not_found(format!(
                "path '{path}': expected config.section[.option]"
            )));
        }

        Ok(Self {
            config: parts[0].to_string(),
            section: parts[1].to_string(),
            option: parts.get(2).map(|s| s.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_three_part_path() {
        let path = ConfigPath::parse("network.wan.ipaddr").unwrap();
        assert_eq!(path.config, "network");
        assert_eq!(path.section, "wan");
        assert_eq!(path.option.as_deref(), Some("ipaddr"));
    }

    #[test]
    fn test_two_part_path_addresses_section() {
        let path = ConfigPath::parse("firewall.defaults").unwrap();
        assert_eq!(path.section, "defaults");
        assert!(path.option.is_none());
    }

    #[test]
    fn test_malformed_paths_rejected() {
        assert!(ConfigPath::parse("network").is_err());
        assert!(ConfigPath::parse("").is_err());
        assert!(ConfigPath::parse("a.b.c.d").is_err());
    }

    #[test]
    fn test_empty_segments_discarded() {
        // Leading/trailing dots collapse; the remaining parts must still
        // form a valid path
        let path = ConfigPath::parse(".network.wan.").unwrap();
        assert_eq!(path.config, "network");
        assert_eq!(path.section, "wan");
    }
}
