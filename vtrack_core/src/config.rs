//! Repository configuration file.
//!
//! Plain `key=value` lines; blank lines and `#` comments are ignored.
//!
//! ```text
//! version=1
//! algo=blake3-256
//! tag=XX
//! ```

use crate::error::{Error, Result};
use crate::hash::Algorithm;
use crate::naming::validate_name;

/// Tag used in working-file names when none is configured.
pub const DEFAULT_TAG: &str = "XX";

const CONFIG_VERSION: &str = "1";

/// Parsed repository configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoConfig {
    /// Digest algorithm for the archive.
    pub algorithm: Algorithm,
    /// Author initials or other fixed tag embedded in working-file names.
    pub tag: String,
}

impl RepoConfig {
    /// Create a config with the given tag.
    pub fn new(tag: impl Into<String>) -> Result<Self> {
        let tag = tag.into();
        validate_name("tag", &tag)?;
        Ok(Self {
            algorithm: Algorithm::Blake3,
            tag,
        })
    }

    /// Render the config file contents.
    pub fn to_file_content(&self) -> String {
        format!(
            "version={}\nalgo={}\ntag={}\n",
            CONFIG_VERSION,
            self.algorithm.as_str(),
            self.tag
        )
    }

    /// Parse config file contents.
    pub fn parse(content: &str) -> Result<Self> {
        let mut version = None;
        let mut algo = None;
        let mut tag = None;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                match key.trim() {
                    "version" => version = Some(value.trim()),
                    "algo" => algo = Some(value.trim()),
                    "tag" => tag = Some(value.trim()),
                    _ => {}
                }
            }
        }

        if version != Some(CONFIG_VERSION) {
            return Err(Error::invalid_config(format!(
                "Unsupported config version: {:?}",
                version
            )));
        }

        let algo_str = algo.ok_or_else(|| Error::invalid_config("Missing algo in config"))?;
        let algorithm = Algorithm::parse(algo_str)?;

        let tag = tag.unwrap_or(DEFAULT_TAG).to_string();
        validate_name("tag", &tag).map_err(|e| Error::invalid_config(e.to_string()))?;

        Ok(Self { algorithm, tag })
    }
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::Blake3,
            tag: DEFAULT_TAG.to_string(),
        }
    }
}
