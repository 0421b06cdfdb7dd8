//! The `--config` file.
//!
//! ```json
//! {
//!   "source_name": "acme/widgets",
//!   "heads": [
//!     { "name": "master", "sha": "r10" },
//!     { "name": "v1.0", "kind": "tag", "sha": "r3" }
//!   ],
//!   "dispatcher": { "worker_name": "scm-events", "pool": { "mode": "shared" } }
//! }
//! ```
//!
//! Every field is optional.

use std::path::Path;

use anyhow::{ensure, Context};
use serde::{Deserialize, Serialize};

use dispatch::DispatcherConfig;
use scm::{CommitSha, Head, HeadKind, HeadName, MemorySource, SourceName};

const DEFAULT_SOURCE_NAME: &str = "local";

/// One head the in-process source starts with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedHead {
    pub name: HeadName,
    #[serde(default)]
    pub kind: HeadKind,
    pub sha: CommitSha,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Name events must carry to concern the in-process source.
    pub source_name: String,
    pub heads: Vec<SeedHead>,
    pub dispatcher: DispatcherConfig,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            source_name: DEFAULT_SOURCE_NAME.to_string(),
            heads: Vec::new(),
            dispatcher: DispatcherConfig::default(),
        }
    }
}

impl CliConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            !self.source_name.trim().is_empty(),
            "source_name must not be empty"
        );
        ensure!(
            self.heads.iter().all(|h| !h.name.as_str().is_empty() && !h.sha.as_str().is_empty()),
            "seed heads need a non-empty name and sha"
        );
        self.dispatcher.validate()?;
        Ok(())
    }

    /// Builds the in-process source the probe listener checks events against.
    pub fn build_source(&self) -> anyhow::Result<MemorySource> {
        let name = SourceName::new(self.source_name.clone()).context("source_name must not be empty")?;
        let source = MemorySource::new(name);
        for seed in &self.heads {
            source.put(Head::new(seed.name.clone(), seed.kind), seed.sha.clone());
        }
        Ok(source)
    }
}
