//! TOML run configuration.
//!
//! ```toml
//! [data]
//! index = "tables/index.json"
//! doc_lengths = "tables/doclen.json"
//! background = "tables/bglm.json"
//! keywords = "keyword"
//! documents = "docs"
//! queries = "PTV.query"
//! answers = "PTV.ans"
//! sim_keywords = "PTV.sim"
//!
//! [users]
//! max_queries = 5
//!
//! [run]
//! episodes = 100
//! seed = 7
//! ```
//!
//! Data paths are resolved against the directory holding the config file.

use std::fs;
use std::path::{Path, PathBuf};

use iir_core::{AgentConfig, RetrievalConfig, UserConfig};
use serde::Deserialize;

use crate::error::{Result, StoreError};

/// Where the static tables live.
#[derive(Clone, Debug, Deserialize)]
pub struct DataPaths {
    pub index: PathBuf,
    pub doc_lengths: PathBuf,
    pub background: PathBuf,
    /// Directory with one keyword file per document.
    pub keywords: PathBuf,
    /// Directory with one text file per document.
    pub documents: PathBuf,
    pub queries: PathBuf,
    pub answers: PathBuf,
    pub sim_keywords: PathBuf,
}

impl DataPaths {
    fn resolve(&mut self, base: &Path) {
        for path in [
            &mut self.index,
            &mut self.doc_lengths,
            &mut self.background,
            &mut self.keywords,
            &mut self.documents,
            &mut self.queries,
            &mut self.answers,
            &mut self.sim_keywords,
        ] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub episodes: usize,
    /// Fixed seed for reproducible runs; entropy-seeded when absent.
    pub seed: Option<u64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            episodes: 100,
            seed: None,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct SimulationConfig {
    pub data: DataPaths,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub users: UserConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub run: RunConfig,
}

impl SimulationConfig {
    /// Read and validate a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let config = Self::parse(&text, base)?;
        tracing::info!(path = %path.display(), "config loaded");
        Ok(config)
    }

    /// Parse TOML, resolving relative data paths against `base`.
    pub fn parse(text: &str, base: &Path) -> Result<Self> {
        let mut config: Self = toml::from_str(text)?;
        config.data.resolve(base);
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let r = &self.retrieval;
        if !(r.mu.is_finite() && r.mu > 0.0) {
            return Err(invalid("retrieval.mu must be positive"));
        }
        if !(r.background_floor.is_finite() && r.background_floor > 0.0) {
            return Err(invalid("retrieval.background_floor must be positive"));
        }
        let u = &self.users;
        if u.max_queries == 0 {
            return Err(invalid("users.max_queries must be at least 1"));
        }
        if u.patience_std < 0.0 || u.ap_threshold_std < 0.0 {
            return Err(invalid("users standard deviations must be non-negative"));
        }
        let a = &self.agent;
        if a.history_len == 0 || a.train_pool_size == 0 || a.update_every == 0 {
            return Err(invalid(
                "agent.history_len, train_pool_size and update_every must be at least 1",
            ));
        }
        if !(0.0..=1.0).contains(&a.epsilon) {
            return Err(invalid("agent.epsilon must lie in [0, 1]"));
        }
        Ok(())
    }
}

fn invalid(msg: &str) -> StoreError {
    StoreError::InvalidData(msg.to_string())
}
