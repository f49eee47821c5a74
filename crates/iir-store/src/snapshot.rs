//! Trained policy persistence as pretty-printed JSON.

use std::fs;
use std::path::Path;

use iir_core::{LinearPolicy, export_json, import_json};

use crate::error::{Result, StoreError};

/// Write `policy` to `path`, creating parent directories as needed.
pub fn save_policy(path: &Path, policy: &LinearPolicy) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
    }
    let json = export_json(policy)?;
    fs::write(path, json).map_err(|e| StoreError::io(path, e))?;
    tracing::info!(path = %path.display(), "policy saved");
    Ok(())
}

pub fn load_policy(path: &Path) -> Result<LinearPolicy> {
    let text = fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;
    let policy = import_json(&text)?;
    tracing::info!(
        path = %path.display(),
        actions = policy.num_actions(),
        state_dim = policy.state_dim(),
        "policy loaded"
    );
    Ok(policy)
}
