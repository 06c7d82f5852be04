//! API key resolution for the Gemini client.
//!
//! Sources, first non-empty wins:
//! 1. explicit value (`--api-key`)
//! 2. `LLM_API_KEY`, then `GEMINI_API_KEY`
//! 3. `<target>/api_key.txt`
//! 4. `<target>/Gemini-api.txt` (legacy name)
//! 5. `api_key.txt` next to the executable

use crate::error::Pdf2DataError;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const KEY_ENV_VARS: [&str; 2] = ["LLM_API_KEY", "GEMINI_API_KEY"];
pub const KEY_FILE: &str = "api_key.txt";
pub const LEGACY_KEY_FILE: &str = "Gemini-api.txt";

/// Resolve a key using the process environment and executable location.
pub fn resolve_api_key(
    explicit: Option<&str>,
    target_dir: &Path,
    provider: &str,
) -> Result<String, Pdf2DataError> {
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf));
    resolve_api_key_with(
        explicit,
        |name| std::env::var(name).ok(),
        target_dir,
        exe_dir.as_deref(),
        provider,
    )
}

/// Resolution with injectable environment lookup, for tests.
pub fn resolve_api_key_with(
    explicit: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
    target_dir: &Path,
    program_dir: Option<&Path>,
    provider: &str,
) -> Result<String, Pdf2DataError> {
    if let Some(key) = explicit.map(str::trim).filter(|k| !k.is_empty()) {
        debug!("Using API key from command line");
        return Ok(key.to_string());
    }

    if let Some((var, key)) = KEY_ENV_VARS
        .iter()
        .find_map(|var| non_empty(env(*var)).map(|k| (*var, k)))
    {
        debug!("Using API key from ${var}");
        return Ok(key);
    }

    let mut files: Vec<PathBuf> = vec![target_dir.join(KEY_FILE), target_dir.join(LEGACY_KEY_FILE)];
    if let Some(dir) = program_dir {
        files.push(dir.join(KEY_FILE));
    }

    for file in files {
        if let Some(key) = non_empty(std::fs::read_to_string(&file).ok()) {
            debug!("Using API key from {}", file.display());
            return Ok(key);
        }
    }

    Err(Pdf2DataError::MissingApiKey {
        provider: provider.to_string(),
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
