//! Machine identity resolution.
//!
//! Each data directory carries a stable machine identity used to
//! disambiguate events when directories are later merged or compared. The
//! identity lives in a plain-text `.machine_id` file alongside the event
//! database and survives process restarts.
//!
//! Resolution precedence:
//!
//! 1. An explicit override (builder setting or the
//!    `CONSTELLATION_MACHINE_ID` environment variable) — used as-is, never
//!    persisted.
//! 2. A previously persisted `.machine_id` file — read and trimmed.
//! 3. Otherwise a fresh id is generated, persisted, and returned.

use std::fs;
use std::path::Path;

use rand::Rng;

use crate::error::Result;

/// File name of the persisted identity, relative to the data directory.
pub const MACHINE_ID_FILE: &str = ".machine_id";

/// Environment variable that overrides the persisted identity.
pub const MACHINE_ID_ENV: &str = "CONSTELLATION_MACHINE_ID";

/// Readable prefix for generated identities.
const MACHINE_ID_PREFIX: &str = "machine-";

/// Length of the random suffix in a generated identity.
const SUFFIX_LEN: usize = 10;

/// Resolve the machine identity for a data directory.
///
/// `override_id` takes precedence over everything; the environment variable
/// comes next; then the persisted file; finally a new identity is generated
/// and persisted. Only the generation branch writes to disk, so resolving
/// twice against the same directory yields the same id.
pub fn resolve_machine_id(data_dir: &Path, override_id: Option<&str>) -> Result<String> {
    if let Some(id) = override_id {
        return Ok(id.to_string());
    }
    if let Ok(id) = std::env::var(MACHINE_ID_ENV) {
        if !id.trim().is_empty() {
            return Ok(id.trim().to_string());
        }
    }

    let path = data_dir.join(MACHINE_ID_FILE);
    if path.exists() {
        let persisted = fs::read_to_string(&path)?;
        let trimmed = persisted.trim();
        if !trimmed.is_empty() {
            return Ok(trimmed.to_string());
        }
    }

    let id = generate_machine_id();
    fs::write(&path, format!("{id}\n"))?;
    tracing::debug!(machine_id = %id, path = %path.display(), "generated machine identity");
    Ok(id)
}

/// Generate a fresh identity: readable prefix + short random suffix.
fn generate_machine_id() -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::thread_rng();
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect();
    format!("{MACHINE_ID_PREFIX}{suffix}")
}
