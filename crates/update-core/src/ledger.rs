use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Well-known name of the ledger inside the generator's working directory.
pub const LEDGER_FILE: &str = "patch.json";

/// The generator's private fingerprint-per-path memory across runs.
///
/// Keys are paths relative to the application tree, values the hex
/// fingerprint of the file content at the last generated version. Entries
/// for files removed from newer trees are retained on purpose: they are the
/// delta basis should a path ever be resurrected.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct PatchLedger {
    pub file_hashes: BTreeMap<String, String>,
}

impl PatchLedger {
    /// Load the ledger from disk, or start empty if none exists yet.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
        } else {
            Ok(PatchLedger::default())
        }
    }

    /// Persist the ledger to disk.
    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_string(self)?)?;
        Ok(())
    }

    /// Fingerprint recorded for `rel_path` at the last generation, if any.
    pub fn fingerprint(&self, rel_path: &str) -> Option<&str> {
        self.file_hashes.get(rel_path).map(String::as_str)
    }

    /// Record the fingerprint for `rel_path`, replacing any previous one.
    pub fn record(&mut self, rel_path: impl Into<String>, fingerprint: impl Into<String>) {
        self.file_hashes.insert(rel_path.into(), fingerprint.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn roundtrips_through_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(LEDGER_FILE);

        let mut ledger = PatchLedger::default();
        ledger.record("bin/app", "00aabbcc00aabbcc");
        ledger.record("data/cfg.toml", "1122334455667788");
        ledger.save(&path).unwrap();

        let back = PatchLedger::load_or_default(&path).unwrap();
        assert_eq!(back, ledger);
        assert_eq!(back.fingerprint("bin/app"), Some("00aabbcc00aabbcc"));
        assert_eq!(back.fingerprint("missing"), None);
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempdir().unwrap();
        let ledger = PatchLedger::load_or_default(&dir.path().join(LEDGER_FILE)).unwrap();
        assert!(ledger.file_hashes.is_empty());
    }

    #[test]
    fn wire_format_matches_published_ledgers() {
        let mut ledger = PatchLedger::default();
        ledger.record("a.txt", "ff");
        let json = serde_json::to_string(&ledger).unwrap();
        assert_eq!(json, "{\"FileHashes\":{\"a.txt\":\"ff\"}}");
    }
}
