use crate::error::{CoreError, Result};
use crate::version::Version;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Well-known name of the manifest inside the update root.
pub const MANIFEST_FILE: &str = "update.json";

/// One published increment of the application.
///
/// Entries are immutable once appended to the trail.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct Patch {
    /// Version this patch brings the installation to.
    pub version: Version,
    /// Free-form release description.
    pub description: String,
    /// Size of the published patch archive in bytes.
    pub size_in_bytes: u64,
}

impl Patch {
    pub fn new(version: Version, description: impl Into<String>, size_in_bytes: u64) -> Self {
        Patch {
            version,
            description: description.into(),
            size_in_bytes,
        }
    }

    /// Deterministic archive name for this patch, e.g. `patch_1_0_0_3.zip`.
    pub fn archive_name(&self) -> String {
        patch_archive_name(&self.version)
    }
}

/// Archive name for a patch targeting `version`.
pub fn patch_archive_name(version: &Version) -> String {
    format!("patch_{}.zip", version.underscored())
}

/// The published, append-only catalog of available patches plus
/// full-archive and updater metadata. Lives as `update.json` under the
/// update root; created and mutated only by the generator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct UpdateInfo {
    /// Version of the published helper binary.
    pub updater_version: Version,
    /// Size of the published helper binary in bytes.
    pub updater_size: u64,
    /// Base name (without `.zip`) of the full application archive.
    pub full_app_archive_name: String,
    /// Size of the full application archive in bytes.
    pub full_app_archive_size: u64,
    /// Published patches, strictly ascending by version.
    pub patch_trail: Vec<Patch>,
}

impl Default for UpdateInfo {
    fn default() -> Self {
        UpdateInfo {
            updater_version: Version::ZERO,
            updater_size: 0,
            full_app_archive_name: "app".to_string(),
            full_app_archive_size: 0,
            patch_trail: Vec::new(),
        }
    }
}

impl UpdateInfo {
    /// Parse a manifest from its JSON representation.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Render the manifest to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Load a manifest from disk, or start a fresh one if none exists yet.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::from_json(&fs::read_to_string(path)?)
        } else {
            Ok(UpdateInfo::default())
        }
    }

    /// Persist the manifest to disk.
    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Newest published version, or [`Version::ZERO`] for an empty trail.
    pub fn latest_version(&self) -> Version {
        self.patch_trail
            .last()
            .map(|p| p.version)
            .unwrap_or(Version::ZERO)
    }

    /// Append a patch, enforcing the strictly-ascending trail invariant.
    pub fn append_patch(&mut self, patch: Patch) -> Result<()> {
        let latest = self.latest_version();
        if patch.version <= latest {
            return Err(CoreError::NonAscendingPatch {
                candidate: patch.version.to_string(),
                latest: latest.to_string(),
            });
        }
        self.patch_trail.push(patch);
        Ok(())
    }

    /// Name of the full archive on the wire, with its `.zip` suffix.
    pub fn full_app_archive_file(&self) -> String {
        format!("{}.zip", self.full_app_archive_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        s.parse().unwrap()
    }

    #[test]
    fn default_manifest_is_empty_app() {
        let info = UpdateInfo::default();
        assert_eq!(info.full_app_archive_name, "app");
        assert_eq!(info.latest_version(), Version::ZERO);
        assert!(info.patch_trail.is_empty());
    }

    #[test]
    fn append_keeps_trail_ascending() {
        let mut info = UpdateInfo::default();
        info.append_patch(Patch::new(v("1.0.0.0"), "", 10)).unwrap();
        info.append_patch(Patch::new(v("1.0.0.1"), "", 20)).unwrap();
        assert!(info
            .append_patch(Patch::new(v("1.0.0.1"), "", 30))
            .is_err());
        assert!(info.append_patch(Patch::new(v("0.9.0.0"), "", 5)).is_err());
        let versions: Vec<_> = info.patch_trail.iter().map(|p| p.version).collect();
        assert_eq!(versions, vec![v("1.0.0.0"), v("1.0.0.1")]);
    }

    #[test]
    fn wire_format_uses_pascal_case_and_version_strings() {
        let mut info = UpdateInfo::default();
        info.updater_version = v("0.2.0.0");
        info.append_patch(Patch::new(v("1.0.0.0"), "first", 42))
            .unwrap();
        let json = info.to_json().unwrap();
        assert!(json.contains("\"UpdaterVersion\":\"0.2.0.0\""));
        assert!(json.contains("\"PatchTrail\""));
        assert!(json.contains("\"SizeInBytes\":42"));
        let back = UpdateInfo::from_json(&json).unwrap();
        assert_eq!(back, info);
    }

    #[test]
    fn patch_archive_names_are_deterministic() {
        assert_eq!(
            Patch::new(v("1.0.0.3"), "", 0).archive_name(),
            "patch_1_0_0_3.zip"
        );
    }
}
