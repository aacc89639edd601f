use crate::error::{CoreError, Result};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Four-component build version, ordered lexicographically by component.
///
/// The canonical textual form is `"major.minor.build.revision"` and that is
/// also how the type serializes inside manifests. Parsing accepts two to
/// four components; missing trailing components read as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub build: u32,
    pub revision: u32,
}

impl Version {
    /// The all-zero version, used as the "never published" sentinel.
    pub const ZERO: Version = Version {
        major: 0,
        minor: 0,
        build: 0,
        revision: 0,
    };

    pub fn new(major: u32, minor: u32, build: u32, revision: u32) -> Self {
        Version {
            major,
            minor,
            build,
            revision,
        }
    }

    /// Render with `.` replaced by `_`, as used in patch archive names.
    pub fn underscored(&self) -> String {
        self.to_string().replace('.', "_")
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.build, self.revision
        )
    }
}

impl FromStr for Version {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.trim().split('.').collect();
        if parts.len() < 2 || parts.len() > 4 {
            return Err(CoreError::InvalidVersion(s.to_string()));
        }
        let mut components = [0u32; 4];
        for (i, part) in parts.iter().enumerate() {
            components[i] = part
                .parse()
                .map_err(|_| CoreError::InvalidVersion(s.to_string()))?;
        }
        Ok(Version::new(
            components[0],
            components[1],
            components[2],
            components[3],
        ))
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}
