use std::env;

/// OS/architecture combinations the update pipeline publishes helper
/// binaries for. Anything else resolves to [`Platform::Unknown`], which
/// makes the manager permanently report
/// [`UpdateState::UnknownPlatform`](crate::UpdateState::UnknownPlatform).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum Platform {
    win_x86,
    win_x64,
    win_arm,
    osx_x64,
    osx_arm,
    linux_x64,
    linux_arm,
    Unknown,
}

impl Platform {
    /// Detect the platform the current process runs on.
    pub fn current() -> Platform {
        match (env::consts::OS, env::consts::ARCH) {
            ("windows", "x86") => Platform::win_x86,
            ("windows", "x86_64") => Platform::win_x64,
            ("windows", "arm" | "aarch64") => Platform::win_arm,
            ("macos", "x86_64") => Platform::osx_x64,
            ("macos", "aarch64") => Platform::osx_arm,
            ("linux", "x86_64") => Platform::linux_x64,
            ("linux", "arm" | "aarch64") => Platform::linux_arm,
            _ => Platform::Unknown,
        }
    }

    /// File name of the published helper binary for this platform.
    pub fn updater_file_name(&self) -> Option<&'static str> {
        match self {
            Platform::win_x86 | Platform::win_x64 | Platform::win_arm => Some("updater.exe"),
            Platform::osx_x64 | Platform::osx_arm | Platform::linux_x64 | Platform::linux_arm => {
                Some("updater")
            }
            Platform::Unknown => None,
        }
    }

    pub fn is_windows(&self) -> bool {
        matches!(
            self,
            Platform::win_x86 | Platform::win_x64 | Platform::win_arm
        )
    }
}
