//! Host platform naming.

use std::fmt;

/// Operating system family relevant to binary lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Os {
    Linux,
    MacOs,
    Windows,
    Other,
}

impl Os {
    pub fn current() -> Self {
        Self::from_target(std::env::consts::OS)
    }

    /// Map a `std::env::consts::OS` value.
    pub fn from_target(os: &str) -> Self {
        match os {
            "linux" => Os::Linux,
            "macos" => Os::MacOs,
            "windows" => Os::Windows,
            _ => Os::Other,
        }
    }

    pub fn exe_extension(self) -> &'static str {
        if self == Os::Windows { ".exe" } else { "" }
    }
}

/// Platform-specific binary name: appends `.exe` on Windows unless present.
pub fn binary_name(name: &str, os: Os) -> String {
    let ext = os.exe_extension();
    if ext.is_empty() || name.to_ascii_lowercase().ends_with(ext) {
        name.to_string()
    } else {
        format!("{name}{ext}")
    }
}

/// Operating system and machine architecture of the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPlatform {
    /// `std::env::consts::OS` value.
    pub os: String,
    /// `std::env::consts::ARCH` value.
    pub arch: String,
}

impl HostPlatform {
    pub fn current() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
        }
    }

    /// OS name as interpreters report it (`platform.system()` style).
    pub fn display_os(&self) -> String {
        match self.os.as_str() {
            "linux" => "Linux".to_string(),
            "macos" => "Darwin".to_string(),
            "windows" => "Windows".to_string(),
            "freebsd" => "FreeBSD".to_string(),
            other => other.to_string(),
        }
    }

    /// Machine architecture as interpreters report it (`platform.machine()` style).
    pub fn display_arch(&self) -> String {
        match (self.os.as_str(), self.arch.as_str()) {
            ("windows", "x86_64") => "AMD64".to_string(),
            ("windows", "aarch64") => "ARM64".to_string(),
            ("macos", "aarch64") => "arm64".to_string(),
            ("freebsd", "x86_64") => "amd64".to_string(),
            (_, arch) => arch.to_string(),
        }
    }
}

impl fmt::Display for HostPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.display_os(), self.display_arch())
    }
}
