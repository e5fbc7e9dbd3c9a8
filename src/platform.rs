//! OS family detection and fragment directory resolution.
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Serialize;

/// Operating system family, as far as the agent's file layout is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OsFamily {
    /// Linux and any other Unix without a dedicated layout.
    Linux,
    /// macOS (Homebrew layout).
    Darwin,
    /// FreeBSD (ports layout).
    FreeBSD,
    /// Windows.
    Windows,
}

impl OsFamily {
    /// All known families.
    pub const ALL: [Self; 4] = [Self::Linux, Self::Darwin, Self::FreeBSD, Self::Windows];

    /// Detect the family of the running system.
    #[must_use]
    pub const fn detect() -> Self {
        if cfg!(target_os = "windows") {
            Self::Windows
        } else if cfg!(target_os = "macos") {
            Self::Darwin
        } else if cfg!(target_os = "freebsd") {
            Self::FreeBSD
        } else {
            // Default to the generic Unix layout
            Self::Linux
        }
    }
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Linux => write!(f, "linux"),
            Self::Darwin => write!(f, "darwin"),
            Self::FreeBSD => write!(f, "freebsd"),
            Self::Windows => write!(f, "windows"),
        }
    }
}

/// Error returned when an OS family string is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown OS family '{0}' (expected linux, darwin, freebsd or windows)")]
pub struct UnknownOsFamily(pub String);

impl FromStr for OsFamily {
    type Err = UnknownOsFamily;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "linux" | "redhat" | "debian" | "suse" | "archlinux" | "gentoo" => Ok(Self::Linux),
            "darwin" | "macos" => Ok(Self::Darwin),
            "freebsd" => Ok(Self::FreeBSD),
            "windows" => Ok(Self::Windows),
            _ => Err(UnknownOsFamily(s.to_string())),
        }
    }
}

/// Resolves the directory that holds agent configuration fragments.
///
/// The fragment path is always `<config_dir>/<name>.conf`, so resolvers
/// never see plugin content.
pub trait PathResolver: Send + Sync {
    /// Return the fragment directory for `family`.
    fn config_dir(&self, family: OsFamily) -> PathBuf;
}

/// The agent's packaged layout on each OS family.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardPaths;

impl PathResolver for StandardPaths {
    fn config_dir(&self, family: OsFamily) -> PathBuf {
        PathBuf::from(match family {
            OsFamily::Windows => "C:/Program Files/telegraf/telegraf.d",
            OsFamily::Darwin => "/usr/local/etc/telegraf/telegraf.d",
            OsFamily::FreeBSD => "/usr/local/etc/telegraf.d",
            OsFamily::Linux => "/etc/telegraf/telegraf.d",
        })
    }
}

/// Resolves every family to one fixed directory.
#[derive(Debug, Clone)]
pub struct FixedDir(pub PathBuf);

impl PathResolver for FixedDir {
    fn config_dir(&self, _family: OsFamily) -> PathBuf {
        self.0.clone()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn standard_paths_per_family() {
        let paths = StandardPaths;
        assert_eq!(
            paths.config_dir(OsFamily::Windows),
            PathBuf::from("C:/Program Files/telegraf/telegraf.d")
        );
        assert_eq!(
            paths.config_dir(OsFamily::Darwin),
            PathBuf::from("/usr/local/etc/telegraf/telegraf.d")
        );
        assert_eq!(
            paths.config_dir(OsFamily::FreeBSD),
            PathBuf::from("/usr/local/etc/telegraf.d")
        );
        assert_eq!(
            paths.config_dir(OsFamily::Linux),
            PathBuf::from("/etc/telegraf/telegraf.d")
        );
    }

    #[test]
    fn fixed_dir_ignores_family() {
        let fixed = FixedDir(PathBuf::from("/tmp/fragments"));
        for family in OsFamily::ALL {
            assert_eq!(fixed.config_dir(family), PathBuf::from("/tmp/fragments"));
        }
    }

    #[test]
    fn parse_known_families() {
        assert_eq!("Linux".parse::<OsFamily>().unwrap(), OsFamily::Linux);
        assert_eq!("RedHat".parse::<OsFamily>().unwrap(), OsFamily::Linux);
        assert_eq!("Darwin".parse::<OsFamily>().unwrap(), OsFamily::Darwin);
        assert_eq!("macos".parse::<OsFamily>().unwrap(), OsFamily::Darwin);
        assert_eq!("FreeBSD".parse::<OsFamily>().unwrap(), OsFamily::FreeBSD);
        assert_eq!("windows".parse::<OsFamily>().unwrap(), OsFamily::Windows);
    }

    #[test]
    fn parse_unknown_family_fails() {
        let err = "plan9".parse::<OsFamily>().unwrap_err();
        assert!(err.to_string().contains("plan9"));
    }

    #[test]
    fn display_round_trips_through_parse() {
        for family in OsFamily::ALL {
            assert_eq!(family.to_string().parse::<OsFamily>().unwrap(), family);
        }
    }

    #[test]
    fn detect_returns_a_known_family() {
        assert!(OsFamily::ALL.contains(&OsFamily::detect()));
    }
}
