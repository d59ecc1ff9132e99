use std::num::NonZeroU64;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::Error;

/// Configuration of the apt collector
#[derive(serde::Deserialize, Clone, Debug)]
pub struct AptConfig {
    /// Seconds between two collection passes
    ///
    /// default: 300
    #[serde(default = "check_interval_seconds_default")]
    pub check_interval_seconds: NonZeroU64,

    /// Seconds the update-check tool may run before it is killed
    ///
    /// default: 10
    #[serde(default = "command_timeout_seconds_default")]
    pub command_timeout_seconds: NonZeroU64,

    /// Path to the update-check tool that prints `<updates>;<security updates>`
    ///
    /// default: "/usr/lib/update-notifier/apt-check"
    #[serde(default = "apt_check_path_default")]
    pub apt_check_path: PathBuf,

    /// Marker file that is touched after every successful package list update
    ///
    /// default: "/var/lib/apt/periodic/update-success-stamp"
    #[serde(default = "update_stamp_path_default")]
    pub update_stamp_path: PathBuf,

    /// Marker file that exists while a reboot is pending
    ///
    /// default: "/var/run/reboot-required"
    #[serde(default = "reboot_required_file_default")]
    pub reboot_required_file: PathBuf,

    /// Prefix of all reported gauge names
    ///
    /// default: "apt"
    #[serde(default = "metric_prefix_default")]
    pub metric_prefix: String,
}

const CHECK_INTERVAL_SECONDS_DEFAULT: NonZeroU64 = match NonZeroU64::new(300) {
    Some(n) => n,
    None => panic!("default check interval is zero"),
};

const COMMAND_TIMEOUT_SECONDS_DEFAULT: NonZeroU64 = match NonZeroU64::new(10) {
    Some(n) => n,
    None => panic!("default command timeout is zero"),
};

fn check_interval_seconds_default() -> NonZeroU64 {
    CHECK_INTERVAL_SECONDS_DEFAULT
}

fn command_timeout_seconds_default() -> NonZeroU64 {
    COMMAND_TIMEOUT_SECONDS_DEFAULT
}

fn apt_check_path_default() -> PathBuf {
    PathBuf::from("/usr/lib/update-notifier/apt-check")
}

fn update_stamp_path_default() -> PathBuf {
    PathBuf::from("/var/lib/apt/periodic/update-success-stamp")
}

fn reboot_required_file_default() -> PathBuf {
    PathBuf::from("/var/run/reboot-required")
}

fn metric_prefix_default() -> String {
    "apt".to_string()
}

impl Default for AptConfig {
    fn default() -> Self {
        Self {
            check_interval_seconds: check_interval_seconds_default(),
            command_timeout_seconds: command_timeout_seconds_default(),
            apt_check_path: apt_check_path_default(),
            update_stamp_path: update_stamp_path_default(),
            reboot_required_file: reboot_required_file_default(),
            metric_prefix: metric_prefix_default(),
        }
    }
}

impl AptConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_seconds.get())
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_seconds.get())
    }

    /// Check the invariants the types cannot express
    pub fn validate(&self) -> Result<(), Error> {
        if self.metric_prefix.is_empty() {
            return Err(Error::EmptyMetricPrefix);
        }

        if !is_valid_metric_name(&self.metric_prefix) {
            return Err(Error::InvalidMetricPrefix(self.metric_prefix.clone()));
        }

        for (what, path) in [
            ("apt_check_path", &self.apt_check_path),
            ("update_stamp_path", &self.update_stamp_path),
            ("reboot_required_file", &self.reboot_required_file),
        ] {
            if path.as_os_str().is_empty() {
                return Err(Error::EmptyPath(what));
            }
        }

        Ok(())
    }

    /// Check that the configured paths can be used on this host
    ///
    /// The update-check tool has to exist. The marker files themselves may legitimately be
    /// missing, but the directories they live in have to exist.
    pub fn validate_paths(&self) -> Vec<Error> {
        fn check(what: &'static str, path: &Path) -> Option<Error> {
            std::fs::metadata(path)
                .err()
                .map(|source| Error::PathNotAccessible {
                    what,
                    path: path.to_path_buf(),
                    source,
                })
        }

        let parent = |p: &Path| -> PathBuf {
            match p.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => PathBuf::from("."),
            }
        };

        [
            check("apt_check_path", &self.apt_check_path),
            check(
                "update_stamp_path directory",
                &parent(&self.update_stamp_path),
            ),
            check(
                "reboot_required_file directory",
                &parent(&self.reboot_required_file),
            ),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

fn is_valid_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}
