use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use std::time::SystemTime;

use tokio::time::Instant;
use tracing::debug;

use crate::config::AptConfig;
use crate::error::ProbeError;
use crate::probe::PathState;
use crate::probe::ProbeRunner;

/// Outcome of one check: a value, or why there is none
///
/// The error is shared because one failed probe can fail several checks.
pub type SampleResult = Result<f64, Arc<ProbeError>>;

/// The named checks of one collection pass
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Check {
    UpdatesAvailable,
    SecurityUpdatesAvailable,
    SecondsSinceLastUpdate,
    RebootRequired,
}

impl Check {
    pub const ALL: [Check; 4] = [
        Check::UpdatesAvailable,
        Check::SecurityUpdatesAvailable,
        Check::SecondsSinceLastUpdate,
        Check::RebootRequired,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Check::UpdatesAvailable => "updates_available",
            Check::SecurityUpdatesAvailable => "security_updates_available",
            Check::SecondsSinceLastUpdate => "seconds_since_last_update",
            Check::RebootRequired => "reboot_required",
        }
    }

    pub fn help(&self) -> &'static str {
        match self {
            Check::UpdatesAvailable => "Number of available package updates",
            Check::SecurityUpdatesAvailable => "Number of available security updates",
            Check::SecondsSinceLastUpdate => "Seconds since last successful apt update",
            Check::RebootRequired => "1 if a reboot is required, 0 otherwise",
        }
    }
}

impl std::fmt::Display for Check {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Results of all checks of one pass
#[derive(Debug)]
pub struct Sample {
    pub updates_available: SampleResult,
    pub security_updates_available: SampleResult,
    pub seconds_since_last_update: SampleResult,
    pub reboot_required: SampleResult,
}

impl Sample {
    pub fn get(&self, check: Check) -> &SampleResult {
        match check {
            Check::UpdatesAvailable => &self.updates_available,
            Check::SecurityUpdatesAvailable => &self.security_updates_available,
            Check::SecondsSinceLastUpdate => &self.seconds_since_last_update,
            Check::RebootRequired => &self.reboot_required,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Check, &SampleResult)> + '_ {
        Check::ALL.into_iter().map(move |check| (check, self.get(check)))
    }

    /// The value to report for `check`, `0` if the check failed
    pub fn value_or_default(&self, check: Check) -> f64 {
        self.get(check).as_ref().copied().unwrap_or(0.0)
    }

    /// Whether every check produced a value
    pub fn is_success(&self) -> bool {
        self.iter().all(|(_, result)| result.is_ok())
    }
}

/// The set of checks run in every collection pass
pub struct SampleSet<P> {
    probes: P,
    apt_check_path: PathBuf,
    update_stamp_path: PathBuf,
    reboot_required_file: PathBuf,
    command_timeout: Duration,
}

impl<P> SampleSet<P>
where
    P: ProbeRunner,
{
    pub fn new(config: &AptConfig, probes: P) -> Self {
        Self {
            probes,
            apt_check_path: config.apt_check_path.clone(),
            update_stamp_path: config.update_stamp_path.clone(),
            reboot_required_file: config.reboot_required_file.clone(),
            command_timeout: config.command_timeout(),
        }
    }

    /// Run every check once
    ///
    /// A failing check never keeps the others from running.
    pub async fn sample(&self) -> Sample {
        let deadline = Instant::now() + self.command_timeout;
        let (updates_available, security_updates_available) = self.check_updates(deadline).await;
        let seconds_since_last_update = self.check_seconds_since_last_update().await;
        let reboot_required = self.check_reboot_required().await;

        Sample {
            updates_available,
            security_updates_available,
            seconds_since_last_update,
            reboot_required,
        }
    }

    async fn check_updates(&self, deadline: Instant) -> (SampleResult, SampleResult) {
        let output = match self
            .probes
            .run_command(&self.apt_check_path, &[], deadline)
            .await
        {
            Ok(output) => output,
            Err(e) => {
                let e = Arc::new(e);
                return (Err(e.clone()), Err(e));
            }
        };

        // apt-check reports on stderr, accept both
        let stdout = String::from_utf8_lossy(&output.stdout);
        let text = if stdout.trim().is_empty() {
            String::from_utf8_lossy(&output.stderr)
        } else {
            stdout
        };

        debug!(output = %text.trim(), "Update check finished");
        parse_update_counts(&text)
    }

    async fn check_seconds_since_last_update(&self) -> SampleResult {
        match self.probes.stat_path(&self.update_stamp_path).await {
            Ok(PathState::Present { modified }) => {
                // A stamp from the future counts as "just updated"
                let age = SystemTime::now()
                    .duration_since(modified)
                    .unwrap_or_default();
                Ok(age.as_secs_f64())
            }
            Ok(PathState::Absent) => Err(Arc::new(ProbeError::NotFound {
                path: self.update_stamp_path.clone(),
            })),
            Err(e) => Err(Arc::new(e)),
        }
    }

    async fn check_reboot_required(&self) -> SampleResult {
        match self.probes.stat_path(&self.reboot_required_file).await {
            Ok(PathState::Present { .. }) => Ok(1.0),
            Ok(PathState::Absent) => Ok(0.0),
            Err(e) => Err(Arc::new(e)),
        }
    }
}

/// Parse the `<updates>;<security updates>` output of the update-check tool
///
/// Surrounding whitespace is ignored, and fields after the second one are ignored. With fewer than
/// two fields both counts fail. A single unparsable field fails only its own count.
pub fn parse_update_counts(output: &str) -> (SampleResult, SampleResult) {
    let trimmed = output.trim();
    let mut fields = trimmed.split(';');

    let (updates, security) = match (fields.next(), fields.next()) {
        (Some(updates), Some(security)) => (updates, security),
        _ => {
            let e = Arc::new(ProbeError::Format {
                output: trimmed.to_string(),
            });
            return (Err(e.clone()), Err(e));
        }
    };

    let parse = |field: &'static str, value: &str| -> SampleResult {
        value
            .parse::<u64>()
            .map(|n| n as f64)
            .map_err(|source| {
                Arc::new(ProbeError::Parse {
                    field,
                    value: value.to_string(),
                    source,
                })
            })
    };

    (parse("update", updates), parse("security update", security))
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use proptest::prelude::*;

    use super::*;
    use crate::probe::CommandOutput;

    #[test]
    fn test_parse_valid() {
        let (u, s) = parse_update_counts("5;2");
        assert_eq!(u.unwrap(), 5.0);
        assert_eq!(s.unwrap(), 2.0);
    }

    #[test]
    fn test_parse_surrounding_whitespace() {
        let (u, s) = parse_update_counts("  12;0\n");
        assert_eq!(u.unwrap(), 12.0);
        assert_eq!(s.unwrap(), 0.0);
    }

    #[test]
    fn test_parse_extra_fields_are_ignored() {
        let (u, s) = parse_update_counts("3;1;whatever");
        assert_eq!(u.unwrap(), 3.0);
        assert_eq!(s.unwrap(), 1.0);
    }

    #[test]
    fn test_parse_missing_separator() {
        for output in ["", "invalid", "42", "  \n"] {
            let (u, s) = parse_update_counts(output);
            assert!(matches!(u.unwrap_err().as_ref(), ProbeError::Format { .. }));
            assert!(matches!(s.unwrap_err().as_ref(), ProbeError::Format { .. }));
        }
    }

    #[test]
    fn test_parse_first_field_invalid_keeps_second() {
        let (u, s) = parse_update_counts("x;7");
        assert!(matches!(
            u.unwrap_err().as_ref(),
            ProbeError::Parse { field: "update", .. }
        ));
        assert_eq!(s.unwrap(), 7.0);
    }

    #[test]
    fn test_parse_second_field_invalid_keeps_first() {
        let (u, s) = parse_update_counts("4;");
        assert_eq!(u.unwrap(), 4.0);
        assert!(matches!(
            s.unwrap_err().as_ref(),
            ProbeError::Parse {
                field: "security update",
                ..
            }
        ));
    }

    #[test]
    fn test_parse_negative_is_invalid() {
        let (u, s) = parse_update_counts("-1;2");
        assert!(u.is_err());
        assert_eq!(s.unwrap(), 2.0);
    }

    proptest! {
        #[test]
        fn prop_parse_valid_counts(a in any::<u32>(), b in any::<u32>()) {
            let (u, s) = parse_update_counts(&format!("{};{}", a, b));
            prop_assert_eq!(u.unwrap(), f64::from(a));
            prop_assert_eq!(s.unwrap(), f64::from(b));
        }

        #[test]
        fn prop_parse_no_separator_fails_both(output in "[^;]*") {
            let (u, s) = parse_update_counts(&output);
            prop_assert!(u.is_err());
            prop_assert!(s.is_err());
        }

        #[test]
        fn prop_parse_bad_first_field_keeps_second(bad in "[a-z]{1,8}", b in any::<u32>()) {
            let (u, s) = parse_update_counts(&format!("{};{}", bad, b));
            prop_assert!(u.is_err());
            prop_assert_eq!(s.unwrap(), f64::from(b));
        }
    }

    /// A scripted [`ProbeRunner`]
    struct FakeProbes {
        command: Mutex<Option<Result<CommandOutput, ProbeError>>>,
        update_stamp: fn() -> Result<PathState, ProbeError>,
        reboot_required: fn() -> Result<PathState, ProbeError>,
    }

    #[async_trait]
    impl ProbeRunner for FakeProbes {
        async fn run_command(
            &self,
            _path: &Path,
            _args: &[&str],
            _deadline: Instant,
        ) -> Result<CommandOutput, ProbeError> {
            self.command
                .lock()
                .unwrap()
                .take()
                .expect("command probed more than once")
        }

        async fn stat_path(&self, path: &Path) -> Result<PathState, ProbeError> {
            if path.ends_with("reboot-required") {
                (self.reboot_required)()
            } else {
                (self.update_stamp)()
            }
        }
    }

    fn config() -> AptConfig {
        AptConfig {
            update_stamp_path: PathBuf::from("/fake/update-success-stamp"),
            reboot_required_file: PathBuf::from("/fake/reboot-required"),
            ..AptConfig::default()
        }
    }

    fn stdout(s: &str) -> Result<CommandOutput, ProbeError> {
        Ok(CommandOutput {
            stdout: s.as_bytes().to_vec(),
            stderr: Vec::new(),
        })
    }

    fn a_day_ago() -> Result<PathState, ProbeError> {
        Ok(PathState::Present {
            modified: SystemTime::now() - Duration::from_secs(86400),
        })
    }

    fn in_the_future() -> Result<PathState, ProbeError> {
        Ok(PathState::Present {
            modified: SystemTime::now() + Duration::from_secs(3600),
        })
    }

    fn just_now() -> Result<PathState, ProbeError> {
        Ok(PathState::Present {
            modified: SystemTime::now(),
        })
    }

    fn absent() -> Result<PathState, ProbeError> {
        Ok(PathState::Absent)
    }

    fn denied() -> Result<PathState, ProbeError> {
        Err(ProbeError::Stat {
            path: PathBuf::from("/fake"),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        })
    }

    fn sample_set(
        command: Result<CommandOutput, ProbeError>,
        update_stamp: fn() -> Result<PathState, ProbeError>,
        reboot_required: fn() -> Result<PathState, ProbeError>,
    ) -> SampleSet<FakeProbes> {
        SampleSet::new(
            &config(),
            FakeProbes {
                command: Mutex::new(Some(command)),
                update_stamp,
                reboot_required,
            },
        )
    }

    #[tokio::test]
    async fn test_all_checks_succeed() {
        let sample = sample_set(stdout("5;2\n"), a_day_ago, just_now)
            .sample()
            .await;

        assert_eq!(sample.value_or_default(Check::UpdatesAvailable), 5.0);
        assert_eq!(sample.value_or_default(Check::SecurityUpdatesAvailable), 2.0);
        let age = sample.value_or_default(Check::SecondsSinceLastUpdate);
        assert!((86400.0..86410.0).contains(&age), "{}", age);
        assert_eq!(sample.value_or_default(Check::RebootRequired), 1.0);
        assert!(sample.is_success());
    }

    #[tokio::test]
    async fn test_output_on_stderr_is_accepted() {
        let command = Ok(CommandOutput {
            stdout: Vec::new(),
            stderr: b"3;1".to_vec(),
        });
        let sample = sample_set(command, a_day_ago, absent).sample().await;

        assert_eq!(sample.value_or_default(Check::UpdatesAvailable), 3.0);
        assert_eq!(sample.value_or_default(Check::SecurityUpdatesAvailable), 1.0);
        assert!(sample.is_success());
    }

    #[tokio::test]
    async fn test_probe_failure_does_not_stop_other_checks() {
        let command = Err(ProbeError::NotFound {
            path: PathBuf::from("/fake/apt-check"),
        });
        let sample = sample_set(command, a_day_ago, absent).sample().await;

        assert!(sample.updates_available.is_err());
        assert!(sample.security_updates_available.is_err());
        assert_eq!(sample.value_or_default(Check::UpdatesAvailable), 0.0);
        assert!(sample.seconds_since_last_update.is_ok());
        assert_eq!(sample.reboot_required.as_ref().unwrap(), &0.0);
        assert!(!sample.is_success());
    }

    #[tokio::test]
    async fn test_missing_update_stamp_is_a_failure() {
        let sample = sample_set(stdout("0;0"), absent, absent).sample().await;

        assert!(matches!(
            sample.seconds_since_last_update.as_ref().unwrap_err().as_ref(),
            ProbeError::NotFound { .. }
        ));
        assert_eq!(sample.value_or_default(Check::SecondsSinceLastUpdate), 0.0);
        assert!(!sample.is_success());
    }

    #[tokio::test]
    async fn test_inaccessible_update_stamp_is_a_failure() {
        let sample = sample_set(stdout("0;0"), denied, absent).sample().await;

        assert!(matches!(
            sample.seconds_since_last_update.as_ref().unwrap_err().as_ref(),
            ProbeError::Stat { .. }
        ));
        assert_eq!(sample.value_or_default(Check::SecondsSinceLastUpdate), 0.0);
        assert_eq!(sample.value_or_default(Check::RebootRequired), 0.0);
        assert!(sample.reboot_required.is_ok());
        assert!(!sample.is_success());
    }

    #[tokio::test]
    async fn test_update_stamp_in_the_future_is_zero() {
        let sample = sample_set(stdout("0;0"), in_the_future, absent).sample().await;
        assert_eq!(sample.seconds_since_last_update.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn test_reboot_marker_absent_is_success() {
        let sample = sample_set(stdout("0;0"), a_day_ago, absent).sample().await;
        assert_eq!(sample.reboot_required.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn test_reboot_marker_inaccessible_is_failure() {
        let sample = sample_set(stdout("0;0"), a_day_ago, denied).sample().await;

        assert!(matches!(
            sample.reboot_required.as_ref().unwrap_err().as_ref(),
            ProbeError::Stat { .. }
        ));
        assert_eq!(sample.value_or_default(Check::RebootRequired), 0.0);
        assert!(!sample.is_success());
    }
}
