#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use std::time::SystemTime;

use exporter_api::CancellationToken;
use exporter_api::MemorySink;
use exporter_api::Plugin;
use plugin_apt::AptConfig;
use plugin_apt::AptPlugin;
use plugin_apt::Collector;
use plugin_apt::SystemProbeRunner;

struct Host {
    dir: tempfile::TempDir,
}

impl Host {
    fn new() -> Self {
        Host {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn config(&self) -> AptConfig {
        AptConfig {
            apt_check_path: self.path("apt-check"),
            update_stamp_path: self.path("update-success-stamp"),
            reboot_required_file: self.path("reboot-required"),
            metric_prefix: "test".to_string(),
            ..AptConfig::default()
        }
    }

    /// Install an apt-check that reports on stderr, like the real one
    fn install_apt_check(&self, output: &str) {
        let path = self.path("apt-check");
        std::fs::write(&path, format!("#!/bin/sh\necho \"{}\" >&2\n", output)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    fn touch(&self, name: &str, modified: SystemTime) {
        let path = self.path(name);
        let file = std::fs::File::create(&path).unwrap();
        file.set_modified(modified).unwrap();
    }

    fn remove(&self, name: &str) {
        std::fs::remove_file(self.path(name)).unwrap();
    }
}

fn collector(config: &AptConfig) -> (Collector<SystemProbeRunner, Arc<MemorySink>>, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    (Collector::new(config, SystemProbeRunner, sink.clone()), sink)
}

fn gauge(sink: &MemorySink, name: &str) -> f64 {
    sink.get(name)
        .unwrap_or_else(|| panic!("Gauge {} was never written", name))
}

#[test_log::test(tokio::test)]
async fn test_everything_present() {
    let host = Host::new();
    host.install_apt_check("5;2");
    host.touch(
        "update-success-stamp",
        SystemTime::now() - Duration::from_secs(24 * 60 * 60),
    );
    host.touch("reboot-required", SystemTime::now());

    let (collector, sink) = collector(&host.config());
    let report = collector.collect().await;

    assert!(report.success);
    assert_eq!(gauge(&sink, "test_updates_available"), 5.0);
    assert_eq!(gauge(&sink, "test_security_updates_available"), 2.0);
    let age = gauge(&sink, "test_seconds_since_last_update");
    assert!((86400.0..86460.0).contains(&age), "age = {}", age);
    assert_eq!(gauge(&sink, "test_reboot_required"), 1.0);
    assert_eq!(gauge(&sink, "test_collector_success"), 1.0);
    assert!(gauge(&sink, "test_collector_duration_seconds") >= 0.0);
    assert!(gauge(&sink, "test_collector_last_timestamp") > 0.0);
}

#[test_log::test(tokio::test)]
async fn test_everything_missing() {
    let host = Host::new();

    let (collector, sink) = collector(&host.config());
    let report = collector.collect().await;

    assert!(!report.success);
    assert_eq!(gauge(&sink, "test_updates_available"), 0.0);
    assert_eq!(gauge(&sink, "test_security_updates_available"), 0.0);
    assert_eq!(gauge(&sink, "test_seconds_since_last_update"), 0.0);
    assert_eq!(gauge(&sink, "test_reboot_required"), 0.0);
    assert_eq!(gauge(&sink, "test_collector_success"), 0.0);
}

#[test_log::test(tokio::test)]
async fn test_one_write_per_gauge_per_pass() {
    let host = Host::new();
    host.install_apt_check("1;1");

    let (collector, sink) = collector(&host.config());
    collector.collect().await;
    assert_eq!(sink.writes(), 7);
    collector.collect().await;
    assert_eq!(sink.writes(), 14);
}

#[test_log::test(tokio::test)]
async fn test_consecutive_passes_are_stable() {
    let host = Host::new();
    host.install_apt_check("7;3");
    host.touch("update-success-stamp", SystemTime::now());

    let (collector, sink) = collector(&host.config());
    collector.collect().await;
    let first = sink.snapshot();
    collector.collect().await;
    let second = sink.snapshot();

    for name in [
        "test_updates_available",
        "test_security_updates_available",
        "test_reboot_required",
        "test_collector_success",
    ] {
        assert_eq!(first.get(name), second.get(name), "{} changed", name);
    }

    // The stamp age moves with the clock, but only by the time between the passes
    let drift = second["test_seconds_since_last_update"] - first["test_seconds_since_last_update"];
    assert!((0.0..5.0).contains(&drift), "drift = {}", drift);
}

#[test_log::test(tokio::test)]
async fn test_changes_are_picked_up() {
    let host = Host::new();
    host.install_apt_check("5;2");
    host.touch("update-success-stamp", SystemTime::now());
    host.touch("reboot-required", SystemTime::now());

    let (collector, sink) = collector(&host.config());
    collector.collect().await;
    assert_eq!(gauge(&sink, "test_reboot_required"), 1.0);

    host.remove("reboot-required");
    let report = collector.collect().await;
    assert!(report.success);
    assert_eq!(gauge(&sink, "test_reboot_required"), 0.0);

    host.install_apt_check("invalid");
    let report = collector.collect().await;
    assert!(!report.success);
    assert_eq!(gauge(&sink, "test_updates_available"), 0.0);
    assert_eq!(gauge(&sink, "test_security_updates_available"), 0.0);
    assert_eq!(gauge(&sink, "test_collector_success"), 0.0);

    host.install_apt_check("oops;4");
    collector.collect().await;
    assert_eq!(gauge(&sink, "test_updates_available"), 0.0);
    assert_eq!(gauge(&sink, "test_security_updates_available"), 4.0);
    assert_eq!(gauge(&sink, "test_collector_success"), 0.0);
}

#[test_log::test(tokio::test)]
async fn test_inaccessible_reboot_marker() {
    let host = Host::new();
    host.install_apt_check("0;0");
    host.touch("update-success-stamp", SystemTime::now());
    // A regular file in place of the marker's directory
    host.touch("not-a-dir", SystemTime::now());

    let config = AptConfig {
        reboot_required_file: host.path("not-a-dir").join("reboot-required"),
        ..host.config()
    };
    let (collector, sink) = collector(&config);
    let report = collector.collect().await;

    assert!(!report.success);
    assert_eq!(gauge(&sink, "test_reboot_required"), 0.0);
    assert_eq!(gauge(&sink, "test_updates_available"), 0.0);
    assert_eq!(gauge(&sink, "test_collector_success"), 0.0);
}

#[test_log::test(tokio::test)]
async fn test_slow_apt_check_is_killed() {
    let host = Host::new();
    let path = host.path("apt-check");
    std::fs::write(&path, "#!/bin/sh\nsleep 30\necho '1;1'\n").unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    host.touch("update-success-stamp", SystemTime::now());

    let config = AptConfig {
        command_timeout_seconds: std::num::NonZeroU64::new(1).unwrap(),
        ..host.config()
    };
    let (collector, sink) = collector(&config);

    let started = std::time::Instant::now();
    let report = collector.collect().await;

    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(!report.success);
    assert_eq!(gauge(&sink, "test_updates_available"), 0.0);
    assert!(gauge(&sink, "test_seconds_since_last_update") < 5.0);
}

async fn wait_for_gauge(sink: &MemorySink, name: &str) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while sink.get(name).is_none() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("Gauge was not written in time");
}

#[test_log::test(tokio::test)]
async fn test_start_collects_immediately_and_stops_on_cancel() {
    let host = Host::new();
    host.install_apt_check("2;1");

    // An interval far longer than the test, only the immediate pass can write anything
    let config = AptConfig {
        check_interval_seconds: std::num::NonZeroU64::new(3600).unwrap(),
        ..host.config()
    };
    let (collector, sink) = collector(&config);
    let token = CancellationToken::new();
    let handle = tokio::spawn(collector.start(token.clone()));

    wait_for_gauge(&sink, "test_collector_success").await;
    assert_eq!(gauge(&sink, "test_updates_available"), 2.0);

    token.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("Collector did not stop in time")
        .unwrap()
        .unwrap();

    assert_eq!(sink.writes(), 7);
}

#[test_log::test(tokio::test)]
async fn test_plugin_lifecycle() {
    let host = Host::new();
    host.install_apt_check("0;0");

    let (collector, sink) = collector(&host.config());
    let mut plugin = AptPlugin::new(collector, CancellationToken::new());
    assert_eq!(plugin.name(), "apt");

    plugin.start().await.unwrap();
    wait_for_gauge(&sink, "test_collector_success").await;

    assert!(plugin.start().await.is_err(), "Second start must fail");

    tokio::time::timeout(Duration::from_secs(5), plugin.shutdown())
        .await
        .expect("Shutdown did not finish in time")
        .unwrap();
}

#[test_log::test(tokio::test)]
async fn test_plugin_stops_with_parent_token() {
    let host = Host::new();
    let (collector, _sink) = collector(&host.config());
    let parent = CancellationToken::new();
    let mut plugin = AptPlugin::new(collector, parent.child_token());

    plugin.start().await.unwrap();
    parent.cancel();

    tokio::time::timeout(Duration::from_secs(5), plugin.shutdown())
        .await
        .expect("Shutdown did not finish in time")
        .unwrap();
}
