use prom_sensors::commands;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const MIXED_CONFIG: &str = r#"{
    "prometheus_url": "http://prom:9090",
    "targets": [
        {
            "target_name": "web",
            "job_name": "node",
            "instance_label": "instance",
            "instance_value": "web:9100",
            "device_id": "web",
            "device_name": "Web"
        },
        {
            "target_name": "broken",
            "job_name": "node",
            "instance_label": "inst ance",
            "instance_value": "x",
            "device_id": "broken",
            "device_name": "Broken"
        }
    ]
}"#;

const NO_VALID_TARGETS: &str = r#"{
    "prometheus_url": "http://prom:9090",
    "targets": [{"target_name": "only_name"}]
}"#;

fn write_config(dir: &TempDir, contents: &str) -> PathBuf {
    let path = dir.path().join("config.json");
    fs::write(&path, contents).unwrap();
    path
}

fn args(subcommand: &str, config: &Path, extra: &[&str]) -> clap::ArgMatches {
    let mut argv = vec!["prom-sensors", subcommand, "--config", config.to_str().unwrap()];
    argv.extend_from_slice(extra);

    let matches = commands::cli().try_get_matches_from(argv).unwrap();
    let (name, sub) = matches.subcommand().unwrap();
    assert_eq!(name, subcommand);
    sub.clone()
}

#[test]
fn test_check_reports_invalid_targets_without_failing() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, MIXED_CONFIG);
    let matches = args("check", &path, &[]);

    let config = commands::load_config(&matches).unwrap();
    assert_eq!(config.targets.len(), 1);
    assert_eq!(config.errors.len(), 1);

    assert!(commands::check(&matches).is_ok());
}

#[test]
fn test_check_fails_on_unreadable_file() {
    let dir = TempDir::new().unwrap();
    let matches = args("check", &dir.path().join("missing.json"), &[]);
    assert!(commands::check(&matches).is_err());

    let path = write_config(&dir, "{ not json");
    let matches = args("check", &path, &[]);
    assert!(commands::check(&matches).is_err());
}

#[test]
fn test_once_and_run_without_valid_targets_return_early() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, NO_VALID_TARGETS);

    assert!(commands::once(&args("once", &path, &["--json"])).is_ok());
    assert!(commands::run(&args("run", &path, &["--all-events"])).is_ok());
}

#[test]
fn test_cli_flags() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, MIXED_CONFIG);

    assert!(args("once", &path, &["--json"]).get_flag("json"));
    assert!(!args("run", &path, &[]).get_flag("all-events"));
    assert!(commands::cli()
        .try_get_matches_from(["prom-sensors", "check", "--bogus"])
        .is_err());
    assert!(commands::cli()
        .try_get_matches_from(["prom-sensors", "-v"])
        .unwrap()
        .get_flag("version"));
}
