use prom_sensors::core::config::{ConfigError, ProviderConfig};
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

const CONFIG: &str = r#"{
    "prometheus_url": "https://prom.example.com:9090/",
    "scrape_interval": 30,
    "fetch_timeout": 5,
    "targets": [
        {
            "target_name": "web",
            "job_name": "node",
            "instance_label": "instance",
            "instance_value": "web:9100",
            "device_id": "web_server",
            "device_name": "Web Server",
            "device_model": "node_exporter",
            "metrics_prefix": "node_",
            "excluded_metrics": "node_scrape_collector_success",
            "metrics_filter": {"mode": "idle"}
        },
        {
            "target_name": "db",
            "job_name": "postgres",
            "instance_label": "host",
            "instance_value": "db01",
            "device_id": "db01",
            "device_name": "Database",
            "included_metrics": ["pg_up", "pg_connections"],
            "scrape_interval": 120
        },
        {
            "target_name": "web",
            "job_name": "node",
            "instance_label": "instance",
            "instance_value": "other:9100",
            "device_id": "other",
            "device_name": "Other"
        }
    ]
}"#;

fn write_config(dir: &TempDir, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join("config.json");
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_load_from_file() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, CONFIG);

    let config = ProviderConfig::load(&path).unwrap();
    assert_eq!(config.prometheus_url, "https://prom.example.com:9090");
    assert_eq!(config.fetch_timeout(), Duration::from_secs(5));
    assert_eq!(config.targets.len(), 2);

    let web = &config.targets[0];
    assert_eq!(web.excluded_metrics, vec!["node_scrape_collector_success"]);
    assert_eq!(web.metrics_prefix.as_deref(), Some("node_"));
    assert_eq!(web.metrics_filter.get("mode").map(String::as_str), Some("idle"));
    assert_eq!(web.device.model.as_deref(), Some("node_exporter"));
    assert_eq!(config.interval_for(web), Duration::from_secs(30));

    let db = &config.targets[1];
    assert_eq!(db.included_metrics.len(), 2);
    assert_eq!(config.interval_for(db), Duration::from_secs(120));
}

#[test]
fn test_duplicate_target_rejected() {
    let dir = TempDir::new().unwrap();
    let config = ProviderConfig::load(&write_config(&dir, CONFIG)).unwrap();

    assert_eq!(
        config.errors,
        vec![ConfigError::Duplicate {
            target: "web".to_string()
        }]
    );
    assert_eq!(config.targets[0].instance_value, "web:9100");
}

#[test]
fn test_missing_file_is_error() {
    let dir = TempDir::new().unwrap();
    let err = ProviderConfig::load(&dir.path().join("missing.json")).unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));
}

#[test]
fn test_invalid_global_settings() {
    let dir = TempDir::new().unwrap();

    let path = write_config(&dir, r#"{"prometheus_url": "ftp://prom", "targets": []}"#);
    assert!(ProviderConfig::load(&path).is_err());

    let path = write_config(&dir, r#"{"prometheus_url": "http://prom", "scrape_interval": 0, "targets": []}"#);
    assert!(ProviderConfig::load(&path).is_err());

    let path = write_config(&dir, "not json");
    assert!(ProviderConfig::load(&path).is_err());
}

#[test]
fn test_default_path_location() {
    if let Ok(path) = ProviderConfig::default_path() {
        assert!(path.ends_with("prom-sensors/config.json"));
    }
}
