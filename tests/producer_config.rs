use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;

use tempfile::{Builder, NamedTempFile};

use homecam::config::ProducerConfig;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "HOMECAM_CONFIG",
        "HOMECAM_CAMERA",
        "HOMECAM_ROUTER",
        "HOMECAM_ROUTER_PORT",
        "HOMECAM_SOURCE",
        "HOMECAM_CHUNK_SIZE",
        "HOMECAM_FRESHNESS_MS",
        "HOMECAM_REGISTRATION_URL",
        "HOMECAM_REGISTRATION_INTERVAL_SECS",
        "HOMECAM_DRAIN_ITERATIONS",
        "HOMECAM_RETAINED_VERSIONS",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_json_config_with_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "camera": "garage",
        "source": "http://192.168.1.40/capture",
        "router": {
            "host": "ndn.example.net",
            "port": 6464
        },
        "publish": {
            "chunk_size": 4000,
            "freshness_ms": 2000,
            "drain_iterations": 50,
            "retained_versions": 3
        },
        "registration": {
            "url": "https://registrar.example.net/reg?cam={camera}",
            "interval_secs": 60
        }
    }"#;
    file.write_all(json.as_bytes()).expect("write config");

    std::env::set_var("HOMECAM_CONFIG", file.path());
    std::env::set_var("HOMECAM_CAMERA", "porch");
    std::env::set_var("HOMECAM_CHUNK_SIZE", "1500");

    let cfg = ProducerConfig::load().expect("load config");

    assert_eq!(cfg.camera.as_deref(), Some("porch"));
    assert_eq!(cfg.router, "ndn.example.net");
    assert_eq!(cfg.router_port, 6464);
    assert_eq!(cfg.source, "http://192.168.1.40/capture");
    assert_eq!(cfg.chunk_size, 1500);
    assert_eq!(cfg.freshness_period, Duration::from_millis(2000));
    assert_eq!(cfg.drain_iterations, 50);
    assert_eq!(cfg.retained_versions, 3);
    assert_eq!(
        cfg.registration_url,
        "https://registrar.example.net/reg?cam={camera}"
    );
    assert_eq!(cfg.registration_interval, Duration::from_secs(60));
    assert_eq!(cfg.validate().expect("valid").as_str(), "porch");

    let settings = cfg.producer_settings();
    assert_eq!(settings.chunk_size, 1500);
    assert_eq!(settings.retained_versions, 3);

    clear_env();
}

#[test]
fn loads_toml_config_by_extension() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    clear_env();

    let mut file = Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp config");
    let toml = r#"
camera = "back_yard"
source = "/run/homecam/latest.jpg"

[router]
host = "stub://local"

[registration]
interval_secs = 300
"#;
    file.write_all(toml.as_bytes()).expect("write config");
    std::env::set_var("HOMECAM_CONFIG", file.path());

    let cfg = ProducerConfig::load().expect("load config");
    assert_eq!(cfg.camera.as_deref(), Some("back_yard"));
    assert_eq!(cfg.source, "/run/homecam/latest.jpg");
    assert!(cfg.uses_loopback_router());
    assert_eq!(cfg.router_port, 6363);
    assert_eq!(cfg.chunk_size, 1200);
    assert_eq!(cfg.registration_interval, Duration::from_secs(300));
    assert!(cfg.validate().is_ok());

    clear_env();
}

#[test]
fn defaults_without_config_file() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    clear_env();

    let cfg = ProducerConfig::load().expect("load config");
    assert_eq!(cfg, ProducerConfig::default());
    assert_eq!(cfg.source, "stub://camera");
    assert_eq!(
        cfg.registration_url,
        "https://yoursunny.com/p/homecam/?prefixreg={camera}"
    );
    assert!(cfg.validate().is_err());

    clear_env();
}

#[test]
fn rejects_malformed_env_and_file() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    clear_env();

    std::env::set_var("HOMECAM_DRAIN_ITERATIONS", "lots");
    let err = ProducerConfig::load().unwrap_err();
    assert!(err.to_string().contains("HOMECAM_DRAIN_ITERATIONS"));
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    file.write_all(b"{ not json").expect("write config");
    std::env::set_var("HOMECAM_CONFIG", file.path());
    assert!(ProducerConfig::load().is_err());
    clear_env();

    std::env::set_var("HOMECAM_CONFIG", "/nonexistent/homecam.json");
    assert!(ProducerConfig::load().is_err());
    clear_env();

    std::env::set_var("HOMECAM_CAMERA", "front door");
    let cfg = ProducerConfig::load().expect("load config");
    assert!(cfg.validate().is_err());
    clear_env();

    std::env::set_var("HOMECAM_CAMERA", "porch");
    std::env::set_var("HOMECAM_REGISTRATION_INTERVAL_SECS", u64::MAX.to_string());
    let cfg = ProducerConfig::load().expect("load config");
    assert!(cfg.validate().is_err());
    clear_env();

    std::env::set_var("HOMECAM_CAMERA", "porch");
    std::env::set_var("HOMECAM_FRESHNESS_MS", u64::MAX.to_string());
    let cfg = ProducerConfig::load().expect("load config");
    assert!(cfg.validate().is_err());

    clear_env();
}
