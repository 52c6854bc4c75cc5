//! Tests for configuration validation

use std::collections::HashMap;

use prometheus_dispatch::config::{DispatchConfig, WindowConfig};
use prometheus_dispatch::util::serde::JobKind;

const SECRET: &str = "0123456789abcdef0123";

#[test]
fn test_default_config_is_valid() {
    let cfg = DispatchConfig::new(SECRET, "https://x.test/o");
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.window, WindowConfig::default());
    assert_eq!(cfg.offers_for(JobKind::Task).offer_ttl_secs, 3600);
    assert_eq!(cfg.offers_for(JobKind::Route).offer_ttl_secs, 900);
}

#[test]
fn test_short_secret_rejected() {
    let cfg = DispatchConfig::new("short", "https://x.test/o");
    assert!(cfg.validate().is_err());
}

#[test]
fn test_zero_service_window_rejected() {
    let mut cfg = DispatchConfig::new(SECRET, "https://x.test/o");
    cfg.window.service_mins = 0;
    let err = cfg.validate().unwrap_err();
    assert!(err.contains("window"), "{err}");
}

#[test]
fn test_zero_offer_ttl_rejected() {
    let mut cfg = DispatchConfig::new(SECRET, "https://x.test/o");
    cfg.route.offer_ttl_secs = 0;
    assert!(cfg.validate().is_err());
}

#[test]
fn test_offset_out_of_range_rejected() {
    let mut cfg = DispatchConfig::new(SECRET, "https://x.test/o");
    cfg.utc_offset_minutes = 24 * 60;
    assert!(cfg.validate().is_err());
    cfg.utc_offset_minutes = -300;
    assert!(cfg.validate().is_ok());
}

#[test]
fn test_from_json_with_defaults() {
    let json = r#"{
        "token_secret": "0123456789abcdef0123",
        "deep_link_base": "https://x.test/o",
        "utc_offset_minutes": 60,
        "route": { "offer_ttl_secs": 600, "template": "route_v2" }
    }"#;

    let cfg = DispatchConfig::from_json_str(json).unwrap();
    assert_eq!(cfg.utc_offset_minutes, 60);
    assert_eq!(cfg.route.template, "route_v2");
    assert_eq!(cfg.task.offer_ttl_secs, 3600);
    assert_eq!(cfg.window.stagger_mins, 45);
    assert_eq!(cfg.sweep_interval_secs, 60);
}

#[test]
fn test_from_json_invalid() {
    assert!(DispatchConfig::from_json_str("{").is_err());
    let json = r#"{ "token_secret": "short", "deep_link_base": "https://x.test/o" }"#;
    assert!(DispatchConfig::from_json_str(json).is_err());
}

#[test]
fn test_from_lookup() {
    let vars: HashMap<&str, &str> = HashMap::from([
        ("DISPATCH_TOKEN_SECRET", SECRET),
        ("DISPATCH_DEEP_LINK_BASE", "https://x.test/o"),
        ("DISPATCH_ROUTE_OFFER_TTL_SECS", "300"),
        ("DISPATCH_STAGGER_MINS", "30"),
    ]);
    let cfg = DispatchConfig::from_lookup(|k| vars.get(k).map(ToString::to_string)).unwrap();
    assert_eq!(cfg.route.offer_ttl_secs, 300);
    assert_eq!(cfg.window.stagger_mins, 30);
}

#[test]
fn test_from_lookup_missing_secret() {
    let err = DispatchConfig::from_lookup(|_| None).unwrap_err();
    assert!(err.contains("DISPATCH_TOKEN_SECRET"));
}

#[test]
fn test_from_lookup_bad_number() {
    let vars: HashMap<&str, &str> = HashMap::from([
        ("DISPATCH_TOKEN_SECRET", SECRET),
        ("DISPATCH_DEEP_LINK_BASE", "https://x.test/o"),
        ("DISPATCH_SWEEP_INTERVAL_SECS", "soon"),
    ]);
    assert!(DispatchConfig::from_lookup(|k| vars.get(k).map(ToString::to_string)).is_err());
}
