use std::time::Duration;

use tempfile::TempDir;
use wileedot::{
    config::{
        CONFIG_FILE_NAME, CONFIG_TEMPLATE, Config, Format, LETS_ENCRYPT_PRODUCTION_URL, LogLevel,
        TlsVersion, init_at, toml::Toml,
    },
    error::WileedotError,
};

#[test]
pub fn parse_full_config() {
    let input = r#"
    domain = "example.com"
    allowed_domains = ["www.example.com", "api.example.com"]
    cert_directory = "/var/lib/wileedot/certs"
    email = "admin@example.com"
    bind_address = "127.0.0.1:8443"
    directory_url = "https://acme-staging-v02.api.letsencrypt.org/directory"
    renewal_interval = 3600
    min_tls_version = "1.3"
    alpn_protocols = ["h2", "http/1.1"]
    log_level = "warn"
    "#;

    let config = Toml::new(input).parse().expect("Failed to parse TOML config");

    assert_eq!(config.domain, "example.com");
    assert_eq!(config.allowed_domains, vec!["www.example.com", "api.example.com"]);
    assert_eq!(config.cert_directory.to_string_lossy(), "/var/lib/wileedot/certs");
    assert_eq!(config.email.as_deref(), Some("admin@example.com"));
    assert_eq!(config.bind_address.to_string(), "127.0.0.1:8443");
    assert!(config.directory_url.contains("staging"));
    assert_eq!(config.renewal_period(), Duration::from_secs(3600));
    assert_eq!(config.min_tls_version, TlsVersion::Tls13);
    assert_eq!(config.alpn_protocols, vec!["h2", "http/1.1"]);
    assert_eq!(config.log_level, Some(LogLevel::Warn));
    assert!(config.base_listener.is_none());
}

#[test]
pub fn parse_minimal_config_uses_defaults() {
    let input = r#"
    domain = "example.com"
    cert_directory = "./certs"
    "#;

    let config = Config::from_toml_str(input).expect("Failed to parse minimal TOML config");

    assert_eq!(config.bind_address.to_string(), "0.0.0.0:443");
    assert_eq!(config.directory_url, LETS_ENCRYPT_PRODUCTION_URL);
    assert_eq!(config.renewal_interval, 86400);
    assert_eq!(config.min_tls_version, TlsVersion::Tls12);
    assert_eq!(config.alpn_protocols, vec!["http/1.1"]);
    assert!(config.allowed_domains.is_empty());
    assert!(config.email.is_none());
    assert!(config.log_level.is_none());
}

#[test]
pub fn parse_empty_config_requires_domain() {
    let err = Toml::new("").parse().unwrap_err();
    assert!(matches!(err, WileedotError::MissingDomain));

    let err = Toml::new(r#"domain = "example.com""#).parse().unwrap_err();
    assert!(matches!(err, WileedotError::MissingCertDirectory));
}

#[test]
pub fn parse_rejects_invalid_values() {
    let input = r#"
    domain = "example.com"
    cert_directory = "./certs"
    renewal_interval = "daily"
    "#;

    match Toml::new(input).parse() {
        Err(WileedotError::ParseError { field, .. }) => assert_eq!(field, "renewal_interval"),
        other => panic!("Expected a parse error, got {other:?}"),
    }

    let input = r#"
    domain = "example.com"
    cert_directory = "./certs"
    min_tls_version = "1.0"
    "#;

    match Toml::new(input).parse() {
        Err(WileedotError::ParseError { field, .. }) => assert_eq!(field, "min_tls_version"),
        other => panic!("Expected a parse error, got {other:?}"),
    }

    let input = r#"
    domain = "example.com"
    cert_directory = "./certs"
    renewal_interval = 0
    "#;
    let err = Toml::new(input).parse().unwrap_err();
    assert!(matches!(err, WileedotError::InvalidRenewalInterval));

    let input = r#"
    domain = "example.com"
    cert_directory = "./certs"
    renewal_interval = 9223372036854775807
    "#;
    let err = Toml::new(input).parse().unwrap_err();
    assert!(matches!(err, WileedotError::InvalidRenewalInterval));
}

#[test]
pub fn parse_rejects_malformed_domains() {
    let input = r#"
    domain = "example.com"
    allowed_domains = ["https://www.example.com"]
    cert_directory = "./certs"
    "#;

    let err = Toml::new(input).parse().unwrap_err();
    assert!(matches!(err, WileedotError::InvalidDomain { ref domain, .. } if domain == "https://www.example.com"));
    assert!(err.is_config_error());
}

#[test]
pub fn template_is_a_valid_config() {
    let config = Config::from_toml_str(CONFIG_TEMPLATE).expect("Template should parse");

    assert_eq!(config.domain, "example.com");
    assert_eq!(config.allowed_domains, vec!["www.example.com"]);
    assert_eq!(config.log_level, Some(LogLevel::Info));
}

#[test]
pub fn init_writes_template() {
    let dir = TempDir::new().unwrap();

    let path = init_at(dir.path()).expect("Failed to write config");
    assert_eq!(path, dir.path().join(CONFIG_FILE_NAME));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), CONFIG_TEMPLATE);

    let err = init_at(dir.path()).unwrap_err();
    assert!(matches!(err, WileedotError::ConfigAlreadyExists(_)));

    let err = init_at(dir.path().join("missing")).unwrap_err();
    assert!(matches!(err, WileedotError::TargetDirNotExists(_)));
}

#[test]
pub fn load_config_from_path() {
    let dir = TempDir::new().unwrap();

    let err = Config::from_path(dir.path()).unwrap_err();
    assert!(matches!(err, WileedotError::ConfigNotFound(_)));

    init_at(dir.path()).unwrap();

    let from_dir = Config::from_path(dir.path()).expect("Failed to load from directory");
    let from_file = Config::from_path(dir.path().join(CONFIG_FILE_NAME))
        .expect("Failed to load from file");

    assert_eq!(from_dir.domain, "example.com");
    assert_eq!(from_file.domain, from_dir.domain);
}
