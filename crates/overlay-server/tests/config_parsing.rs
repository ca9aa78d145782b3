use std::{env, fs};

use overlay_server::StorageBackend;
use overlay_server::config::loader::load_config;

#[test]
fn config_parsing_and_env_overrides_and_validation() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("overlay.toml");

    let toml_content = r#"
[server]
host = "127.0.0.1"
port = 8081
debug = true
body_limit_bytes = 1024

[logging]
level = "debug"

[storage]
backend = "memory"

[[storage.seed]]
user_id = "42"
priority = 1
override_name = "beta"
override_dir = "/beta_override"

[[storage.seed]]
user_id = "42"
priority = 2
override_dir = "/plain_override"

[cache]
override_ttl_secs = 120

[templates]
project_path = "/srv/site"

[routing]
url_provider = "site.url_overrides"

[[routing.root]]
path = "/"
name = "home"
template = "index.html"

[[routing.providers]]
id = "site.url_overrides"

[[routing.providers.fragments]]
name = "beta"
routes = [
    { path = "/", template = "beta/index.html" },
    { path = "/news", name = "news", template = "beta/news.html" },
]

[auth]
user_header = "x-forwarded-user"
"#;
    fs::write(&path, toml_content).expect("write toml");

    // 1) Valid config parses
    let cfg = load_config(path.to_str()).expect("should parse config");
    assert_eq!(cfg.server.port, 8081);
    assert!(cfg.server.debug);
    assert_eq!(cfg.logging.level, "debug");
    assert_eq!(cfg.storage.backend, StorageBackend::Memory);
    assert_eq!(cfg.storage.seed.len(), 2);
    assert_eq!(cfg.storage.seed[0].override_name.as_deref(), Some("beta"));
    assert_eq!(cfg.storage.seed[1].override_name, None);
    assert_eq!(cfg.storage.seed[1].user_id.as_str(), "42");
    assert_eq!(cfg.cache.override_ttl_secs, 120);
    assert_eq!(
        cfg.templates.default_dir(),
        std::path::PathBuf::from("/srv/site/templates")
    );
    assert_eq!(cfg.routing.url_provider.as_deref(), Some("site.url_overrides"));
    assert_eq!(cfg.routing.root.len(), 1);
    assert_eq!(cfg.routing.root[0].name.as_deref(), Some("home"));
    assert_eq!(cfg.routing.providers.len(), 1);
    let fragment = &cfg.routing.providers[0].fragments[0];
    assert_eq!(fragment.name, "beta");
    assert_eq!(fragment.routes.len(), 2);
    assert_eq!(fragment.routes[1].name.as_deref(), Some("news"));
    assert_eq!(cfg.auth.user_header, "x-forwarded-user");
    // Untouched sections keep their defaults.
    assert!(!cfg.redis.enabled);

    // 2) Env override should win over file
    unsafe {
        env::set_var("OVERLAY__SERVER__PORT", "9090");
        env::set_var("OVERLAY__CACHE__OVERRIDE_TTL_SECS", "30");
    }
    let cfg_env = load_config(path.to_str()).expect("should parse config with env overrides");
    assert_eq!(cfg_env.server.port, 9090);
    assert_eq!(cfg_env.cache.override_ttl_secs, 30);
    unsafe {
        env::remove_var("OVERLAY__SERVER__PORT");
        env::remove_var("OVERLAY__CACHE__OVERRIDE_TTL_SECS");
    }

    // 3) Missing file falls back to defaults
    let missing = dir.path().join("missing.toml");
    let cfg_default = load_config(missing.to_str()).expect("defaults");
    assert_eq!(cfg_default.server.port, 8080);
    assert_eq!(cfg_default.cache.override_ttl_secs, 600);

    // 4) Invalid provider id should error
    let invalid_path = dir.path().join("invalid.toml");
    let invalid_toml = r#"
[routing]
url_provider = "site..urls"
"#;
    fs::write(&invalid_path, invalid_toml).expect("write invalid toml");
    let err = load_config(invalid_path.to_str()).expect_err("expected validation error");
    assert!(err.contains("routing.url_provider"));

    // 5) Unknown storage backend is rejected at deserialization
    let bad_backend = dir.path().join("bad_backend.toml");
    fs::write(&bad_backend, "[storage]\nbackend = \"sqlite\"\n").expect("write toml");
    let err = load_config(bad_backend.to_str()).expect_err("expected deserialize error");
    assert!(err.contains("deserialize"));
}
