use sr_domain::config::Config;

#[test]
fn default_host_is_localhost() {
    let config = Config::default();
    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.server.port, 3000);
}

#[test]
fn default_cors_allows_only_localhost() {
    let config = Config::default();
    assert!(config.server.cors.allowed_origins.contains(&"http://localhost:*".to_string()));
    assert!(config.server.cors.allowed_origins.contains(&"http://127.0.0.1:*".to_string()));
}

#[test]
fn default_reconnect_policy_matches_bring_up_contract() {
    let config = Config::default();
    assert_eq!(config.sessions.reconnect.max_attempts, 5);
    assert_eq!(config.sessions.reconnect.backoff_base_secs, 2);
    assert_eq!(config.sessions.send_pacing_secs, 20);
}

#[test]
fn default_message_suffixes() {
    let config = Config::default();
    assert_eq!(config.messages.direct_suffix, "@c.us");
    assert_eq!(config.messages.group_suffix, "@g.us");
    assert_eq!(config.messages.media_mount, "/media");
    assert!(config.messages.timezone.is_none());
}

#[test]
fn empty_file_parses_to_defaults() {
    let config: Config = toml::from_str("").unwrap();
    assert_eq!(config.webhooks.timeout_secs, 30);
    assert_eq!(config.storage.state_path, std::path::PathBuf::from("./data/state"));
    assert_eq!(config.server.passkey_env, "SR_PASSKEY");
}

#[test]
fn partial_sections_keep_other_defaults() {
    let toml_str = r#"
[sessions]
send_pacing_secs = 5

[sessions.reconnect]
max_attempts = 2

[messages]
timezone = "Asia/Karachi"

[transport]
bridge_url = "http://bridge.internal:8080"
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.sessions.send_pacing_secs, 5);
    assert_eq!(config.sessions.reconnect.max_attempts, 2);
    assert_eq!(config.sessions.reconnect.backoff_base_secs, 2);
    assert_eq!(config.sessions.command_buffer, 64);
    assert_eq!(config.messages.timezone.as_deref(), Some("Asia/Karachi"));
    assert_eq!(config.transport.bridge_url, "http://bridge.internal:8080");
    assert!(config.transport.events_url.is_none());
}
