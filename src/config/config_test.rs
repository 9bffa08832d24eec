use serial_test::serial;
use temp_env::with_vars;

use super::*;

fn cleanup_all_ca_client_env_vars() {
    for (key, _) in std::env::vars() {
        if key.starts_with("CA_CLIENT__") {
            std::env::remove_var(&key);
        }
    }
}

#[test]
fn default_config_should_initialize_with_hardcoded_values() {
    let config = ContextConfig::default();

    assert_eq!(config.connection_timeout_ms, 30_000);
    assert_eq!(config.beacon_period_ms, 15_000);
    assert_eq!(config.max_array_bytes, 16_384);
    assert_eq!(config.pools.io_chunk, 1024);
    assert_eq!(config.pools.channel_chunk, 1024);
    assert_eq!(config.pools.circuit_chunk, 32);
    assert_eq!(config.pools.group_chunk, 128);
    assert!(config.validate().is_ok());
}

#[test]
#[serial]
fn load_should_merge_environment_overrides() {
    cleanup_all_ca_client_env_vars();
    with_vars(
        vec![
            ("CA_CLIENT__MAX_ARRAY_BYTES", Some("65536")),
            ("CA_CLIENT__POOLS__IO_CHUNK", Some("64")),
        ],
        || {
            let config = ContextConfig::load(None).unwrap();

            assert_eq!(config.max_array_bytes, 65536);
            assert_eq!(config.pools.io_chunk, 64);
            assert_eq!(config.pools.circuit_chunk, 32);
        },
    );
}

#[test]
#[serial]
fn load_should_merge_file_settings() {
    cleanup_all_ca_client_env_vars();
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("client.toml");
    std::fs::write(
        &config_path,
        r#"
        connection_timeout_ms = 5000
        user_name = "operator"

        [pools]
        group_chunk = 8
        "#,
    )
    .unwrap();

    let empty_vars: Vec<(&str, Option<&str>)> = vec![];
    with_vars(empty_vars, || {
        let config = ContextConfig::load(config_path.to_str()).unwrap();

        assert_eq!(config.connection_timeout_ms, 5000);
        assert_eq!(config.user_name, "operator");
        assert_eq!(config.pools.group_chunk, 8);
        assert_eq!(config.pools.io_chunk, 1024);
    });
}

#[test]
#[serial]
fn environment_variables_should_have_highest_priority() {
    cleanup_all_ca_client_env_vars();
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("client.toml");
    std::fs::write(&config_path, "echo_period_ms = 1000\n").unwrap();

    with_vars(vec![("CA_CLIENT__ECHO_PERIOD_MS", Some("2500"))], || {
        let config = ContextConfig::load(config_path.to_str()).unwrap();
        assert_eq!(config.echo_period_ms, 2500);
    });
}

#[test]
#[serial]
fn missing_config_file_should_fail() {
    cleanup_all_ca_client_env_vars();
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("absent.toml");

    assert!(ContextConfig::load(config_path.to_str()).is_err());
}

#[test]
fn validation_should_reject_zero_timeouts() {
    let mut config = ContextConfig::default();
    config.connection_timeout_ms = 0;

    assert!(matches!(config.validate(), Err(Error::Config(_))));
}

#[test]
fn validation_should_reject_small_buffer_above_array_limit() {
    let mut config = ContextConfig::default();
    config.max_array_bytes = 1024;
    config.pools.small_buffer_size = 4096;

    assert!(config.validate().is_err());
}

#[test]
fn validation_should_reject_zero_pool_chunk() {
    let mut config = ContextConfig::default();
    config.pools.circuit_chunk = 0;

    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("circuit_chunk"));
}
