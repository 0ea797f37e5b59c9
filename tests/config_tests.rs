//! Configuration loading tests

use std::io::Write;
use std::time::Duration;
use swapd::types::Environment;
use swapd::SwapdConfig;

const VALID_CONFIG: &str = r#"
[service]
environment = "stagenet"
swap_timeout_secs = 1800
poll_interval_ms = 250

[ethereum]
rpc_url = "http://127.0.0.1:8545"
chain_id = 1337
swap_creator = "0x5fbdb2315678afecb367f032d93f642f64180aa3"
forwarder = "0xe7f1725e7734ce288f8367e1bb143e90bb3f0512"
private_key_env = "SWAPD_ETH_PRIVATE_KEY"
"#;

fn write_config(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

/// What is tested: load_from_path() parses a config and fills defaults
/// Why: Operators only set what differs from the defaults
#[test]
fn test_load_valid_config() {
    let file = write_config(VALID_CONFIG);
    let config = SwapdConfig::load_from_path(file.path().to_str()).unwrap();

    assert_eq!(config.service.environment, Environment::Stagenet);
    assert_eq!(config.swap_timeout(), Duration::from_secs(1800));
    let timeouts = config.timeouts();
    assert_eq!(timeouts.io, Duration::from_secs(30));
    assert_eq!(timeouts.tx, Duration::from_secs(300));
    assert_eq!(timeouts.poll_interval, Duration::from_millis(250));
    assert!(config.service.data_dir.is_none());
    assert!(config.sender_address().unwrap().is_none());

    let contracts = config.contract_addresses().unwrap();
    assert_eq!(
        format!("{:#x}", contracts.swap_creator),
        "0x5fbdb2315678afecb367f032d93f642f64180aa3"
    );
}

/// What is tested: load_from_path() with a missing file
/// Why: The error must tell the operator how to create one
#[test]
fn test_missing_config_file() {
    let err = SwapdConfig::load_from_path(Some("/nonexistent/swapd.toml")).unwrap_err();
    assert!(err.to_string().contains("swapd.template.toml"));
}

/// What is tested: validate() rejects inconsistent settings
/// Why: A bad config must fail at startup, not mid-swap
#[test]
fn test_validate_rejects_bad_values() {
    let mut config = SwapdConfig::default();
    assert!(config.validate().is_ok());

    config.service.swap_timeout_secs = 0;
    assert!(config.validate().is_err());

    let mut config = SwapdConfig::default();
    config.ethereum.forwarder = config.ethereum.swap_creator.clone();
    assert!(config.validate().is_err());

    let mut config = SwapdConfig::default();
    config.ethereum.swap_creator = "0x1234".to_string();
    assert!(config.validate().is_err());

    let mut config = SwapdConfig::default();
    config.ethereum.sender_address = Some("not-hex".to_string());
    assert!(config.validate().is_err());

    let mut config = SwapdConfig::default();
    config.ethereum.rpc_url = "  ".to_string();
    assert!(config.validate().is_err());
}

/// What is tested: malformed TOML is reported with the file name
/// Why: The operator needs to know which file to fix
#[test]
fn test_unparseable_config() {
    let file = write_config("[service\nswap_timeout_secs = ");
    let err = SwapdConfig::load_from_path(file.path().to_str()).unwrap_err();
    assert!(err.to_string().contains("Failed to parse"));
}

/// What is tested: swap_manager() persists past swaps under data_dir
/// Why: History is kept across restarts only when a data directory is configured
#[tokio::test]
async fn test_swap_manager_uses_data_dir() {
    use swapd::swap::{status_channel, Info, SwapManager};
    use swapd::types::{EthAsset, Hash, ProvidesCoin};

    let dir = tempfile::tempdir().unwrap();
    let mut config = SwapdConfig::default();
    config.service.data_dir = Some(dir.path().to_path_buf());
    let id = Hash::repeat_byte(0x31);

    let manager = config.swap_manager().unwrap();
    let (notifier, _observer) = status_channel();
    let info = Info::new(id, ProvidesCoin::Xmr, 1.0, 0.05, 0.05, EthAsset::ETH, notifier);
    manager.add_swap(std::sync::Arc::new(info)).await.unwrap();
    manager.complete_ongoing_swap(&id).await.unwrap();

    let reloaded = config.swap_manager().unwrap();
    assert_eq!(reloaded.get_past_ids().await, vec![id]);
    assert!(dir.path().join("swaps").is_dir());

    let in_memory = SwapdConfig::default().swap_manager().unwrap();
    assert!(in_memory.get_past_ids().await.is_empty());
}
