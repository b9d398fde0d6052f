use henchman::error::{ErrorKind, HenchmanError};
use henchman::inventory::{InventoryError, InventoryLoader, VariableResolver, YamlInventory};
use henchman::types::TransportConfig;
use serde_json::json;
use std::fs;
use tempfile::TempDir;

const INVENTORY: &str = r#"
groups:
  web:
    hosts: [web1, web2]
    vars:
      port: 80
      tier: frontend
  db:
    hosts: [db1, web2]
    vars:
      port: 5432
      henchman_port: 2222
  ctl:
    hosts: [localhost]
hostvars:
  web1:
    port: 8080
    henchman_username: deploy
"#;

fn write_inventory(content: &str) -> (TempDir, YamlInventory) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("hosts");
    fs::write(&path, content).unwrap();
    (dir, YamlInventory::new(&path))
}

fn base_config(user: &str) -> TransportConfig {
    let mut config = TransportConfig::new();
    config.insert("username".to_string(), user.to_string());
    config
}

#[tokio::test]
async fn test_load_from_file() {
    let (_dir, loader) = write_inventory(INVENTORY);
    let inventory = loader.load().unwrap();

    let groups: Vec<&String> = inventory.groups.keys().collect();
    assert_eq!(groups, vec!["web", "db", "ctl"]);
    assert_eq!(inventory.hostnames(), vec!["web1", "web2", "db1", "localhost"]);
}

#[tokio::test]
async fn test_missing_file_is_config_error() {
    let loader = YamlInventory::new("/nonexistent/henchman/hosts");
    let err = loader.load().unwrap_err();
    assert!(matches!(err, InventoryError::Read { .. }));
    assert_eq!(HenchmanError::from(err).kind(), ErrorKind::Config);
}

#[tokio::test]
async fn test_reserved_group_rejected() {
    let (_dir, loader) = write_inventory("groups:\n  hosts:\n    hosts: [a]\n");
    let err = loader.load().unwrap_err();
    assert!(matches!(err, InventoryError::ReservedGroup { .. }));
    assert_eq!(HenchmanError::from(err).kind(), ErrorKind::Config);
}

#[tokio::test]
async fn test_group_without_hosts_rejected() {
    let (_dir, loader) = write_inventory("groups:\n  web:\n    vars: {a: 1}\n");
    assert!(matches!(
        loader.load().unwrap_err(),
        InventoryError::MissingHosts { .. }
    ));
}

#[tokio::test]
async fn test_var_precedence_across_groups() {
    let (_dir, loader) = write_inventory(INVENTORY);
    let inventory = loader.load().unwrap();
    let resolver = VariableResolver::new();

    // web2 is in web then db: db declared later wins
    let web2 = resolver.host_vars(&inventory, "web2");
    assert_eq!(web2["port"], json!(5432));
    assert_eq!(web2["tier"], json!("frontend"));

    // host vars beat every group
    let web1 = resolver.host_vars(&inventory, "web1");
    assert_eq!(web1["port"], json!(8080));
}

#[tokio::test]
async fn test_unknown_group_selector() {
    let (_dir, loader) = write_inventory(INVENTORY);
    let inventory = loader.load().unwrap();
    let err = inventory.for_groups(&["nope".to_string()]).unwrap_err();
    assert!(matches!(err, InventoryError::UnknownGroup { .. }));
}

#[tokio::test]
async fn test_henchman_vars_feed_transport_config() {
    let (_dir, loader) = write_inventory(INVENTORY);
    let inventory = loader.load().unwrap();
    let resolver = VariableResolver::new();

    let vars = resolver.host_vars(&inventory, "web1");
    let config = inventory.transport_config("web1", &vars, &base_config("root"));
    assert_eq!(config["hostname"], "web1");
    assert_eq!(config["username"], "deploy");
    assert!(!config.contains_key("henchman_username"));

    let vars = resolver.host_vars(&inventory, "db1");
    let config = inventory.transport_config("db1", &vars, &base_config("root"));
    assert_eq!(config["port"], "2222");
    assert_eq!(config["username"], "root");
}

#[tokio::test]
async fn test_localhost_machine_needs_no_credentials() {
    let (_dir, loader) = write_inventory(INVENTORY);
    let inventory = loader.load().unwrap();
    let selected = inventory.for_groups(&["ctl".to_string()]).unwrap();

    let machines = selected.machines(&base_config("root")).unwrap();
    assert_eq!(machines.len(), 1);
    assert_eq!(machines[0].hostname, "localhost");
    assert!(format!("{:?}", machines[0].transport).contains("LocalTransport"));
}

#[tokio::test]
async fn test_missing_credentials_is_validation_error() {
    let (_dir, loader) = write_inventory(INVENTORY);
    let inventory = loader.load().unwrap();
    let selected = inventory.for_groups(&["db".to_string()]).unwrap();

    let err = selected.machines(&base_config("root")).unwrap_err();
    assert_eq!(HenchmanError::from(err).kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn test_ssh_machines_with_keyfile() {
    let (dir, loader) = write_inventory(INVENTORY);
    let keyfile = dir.path().join("id_rsa");
    fs::write(&keyfile, "not really a key").unwrap();

    let inventory = loader.load().unwrap();
    let selected = inventory.for_groups(&["web".to_string()]).unwrap();
    let mut base = base_config("root");
    base.insert("keyfile".to_string(), keyfile.display().to_string());

    let machines = selected.machines(&base).unwrap();
    let hosts: Vec<&str> = machines.iter().map(|m| m.hostname.as_str()).collect();
    assert_eq!(hosts, vec!["web1", "web2"]);
    assert!(format!("{:?}", machines[0].transport).contains("SshTransport"));
    assert_eq!(machines[0].vars["port"], json!(8080));
}
