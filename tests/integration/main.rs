//! Integration tests for shellcache

use async_trait::async_trait;
use parking_lot::Mutex;
use shellcache::config::{Config, ConfigManager};
use shellcache::http::{RequestDescriptor, Response};
use shellcache::network::Network;
use shellcache::{ShellcacheError, ShellcacheResult};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Origin nothing listens on, so live fetches fail fast
const DEAD_ORIGIN: &str = "http://127.0.0.1:9/";

/// Config rooted in a temp dir, pointing at the dead origin
fn test_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.general.state_dir = Some(dir.join("state"));
    config.origin.url = DEAD_ORIGIN.parse().unwrap();
    config.cache.manifest = vec!["/".to_string(), "/app.js".to_string()];
    config
}

fn write_config(dir: &Path, config: &Config) -> PathBuf {
    let path = dir.join("config.toml");
    std::fs::write(&path, toml::to_string_pretty(config).unwrap()).unwrap();
    path
}

/// In-process site that answers for the dead origin
#[derive(Default)]
struct FakeSite {
    pages: Mutex<HashMap<String, Response>>,
    offline: Mutex<bool>,
}

impl FakeSite {
    fn serve(&self, path: &str, body: &str) {
        let url = format!("{}{}", DEAD_ORIGIN, path.trim_start_matches('/'));
        self.pages.lock().insert(url, Response::new(200, body));
    }

    fn go_offline(&self) {
        *self.offline.lock() = true;
    }
}

#[async_trait]
impl Network for FakeSite {
    async fn fetch(&self, request: &RequestDescriptor) -> ShellcacheResult<Response> {
        let url = request.url.to_string();
        if *self.offline.lock() {
            return Err(ShellcacheError::network(url, "offline"));
        }
        let page = self.pages.lock().get(&url).cloned();
        page.ok_or_else(|| ShellcacheError::network(url, "connection refused"))
    }
}

mod cli_tests {
    use super::*;
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;

    fn shellcache(config_path: &Path) -> Command {
        let mut cmd = cargo_bin_cmd!("shellcache");
        cmd.arg("--no-local").arg("-c").arg(config_path);
        cmd
    }

    fn setup() -> (TempDir, PathBuf) {
        let temp = TempDir::new().unwrap();
        let path = write_config(temp.path(), &test_config(temp.path()));
        (temp, path)
    }

    #[test]
    fn help_displays() {
        cargo_bin_cmd!("shellcache")
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("offline cache layer"));
    }

    #[test]
    fn version_displays() {
        cargo_bin_cmd!("shellcache")
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("shellcache"));
    }

    #[test]
    fn config_path() {
        let (_temp, path) = setup();
        shellcache(&path)
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        let (_temp, path) = setup();
        shellcache(&path)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[cache]"))
            .stdout(predicate::str::contains("127.0.0.1:9"));
    }

    #[test]
    fn config_init_refuses_to_overwrite() {
        let (_temp, path) = setup();
        shellcache(&path)
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("already exists"));
    }

    #[test]
    fn invalid_config_is_reported() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "[cache]\nversion = \"one\"\n").unwrap();

        shellcache(&path)
            .arg("status")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid configuration"));
    }

    #[test]
    fn partitions_empty() {
        let (_temp, path) = setup();
        shellcache(&path)
            .arg("partitions")
            .assert()
            .success()
            .stdout(predicate::str::contains("No cache partitions found"));
    }

    #[test]
    fn status_before_install() {
        let (_temp, path) = setup();
        shellcache(&path)
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains("installing"))
            .stdout(predicate::str::contains("static-v1.0.0"));
    }

    #[test]
    fn install_fails_when_origin_unreachable() {
        let (temp, path) = setup();
        shellcache(&path)
            .arg("install")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Install failed"))
            .stderr(predicate::str::contains("Hint:"));

        let partitions = temp.path().join("state").join("partitions");
        let entries = std::fs::read_dir(partitions).unwrap().count();
        assert_eq!(entries, 0);
    }

    #[test]
    fn activate_before_install_fails() {
        let (_temp, path) = setup();
        shellcache(&path)
            .arg("activate")
            .assert()
            .failure()
            .stderr(predicate::str::contains("not installed yet"));
    }

    #[test]
    fn unrecognized_message_is_ignored() {
        let (_temp, path) = setup();
        shellcache(&path)
            .args(["message", r#"{"type":"PING"}"#])
            .assert()
            .success()
            .stdout(predicate::str::contains("Message ignored"));
    }

    #[test]
    fn fetch_before_activation_passes_through() {
        let (_temp, path) = setup();
        shellcache(&path)
            .args(["fetch", "/"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Network unavailable"));
    }

    #[tokio::test]
    async fn fetch_serves_installed_shell_offline() {
        let temp = TempDir::new().unwrap();
        let config = test_config(temp.path());
        let path = write_config(temp.path(), &config);
        super::layer_tests::install_and_activate(&config, "<h1>shell</h1>").await;

        shellcache(&path)
            .args(["fetch", "/orders/42", "--navigate"])
            .assert()
            .success()
            .stdout("<h1>shell</h1>")
            .stderr(predicate::str::contains("shell-fallback"));

        shellcache(&path)
            .args(["fetch", "/app.js"])
            .assert()
            .success()
            .stdout("app()")
            .stderr(predicate::str::contains("cache"));

        shellcache(&path)
            .args(["fetch", "/img/missing.png"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("no cached copy"));

        shellcache(&path)
            .args(["partitions", "--format", "plain"])
            .assert()
            .success()
            .stdout("static-v1.0.0\n");

        shellcache(&path)
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains("active"));
    }

    #[tokio::test]
    async fn fetch_keeps_serving_old_shell_while_upgrade_waits() {
        let temp = TempDir::new().unwrap();
        let mut config = test_config(temp.path());
        super::layer_tests::install_and_activate(&config, "<h1>v1</h1>").await;

        config.cache.version = "1.1.0".parse().unwrap();
        let path = write_config(temp.path(), &config);
        super::layer_tests::install_waiting(&config, "<h1>v2</h1>").await;

        shellcache(&path)
            .args(["fetch", "/", "--navigate"])
            .assert()
            .success()
            .stdout("<h1>v1</h1>")
            .stderr(predicate::str::contains("cache"));

        shellcache(&path)
            .args(["fetch", "/orders/42", "--navigate"])
            .assert()
            .success()
            .stdout("<h1>v1</h1>")
            .stderr(predicate::str::contains("shell-fallback"));

        shellcache(&path)
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains("installed (waiting)"))
            .stdout(predicate::str::contains("Serving:  1.0.0 (until activation)"));

        shellcache(&path).arg("activate").assert().success();

        shellcache(&path)
            .args(["fetch", "/orders/42", "--navigate"])
            .assert()
            .success()
            .stdout("<h1>v2</h1>");
    }
}

mod layer_tests {
    use super::*;
    use shellcache::lifecycle::{LifecycleRecord, LifecycleState};
    use shellcache::store::{CacheStore, FsStore};
    use shellcache::strategy::ResponseSource;
    use shellcache::ShellCache;
    use std::sync::Arc;

    /// Install and activate `config`'s version into its state dir
    pub async fn install_and_activate(config: &Config, shell: &str) {
        let site = Arc::new(FakeSite::default());
        site.serve("/", shell);
        site.serve("/app.js", "app()");
        let store = Arc::new(FsStore::new(ConfigManager::partitions_dir(config)));

        let layer = ShellCache::from_config(config, store, site).unwrap();
        layer.on_install().await.unwrap();
        layer.on_message(r#"{"type":"SKIP_WAITING"}"#).await.unwrap();
        assert_eq!(layer.state(), LifecycleState::Active);

        LifecycleRecord::new(config.cache.version.clone(), layer.state())
            .save(&ConfigManager::lifecycle_path(config))
            .await
            .unwrap();
    }

    /// Install `config`'s version next to the active one, leaving it waiting
    pub async fn install_waiting(config: &Config, shell: &str) {
        let record_path = ConfigManager::lifecycle_path(config);
        let point = LifecycleRecord::resume(&record_path, &config.cache.version)
            .await
            .unwrap();

        let site = Arc::new(FakeSite::default());
        site.serve("/", shell);
        site.serve("/app.js", "app()");
        let store = Arc::new(FsStore::new(ConfigManager::partitions_dir(config)));

        let layer = ShellCache::from_config(config, store, site)
            .unwrap()
            .with_predecessor(point.predecessor);
        layer.on_install().await.unwrap();
        assert_eq!(layer.state(), LifecycleState::Installed);

        LifecycleRecord::new(config.cache.version.clone(), layer.state())
            .with_predecessor(layer.predecessor().cloned())
            .save(&record_path)
            .await
            .unwrap();
    }

    fn navigate(config: &Config, path: &str) -> RequestDescriptor {
        RequestDescriptor::get(config.origin.url.join(path).unwrap()).navigation()
    }

    #[tokio::test]
    async fn installed_shell_survives_restart_and_offline() {
        let temp = TempDir::new().unwrap();
        let config = test_config(temp.path());
        install_and_activate(&config, "shell v1").await;

        // A fresh layer over the same directory, as after a process restart
        let site = Arc::new(FakeSite::default());
        site.go_offline();
        let store = Arc::new(FsStore::new(ConfigManager::partitions_dir(&config)));
        let layer = ShellCache::from_config(&config, store, site)
            .unwrap()
            .with_state(LifecycleState::Active);

        let root = layer.on_intercept(&navigate(&config, "/")).await.unwrap();
        let root = root.served().unwrap();
        assert_eq!(root.source, ResponseSource::Cache);
        assert_eq!(root.response.body, b"shell v1");

        let deep = layer
            .on_intercept(&navigate(&config, "/reports/2024"))
            .await
            .unwrap()
            .served()
            .unwrap();
        assert_eq!(deep.source, ResponseSource::ShellFallback);
        assert_eq!(deep.response.body, b"shell v1");

        layer.settle().await;
    }

    #[tokio::test]
    async fn waiting_upgrade_serves_old_shell_offline() {
        let temp = TempDir::new().unwrap();
        let mut config = test_config(temp.path());
        install_and_activate(&config, "shell v1").await;
        config.cache.version = "1.1.0".parse().unwrap();
        install_waiting(&config, "shell v2").await;

        let record_path = ConfigManager::lifecycle_path(&config);
        let point = LifecycleRecord::resume(&record_path, &config.cache.version)
            .await
            .unwrap();
        assert_eq!(point.state, LifecycleState::Installed);
        assert_eq!(point.predecessor, Some("1.0.0".parse().unwrap()));

        let site = Arc::new(FakeSite::default());
        site.go_offline();
        let store = Arc::new(FsStore::new(ConfigManager::partitions_dir(&config)));
        let layer = ShellCache::from_config(&config, store, site)
            .unwrap()
            .with_state(point.state)
            .with_predecessor(point.predecessor);

        let root = layer
            .on_intercept(&navigate(&config, "/"))
            .await
            .unwrap()
            .served()
            .unwrap();
        assert_eq!(root.source, ResponseSource::Cache);
        assert_eq!(root.response.body, b"shell v1");

        layer.settle().await;
    }

    #[tokio::test]
    async fn new_version_evicts_old_partitions_on_disk() {
        let temp = TempDir::new().unwrap();
        let mut config = test_config(temp.path());
        install_and_activate(&config, "shell v1").await;

        config.cache.version = "1.1.0".parse().unwrap();
        install_and_activate(&config, "shell v2").await;

        let store = FsStore::new(ConfigManager::partitions_dir(&config));
        assert_eq!(store.list_partitions().await.unwrap(), vec!["static-v1.1.0"]);

        let journal = std::fs::read_to_string(ConfigManager::journal_path(&config)).unwrap();
        assert!(journal.contains("\"partition.deleted\""));
        assert!(journal.contains("static-v1.0.0"));
    }
}
