use crate::config::{Config, DEFAULT_CONFIG_PATH};
use crate::support::{fail_startup, print_json, yes_no};
use imex_central::{FileRegistry, RegistryState};
use imex_store::JsonlStore;
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct InitOutcome {
    pub root: PathBuf,
    pub config_path: PathBuf,
    pub store_path: PathBuf,
    pub registry_path: PathBuf,
    pub created_config: bool,
    pub created_store: bool,
    pub created_registry: bool,
}

/// Create whatever is missing under `path`; existing files are left alone.
pub fn init_layout(
    path: impl AsRef<Path>,
    institution: &str,
    first_id: u64,
    users: &[String],
) -> Result<InitOutcome, String> {
    let root = path.as_ref().to_path_buf();
    if !root.exists() {
        fs::create_dir_all(&root)
            .map_err(|e| format!("failed to create init path {}: {e}", root.display()))?;
    }
    if !root.is_dir() {
        return Err(format!("init path is not a directory: {}", root.display()));
    }

    let mut config = Config::default();
    config.registry.institution = institution.to_string();

    let config_path = root.join(DEFAULT_CONFIG_PATH);
    let created_config = !config_path.exists();
    if created_config {
        config.write(&config_path).map_err(|e| e.to_string())?;
    }

    let store_path = root.join(&config.store.path);
    let created_store = !store_path.exists();
    if created_store {
        JsonlStore::create_empty(&store_path)
            .map_err(|e| format!("failed to initialize {}: {e}", store_path.display()))?;
    }

    let registry_path = root.join(&config.registry.path);
    let created_registry = !registry_path.exists();
    if created_registry {
        let mut state = RegistryState::new(institution, first_id);
        state.authorized_users = users.to_vec();
        FileRegistry::init(&registry_path, &state)
            .map_err(|e| format!("failed to initialize {}: {e}", registry_path.display()))?;
    }

    Ok(InitOutcome {
        root,
        config_path,
        store_path,
        registry_path,
        created_config,
        created_store,
        created_registry,
    })
}

pub fn run(path: String, institution: String, first_id: u64, users: Vec<String>, json_output: bool) -> i32 {
    let outcome =
        init_layout(&path, &institution, first_id, &users).unwrap_or_else(|e| fail_startup(e));

    if json_output {
        print_json(&json!({
            "root": outcome.root.display().to_string(),
            "configPath": outcome.config_path.display().to_string(),
            "storePath": outcome.store_path.display().to_string(),
            "registryPath": outcome.registry_path.display().to_string(),
            "createdConfig": outcome.created_config,
            "createdStore": outcome.created_store,
            "createdRegistry": outcome.created_registry,
        }));
    } else {
        println!("imex init {path}");
        println!();
        println!("  config: {}", outcome.config_path.display());
        println!("  store: {}", outcome.store_path.display());
        println!("  registry: {}", outcome.registry_path.display());
        println!("  created config: {}", yes_no(outcome.created_config));
        println!("  created store: {}", yes_no(outcome.created_store));
        println!("  created registry: {}", yes_no(outcome.created_registry));
        if outcome.created_registry && users.is_empty() {
            println!("  note: no registry users; add one with --user or edit the registry file");
        }
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(prefix: &str) -> PathBuf {
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be after unix epoch")
            .as_nanos();
        std::env::temp_dir().join(format!(
            "imex-cli-init-{prefix}-{}-{unique}",
            std::process::id()
        ))
    }

    #[test]
    fn init_layout_creates_config_store_and_registry() {
        let root = temp_dir("create");
        let outcome = init_layout(&root, "MINT", 500, &["curator".to_string()])
            .expect("init should succeed");
        assert!(outcome.created_config && outcome.created_store && outcome.created_registry);

        let config = Config::load(&outcome.config_path).expect("config loads");
        assert_eq!(config.registry.institution, "MINT");
        assert_eq!(config.store.path, outcome.store_path);

        let state = FileRegistry::read_state(&outcome.registry_path).expect("registry reads");
        assert_eq!(state.partner, "MINT");
        assert_eq!(state.next_identifier, 500);
        assert_eq!(state.authorized_users, vec!["curator"]);
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn init_layout_keeps_existing_files() {
        let root = temp_dir("keep");
        init_layout(&root, "IntAct", 1, &[]).expect("first init");
        let store_path = root.join("store.jsonl");
        fs::write(&store_path, "{\"ac\":\"EBI-1\"}\n").expect("store written");

        let outcome = init_layout(&root, "IntAct", 1, &[]).expect("second init");
        assert!(!outcome.created_store && !outcome.created_config && !outcome.created_registry);
        let kept = fs::read_to_string(&store_path).expect("store readable");
        assert!(kept.contains("EBI-1"));
        let _ = fs::remove_dir_all(&root);
    }
}
