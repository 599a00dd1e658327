use crate::support::{load_config_or_exit, print_json, yes_no};
use imex_central::FileRegistry;
use imex_kernel::{PublicationState, classify};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

fn store_status(path: &Path) -> Value {
    let store = match imex_store::MemoryStore::load_jsonl(path) {
        Ok(store) => store,
        Err(e) => {
            return json!({
                "path": path.display().to_string(),
                "exists": path.exists(),
                "error": e.to_string(),
            });
        }
    };

    let mut by_state: BTreeMap<&'static str, usize> = [
        PublicationState::None,
        PublicationState::EvidenceOnly,
        PublicationState::PrimaryAssigned,
        PublicationState::Conflicted,
    ]
    .into_iter()
    .map(|state| (state.as_str(), 0))
    .collect();
    let mut pending = 0;
    for publication in store.publications() {
        if publication.is_pending_review() {
            pending += 1;
        }
        *by_state.entry(classify(publication).state.as_str()).or_default() += 1;
    }

    json!({
        "path": path.display().to_string(),
        "exists": true,
        "publications": store.len(),
        "pendingReview": pending,
        "byState": by_state,
        "snapshotRef": store.snapshot_ref(),
    })
}

fn registry_status(path: &Path) -> Value {
    match FileRegistry::read_state(path) {
        Ok(state) => json!({
            "path": path.display().to_string(),
            "exists": true,
            "partner": state.partner,
            "nextIdentifier": state.next_identifier,
            "authorizedUsers": state.authorized_users.len(),
            "records": state.records.len(),
            "submissions": state.submissions.len(),
        }),
        Err(e) => json!({
            "path": path.display().to_string(),
            "exists": path.exists(),
            "error": e.to_string(),
        }),
    }
}

pub fn run(config: String, store: Option<String>, registry: Option<String>, json_output: bool) -> i32 {
    let mut config = load_config_or_exit(&config);
    if let Some(store) = store {
        config.store.path = PathBuf::from(store);
    }
    if let Some(registry) = registry {
        config.registry.path = PathBuf::from(registry);
    }

    let store = store_status(&config.store.path);
    let registry = registry_status(&config.registry.path);
    let healthy = store.get("error").is_none() && registry.get("error").is_none();

    if json_output {
        print_json(&json!({
            "institution": config.registry.institution,
            "batchSize": config.allocator.batch_size,
            "store": store,
            "registry": registry,
        }));
    } else {
        println!("imex status");
        println!("  institution: {}", config.registry.institution);
        println!("  store: {}", config.store.path.display());
        print_section(&store);
        println!("  registry: {}", config.registry.path.display());
        print_section(&registry);
        println!("  healthy: {}", yes_no(healthy));
    }

    if healthy { 0 } else { 1 }
}

fn print_section(section: &Value) {
    let Some(fields) = section.as_object() else {
        return;
    };
    for (key, value) in fields {
        if key == "path" {
            continue;
        }
        println!("    {key}: {value}");
    }
}
