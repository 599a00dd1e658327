use crate::support::{fail_startup, load_config_or_exit, open_store_or_exit, or_dash, print_json};
use imex_kernel::{Publication, RegistryView, classify, evaluate};
use imex_store::CurationStore;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Row {
    ac: String,
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    external_ref: Option<String>,
    state: String,
    primary_ids: Vec<String>,
    evidence_ids: Vec<String>,
    /// Decision from local state alone; the registry is not consulted.
    decision: String,
}

fn row(publication: &Publication, institution: &str) -> Row {
    let classification = classify(publication);
    let decision = evaluate(
        publication,
        &classification,
        &RegistryView::NotConsulted,
        institution,
    );
    Row {
        ac: publication.ac.clone(),
        status: publication.status.clone(),
        external_ref: publication.external_ref.clone(),
        state: classification.state.to_string(),
        primary_ids: classification.primary_ids,
        evidence_ids: classification.evidence_ids,
        decision: decision.as_str().to_string(),
    }
}

pub fn run(config: String, ids: Vec<String>, store: Option<String>, json_output: bool) -> i32 {
    let mut config = load_config_or_exit(&config);
    if let Some(store) = store {
        config.store.path = PathBuf::from(store);
    }
    let store = open_store_or_exit(&config.store.path);

    let ids = if ids.is_empty() {
        store
            .pending_publications()
            .unwrap_or_else(|e| fail_startup(e))
    } else {
        ids
    };

    let mut rows = Vec::with_capacity(ids.len());
    for ac in &ids {
        let publication = store.publication(ac).unwrap_or_else(|e| fail_startup(e));
        rows.push(row(&publication, &config.registry.institution));
    }

    if json_output {
        print_json(&rows);
    } else {
        println!("imex classify");
        println!("  store: {}", config.store.path.display());
        println!("  publications: {}", rows.len());
        for row in &rows {
            println!(
                "  {}\t{}\t{}\t{}",
                row.ac,
                row.state,
                or_dash(row.primary_ids.first().map(String::as_str)),
                row.decision
            );
        }
    }
    0
}
