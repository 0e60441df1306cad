//! Backend state and `workspace/executeCommand` behaviour, driven in-process
use std::fs;
use std::path::Path;

use serde_json::{Value, json};
use tmos_xc_language_server::lsp::Backend;
use tmos_xc_language_server::lsp::handlers::{
    CMD_LOAD_RULES, CMD_REFRESH, CMD_STATS, HandleDiagnostics,
};
use tmos_xc_language_server::{Config, RuleSource, load_rules};
use tower_lsp::lsp_types::*;
use tower_lsp::{ClientSocket, LanguageServer, LspService};

const BIGIP_CONF: &str =
    "ltm virtual /Common/vs {\n    rules {\n        /Common/r1\n    }\n}\nltm rule /Common/r1 {\n}\n";

const TWO_RULES: &str = r#"[
    { "code": "T001", "severity": "Error", "title": "iRule", "message": "iRule", "regex": "ltm rule \\S+" },
    { "code": "T002", "severity": "Warning", "title": "iRule ref", "message": "iRule ref", "regex": "rules \\{" }
]"#;

fn start(rule_source: RuleSource) -> (LspService<Backend>, ClientSocket) {
    let config = Config {
        rule_source,
        watch_rules: false,
        ..Default::default()
    };
    let rules = load_rules(&config.rule_source).expect("load rules");
    LspService::new(move |client| Backend::new(client, config, rules))
}

fn write_rules(dir: &Path, content: &str) -> std::path::PathBuf {
    let path = dir.join("tmosXcRules.json");
    fs::write(&path, content).expect("write rules");
    path
}

fn uri() -> Url {
    Url::parse("file:///tmp/bigip.conf").expect("uri")
}

async fn open(backend: &Backend, text: &str) {
    backend
        .did_open(DidOpenTextDocumentParams {
            text_document: TextDocumentItem::new(uri(), "tmos".to_string(), 1, text.to_string()),
        })
        .await;
}

async fn change(backend: &Backend, version: i32, text: &str) {
    backend
        .did_change(DidChangeTextDocumentParams {
            text_document: VersionedTextDocumentIdentifier::new(uri(), version),
            content_changes: vec![TextDocumentContentChangeEvent {
                range: None,
                range_length: None,
                text: text.to_string(),
            }],
        })
        .await;
}

async fn close(backend: &Backend) {
    backend
        .did_close(DidCloseTextDocumentParams {
            text_document: TextDocumentIdentifier::new(uri()),
        })
        .await;
}

async fn command(backend: &Backend, name: &str, arguments: Vec<Value>) -> Value {
    backend
        .execute_command(ExecuteCommandParams {
            command: name.to_string(),
            arguments,
            work_done_progress_params: Default::default(),
        })
        .await
        .expect("command succeeds")
        .expect("command returns a value")
}

#[tokio::test]
async fn test_stats_command_reports_sparse_counts() {
    let (service, _socket) = start(RuleSource::Embedded);
    let backend = service.inner();
    open(backend, BIGIP_CONF).await;

    let stats = command(backend, CMD_STATS, vec![json!(uri().as_str())]).await;
    assert_eq!(stats, json!({ "Error": 1, "Warning": 1 }));

    let unknown = command(backend, CMD_STATS, vec![json!("file:///tmp/other.conf")]).await;
    assert_eq!(unknown, json!({}));
}

#[tokio::test]
async fn test_stats_command_requires_uri() {
    let (service, _socket) = start(RuleSource::Embedded);
    let result = service
        .inner()
        .execute_command(ExecuteCommandParams {
            command: CMD_STATS.to_string(),
            arguments: vec![],
            work_done_progress_params: Default::default(),
        })
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_unknown_command_is_rejected() {
    let (service, _socket) = start(RuleSource::Embedded);
    let result = service
        .inner()
        .execute_command(ExecuteCommandParams {
            command: "tmos-xc.nope".to_string(),
            arguments: vec![],
            work_done_progress_params: Default::default(),
        })
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_refresh_command_counts_open_documents() {
    let (service, _socket) = start(RuleSource::Embedded);
    let backend = service.inner();

    assert_eq!(command(backend, CMD_REFRESH, vec![]).await, json!({ "documents": 0 }));

    open(backend, BIGIP_CONF).await;
    assert_eq!(command(backend, CMD_REFRESH, vec![]).await, json!({ "documents": 1 }));
}

#[tokio::test]
async fn test_load_rules_command_swaps_rule_table() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = write_rules(dir.path(), TWO_RULES);
    let (service, _socket) = start(RuleSource::File(path.clone()));
    let backend = service.inner();
    open(backend, BIGIP_CONF).await;

    let loaded = command(backend, CMD_LOAD_RULES, vec![]).await;
    assert_eq!(loaded, json!({ "rules": 2, "documents": 1 }));

    // Keep only the warning rule; the open document is rescanned with it
    fs::write(
        &path,
        r#"[{ "code": "T002", "severity": "Warning", "title": "", "message": "", "regex": "rules \\{" }]"#,
    )
    .expect("rewrite rules");
    let loaded = command(backend, CMD_LOAD_RULES, vec![]).await;
    assert_eq!(loaded, json!({ "rules": 1, "documents": 1 }));

    let stats = command(backend, CMD_STATS, vec![json!(uri().as_str())]).await;
    assert_eq!(stats, json!({ "Warning": 1 }));
}

#[tokio::test]
async fn test_load_rules_failure_keeps_previous_table() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = write_rules(dir.path(), TWO_RULES);
    let (service, _socket) = start(RuleSource::File(path.clone()));
    let backend = service.inner();

    fs::write(&path, "{ not json").expect("break rules");
    let result = backend
        .execute_command(ExecuteCommandParams {
            command: CMD_LOAD_RULES.to_string(),
            arguments: vec![],
            work_done_progress_params: Default::default(),
        })
        .await;
    assert!(result.is_err());
    assert_eq!(backend.current_rules().await.len(), 2);
}

#[tokio::test]
async fn test_earlier_snapshot_cannot_commit_over_later_one() {
    let (service, _socket) = start(RuleSource::Embedded);
    let backend = service.inner();
    let rules = backend.current_rules().await;

    open(backend, BIGIP_CONF).await;
    let earlier = backend.begin_scan(&uri()).await.expect("document is open");
    assert_eq!(earlier.content, BIGIP_CONF);

    // A later edit snapshots and commits first
    change(backend, 2, "ltm virtual /Common/vs {\n}\n").await;

    assert!(!backend.finish_scan(earlier, &rules).await);
    assert!(backend.store.lock().await.get(&uri()).is_empty());
}

#[tokio::test]
async fn test_scan_in_flight_at_close_is_discarded() {
    let (service, _socket) = start(RuleSource::Embedded);
    let backend = service.inner();
    let rules = backend.current_rules().await;

    open(backend, BIGIP_CONF).await;
    let in_flight = backend.begin_scan(&uri()).await.expect("document is open");

    close(backend).await;
    assert!(backend.begin_scan(&uri()).await.is_none());

    assert!(!backend.finish_scan(in_flight, &rules).await);
    assert!(backend.store.lock().await.is_empty());
    assert!(backend.documents.lock().await.is_empty());
}

#[tokio::test]
async fn test_close_clears_stats() {
    let (service, _socket) = start(RuleSource::Embedded);
    let backend = service.inner();

    open(backend, BIGIP_CONF).await;
    close(backend).await;

    let stats = command(backend, CMD_STATS, vec![json!(uri().as_str())]).await;
    assert_eq!(stats, json!({}));
}
