use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::{Value, json};
use tower_lsp::jsonrpc::{Error as LspError, Result as LspResult};
use tower_lsp::lsp_types::*;

use crate::diagnostics::{self, ScanTicket};
use crate::lsp::backend::Backend;
use crate::rules::loader::user_rules_dir;
use crate::rules::{
    RuleSet, RuleSource, RulesEvent, Severity, load_rules, materialize_default_rules,
    watch_rules_file,
};

pub const CMD_LOAD_RULES: &str = "tmos-xc.loadRules";
pub const CMD_OPEN_RULES: &str = "tmos-xc.openRules";
pub const CMD_REFRESH: &str = "tmos-xc.refresh";
pub const CMD_STATS: &str = "tmos-xc.stats";

/// Commands advertised through `workspace/executeCommand`
pub const COMMANDS: [&str; 4] = [CMD_LOAD_RULES, CMD_OPEN_RULES, CMD_REFRESH, CMD_STATS];

/// Source tag attached to every published diagnostic
pub const DIAGNOSTIC_SOURCE: &str = "tmos-xc";

/// A document snapshot together with the ticket its scan will commit under
#[derive(Debug)]
pub struct PendingScan {
    pub uri: Url,
    pub content: String,
    pub version: Option<i32>,
    pub ticket: ScanTicket,
}

/// Trait for publishing diagnostics
#[tower_lsp::async_trait]
pub trait HandleDiagnostics {
    async fn begin_scan(&self, uri: &Url) -> Option<PendingScan>;
    async fn finish_scan(&self, scan: PendingScan, rules: &RuleSet) -> bool;
    async fn refresh_document(&self, uri: Url);
    async fn refresh_all(&self) -> usize;
}

/// Trait for rule table lifecycle
#[tower_lsp::async_trait]
pub trait HandleRules {
    async fn reload_rules(&self) -> Result<usize>;
    async fn rules_file_for_editing(&self) -> Result<PathBuf>;
    async fn start_rules_watcher(&self);
}

/// Trait for handling `workspace/executeCommand`
#[tower_lsp::async_trait]
pub trait HandleCommands {
    async fn handle_execute_command(
        &self,
        params: ExecuteCommandParams,
    ) -> LspResult<Option<Value>>;
}

#[tower_lsp::async_trait]
impl HandleDiagnostics for Backend {
    /// Snapshot an open document and reserve its scan ticket
    ///
    /// Both happen under the documents lock, so ticket order follows content
    /// order and a closed document gets no ticket.
    async fn begin_scan(&self, uri: &Url) -> Option<PendingScan> {
        let docs = self.documents.lock().await;
        let state = docs.get(uri)?;
        let ticket = self.store.lock().await.begin(uri)?;

        Some(PendingScan {
            uri: uri.clone(),
            content: state.content.clone(),
            version: state.version,
            ticket,
        })
    }

    /// Scan a snapshot and publish it unless a newer scan or a close overtook it
    async fn finish_scan(&self, scan: PendingScan, rules: &RuleSet) -> bool {
        let PendingScan {
            uri,
            content,
            version,
            ticket,
        } = scan;

        let scanned = match diagnostics::get_diagnostics(&content, rules, &self.config.scan) {
            Ok(scanned) => scanned,
            Err(e) => {
                log::error!("diagnostics scan failed for {}: {:#}", uri, e);
                self.client
                    .log_message(MessageType::ERROR, format!("Diagnostics scan failed: {:#}", e))
                    .await;
                return false;
            }
        };

        let lsp_diagnostics: Vec<_> = scanned.iter().map(to_lsp_diagnostic).collect();

        // Commit and publish under one lock so an older set never lands last
        let mut store = self.store.lock().await;
        if !store.commit(&uri, ticket, scanned) {
            return false;
        }
        self.client
            .publish_diagnostics(uri, lsp_diagnostics, version)
            .await;
        true
    }

    async fn refresh_document(&self, uri: Url) {
        let rules = self.current_rules().await;
        if let Some(scan) = self.begin_scan(&uri).await {
            self.finish_scan(scan, &rules).await;
        }
    }

    /// Rescan every open document, returning how many were refreshed
    async fn refresh_all(&self) -> usize {
        let uris: Vec<Url> = self.documents.lock().await.keys().cloned().collect();
        for uri in &uris {
            self.refresh_document(uri.clone()).await;
        }
        uris.len()
    }
}

#[tower_lsp::async_trait]
impl HandleRules for Backend {
    /// Load a fresh rule set and swap it in; the old set stays on failure
    async fn reload_rules(&self) -> Result<usize> {
        let rules = load_rules(&self.config.rule_source)?;
        let count = rules.len();

        *self.rules.write().await = Arc::new(rules);

        self.client
            .log_message(
                MessageType::INFO,
                format!("Loaded {} tmos -> xc rules", count),
            )
            .await;

        Ok(count)
    }

    async fn rules_file_for_editing(&self) -> Result<PathBuf> {
        match &self.config.rule_source {
            RuleSource::File(path) => Ok(path.clone()),
            RuleSource::Embedded => {
                let dir = user_rules_dir().context("Could not determine user config directory")?;
                materialize_default_rules(&dir)
            }
        }
    }

    async fn start_rules_watcher(&self) {
        let Some(path) = self.config.rule_source.path() else {
            return;
        };

        let (watcher, mut rx) = match watch_rules_file(path) {
            Ok(watching) => watching,
            Err(e) => {
                log::warn!("not watching rules file: {:#}", e);
                return;
            }
        };
        *self.watcher.lock().await = Some(watcher);

        let backend = self.clone();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                match event {
                    RulesEvent::RulesFileChanged(path) => {
                        log::info!("rules file changed: {}", path.display());
                        match backend.reload_rules().await {
                            Ok(_) => {
                                backend.refresh_all().await;
                            }
                            Err(e) => {
                                backend
                                    .client
                                    .log_message(
                                        MessageType::ERROR,
                                        format!("Failed to reload rules: {:#}", e),
                                    )
                                    .await;
                            }
                        }
                    }
                    RulesEvent::WatcherError(e) => {
                        backend
                            .client
                            .log_message(
                                MessageType::ERROR,
                                format!("Rules file watcher error: {}", e),
                            )
                            .await;
                    }
                }
            }
        });
    }
}

#[tower_lsp::async_trait]
impl HandleCommands for Backend {
    async fn handle_execute_command(
        &self,
        params: ExecuteCommandParams,
    ) -> LspResult<Option<Value>> {
        match params.command.as_str() {
            CMD_LOAD_RULES => match self.reload_rules().await {
                Ok(count) => {
                    let documents = self.refresh_all().await;
                    Ok(Some(json!({ "rules": count, "documents": documents })))
                }
                Err(e) => {
                    self.client
                        .show_message(MessageType::ERROR, format!("Failed to load rules: {:#}", e))
                        .await;
                    Err(internal_error(e))
                }
            },
            CMD_OPEN_RULES => {
                let path = self.rules_file_for_editing().await.map_err(internal_error)?;
                let uri = Url::from_file_path(&path).map_err(|_| {
                    LspError::invalid_params(format!("Not an absolute path: {}", path.display()))
                })?;

                log::info!("opening tmos -> xc rules file {}", path.display());
                let shown = self
                    .client
                    .show_document(ShowDocumentParams {
                        uri: uri.clone(),
                        external: Some(false),
                        take_focus: Some(true),
                        selection: None,
                    })
                    .await?;

                Ok(Some(json!({ "uri": uri, "shown": shown })))
            }
            CMD_REFRESH => {
                let documents = self.refresh_all().await;
                Ok(Some(json!({ "documents": documents })))
            }
            CMD_STATS => {
                let uri = uri_argument(&params.arguments)?;
                let stats = self.store.lock().await.stats(&uri);
                serde_json::to_value(stats)
                    .map(Some)
                    .map_err(|e| internal_error(e.into()))
            }
            other => Err(LspError::invalid_params(format!(
                "Unknown command '{}'",
                other
            ))),
        }
    }
}

fn internal_error(e: anyhow::Error) -> LspError {
    let mut err = LspError::internal_error();
    err.message = format!("{:#}", e).into();
    err
}

/// First command argument parsed as a document URI
pub fn uri_argument(arguments: &[Value]) -> LspResult<Url> {
    let raw = arguments
        .first()
        .and_then(Value::as_str)
        .ok_or_else(|| LspError::invalid_params("Expected a document URI argument"))?;
    Url::parse(raw).map_err(|e| LspError::invalid_params(format!("Invalid URI '{}': {}", raw, e)))
}

/// Convert an engine diagnostic into its LSP form
pub fn to_lsp_diagnostic(diagnostic: &diagnostics::Diagnostic) -> Diagnostic {
    let severity = match diagnostic.severity {
        Severity::Error => DiagnosticSeverity::ERROR,
        Severity::Warning => DiagnosticSeverity::WARNING,
        Severity::Information => DiagnosticSeverity::INFORMATION,
        Severity::Hint => DiagnosticSeverity::HINT,
    };

    let range = diagnostic.range;

    Diagnostic::new(
        Range::new(
            Position::new(range.start_line as u32, range.start_column as u32),
            Position::new(range.end_line as u32, range.end_column as u32),
        ),
        Some(severity),
        Some(NumberOrString::String(diagnostic.code.clone())),
        Some(DIAGNOSTIC_SOURCE.to_string()),
        diagnostic.message.clone(),
        None,
        None,
    )
}
