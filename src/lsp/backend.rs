use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer};

use crate::Config;
use crate::diagnostics::DiagnosticStore;
use crate::lsp::document::DocumentState;
use crate::lsp::handlers::{COMMANDS, HandleCommands, HandleDiagnostics, HandleRules};
use crate::rules::{RuleSet, RulesWatcher};

/// The main LSP backend that holds state and implements the Language Server Protocol
///
/// Cloning is cheap and shares all state; background tasks hold a clone.
#[derive(Clone)]
pub struct Backend {
    pub client: Client,
    /// Active rule set, swapped wholesale on reload
    pub rules: Arc<RwLock<Arc<RuleSet>>>,
    pub documents: Arc<Mutex<HashMap<Url, DocumentState>>>,
    pub store: Arc<Mutex<DiagnosticStore<Url>>>,
    pub watcher: Arc<Mutex<Option<RulesWatcher>>>,
    pub config: Config,
}

impl Backend {
    pub fn new(client: Client, config: Config, rules: RuleSet) -> Self {
        Self {
            client,
            rules: Arc::new(RwLock::new(Arc::new(rules))),
            documents: Arc::new(Mutex::new(HashMap::new())),
            store: Arc::new(Mutex::new(DiagnosticStore::new())),
            watcher: Arc::new(Mutex::new(None)),
            config,
        }
    }

    /// Snapshot of the rule set current at call time
    pub async fn current_rules(&self) -> Arc<RuleSet> {
        self.rules.read().await.clone()
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(
        &self,
        _: InitializeParams,
    ) -> tower_lsp::jsonrpc::Result<InitializeResult> {
        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Kind(
                    TextDocumentSyncKind::FULL,
                )),
                execute_command_provider: Some(ExecuteCommandOptions {
                    commands: COMMANDS.iter().map(|c| c.to_string()).collect(),
                    work_done_progress_options: Default::default(),
                }),
                ..Default::default()
            },
            server_info: Some(ServerInfo {
                name: "tmos-xc-language-server".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        let rule_count = self.current_rules().await.len();
        self.client
            .log_message(
                MessageType::INFO,
                format!(
                    "tmos-xc-language-server initialized with {} rules from {}",
                    rule_count, self.config.rule_source
                ),
            )
            .await;

        if self.config.watch_rules {
            self.start_rules_watcher().await;
        }
    }

    async fn shutdown(&self) -> tower_lsp::jsonrpc::Result<()> {
        self.watcher.lock().await.take();
        Ok(())
    }

    async fn execute_command(
        &self,
        params: ExecuteCommandParams,
    ) -> tower_lsp::jsonrpc::Result<Option<serde_json::Value>> {
        self.handle_execute_command(params).await
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let uri = params.text_document.uri.clone();
        let doc_state = DocumentState {
            content: params.text_document.text,
            version: Some(params.text_document.version),
        };

        let mut docs = self.documents.lock().await;
        docs.insert(uri.clone(), doc_state);
        self.store.lock().await.open(&uri);
        drop(docs); // Release the lock before scanning

        self.refresh_document(uri).await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri.clone();
        if let Some(change) = params.content_changes.into_iter().last() {
            let doc_state = DocumentState {
                content: change.text,
                version: Some(params.text_document.version),
            };

            let mut docs = self.documents.lock().await;
            docs.insert(uri.clone(), doc_state);
            self.store.lock().await.open(&uri);
            drop(docs);

            self.refresh_document(uri).await;
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;

        // Documents before store, the same order scans take them in
        let mut docs = self.documents.lock().await;
        docs.remove(&uri);
        let mut store = self.store.lock().await;
        store.remove(&uri);
        drop(docs);

        self.client.publish_diagnostics(uri, Vec::new(), None).await;
    }
}
