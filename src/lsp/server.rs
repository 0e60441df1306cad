use std::thread;
use std::time::Duration;

use anyhow::Result;
use tokio::io::{stdin, stdout};
use tower_lsp::{LspService, Server};

use crate::Config;
use crate::lsp::backend::Backend;
use crate::rules::load_rules;

/// Start the LSP server
pub async fn serve() -> Result<()> {
    let config = Config::from_args_and_env()?;
    init_logging(&config.log_level);

    if let Some(path) = &config.project_config_path {
        log::info!("using project config {}", path.display());
    }

    // Without a rule table the server has nothing to report, so fail here
    let rules = load_rules(&config.rule_source)?;

    // Under the integration test, exit after a short delay so the test can read stdout to EOF
    if std::env::var("TMOS_XC_LS_TEST_EXIT").as_deref() == Ok("1") {
        thread::spawn(|| {
            thread::sleep(Duration::from_secs(3));
            std::process::exit(0);
        });
    }

    let (service, socket) =
        LspService::build(move |client| Backend::new(client, config, rules)).finish();

    Server::new(stdin(), stdout(), socket).serve(service).await;

    Ok(())
}

/// Log to stderr; stdout carries the protocol
pub fn init_logging(filters: &str) {
    let _ = env_logger::Builder::new()
        .parse_filters(filters)
        .target(env_logger::Target::Stderr)
        .try_init();
}
