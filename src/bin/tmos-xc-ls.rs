use anyhow::Result;
use tmos_xc_language_server::lsp::server::serve;

#[tokio::main]
async fn main() -> Result<()> {
    serve().await
}
