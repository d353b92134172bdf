use msgraph_groups_provider::{init_logging, serve, GraphProvider};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    info!(version = env!("CARGO_PKG_VERSION"), "Starting Microsoft Graph groups provider");
    serve(GraphProvider::new()).await
}
