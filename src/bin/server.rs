//! Allotment engine server binary.

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    allotment_engine::server::run().await
}
