//! sitecast control panel server.

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    sitecast_lib::run().await
}
