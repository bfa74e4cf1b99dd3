use graphene_visualizer::{FrameBus, ServerConfig, start_server};

/// Serves the viewer with nothing feeding it, for checking the page and routes.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let bus = FrameBus::new(2);
    let cfg = ServerConfig::from_env();

    let handle = start_server(bus, cfg).await?;
    // Park forever
    handle.await.ok();
    Ok(())
}
