use viewer::{config::get_configuration, driver, logging::setup_logging};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = get_configuration()?;
    setup_logging(&config);

    tracing::info!(
        server = %config.server_url,
        channels = %config.channels,
        "Viewer starting"
    );

    driver::run(config).await
}
