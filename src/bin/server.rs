use anyhow::{Context, Result};
use clap::Parser;
use order_relay::config::{
    BrokerBackend, ListenArgs, RelayArgs, MEMORY_BACKEND_MAX_LENGTH,
};
use order_relay::{http, telemetry};
use tracing::{info, warn};

/// HTTP front end that publishes posted orders to the broker.
#[derive(Debug, Parser)]
#[command(name = "order-relay-server", version, about)]
struct Cli {
    #[command(flatten)]
    relay: RelayArgs,

    #[command(flatten)]
    listen: ListenArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init();

    let cli = Cli::parse();
    let addr = cli.listen.addr()?;
    let relay = cli.relay.relay().context("invalid broker configuration")?;
    info!(
        %addr,
        broker = %cli.relay.broker.endpoint(),
        provisioning = %relay.provisioning(),
        declarations = relay.topology().declarations().len(),
        "starting order relay"
    );
    if cli.relay.broker.backend == BrokerBackend::Memory {
        warn!(
            max_length = MEMORY_BACKEND_MAX_LENGTH,
            "memory backend: orders are not delivered anywhere and are lost on exit"
        );
    }

    http::serve(relay, addr)
        .await
        .context("server shutdown with error")?;
    info!("order relay stopped");
    Ok(())
}
