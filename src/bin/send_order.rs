use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::Parser;
use order_relay::cli::{self, CliOutcome};
use order_relay::config::RelayArgs;
use order_relay::telemetry;

/// Publish one order to the broker and exit.
#[derive(Debug, Parser)]
#[command(name = "send-order", version, about)]
struct Cli {
    /// The order document as a single JSON argument.
    payload: Option<String>,

    #[command(flatten)]
    relay: RelayArgs,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    telemetry::init();

    let args = match Cli::try_parse() {
        Ok(args) => args,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            err.exit()
        }
        Err(err) => {
            let _ = err.print();
            return CliOutcome::UsageError.into();
        }
    };

    let relay = match args.relay.relay() {
        Ok(relay) => relay,
        Err(err) => {
            eprintln!("configuration error: {err}");
            return CliOutcome::UsageError.into();
        }
    };

    let mut stderr = std::io::stderr();
    cli::run(&relay, args.payload.as_deref(), &mut stderr)
        .await
        .into()
}
