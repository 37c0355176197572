//! Command-line ingress: one JSON argument in, one exit status out.
//!
//! Exit status 0 means the order was handed to the broker; 1 covers both
//! usage errors (the broker is never contacted) and pipeline failures.

use std::io::Write;
use std::process::ExitCode;

use tracing::error;

use crate::error::RelayError;
use crate::order::OrderPayload;
use crate::relay::OrderRelay;

pub const USAGE: &str = "usage: send-order '<order-json>'";

/// Result of one CLI invocation.
#[derive(Debug, PartialEq, Eq)]
pub enum CliOutcome {
    Published,
    UsageError,
    Failed,
}

impl CliOutcome {
    pub fn code(&self) -> u8 {
        match self {
            CliOutcome::Published => 0,
            CliOutcome::UsageError | CliOutcome::Failed => 1,
        }
    }
}

impl From<CliOutcome> for ExitCode {
    fn from(outcome: CliOutcome) -> Self {
        ExitCode::from(outcome.code())
    }
}

/// Parse `raw` and publish it, writing diagnostics to `diagnostics`.
pub async fn run<W: Write>(relay: &OrderRelay, raw: Option<&str>, diagnostics: &mut W) -> CliOutcome {
    let Some(raw) = raw else {
        let _ = writeln!(diagnostics, "{USAGE}");
        return CliOutcome::UsageError;
    };

    let order = match OrderPayload::from_json_str(raw) {
        Ok(order) => order,
        Err(err) => {
            let _ = writeln!(diagnostics, "{err}");
            let _ = writeln!(diagnostics, "{USAGE}");
            return CliOutcome::UsageError;
        }
    };

    match relay.publish(&order).await {
        Ok(receipt) => {
            let _ = writeln!(
                diagnostics,
                "order {} sent to {} ({})",
                receipt.order_id, receipt.exchange, receipt.routing_key
            );
            CliOutcome::Published
        }
        Err(err) => {
            report(&err, diagnostics);
            CliOutcome::Failed
        }
    }
}

fn report<W: Write>(err: &RelayError, diagnostics: &mut W) {
    error!(kind = err.kind(), error = %err, "send-order failed");
    let _ = writeln!(diagnostics, "error publishing order: {err}");
}
