//! HTTP ingress: maps requests to the publish pipeline.
//!
//! Requires the `http` feature. Uses axum for routing.
//!
//! ## Routes
//!
//! - `POST /publish-order`: body is the order JSON. 200 once the order is handed
//!   to the broker, 400 for a structurally invalid body (the broker is never
//!   contacted), 500 for any pipeline failure.
//! - `GET /health`: liveness, `{ "status": "ok" }`. Does not touch the broker.
//!
//! ## Example
//!
//! ```ignore
//! let relay = OrderRelay::new(Arc::new(AmqpBroker::new(url)), Arc::new(topology));
//!
//! // Get the router to compose with other axum routes
//! let app = order_relay::http::router(relay.clone());
//!
//! // Or serve directly
//! order_relay::http::serve(relay, "0.0.0.0:3000".parse()?).await?;
//! ```

use std::net::SocketAddr;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::error::RelayError;
use crate::order::OrderPayload;
use crate::relay::OrderRelay;

/// Build the router. Each request runs its own pipeline; the relay holds no
/// per-request state.
pub fn router(relay: OrderRelay) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/publish-order", post(publish_order_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(relay)
}

/// Serve on an already-bound listener until Ctrl-C.
pub async fn serve_listener(relay: OrderRelay, listener: TcpListener) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    info!(%addr, "order relay listening");
    axum::serve(listener, router(relay))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

/// Bind `addr` and serve until Ctrl-C.
pub async fn serve(relay: OrderRelay, addr: SocketAddr) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    serve_listener(relay, listener).await
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "could not install Ctrl-C handler");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

/// `GET /health`
async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// `POST /publish-order`
///
/// The body is taken as raw bytes so validation failures produce our own
/// error body rather than the extractor's rejection. The pipeline runs on its
/// own task: if the client goes away and this future is dropped, the publish
/// still finishes and its session is still closed.
async fn publish_order_handler(State(relay): State<OrderRelay>, body: Bytes) -> Response {
    let order = match OrderPayload::from_json_slice(&body) {
        Ok(order) => order,
        Err(err) => {
            warn!(error = %err, "rejected order payload");
            return error_response(&err);
        }
    };

    let pipeline = tokio::spawn(async move { relay.publish(&order).await });
    let outcome = match pipeline.await {
        Ok(outcome) => outcome,
        Err(err) => {
            error!(error = %err, "publish task did not complete");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "status": "error",
                    "kind": "internal",
                    "message": "publish task did not complete",
                })),
            )
                .into_response();
        }
    };

    match outcome {
        Ok(receipt) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "message": "order queued",
                "orderId": receipt.order_id,
                "exchange": receipt.exchange,
                "routingKey": receipt.routing_key,
            })),
        )
            .into_response(),
        Err(err) => error_response(&err),
    }
}

fn error_response(err: &RelayError) -> Response {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = json!({
        "status": "error",
        "kind": err.kind(),
        "message": err.to_string(),
    });
    (status, Json(body)).into_response()
}
