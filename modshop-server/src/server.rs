//! modshop-server/src/server.rs
//!
//! The Messenger webhook listener and the background job poller.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use modshop_core::platforms::messenger::{VerifyParams, WebhookPayload};
use modshop_core::services::DialogRouter;
use modshop_core::tasks::job_poller::spawn_job_poller;
use modshop_core::Error;

use crate::context::ServerContext;
use crate::Args;

#[derive(Clone)]
pub struct AppState {
    pub router: Arc<DialogRouter>,
    pub verify_token: Arc<String>,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/webhook", get(verify_webhook).post(receive_webhook))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "ModShop bot is running"
}

async fn verify_webhook(
    State(state): State<AppState>,
    Query(params): Query<VerifyParams>,
) -> Response {
    match params.verify(&state.verify_token) {
        Some(challenge) => {
            info!("Webhook verified");
            (StatusCode::OK, challenge.to_string()).into_response()
        }
        None => {
            warn!("Webhook verification rejected (mode={:?})", params.mode);
            StatusCode::FORBIDDEN.into_response()
        }
    }
}

/// Acknowledges at once; every event is handled on its own task so a slow
/// receipt analysis never holds up the platform's delivery.
async fn receive_webhook(
    State(state): State<AppState>,
    Json(payload): Json<WebhookPayload>,
) -> Response {
    if !payload.is_page() {
        debug!("Ignoring webhook for object '{}'", payload.object);
        return StatusCode::NOT_FOUND.into_response();
    }
    for event in payload.into_events() {
        let router = state.router.clone();
        tokio::spawn(async move {
            router.handle_event(event).await;
        });
    }
    (StatusCode::OK, "EVENT_RECEIVED").into_response()
}

pub async fn run_server(args: Args) -> Result<(), Error> {
    let ctx = ServerContext::new(&args).await?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let poller_task = if args.no_job_poller {
        info!("Job poller disabled");
        None
    } else {
        Some(spawn_job_poller(
            ctx.job_poller(),
            Duration::from_secs(args.job_poll_secs.max(1)),
            shutdown_rx.clone(),
        ))
    };

    let addr: SocketAddr = args
        .server_addr
        .parse()
        .map_err(|e| Error::Parse(format!("Invalid server address '{}': {}", args.server_addr, e)))?;
    let listener = TcpListener::bind(addr).await?;
    info!("Webhook listener on {}", addr);

    let state = AppState {
        router: ctx.router.clone(),
        verify_token: ctx.verify_token.clone(),
    };

    let mut graceful_rx = shutdown_rx;
    let serve = axum::serve(listener, app(state)).with_graceful_shutdown(async move {
        let _ = graceful_rx.wait_for(|stop| *stop).await;
    });

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received; shutting down");
        }
        let _ = shutdown_tx.send(true);
    });

    if let Err(e) = serve.await {
        error!("Webhook listener failed: {}", e);
    }

    if let Some(task) = poller_task {
        let _ = task.await;
    }
    ctx.db.pool().close().await;
    info!("Shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    use modshop_core::services::{BotContext, BotSettings, InMemoryConversationStore, LedgerRepos};
    use modshop_core::test_utils::{InMemoryLedger, RecordingSender, StaticAnalyzer};

    fn test_app() -> (Router, Arc<RecordingSender>) {
        let ledger = Arc::new(InMemoryLedger::new());
        let sender = Arc::new(RecordingSender::new());
        let settings = BotSettings::default();
        let states = Arc::new(InMemoryConversationStore::new(settings.idle_timeout));
        let repos = LedgerRepos {
            mods: ledger.clone(),
            accounts: ledger.clone(),
            references: ledger.clone(),
            admins: ledger.clone(),
            jobs: ledger,
        };
        let ctx = BotContext::new(
            settings,
            repos,
            Arc::new(StaticAnalyzer::returning("0", "0")),
            sender.clone(),
            states,
        );
        let state = AppState {
            router: Arc::new(DialogRouter::new(ctx)),
            verify_token: Arc::new("secret".to_string()),
        };
        (app(state), sender)
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn verification_echoes_challenge() {
        let (app, _) = test_app();
        let response = app
            .oneshot(
                Request::get("/webhook?hub.mode=subscribe&hub.verify_token=secret&hub.challenge=42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "42");
    }

    #[tokio::test]
    async fn verification_with_wrong_token_is_forbidden() {
        let (app, _) = test_app();
        let response = app
            .oneshot(
                Request::get("/webhook?hub.mode=subscribe&hub.verify_token=nope&hub.challenge=42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn non_page_payload_is_not_found() {
        let (app, _) = test_app();
        let response = app
            .oneshot(
                Request::post("/webhook")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"object":"instagram","entry":[]}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn page_event_is_acknowledged_and_handled() {
        let (app, sender) = test_app();
        let payload = serde_json::json!({
            "object": "page",
            "entry": [{
                "messaging": [{
                    "sender": { "id": "buyer-9" },
                    "message": { "text": "my id" }
                }]
            }]
        });
        let response = app
            .oneshot(
                Request::post("/webhook")
                    .header("content-type", "application/json")
                    .body(Body::from(payload.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "EVENT_RECEIVED");

        for _ in 0..50 {
            if sender.saw("buyer-9", "buyer-9") {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("event was never handled: {:?}", sender.all());
    }

    #[tokio::test]
    async fn health_check_answers() {
        let (app, _) = test_app();
        let response = app
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
