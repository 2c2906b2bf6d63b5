//! HTTP server for the chat page and its API

use super::page::CHAT_HTML;
use crate::config::ServerConfig;
use crate::core::{Attachment, ChatContext, Prompt, RenderCommand};
use anyhow::Result;
use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        Html, IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures::StreamExt;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Health check response
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

pub fn version() -> String {
    format!(
        "{}{}",
        env!("CARGO_PKG_VERSION"),
        env!("CHATDECK_VERSION_SUFFIX")
    )
}

/// Build the router around a shared chat context
pub fn router(ctx: Arc<ChatContext>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
        .route("/history", get(get_history))
        .route("/session/items", get(get_items))
        .route("/session/reset", post(reset_session))
        .route("/chat", post(handle_chat))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(ctx)
}

/// Run the HTTP server until ctrl-c
pub async fn run_http_server(config: &ServerConfig, ctx: Arc<ChatContext>) -> Result<()> {
    let app = router(ctx, config.max_upload_bytes);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Chat UI available at http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await?;

    Ok(())
}

fn error_response(status: StatusCode, message: impl ToString) -> Response {
    (status, Json(serde_json::json!({ "error": message.to_string() }))).into_response()
}

async fn index() -> Html<&'static str> {
    Html(CHAT_HTML)
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: version(),
    })
}

async fn get_history(State(ctx): State<Arc<ChatContext>>) -> Response {
    match ctx.history().await {
        Ok(directives) => Json(directives).into_response(),
        Err(e) => {
            tracing::error!("Failed to load history: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e)
        }
    }
}

async fn get_items(State(ctx): State<Arc<ChatContext>>) -> Response {
    match ctx.items().await {
        Ok(items) => Json(items).into_response(),
        Err(e) => {
            tracing::error!("Failed to load session items: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e)
        }
    }
}

async fn reset_session(State(ctx): State<Arc<ChatContext>>) -> Response {
    match ctx.reset().await {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({ "success": true }))).into_response(),
        Err(e) => {
            tracing::error!("Failed to reset session: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e)
        }
    }
}

/// Read the `text` field and any `files` parts of a chat submission
async fn read_prompt(mut multipart: Multipart) -> Result<Prompt, Response> {
    let mut prompt = Prompt::default();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return Err(error_response(StatusCode::BAD_REQUEST, e.body_text())),
        };

        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "text" => {
                prompt.text = field
                    .text()
                    .await
                    .map_err(|e| error_response(StatusCode::BAD_REQUEST, e.body_text()))?;
            }
            "files" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                if file_name.is_empty() {
                    continue;
                }
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| error_response(StatusCode::BAD_REQUEST, e.body_text()))?;

                let attachment =
                    Attachment::from_upload(file_name, content_type.as_deref(), bytes.to_vec())
                        .map_err(|e| error_response(StatusCode::BAD_REQUEST, e))?;
                prompt.attachments.push(attachment);
            }
            other => tracing::debug!(field = other, "Ignoring unknown form field"),
        }
    }

    Ok(prompt)
}

async fn handle_chat(State(ctx): State<Arc<ChatContext>>, multipart: Multipart) -> Response {
    let prompt = match read_prompt(multipart).await {
        Ok(prompt) => prompt,
        Err(response) => return response,
    };
    if prompt.text.trim().is_empty() && prompt.attachments.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Message is empty");
    }

    tracing::info!(
        chars = prompt.text.len(),
        attachments = prompt.attachments.len(),
        "Chat submission"
    );

    let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<RenderCommand>();
    tokio::spawn(async move {
        match ctx.submit(prompt, tx).await {
            Ok(outcome) => tracing::debug!(?outcome, "Turn finished"),
            Err(e) => tracing::warn!("Turn failed: {}", e),
        }
    });

    let events = UnboundedReceiverStream::new(rx)
        .map(|command| Event::default().event("render").json_data(&command));

    Sse::new(events)
        .keep_alive(KeepAlive::default())
        .into_response()
}
