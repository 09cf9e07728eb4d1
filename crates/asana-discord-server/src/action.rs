// Asana rule action "Send Feedback to Discord": form metadata, form
// submission and the rule run callback.

use axum::body::{Body, Bytes};
use axum::extract::{Query, Request, State};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tower_http::cors::{AllowHeaders, CorsLayer};
use tracing::{debug, error, info, warn};

use crate::asana::{
    strip_form_footer, verify_asana_signature, AsanaClient, SignatureError, TaskFetchError,
    SIGNATURE_HEADER,
};
use crate::discord::{is_channel_id, CreateMessage, DiscordClient};
use crate::models::{
    decode_envelope, ActionResult, FormBody, FormField, FormMetadata, MetadataQuery, PayloadError,
    RunData, SubmitData,
};
use crate::{AppResult, AppState, BODY_LIMIT};

/// Where the action routes are nested in the app router.
pub const MOUNT: &str = "/asana";

const METADATA_PATH: &str = "/action/feedback/metadata";
const ONSUBMIT_PATH: &str = "/action/feedback/onsubmit";
const RUN_PATH: &str = "/action/feedback/run";

const TASK_BUTTON_LABEL: &str = "Asana Task";

pub fn routes(state: &AppState) -> anyhow::Result<Router<AppState>> {
    let origin: HeaderValue = state
        .config
        .asana_origin
        .parse()
        .map_err(|err| anyhow::anyhow!("invalid ASANA_ORIGIN: {err}"))?;

    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(AllowHeaders::mirror_request());

    Ok(Router::new()
        .route(METADATA_PATH, get(feedback_metadata))
        .route(ONSUBMIT_PATH, post(feedback_onsubmit))
        .route(RUN_PATH, post(feedback_run))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            asana_signature,
        ))
        .layer(cors))
}

impl IntoResponse for PayloadError {
    fn into_response(self) -> Response {
        warn!(error = %self, "rejected asana payload");
        (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": self.to_string() })),
        )
            .into_response()
    }
}

impl IntoResponse for SignatureError {
    fn into_response(self) -> Response {
        warn!(error = %self, "invalid asana request signature");
        (StatusCode::UNAUTHORIZED, "invalid signature").into_response()
    }
}

/// Checks `X-Asana-Request-Signature` when a client secret is configured.
async fn asana_signature(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let Some(secret) = state.config.asana_client_secret.as_deref() else {
        return next.run(req).await;
    };
    if req.method() == Method::OPTIONS {
        return next.run(req).await;
    }

    let signature = match req.headers().get(SIGNATURE_HEADER).map(|v| v.to_str()) {
        Some(Ok(v)) => Some(v.to_string()),
        Some(Err(_)) => return SignatureError::InvalidHeader(SIGNATURE_HEADER).into_response(),
        None => None,
    };

    if req.method() == Method::GET {
        let query = req.uri().query().unwrap_or("");
        if let Err(err) = verify_asana_signature(secret, query.as_bytes(), signature.as_deref()) {
            return err.into_response();
        }
        return next.run(req).await;
    }

    let (parts, body) = req.into_parts();
    let bytes = match axum::body::to_bytes(body, BODY_LIMIT).await {
        Ok(b) => b,
        Err(err) => {
            warn!(error = %err, limit = BODY_LIMIT, "failed to read request body");
            return (StatusCode::PAYLOAD_TOO_LARGE, "request body too large").into_response();
        }
    };
    if let Err(err) = verify_asana_signature(secret, &bytes, signature.as_deref()) {
        return err.into_response();
    }
    next.run(Request::from_parts(parts, Body::from(bytes))).await
}

fn form_metadata(on_submit_callback: String, channel_id: String) -> FormMetadata {
    FormMetadata {
        template: "form_metadata_v0",
        metadata: FormBody {
            title: "Send Feedback to Discord".to_string(),
            on_submit_callback,
            fields: vec![FormField {
                id: "discord_channel_id",
                is_required: true,
                name: "Discord Channel ID",
                placeholder: "810330382993457192",
                kind: "single_line_text",
                value: channel_id,
                width: "full",
            }],
        },
    }
}

async fn feedback_metadata(
    State(state): State<AppState>,
    Query(query): Query<MetadataQuery>,
) -> AppResult<Json<FormMetadata>> {
    debug!(
        action_type = %query.action_type,
        workspace = %query.workspace,
        project = %query.project,
        user = %query.user,
        expires_at = %query.expires_at,
        "form metadata requested"
    );

    let current = match query.action.as_deref().filter(|a| !a.is_empty()) {
        Some(action) => state.channels.get(action).await?.unwrap_or_default(),
        None => String::new(),
    };
    let callback = state
        .config
        .callback_url(&format!("{MOUNT}{ONSUBMIT_PATH}"))?;

    Ok(Json(form_metadata(callback.to_string(), current)))
}

async fn feedback_onsubmit(State(state): State<AppState>, body: Bytes) -> Response {
    let data: SubmitData = match decode_envelope(&body) {
        Ok(v) => v,
        Err(err) => return err.into_response(),
    };
    if !is_channel_id(&data.values.discord_channel_id) {
        return PayloadError::ChannelId(data.values.discord_channel_id).into_response();
    }

    if let Err(err) = state
        .channels
        .put(&data.action, &data.values.discord_channel_id)
        .await
    {
        return crate::AppError::from(err).into_response();
    }

    info!(
        action = %data.action,
        channel_id = %data.values.discord_channel_id,
        rule_name = data.rule_name.as_deref().unwrap_or(""),
        task = data.task.as_deref().unwrap_or(""),
        workspace = ?data.workspace,
        project = ?data.project,
        user = ?data.user,
        action_type = ?data.action_type,
        expires_at = ?data.expires_at,
        "stored discord channel for action"
    );
    StatusCode::OK.into_response()
}

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("Could not retrieve Discord Channel ID.")]
    MissingChannel,
    #[error("Could not retrieve Asana task details: no target object")]
    MissingTarget,
    #[error("Could not retrieve Asana task details: {task_id} ({status})")]
    TaskFetch { task_id: u64, status: u16 },
    #[error("Could not retrieve Asana task details: {task_id}")]
    TaskRequest {
        task_id: u64,
        #[source]
        source: reqwest::Error,
    },
    #[error("Could not parse Asana task details.")]
    TaskShape,
    #[error("Failed to send Discord message with error.")]
    Send,
    #[error("internal error")]
    Store(anyhow::Error),
}

impl IntoResponse for RunError {
    fn into_response(self) -> Response {
        match &self {
            RunError::Store(err) => error!(error = %err, "channel map lookup failed"),
            RunError::TaskRequest { source, .. } => {
                warn!(error = %source, "asana task request failed")
            }
            // Delivery failures are logged where they happen.
            RunError::Send => {}
            other => warn!(error = %other, "action run failed"),
        }
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": self.to_string() })),
        )
            .into_response()
    }
}

async fn feedback_run(State(state): State<AppState>, body: Bytes) -> Response {
    let data: RunData = match decode_envelope(&body) {
        Ok(v) => v,
        Err(err) => return err.into_response(),
    };

    // No deduplication on idempotency_key: a repeated run posts again.
    debug!(
        action = %data.action,
        idempotency_key = %data.idempotency_key,
        target_object = ?data.target_object,
        workspace = ?data.workspace,
        project = ?data.project,
        user = ?data.user,
        action_type = ?data.action_type,
        expires_at = ?data.expires_at,
        "running action"
    );

    match run_action(&state, &data).await {
        Ok(()) => Json(ActionResult { action_result: "ok" }).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn run_action(state: &AppState, data: &RunData) -> Result<(), RunError> {
    let channel_id = state
        .channels
        .get(&data.action)
        .await
        .map_err(RunError::Store)?
        .filter(|c| !c.is_empty())
        .ok_or(RunError::MissingChannel)?;

    let task_id = data.target_object.ok_or(RunError::MissingTarget)?;
    let asana = AsanaClient::new(
        state.http.clone(),
        &state.config.asana_api_base,
        state.config.asana_bearer.clone(),
    );
    let task = asana.fetch_task(task_id).await.map_err(|err| match err {
        TaskFetchError::Status(status) => RunError::TaskFetch {
            task_id,
            status: status.as_u16(),
        },
        TaskFetchError::Request(source) => RunError::TaskRequest { task_id, source },
        TaskFetchError::Shape(_) => RunError::TaskShape,
    })?;

    let content = strip_form_footer(&task.notes);
    let message = CreateMessage::with_link_button(content, TASK_BUTTON_LABEL, &task.permalink_url);
    let discord = DiscordClient::new(
        state.http.clone(),
        &state.config.discord_api_base,
        state.config.discord_token.clone(),
    );
    if let Err(err) = discord.create_message(&channel_id, &message).await {
        error!(error = %err, action = %data.action, channel_id = %channel_id, "failed to send discord message");
        return Err(RunError::Send);
    }

    info!(
        action = %data.action,
        channel_id = %channel_id,
        task_id,
        idempotency_key = %data.idempotency_key,
        "posted asana task to discord"
    );
    Ok(())
}
