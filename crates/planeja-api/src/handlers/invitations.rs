//! Invitation handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use planeja_common::types::Actor;
use planeja_core::invitations::InvitationBox;
use planeja_core::RemainingQuota;
use planeja_storage::models::{
    CreateInvitation, Invitation, InvitationActivity, InvitationRole, InvitationStats,
    InvitationStatus, InvitationTarget, TargetKind,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::{ApiError, ApiResult};
use crate::auth::{AppState, AuthContext};

const MAX_ACTIVITY_LIMIT: usize = 200;

/// Request body for sending an invitation
#[derive(Debug, Deserialize)]
pub struct SendInvitationRequest {
    pub recipient_email: String,
    pub role: InvitationRole,
    pub target: InvitationTarget,
    #[serde(default)]
    pub team_names: Vec<String>,
    pub message: Option<String>,
    pub expiration_days: Option<i64>,
    #[serde(default)]
    pub generate_link: bool,
}

/// Request body for resending an invitation
#[derive(Debug, Default, Deserialize)]
pub struct ResendInvitationRequest {
    pub message: Option<String>,
}

/// Query parameters for listing invitations
#[derive(Debug, Deserialize)]
pub struct ListInvitationsQuery {
    #[serde(rename = "box")]
    pub mailbox: Option<String>,
    pub status: Option<String>,
}

/// Query parameters for listing activities
#[derive(Debug, Deserialize)]
pub struct ListActivitiesQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

/// Invitation response
#[derive(Debug, Serialize)]
pub struct InvitationResponse {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub sender_name: String,
    pub sender_email: String,
    pub recipient_email: String,
    pub recipient_id: Option<Uuid>,
    pub target: InvitationTarget,
    pub role: InvitationRole,
    pub team_names: Vec<String>,
    pub message: Option<String>,
    pub status: InvitationStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub share_link: Option<String>,
}

impl InvitationResponse {
    fn new(invitation: Invitation, share_link: Option<String>) -> Self {
        Self {
            id: invitation.id,
            sender_id: invitation.sender.id,
            sender_name: invitation.sender.name,
            sender_email: invitation.sender.email,
            recipient_email: invitation.recipient_email,
            recipient_id: invitation.recipient_id,
            target: invitation.target,
            role: invitation.role,
            team_names: invitation.team_names,
            message: invitation.message,
            status: invitation.status,
            created_at: invitation.created_at,
            expires_at: invitation.expires_at,
            accepted_at: invitation.accepted_at,
            rejected_at: invitation.rejected_at,
            cancelled_at: invitation.cancelled_at,
            share_link,
        }
    }
}

/// Invitation list response
#[derive(Debug, Serialize)]
pub struct InvitationListResponse {
    pub data: Vec<InvitationResponse>,
    pub total: usize,
}

/// Activity list response
#[derive(Debug, Serialize)]
pub struct ActivityListResponse {
    pub data: Vec<InvitationActivity>,
    pub total: usize,
}

/// Stats response
#[derive(Debug, Serialize)]
pub struct InvitationStatsResponse {
    #[serde(flatten)]
    pub stats: InvitationStats,
    pub rate_limit: RemainingQuota,
}

/// Cleared activities response
#[derive(Debug, Serialize)]
pub struct ClearActivitiesResponse {
    pub removed: usize,
}

/// The shareable link is only handed back to the sender
fn respond(state: &AppState, invitation: Invitation, viewer: &Actor) -> InvitationResponse {
    let link = if invitation.sender.id == viewer.id {
        state.invitations.share_link(&invitation)
    } else {
        None
    };
    InvitationResponse::new(invitation, link)
}

fn parse_status(status: Option<&str>) -> ApiResult<Option<InvitationStatus>> {
    status
        .filter(|s| !s.is_empty() && *s != "all")
        .map(|s| s.parse::<InvitationStatus>().map_err(ApiError::validation))
        .transpose()
}

/// Send an invitation
///
/// POST /api/v1/invitations
pub async fn send_invitation(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Json(input): Json<SendInvitationRequest>,
) -> ApiResult<(StatusCode, Json<InvitationResponse>)> {
    let form = CreateInvitation {
        recipient_email: input.recipient_email,
        role: input.role,
        team_names: input.team_names,
        message: input.message,
        expiration_days: input.expiration_days,
        generate_link: input.generate_link,
    };

    let invitation = state
        .invitations
        .send_invitation(form, input.target, &auth.actor)
        .await?;

    Ok((StatusCode::CREATED, Json(respond(&state, invitation, &auth.actor))))
}

/// List sent or received invitations
///
/// GET /api/v1/invitations?box=sent|received&status=
pub async fn list_invitations(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListInvitationsQuery>,
) -> ApiResult<Json<InvitationListResponse>> {
    let mailbox = query
        .mailbox
        .as_deref()
        .unwrap_or("received")
        .parse::<InvitationBox>()
        .map_err(ApiError::validation)?;
    let status = parse_status(query.status.as_deref())?;

    let invitations = match mailbox {
        InvitationBox::Sent => state.invitations.list_sent(auth.actor.id, status).await?,
        InvitationBox::Received => {
            state
                .invitations
                .list_received(&auth.actor.email, status)
                .await?
        }
    };

    let data: Vec<InvitationResponse> = invitations
        .into_iter()
        .map(|i| respond(&state, i, &auth.actor))
        .collect();

    Ok(Json(InvitationListResponse {
        total: data.len(),
        data,
    }))
}

/// Invitation counts and send quota for the caller
///
/// GET /api/v1/invitations/stats
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<InvitationStatsResponse>> {
    let stats = state.invitations.stats(&auth.actor).await?;
    let rate_limit = state
        .invitations
        .rate_limiter()
        .remaining(&auth.actor.id.to_string())
        .await?;

    Ok(Json(InvitationStatsResponse { stats, rate_limit }))
}

/// Recent activities involving the caller
///
/// GET /api/v1/invitations/activities?limit=
pub async fn list_activities(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListActivitiesQuery>,
) -> ApiResult<Json<ActivityListResponse>> {
    let limit = query.limit.clamp(1, MAX_ACTIVITY_LIMIT);
    let data = state.invitations.list_activities(&auth.actor, limit).await?;

    Ok(Json(ActivityListResponse {
        total: data.len(),
        data,
    }))
}

/// Clear the activity log
///
/// DELETE /api/v1/invitations/activities
pub async fn clear_activities(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<ClearActivitiesResponse>> {
    let removed = state.invitations.clear_activities().await?;
    info!("User {} cleared {} invitation activities", auth.actor.id, removed);
    Ok(Json(ClearActivitiesResponse { removed }))
}

/// Invitations to one project or team that the caller sent or received
///
/// GET /api/v1/invitations/target/:kind/:id
pub async fn list_for_target(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path((kind, id)): Path<(String, Uuid)>,
) -> ApiResult<Json<InvitationListResponse>> {
    let kind = kind.parse::<TargetKind>().map_err(ApiError::validation)?;
    let data: Vec<InvitationResponse> = state
        .invitations
        .list_for_target(kind, id, &auth.actor)
        .await?
        .into_iter()
        .map(|i| respond(&state, i, &auth.actor))
        .collect();

    Ok(Json(InvitationListResponse {
        total: data.len(),
        data,
    }))
}

/// Get an invitation
///
/// GET /api/v1/invitations/:id
pub async fn get_invitation(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<InvitationResponse>> {
    let invitation = state.invitations.get(id, &auth.actor).await?;
    Ok(Json(respond(&state, invitation, &auth.actor)))
}

/// History of one invitation
///
/// GET /api/v1/invitations/:id/activities
pub async fn get_invitation_activities(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ActivityListResponse>> {
    // Visibility follows the invitation
    state.invitations.get(id, &auth.actor).await?;
    let data = state.invitations.activities_for(id).await?;

    Ok(Json(ActivityListResponse {
        total: data.len(),
        data,
    }))
}

/// POST /api/v1/invitations/:id/accept
pub async fn accept_invitation(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<InvitationResponse>> {
    let invitation = state.invitations.accept_invitation(id, &auth.actor).await?;
    Ok(Json(respond(&state, invitation, &auth.actor)))
}

/// POST /api/v1/invitations/:id/reject
pub async fn reject_invitation(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<InvitationResponse>> {
    let invitation = state.invitations.reject_invitation(id, &auth.actor).await?;
    Ok(Json(respond(&state, invitation, &auth.actor)))
}

/// POST /api/v1/invitations/:id/cancel
pub async fn cancel_invitation(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<InvitationResponse>> {
    let invitation = state.invitations.cancel_invitation(id, &auth.actor).await?;
    Ok(Json(respond(&state, invitation, &auth.actor)))
}

/// POST /api/v1/invitations/:id/resend
pub async fn resend_invitation(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    body: Option<Json<ResendInvitationRequest>>,
) -> ApiResult<Json<InvitationResponse>> {
    let Json(input) = body.unwrap_or_default();
    let invitation = state
        .invitations
        .resend_invitation(id, &auth.actor, input.message)
        .await?;
    Ok(Json(respond(&state, invitation, &auth.actor)))
}

/// Look up an invitation by its shareable link
///
/// GET /api/v1/invitations/token/:token
pub async fn get_by_token(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(token): Path<String>,
) -> ApiResult<Json<InvitationResponse>> {
    let invitation = state.invitations.get_by_token(&token).await?;
    Ok(Json(respond(&state, invitation, &auth.actor)))
}

/// Accept an invitation through its shareable link
///
/// POST /api/v1/invitations/token/:token/accept
pub async fn accept_by_token(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(token): Path<String>,
) -> ApiResult<Json<InvitationResponse>> {
    let invitation = state.invitations.accept_by_token(&token, &auth.actor).await?;
    Ok(Json(respond(&state, invitation, &auth.actor)))
}
