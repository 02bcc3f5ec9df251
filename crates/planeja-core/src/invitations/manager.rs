//! Invitation Manager - Send, accept, reject, cancel and resend invitations

use super::rate_limiter::RateLimiter;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use planeja_common::config::InvitationConfig;
use planeja_common::types::{normalize_email, Actor, EmailAddress, InvitationId, UserId};
use planeja_common::{Clock, Error, Result};
use planeja_storage::models::{
    ActivityType, CreateInvitation, Invitation, InvitationActivity, InvitationCounts,
    InvitationSender, InvitationStats, InvitationStatus, InvitationTarget, TargetKind,
};
use planeja_storage::state::{load_json, save_json, StateStore, ACTIVITIES_KEY, INVITATIONS_KEY};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Maximum length of an invitation message, in characters
pub const MAX_MESSAGE_LEN: usize = 1000;

/// Which side of an invitation a listing is for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvitationBox {
    Sent,
    Received,
}

impl std::str::FromStr for InvitationBox {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "sent" => Ok(InvitationBox::Sent),
            "received" => Ok(InvitationBox::Received),
            _ => Err(format!("Invalid invitation box: {}", s)),
        }
    }
}

/// Mark a pending invitation past its expiry as expired.
///
/// This is the only place expiry is decided; the sweep, every action and
/// every read go through it. Returns true when the status changed.
pub fn resolve_status(invitation: &mut Invitation, now: DateTime<Utc>) -> bool {
    if invitation.is_overdue(now) {
        invitation.status = InvitationStatus::Expired;
        true
    } else {
        false
    }
}

#[derive(Debug, Clone, Copy)]
enum Lookup<'a> {
    Id(InvitationId),
    Token(&'a str),
}

impl Lookup<'_> {
    fn position(&self, invitations: &[Invitation]) -> Option<usize> {
        match self {
            Lookup::Id(id) => invitations.iter().position(|i| i.id == *id),
            Lookup::Token(token) => invitations
                .iter()
                .position(|i| i.link_token.as_deref() == Some(*token)),
        }
    }

    fn describe(&self) -> String {
        match self {
            Lookup::Id(id) => format!("Invitation {}", id),
            Lookup::Token(_) => "Invitation link".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transition {
    Accept { via_link: bool },
    Reject,
    Cancel,
}

impl Transition {
    fn activity_type(&self) -> ActivityType {
        match self {
            Transition::Accept { .. } => ActivityType::Accepted,
            Transition::Reject => ActivityType::Rejected,
            Transition::Cancel => ActivityType::Cancelled,
        }
    }
}

/// Invitation manager
pub struct InvitationManager {
    store: Arc<dyn StateStore>,
    clock: Arc<dyn Clock>,
    rate_limiter: Arc<RateLimiter>,
    config: InvitationConfig,
    lock: Mutex<()>,
}

impl InvitationManager {
    /// Create a new invitation manager
    pub fn new(
        store: Arc<dyn StateStore>,
        clock: Arc<dyn Clock>,
        rate_limiter: Arc<RateLimiter>,
        config: InvitationConfig,
    ) -> Self {
        Self {
            store,
            clock,
            rate_limiter,
            config,
            lock: Mutex::new(()),
        }
    }

    /// Get the send rate limiter
    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }

    /// Shareable URL for an invitation carrying a link token
    pub fn share_link(&self, invitation: &Invitation) -> Option<String> {
        invitation.link_token.as_ref().map(|token| {
            format!(
                "{}/{}",
                self.config.link_base_url.trim_end_matches('/'),
                token
            )
        })
    }

    async fn load_invitations(&self) -> Result<Vec<Invitation>> {
        Ok(load_json(self.store.as_ref(), INVITATIONS_KEY)
            .await?
            .unwrap_or_default())
    }

    async fn save_invitations(&self, invitations: &[Invitation]) -> Result<()> {
        save_json(self.store.as_ref(), INVITATIONS_KEY, invitations).await
    }

    async fn load_activities(&self) -> Result<Vec<InvitationActivity>> {
        Ok(load_json(self.store.as_ref(), ACTIVITIES_KEY)
            .await?
            .unwrap_or_default())
    }

    /// Record `activity` and persist `invitations` as one change.
    ///
    /// The activity log is written first. If the invitation save then fails,
    /// the previous log is put back and the save error is returned.
    async fn commit(&self, invitations: &[Invitation], activity: InvitationActivity) -> Result<()> {
        let previous = self.load_activities().await?;
        let mut activities = previous.clone();
        activities.push(activity);
        save_json(self.store.as_ref(), ACTIVITIES_KEY, &activities).await?;

        if let Err(e) = self.save_invitations(invitations).await {
            if let Err(restore) = save_json(self.store.as_ref(), ACTIVITIES_KEY, &previous).await {
                error!(error = %restore, "Failed to restore the activity log");
            }
            return Err(e);
        }
        Ok(())
    }

    /// Load every invitation with expiry resolved, plus how many were corrected
    async fn load_resolved(&self, now: DateTime<Utc>) -> Result<(Vec<Invitation>, usize)> {
        let mut invitations = self.load_invitations().await?;
        let corrected = invitations
            .iter_mut()
            .map(|i| resolve_status(i, now))
            .filter(|changed| *changed)
            .count();
        Ok((invitations, corrected))
    }

    /// Persist pending expiry corrections, then fail with `err`
    async fn fail<T>(&self, invitations: &[Invitation], corrected: usize, err: Error) -> Result<T> {
        if corrected > 0 {
            self.save_invitations(invitations).await?;
            debug!(corrected, "Persisted expiry corrections");
        }
        Err(err)
    }

    /// Send a new invitation
    pub async fn send_invitation(
        &self,
        form: CreateInvitation,
        target: InvitationTarget,
        sender: &Actor,
    ) -> Result<Invitation> {
        let recipient_email = EmailAddress::parse(&form.recipient_email)
            .ok_or_else(|| {
                Error::Validation(format!(
                    "Invalid email address: {}",
                    form.recipient_email.trim()
                ))
            })?
            .as_string();

        if recipient_email == sender.email {
            return Err(Error::Validation("You cannot invite yourself".to_string()));
        }
        if target.name.trim().is_empty() {
            return Err(Error::Validation("Target name is required".to_string()));
        }

        let message = normalize_message(form.message)?;
        let team_names = normalize_team_names(form.team_names)?;

        let expiration_days = form
            .expiration_days
            .unwrap_or(self.config.expiration_days);
        if !(1..=30).contains(&expiration_days) {
            return Err(Error::Validation(
                "Expiration must be between 1 and 30 days".to_string(),
            ));
        }

        let _guard = self.lock.lock().await;

        self.rate_limiter.consume(&sender.id.to_string()).await?;

        let now = self.clock.now();
        let (mut invitations, corrected) = self.load_resolved(now).await?;

        let duplicate = invitations.iter().any(|i| {
            i.status == InvitationStatus::Pending
                && i.matches_slot(&recipient_email, target.kind, target.id)
        });
        if duplicate {
            return self
                .fail(
                    &invitations,
                    corrected,
                    Error::Duplicate(format!(
                        "{} already has a pending invitation to {}",
                        recipient_email, target.name
                    )),
                )
                .await;
        }

        let invitation = Invitation {
            id: Uuid::new_v4(),
            sender: InvitationSender {
                id: sender.id,
                name: sender.name.clone(),
                email: sender.email.clone(),
            },
            recipient_email,
            recipient_id: None,
            target,
            role: form.role,
            team_names,
            message,
            status: InvitationStatus::Pending,
            created_at: now,
            expires_at: now + Duration::days(expiration_days),
            accepted_at: None,
            rejected_at: None,
            cancelled_at: None,
            link_token: form.generate_link.then(generate_link_token),
        };

        let activity = new_activity(
            &invitation,
            sender,
            ActivityType::Sent,
            invitation.message.clone(),
            now,
        );
        invitations.push(invitation.clone());
        self.commit(&invitations, activity).await?;

        info!(
            invitation_id = %invitation.id,
            recipient = %invitation.recipient_email,
            target = %invitation.target.name,
            role = %invitation.role,
            "Invitation sent"
        );

        Ok(invitation)
    }

    /// Accept an invitation addressed to the actor
    pub async fn accept_invitation(&self, id: InvitationId, actor: &Actor) -> Result<Invitation> {
        self.transition(Lookup::Id(id), actor, Transition::Accept { via_link: false })
            .await
    }

    /// Accept an invitation through its shareable link
    pub async fn accept_by_token(&self, token: &str, actor: &Actor) -> Result<Invitation> {
        self.transition(Lookup::Token(token), actor, Transition::Accept { via_link: true })
            .await
    }

    /// Reject an invitation addressed to the actor
    pub async fn reject_invitation(&self, id: InvitationId, actor: &Actor) -> Result<Invitation> {
        self.transition(Lookup::Id(id), actor, Transition::Reject).await
    }

    /// Cancel an invitation the actor sent
    pub async fn cancel_invitation(&self, id: InvitationId, actor: &Actor) -> Result<Invitation> {
        self.transition(Lookup::Id(id), actor, Transition::Cancel).await
    }

    async fn transition(
        &self,
        lookup: Lookup<'_>,
        actor: &Actor,
        transition: Transition,
    ) -> Result<Invitation> {
        let _guard = self.lock.lock().await;
        let now = self.clock.now();
        let (mut invitations, corrected) = self.load_resolved(now).await?;

        let idx = match apply_transition(&mut invitations, lookup, actor, transition, now) {
            Ok(idx) => idx,
            Err(e) => return self.fail(&invitations, corrected, e).await,
        };

        let invitation = invitations[idx].clone();
        let activity = new_activity(&invitation, actor, transition.activity_type(), None, now);
        self.commit(&invitations, activity).await?;

        info!(
            invitation_id = %invitation.id,
            actor_id = %actor.id,
            status = %invitation.status,
            "Invitation updated"
        );

        Ok(invitation)
    }

    /// Re-issue a pending or expired invitation with a fresh expiry
    pub async fn resend_invitation(
        &self,
        id: InvitationId,
        actor: &Actor,
        new_message: Option<String>,
    ) -> Result<Invitation> {
        let new_message = normalize_message(new_message)?;

        let _guard = self.lock.lock().await;
        let now = self.clock.now();
        let (mut invitations, corrected) = self.load_resolved(now).await?;

        let idx = match locate_for_resend(&invitations, id, actor) {
            Ok(idx) => idx,
            Err(e) => return self.fail(&invitations, corrected, e).await,
        };

        if let Err(e) = self.rate_limiter.consume(&actor.id.to_string()).await {
            return self.fail(&invitations, corrected, e).await;
        }

        let current = &invitations[idx];
        let duplicate = invitations.iter().any(|other| {
            other.id != current.id
                && other.status == InvitationStatus::Pending
                && other.matches_slot(&current.recipient_email, current.target.kind, current.target.id)
        });
        if duplicate {
            let err = Error::Duplicate(format!(
                "{} already has a pending invitation to {}",
                current.recipient_email, current.target.name
            ));
            return self.fail(&invitations, corrected, err).await;
        }

        let invitation = &mut invitations[idx];
        invitation.status = InvitationStatus::Pending;
        invitation.expires_at = now + Duration::days(self.config.resend_extension_days);
        if new_message.is_some() {
            invitation.message = new_message.clone();
        }
        let invitation = invitation.clone();

        let activity = new_activity(&invitation, actor, ActivityType::Resent, new_message, now);
        self.commit(&invitations, activity).await?;

        info!(
            invitation_id = %invitation.id,
            expires_at = %invitation.expires_at,
            "Invitation resent"
        );

        Ok(invitation)
    }

    /// Mark every overdue pending invitation as expired
    pub async fn sweep_expired(&self) -> Result<usize> {
        let _guard = self.lock.lock().await;
        let now = self.clock.now();
        let (invitations, corrected) = self.load_resolved(now).await?;

        if corrected > 0 {
            self.save_invitations(&invitations).await?;
            info!(expired = corrected, "Expired overdue invitations");
        }

        Ok(corrected)
    }

    /// Resolved copies of every invitation
    async fn snapshot(&self) -> Result<Vec<Invitation>> {
        let now = self.clock.now();
        Ok(self.load_resolved(now).await?.0)
    }

    /// Get an invitation the actor sent or received
    pub async fn get(&self, id: InvitationId, actor: &Actor) -> Result<Invitation> {
        let invitation = self
            .snapshot()
            .await?
            .into_iter()
            .find(|i| i.id == id)
            .ok_or_else(|| Error::NotFound(format!("Invitation {}", id)))?;

        if invitation.sender.id != actor.id && invitation.recipient_email != actor.email {
            return Err(Error::PermissionDenied(
                "Only the sender or the recipient can view this invitation".to_string(),
            ));
        }

        Ok(invitation)
    }

    /// Get an invitation by its shareable link token
    pub async fn get_by_token(&self, token: &str) -> Result<Invitation> {
        self.snapshot()
            .await?
            .into_iter()
            .find(|i| i.link_token.as_deref() == Some(token))
            .ok_or_else(|| Error::NotFound("Invitation link".to_string()))
    }

    /// Invitations sent by a user, newest first
    pub async fn list_sent(
        &self,
        sender_id: UserId,
        status: Option<InvitationStatus>,
    ) -> Result<Vec<Invitation>> {
        let mut invitations: Vec<Invitation> = self
            .snapshot()
            .await?
            .into_iter()
            .filter(|i| i.sender.id == sender_id)
            .filter(|i| status.map(|s| i.status == s).unwrap_or(true))
            .collect();
        invitations.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(invitations)
    }

    /// Invitations addressed to an email, newest first
    pub async fn list_received(
        &self,
        email: &str,
        status: Option<InvitationStatus>,
    ) -> Result<Vec<Invitation>> {
        let email = normalize_email(email);
        let mut invitations: Vec<Invitation> = self
            .snapshot()
            .await?
            .into_iter()
            .filter(|i| i.recipient_email == email)
            .filter(|i| status.map(|s| i.status == s).unwrap_or(true))
            .collect();
        invitations.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(invitations)
    }

    /// Invitations to one project or team that the actor sent or received,
    /// newest first
    pub async fn list_for_target(
        &self,
        kind: TargetKind,
        id: Uuid,
        actor: &Actor,
    ) -> Result<Vec<Invitation>> {
        let mut invitations: Vec<Invitation> = self
            .snapshot()
            .await?
            .into_iter()
            .filter(|i| i.target.kind == kind && i.target.id == id)
            .filter(|i| i.sender.id == actor.id || i.recipient_email == actor.email)
            .collect();
        invitations.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(invitations)
    }

    /// Activities the user took part in, newest first
    pub async fn list_activities(&self, actor: &Actor, limit: usize) -> Result<Vec<InvitationActivity>> {
        let mut activities: Vec<InvitationActivity> = self
            .load_activities()
            .await?
            .into_iter()
            .filter(|a| a.actor_id == actor.id || a.recipient_email == actor.email)
            .collect();
        activities.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        activities.truncate(limit);
        Ok(activities)
    }

    /// History of one invitation, oldest first
    pub async fn activities_for(&self, invitation_id: InvitationId) -> Result<Vec<InvitationActivity>> {
        let mut activities: Vec<InvitationActivity> = self
            .load_activities()
            .await?
            .into_iter()
            .filter(|a| a.invitation_id == invitation_id)
            .collect();
        activities.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(activities)
    }

    /// Counts by status of what the user sent and received
    pub async fn stats(&self, actor: &Actor) -> Result<InvitationStats> {
        let mut sent = InvitationCounts::default();
        let mut received = InvitationCounts::default();

        for invitation in self.snapshot().await? {
            if invitation.sender.id == actor.id {
                sent.record(invitation.status);
            }
            if invitation.recipient_email == actor.email {
                received.record(invitation.status);
            }
        }

        Ok(InvitationStats { sent, received })
    }

    /// Stored pending invitations already past their expiry
    pub async fn sweep_backlog(&self) -> Result<usize> {
        let now = self.clock.now();
        Ok(self
            .load_invitations()
            .await?
            .iter()
            .filter(|i| i.is_overdue(now))
            .count())
    }

    /// Remove every activity record; refused unless enabled in configuration
    pub async fn clear_activities(&self) -> Result<usize> {
        if !self.config.allow_activity_clear {
            return Err(Error::PermissionDenied(
                "Clearing the activity log is disabled".to_string(),
            ));
        }

        let _guard = self.lock.lock().await;
        let removed = self.load_activities().await?.len();
        let empty: Vec<InvitationActivity> = Vec::new();
        save_json(self.store.as_ref(), ACTIVITIES_KEY, &empty).await?;
        info!(removed, "Cleared invitation activities");
        Ok(removed)
    }
}

fn apply_transition(
    invitations: &mut [Invitation],
    lookup: Lookup<'_>,
    actor: &Actor,
    transition: Transition,
    now: DateTime<Utc>,
) -> Result<usize> {
    let idx = lookup
        .position(invitations)
        .ok_or_else(|| Error::NotFound(lookup.describe()))?;
    let invitation = &mut invitations[idx];

    match transition {
        Transition::Accept { via_link } => {
            ensure_pending(invitation)?;
            if !via_link && invitation.recipient_email != actor.email {
                return Err(Error::PermissionDenied(
                    "Only the recipient can accept this invitation".to_string(),
                ));
            }
            if via_link && invitation.sender.id == actor.id {
                return Err(Error::PermissionDenied(
                    "The sender cannot accept their own invitation".to_string(),
                ));
            }
            invitation.status = InvitationStatus::Accepted;
            invitation.recipient_id = Some(actor.id);
            invitation.accepted_at = Some(now);
        }
        Transition::Reject => {
            ensure_pending(invitation)?;
            if invitation.recipient_email != actor.email {
                return Err(Error::PermissionDenied(
                    "Only the recipient can reject this invitation".to_string(),
                ));
            }
            invitation.status = InvitationStatus::Rejected;
            invitation.rejected_at = Some(now);
        }
        Transition::Cancel => {
            if invitation.sender.id != actor.id {
                return Err(Error::PermissionDenied(
                    "Only the sender can cancel this invitation".to_string(),
                ));
            }
            ensure_pending(invitation)?;
            invitation.status = InvitationStatus::Cancelled;
            invitation.cancelled_at = Some(now);
        }
    }

    Ok(idx)
}

fn locate_for_resend(invitations: &[Invitation], id: InvitationId, actor: &Actor) -> Result<usize> {
    let idx = invitations
        .iter()
        .position(|i| i.id == id)
        .ok_or_else(|| Error::NotFound(format!("Invitation {}", id)))?;
    let invitation = &invitations[idx];

    if invitation.sender.id != actor.id {
        return Err(Error::PermissionDenied(
            "Only the sender can resend this invitation".to_string(),
        ));
    }

    match invitation.status {
        InvitationStatus::Pending | InvitationStatus::Expired => Ok(idx),
        other => Err(Error::NotPending(other.to_string())),
    }
}

fn ensure_pending(invitation: &Invitation) -> Result<()> {
    match invitation.status {
        InvitationStatus::Pending => Ok(()),
        InvitationStatus::Expired => Err(Error::Expired),
        other => Err(Error::NotPending(other.to_string())),
    }
}

fn normalize_message(message: Option<String>) -> Result<Option<String>> {
    let Some(message) = message else {
        return Ok(None);
    };
    let message = message.trim();
    if message.is_empty() {
        return Ok(None);
    }
    if message.chars().count() > MAX_MESSAGE_LEN {
        return Err(Error::Validation(format!(
            "Message must be at most {} characters",
            MAX_MESSAGE_LEN
        )));
    }
    Ok(Some(message.to_string()))
}

fn normalize_team_names(names: Vec<String>) -> Result<Vec<String>> {
    names
        .into_iter()
        .map(|name| {
            let name = name.trim();
            if name.is_empty() {
                Err(Error::Validation("Team names must not be empty".to_string()))
            } else {
                Ok(name.to_string())
            }
        })
        .collect()
}

/// 32 random bytes, URL-safe base64 without padding
fn generate_link_token() -> String {
    let mut bytes = [0u8; 32];
    bytes[..16].copy_from_slice(Uuid::new_v4().as_bytes());
    bytes[16..].copy_from_slice(Uuid::new_v4().as_bytes());
    URL_SAFE_NO_PAD.encode(bytes)
}

fn new_activity(
    invitation: &Invitation,
    actor: &Actor,
    activity_type: ActivityType,
    message: Option<String>,
    now: DateTime<Utc>,
) -> InvitationActivity {
    InvitationActivity {
        id: Uuid::new_v4(),
        activity_type,
        invitation_id: invitation.id,
        actor_id: actor.id,
        actor_name: actor.name.clone(),
        target_name: invitation.target.name.clone(),
        recipient_email: invitation.recipient_email.clone(),
        message,
        created_at: now,
    }
}
