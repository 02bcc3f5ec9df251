//! Domain models

use chrono::{DateTime, Utc};
use planeja_common::types::{
    ActivityId, InvitationId, ProjectId, TaskId, TeamId, UserId,
};
use serde::{Deserialize, Serialize};

/// Invitation status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Rejected,
    Cancelled,
    Expired,
}

impl InvitationStatus {
    pub const ALL: [InvitationStatus; 5] = [
        InvitationStatus::Pending,
        InvitationStatus::Accepted,
        InvitationStatus::Rejected,
        InvitationStatus::Cancelled,
        InvitationStatus::Expired,
    ];

    /// Terminal states never move on through the regular lifecycle
    pub fn is_terminal(&self) -> bool {
        !matches!(self, InvitationStatus::Pending)
    }

    /// Whether `self -> next` is a lifecycle transition
    pub fn can_transition_to(&self, next: InvitationStatus) -> bool {
        *self == InvitationStatus::Pending && next.is_terminal()
    }
}

impl std::fmt::Display for InvitationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvitationStatus::Pending => write!(f, "pending"),
            InvitationStatus::Accepted => write!(f, "accepted"),
            InvitationStatus::Rejected => write!(f, "rejected"),
            InvitationStatus::Cancelled => write!(f, "cancelled"),
            InvitationStatus::Expired => write!(f, "expired"),
        }
    }
}

impl std::str::FromStr for InvitationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(InvitationStatus::Pending),
            "accepted" => Ok(InvitationStatus::Accepted),
            "rejected" => Ok(InvitationStatus::Rejected),
            "cancelled" => Ok(InvitationStatus::Cancelled),
            "expired" => Ok(InvitationStatus::Expired),
            _ => Err(format!("Invalid invitation status: {}", s)),
        }
    }
}

/// Role granted by an invitation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvitationRole {
    Owner,
    Admin,
    Member,
    Observer,
}

impl std::fmt::Display for InvitationRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvitationRole::Owner => write!(f, "owner"),
            InvitationRole::Admin => write!(f, "admin"),
            InvitationRole::Member => write!(f, "member"),
            InvitationRole::Observer => write!(f, "observer"),
        }
    }
}

impl std::str::FromStr for InvitationRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owner" => Ok(InvitationRole::Owner),
            "admin" => Ok(InvitationRole::Admin),
            "member" => Ok(InvitationRole::Member),
            "observer" => Ok(InvitationRole::Observer),
            _ => Err(format!("Invalid invitation role: {}", s)),
        }
    }
}

/// What an invitation grants access to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Project,
    Team,
}

impl std::fmt::Display for TargetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetKind::Project => write!(f, "project"),
            TargetKind::Team => write!(f, "team"),
        }
    }
}

impl std::str::FromStr for TargetKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "project" => Ok(TargetKind::Project),
            "team" => Ok(TargetKind::Team),
            _ => Err(format!("Invalid invitation target kind: {}", s)),
        }
    }
}

/// The project or team a recipient is invited to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvitationTarget {
    pub kind: TargetKind,
    pub id: uuid::Uuid,
    pub name: String,
}

/// The user who sent an invitation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvitationSender {
    pub id: UserId,
    pub name: String,
    pub email: String,
}

/// Invitation model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invitation {
    pub id: InvitationId,
    pub sender: InvitationSender,
    pub recipient_email: String,
    pub recipient_id: Option<UserId>,
    pub target: InvitationTarget,
    pub role: InvitationRole,
    #[serde(default)]
    pub team_names: Vec<String>,
    pub message: Option<String>,
    pub status: InvitationStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub link_token: Option<String>,
}

impl Invitation {
    /// Pending, but past its expiry instant
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status == InvitationStatus::Pending && now > self.expires_at
    }

    /// Whether this invitation occupies the (email, target) pending slot
    pub fn matches_slot(&self, recipient_email: &str, kind: TargetKind, target_id: uuid::Uuid) -> bool {
        self.recipient_email == recipient_email
            && self.target.kind == kind
            && self.target.id == target_id
    }
}

/// Invitation activity type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    Sent,
    Accepted,
    Rejected,
    Cancelled,
    Resent,
}

impl std::fmt::Display for ActivityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActivityType::Sent => write!(f, "sent"),
            ActivityType::Accepted => write!(f, "accepted"),
            ActivityType::Rejected => write!(f, "rejected"),
            ActivityType::Cancelled => write!(f, "cancelled"),
            ActivityType::Resent => write!(f, "resent"),
        }
    }
}

/// Append-only audit record of an invitation state change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvitationActivity {
    pub id: ActivityId,
    pub activity_type: ActivityType,
    pub invitation_id: InvitationId,
    pub actor_id: UserId,
    pub actor_name: String,
    pub target_name: String,
    pub recipient_email: String,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Create invitation input (the send form)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateInvitation {
    pub recipient_email: String,
    pub role: InvitationRole,
    #[serde(default)]
    pub team_names: Vec<String>,
    pub message: Option<String>,
    /// Overrides the configured validity when set
    pub expiration_days: Option<i64>,
    #[serde(default)]
    pub generate_link: bool,
}

/// Invitation counts per status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvitationCounts {
    pub pending: u32,
    pub accepted: u32,
    pub rejected: u32,
    pub cancelled: u32,
    pub expired: u32,
}

impl InvitationCounts {
    pub fn record(&mut self, status: InvitationStatus) {
        match status {
            InvitationStatus::Pending => self.pending += 1,
            InvitationStatus::Accepted => self.accepted += 1,
            InvitationStatus::Rejected => self.rejected += 1,
            InvitationStatus::Cancelled => self.cancelled += 1,
            InvitationStatus::Expired => self.expired += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.pending + self.accepted + self.rejected + self.cancelled + self.expired
    }
}

/// Invitation statistics for one user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvitationStats {
    pub sent: InvitationCounts,
    pub received: InvitationCounts,
}

/// Send rate-limit counter for one scope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitState {
    pub count: u32,
    pub window_start: DateTime<Utc>,
    pub blocked_until: Option<DateTime<Utc>>,
}

impl RateLimitState {
    pub fn fresh(now: DateTime<Utc>) -> Self {
        Self {
            count: 0,
            window_start: now,
            blocked_until: None,
        }
    }
}

/// Task status as stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::InProgress => write!(f, "in_progress"),
            TaskStatus::Completed => write!(f, "completed"),
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" | "todo" => Ok(TaskStatus::Pending),
            "in_progress" | "in-progress" => Ok(TaskStatus::InProgress),
            "completed" | "done" => Ok(TaskStatus::Completed),
            _ => Err(format!("Invalid task status: {}", s)),
        }
    }
}

/// Task priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskPriority::Low => write!(f, "low"),
            TaskPriority::Medium => write!(f, "medium"),
            TaskPriority::High => write!(f, "high"),
        }
    }
}

impl std::str::FromStr for TaskPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(TaskPriority::Low),
            "medium" => Ok(TaskPriority::Medium),
            "high" => Ok(TaskPriority::High),
            _ => Err(format!("Invalid task priority: {}", s)),
        }
    }
}

/// Project model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub description: Option<String>,
    pub status: String,
    pub team_id: Option<TeamId>,
    pub owner_id: UserId,
    pub created_at: DateTime<Utc>,
    pub due_date: Option<DateTime<Utc>>,
}

impl Project {
    pub fn is_active(&self) -> bool {
        self.status == "active"
    }
}

/// Task model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub project_id: ProjectId,
    pub title: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    #[serde(default)]
    pub assignee_ids: Vec<UserId>,
    pub due_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Team member entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMember {
    pub user_id: UserId,
    pub name: String,
}

/// Team model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
    #[serde(default)]
    pub members: Vec<TeamMember>,
}

/// The projects, tasks and teams a report is computed over
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub teams: Vec<Team>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_status_transitions() {
        for next in InvitationStatus::ALL {
            assert_eq!(
                InvitationStatus::Pending.can_transition_to(next),
                next != InvitationStatus::Pending
            );
        }
        for from in InvitationStatus::ALL.into_iter().filter(|s| s.is_terminal()) {
            for next in InvitationStatus::ALL {
                assert!(!from.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_status_round_trips_through_display() {
        for status in InvitationStatus::ALL {
            assert_eq!(status.to_string().parse::<InvitationStatus>(), Ok(status));
        }
        assert!("open".parse::<InvitationStatus>().is_err());
    }

    #[test]
    fn test_task_status_accepts_dashed_form() {
        assert_eq!("in-progress".parse::<TaskStatus>(), Ok(TaskStatus::InProgress));
        assert_eq!("in_progress".parse::<TaskStatus>(), Ok(TaskStatus::InProgress));
    }

    #[test]
    fn test_invitation_serializes_timestamps_as_rfc3339() {
        let now = Utc::now();
        let invitation = Invitation {
            id: uuid::Uuid::new_v4(),
            sender: InvitationSender {
                id: uuid::Uuid::new_v4(),
                name: "Ana".to_string(),
                email: "ana@x.com".to_string(),
            },
            recipient_email: "bia@x.com".to_string(),
            recipient_id: None,
            target: InvitationTarget {
                kind: TargetKind::Project,
                id: uuid::Uuid::new_v4(),
                name: "Site".to_string(),
            },
            role: InvitationRole::Member,
            team_names: vec![],
            message: None,
            status: InvitationStatus::Pending,
            created_at: now,
            expires_at: now + Duration::days(7),
            accepted_at: None,
            rejected_at: None,
            cancelled_at: None,
            link_token: None,
        };

        let json = serde_json::to_value(&invitation).unwrap();
        assert_eq!(json["status"], "pending");
        assert_eq!(json["target"]["kind"], "project");
        assert!(json["expires_at"].as_str().unwrap().contains('T'));

        let back: Invitation = serde_json::from_value(json).unwrap();
        assert_eq!(back, invitation);
        assert!(!back.is_overdue(now));
        assert!(back.is_overdue(now + Duration::days(8)));
    }
}
