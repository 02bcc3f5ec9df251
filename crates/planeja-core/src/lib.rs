//! Planeja+ Core - Invitation lifecycle and reporting
//!
//! This crate provides the invitation manager with its send rate limiter and
//! expiry sweeper, and the reports aggregator used by the analytics screens.

pub mod invitations;
pub mod reports;

pub use invitations::{
    ExpirySweeper, InvitationManager, RateLimitDecision, RateLimiter, RemainingQuota,
};
pub use reports::{
    export_tasks_csv, export_teams_csv, DateRange, DrillDownTarget, Granularity,
    ReportAggregator, ReportData, ReportFilters, ReportPeriod, StatusFilter, TaskBucket,
};
