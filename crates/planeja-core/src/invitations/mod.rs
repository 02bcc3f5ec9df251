//! Invitation Module - Invitation lifecycle, send rate limiting and expiry

mod manager;
mod rate_limiter;
mod sweeper;

pub use manager::{resolve_status, InvitationBox, InvitationManager};
pub use rate_limiter::{RateLimitDecision, RateLimiter, RemainingQuota};
pub use sweeper::ExpirySweeper;
