//! # Tally
//!
//! Pure vote and badge logic shared by the server.
//!
//! Nothing in here touches storage or the network. Every function takes the current values
//! and hands back new ones, so it is safe to call from any number of request tasks at once.
pub mod badges;
pub mod vote;

pub use badges::{
    ActivityCriterion, BadgeCounts, BadgeError, BadgePolicy, BadgeThresholds, CriterionKind,
    Tier, count_badges, default_thresholds,
};
pub use vote::{Transition, UserId, VoteDirection, VoteState, resolve, transition_for};
