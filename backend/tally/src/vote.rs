//! # Votes
//!
//! Upvote/downvote membership for a single subject (question or answer).
//!
//! ## Rules
//!
//! - Voting the same direction twice retracts the vote
//! - Voting the opposite direction moves the ballot, never leaving the user in both sets
//! - Otherwise the vote is cast
//!
//! The resolver never touches storage. It hands back the new state together with the
//! [`Transition`] it applied, and the caller turns that into whatever atomic set operations
//! its store offers.
use std::{collections::BTreeSet, fmt};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteDirection {
    Up,
    Down,
}

impl VoteDirection {
    pub fn opposite(self) -> Self {
        match self {
            VoteDirection::Up => VoteDirection::Down,
            VoteDirection::Down => VoteDirection::Up,
        }
    }
}

/// What the resolver did to the ballot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Added to `0`.
    Cast(VoteDirection),
    /// Removed from `0`.
    Retract(VoteDirection),
    /// Removed from `from`, added to `to`.
    Switch {
        from: VoteDirection,
        to: VoteDirection,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteState {
    pub upvotes: BTreeSet<UserId>,
    pub downvotes: BTreeSet<UserId>,
}

impl VoteState {
    pub fn new(
        upvotes: impl IntoIterator<Item = UserId>,
        downvotes: impl IntoIterator<Item = UserId>,
    ) -> Self {
        Self {
            upvotes: upvotes.into_iter().collect(),
            downvotes: downvotes.into_iter().collect(),
        }
    }

    pub fn voters(&self, direction: VoteDirection) -> &BTreeSet<UserId> {
        match direction {
            VoteDirection::Up => &self.upvotes,
            VoteDirection::Down => &self.downvotes,
        }
    }

    fn voters_mut(&mut self, direction: VoteDirection) -> &mut BTreeSet<UserId> {
        match direction {
            VoteDirection::Up => &mut self.upvotes,
            VoteDirection::Down => &mut self.downvotes,
        }
    }

    pub fn has_voted(&self, user: &UserId, direction: VoteDirection) -> bool {
        self.voters(direction).contains(user)
    }

    /// Net score, upvotes minus downvotes.
    pub fn score(&self) -> i64 {
        self.upvotes.len() as i64 - self.downvotes.len() as i64
    }

    pub fn is_disjoint(&self) -> bool {
        self.upvotes.is_disjoint(&self.downvotes)
    }

    /// Applies a vote and returns the resulting state with the transition taken.
    pub fn resolve(mut self, user: &UserId, direction: VoteDirection) -> (Self, Transition) {
        let transition = transition_for(&self, user, direction);

        match transition {
            Transition::Retract(from) => {
                self.voters_mut(from).remove(user);
            }
            Transition::Switch { from, to } => {
                self.voters_mut(from).remove(user);
                self.voters_mut(to).insert(user.clone());
            }
            Transition::Cast(to) => {
                self.voters_mut(to).insert(user.clone());
            }
        }

        (self, transition)
    }
}

/// Picks the transition without building a new state.
pub fn transition_for(state: &VoteState, user: &UserId, direction: VoteDirection) -> Transition {
    if state.has_voted(user, direction) {
        Transition::Retract(direction)
    } else if state.has_voted(user, direction.opposite()) {
        Transition::Switch {
            from: direction.opposite(),
            to: direction,
        }
    } else {
        Transition::Cast(direction)
    }
}

pub fn resolve(state: VoteState, user: &UserId, direction: VoteDirection) -> VoteState {
    state.resolve(user, direction).0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(up: &[&str], down: &[&str]) -> VoteState {
        VoteState::new(
            up.iter().map(|u| UserId::from(*u)),
            down.iter().map(|u| UserId::from(*u)),
        )
    }

    #[test]
    fn test_cast_then_switch() {
        let u1 = UserId::from("u1");

        let upvoted = resolve(VoteState::default(), &u1, VoteDirection::Up);
        assert_eq!(upvoted, state(&["u1"], &[]));

        let downvoted = resolve(upvoted, &u1, VoteDirection::Down);
        assert_eq!(downvoted, state(&[], &["u1"]));
    }

    #[test]
    fn test_retract() {
        let u1 = UserId::from("u1");
        let (after, transition) = state(&["u1", "u2"], &[]).resolve(&u1, VoteDirection::Up);

        assert_eq!(transition, Transition::Retract(VoteDirection::Up));
        assert_eq!(after, state(&["u2"], &[]));
    }

    #[test]
    fn test_switch_reports_both_sides() {
        let u1 = UserId::from("u1");
        let (after, transition) = state(&[], &["u1"]).resolve(&u1, VoteDirection::Up);

        assert_eq!(
            transition,
            Transition::Switch {
                from: VoteDirection::Down,
                to: VoteDirection::Up
            }
        );
        assert_eq!(after, state(&["u1"], &[]));
    }

    #[test]
    fn test_other_voters_untouched() {
        let u3 = UserId::from("u3");
        let after = resolve(state(&["u1"], &["u2"]), &u3, VoteDirection::Down);

        assert_eq!(after, state(&["u1"], &["u2", "u3"]));
        assert_eq!(after.score(), -1);
    }

    #[test]
    fn test_direction_serde() {
        let direction: VoteDirection = serde_json::from_str("\"down\"").unwrap();
        assert_eq!(direction, VoteDirection::Down);
        assert_eq!(serde_json::to_string(&VoteDirection::Up).unwrap(), "\"up\"");
    }
}
