//! Reaction/recommendation API seam.
//!
//! The deck asks the gateway for candidate charity IDs and reports swipes back
//! to it. Reactions are fire-and-forget from the user's point of view.

mod http;

pub use http::*;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::AppResult;

/// A user's reaction to a charity card.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Reaction {
    Like,
    Dislike,
    /// Commit to donate; `amount` may be zero for a pledge of intent
    Pledge { amount: f64 },
}

impl Reaction {
    /// Wire code understood by the reaction endpoint.
    pub fn code(&self) -> u8 {
        match self {
            Reaction::Like => 0,
            Reaction::Dislike => 1,
            Reaction::Pledge { .. } => 3,
        }
    }

    pub fn amount(&self) -> f64 {
        match self {
            Reaction::Pledge { amount } => *amount,
            _ => 0.0,
        }
    }
}

/// Direction of a swipe gesture on the top card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwipeDirection {
    Left,
    Right,
    Up,
    /// Save to the user's list; reported to the recommender like a dislike
    Down,
}

impl SwipeDirection {
    pub fn reaction(&self) -> Reaction {
        match self {
            SwipeDirection::Right => Reaction::Like,
            SwipeDirection::Left | SwipeDirection::Down => Reaction::Dislike,
            SwipeDirection::Up => Reaction::Pledge { amount: 0.0 },
        }
    }

    /// Whether the swipe adds the charity to the user's saved list.
    pub fn saves(&self) -> bool {
        matches!(self, SwipeDirection::Down)
    }
}

/// A reaction to submit for a user.
#[derive(Debug, Clone, PartialEq)]
pub struct ReactionEvent {
    pub user_id: String,
    pub charity_id: String,
    pub reaction: Reaction,
}

/// Recommendation API used to choose and report on deck candidates.
#[async_trait]
pub trait RecommendationGateway: Send + Sync {
    /// Up to `n` candidate charity IDs for `user_id`, in recommendation order.
    async fn next_n(&self, user_id: &str, n: usize) -> AppResult<Vec<String>>;

    async fn submit_reaction(&self, event: &ReactionEvent) -> AppResult<()>;

    /// Register the user as online with the recommender.
    async fn log_on(&self, _user_id: &str) -> AppResult<()> {
        Ok(())
    }

    /// Persist and drop the user's recommender state.
    async fn log_off(&self, _user_id: &str) -> AppResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reaction_codes() {
        assert_eq!(Reaction::Like.code(), 0);
        assert_eq!(Reaction::Dislike.code(), 1);
        assert_eq!(Reaction::Pledge { amount: 12.5 }.code(), 3);
        assert_eq!(Reaction::Pledge { amount: 12.5 }.amount(), 12.5);
        assert_eq!(Reaction::Like.amount(), 0.0);
    }

    #[test]
    fn test_swipe_mapping() {
        assert_eq!(SwipeDirection::Right.reaction(), Reaction::Like);
        assert_eq!(SwipeDirection::Left.reaction(), Reaction::Dislike);
        assert_eq!(SwipeDirection::Down.reaction(), Reaction::Dislike);
        assert_eq!(
            SwipeDirection::Up.reaction(),
            Reaction::Pledge { amount: 0.0 }
        );
        assert!(SwipeDirection::Down.saves());
        assert!(!SwipeDirection::Left.saves());
    }
}
