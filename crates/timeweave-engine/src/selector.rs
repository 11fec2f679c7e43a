//! CPU move-selection contract.
//!
//! Selectors only see candidate lists; they never touch timelines directly.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use timeweave_types::{
    game::{GameState, Move},
    Result, TimelineId,
};
use tracing::{debug, info};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionContext {
    pub timeline: TimelineId,
    pub state: GameState,
    pub candidates: Vec<Move>,
}

#[async_trait]
pub trait MoveSelector: Send + Sync {
    async fn warm_up(&mut self) -> Result<()>;
    async fn select(&self, ctx: &SelectionContext) -> Result<Option<Move>>;
}

/// Picks the first candidate in generation order.
#[derive(Debug, Default)]
pub struct FirstLegalSelector;

impl FirstLegalSelector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MoveSelector for FirstLegalSelector {
    async fn warm_up(&mut self) -> Result<()> {
        info!("First-legal selector ready");
        Ok(())
    }

    async fn select(&self, ctx: &SelectionContext) -> Result<Option<Move>> {
        debug!(
            "Selecting among {} candidates on timeline {} for {}",
            ctx.candidates.len(),
            ctx.timeline,
            ctx.state.side_to_move
        );
        Ok(ctx.candidates.first().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::movegen::legal_moves;

    #[tokio::test]
    async fn first_legal_picks_head_of_list() {
        let state = GameState::initial();
        let candidates = legal_moves(&state);
        let expected = candidates[0].clone();
        let mut selector = FirstLegalSelector::new();
        selector.warm_up().await.expect("warm up");
        let ctx = SelectionContext {
            timeline: 0,
            state,
            candidates,
        };
        let picked = selector.select(&ctx).await.expect("select");
        assert_eq!(picked, Some(expected));
    }

    #[tokio::test]
    async fn empty_candidates_yield_none() {
        let selector = FirstLegalSelector::new();
        let ctx = SelectionContext {
            timeline: 4,
            state: GameState::initial(),
            candidates: Vec::new(),
        };
        assert_eq!(selector.select(&ctx).await.expect("select"), None);
    }
}
