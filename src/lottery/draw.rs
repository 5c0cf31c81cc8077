use super::registry::Registrant;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;

/// Outcome of a closed window. `winner` is `None` when nobody registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DrawResult {
    pub winner: Option<Registrant>,
    pub total_participants: usize,
    pub drawn_at: DateTime<Utc>,
}

impl DrawResult {
    pub fn cancelled(&self) -> bool {
        self.winner.is_none()
    }
}

/// Uniform selection over a registry snapshot.
#[derive(Debug, Clone)]
pub struct Drawer {
    rng: StdRng,
}

impl Drawer {
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn new(seed: Option<u64>) -> Self {
        seed.map_or_else(Self::from_entropy, Self::seeded)
    }

    pub fn select(&mut self, snapshot: &[Registrant], at: DateTime<Utc>) -> DrawResult {
        let winner = snapshot.choose(&mut self.rng).cloned();
        match &winner {
            Some(w) => tracing::info!(
                winner = %w.username,
                participants = snapshot.len(),
                "lottery winner drawn"
            ),
            None => tracing::warn!("lottery cancelled: no participants registered"),
        }
        DrawResult {
            winner,
            total_participants: snapshot.len(),
            drawn_at: at,
        }
    }
}
