//! Linear action-value policy trained by fitted-value iteration.
//!
//! Each action owns a weight vector over the bias-augmented state. A batch
//! update regresses every action's weights onto bootstrapped targets in one
//! least-squares solve per action.

use rand::Rng;
use serde::de::Error as _;
use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::corpus::DataError;
use crate::linalg::{dot, least_squares};

/// Snapshot format version. Increment when the layout changes.
pub const SNAPSHOT_VERSION: u32 = 1;

/// One recorded step: `next_state = None` marks a terminal transition.
#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    pub state: Vec<f64>,
    pub action: usize,
    pub next_state: Option<Vec<f64>>,
    pub reward: f64,
}

/// Serialized form of a trained policy.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PolicySnapshot {
    pub version: u32,
    pub actions: Vec<Action>,
    pub state_dim: usize,
    /// One row per action, `state_dim + 1` entries each (bias last).
    pub weights: Vec<Vec<f64>>,
}

#[derive(Clone, Debug)]
pub struct LinearPolicy {
    num_actions: usize,
    state_dim: usize,
    weights: Vec<Vec<f64>>,
}

impl LinearPolicy {
    /// Weights start uniform in `[0, 1)`.
    pub fn new(num_actions: usize, state_dim: usize, rng: &mut impl Rng) -> Self {
        let weights = (0..num_actions)
            .map(|_| (0..=state_dim).map(|_| rng.random::<f64>()).collect())
            .collect();
        Self {
            num_actions,
            state_dim,
            weights,
        }
    }

    pub fn from_weights(weights: Vec<Vec<f64>>) -> Result<Self, DataError> {
        let num_actions = weights.len();
        let cols = weights.first().map_or(1, Vec::len);
        if let Some(bad) = weights.iter().find(|w| w.len() != cols) {
            return Err(DataError::DimensionMismatch {
                expected: cols,
                found: bad.len(),
            });
        }
        if cols == 0 {
            return Err(DataError::DimensionMismatch {
                expected: 1,
                found: 0,
            });
        }
        Ok(Self {
            num_actions,
            state_dim: cols - 1,
            weights,
        })
    }

    pub fn num_actions(&self) -> usize {
        self.num_actions
    }

    pub fn state_dim(&self) -> usize {
        self.state_dim
    }

    pub fn weights(&self) -> &[Vec<f64>] {
        &self.weights
    }

    /// `w_action · [state, 1]`
    pub fn q_value(&self, state: &[f64], action: usize) -> f64 {
        let w = &self.weights[action];
        dot(&w[..self.state_dim], state) + w[self.state_dim]
    }

    pub fn max_q(&self, state: &[f64]) -> f64 {
        (0..self.num_actions)
            .map(|a| self.q_value(state, a))
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Highest-valued action; the lowest id wins ties.
    pub fn best_action(&self, state: &[f64]) -> usize {
        let mut best = 0;
        let mut best_q = f64::NEG_INFINITY;
        for a in 0..self.num_actions {
            let q = self.q_value(state, a);
            if q > best_q {
                best = a;
                best_q = q;
            }
        }
        best
    }

    /// Epsilon-greedy action choice.
    pub fn select(&self, state: &[f64], epsilon: f64, rng: &mut impl Rng) -> usize {
        if epsilon > 0.0 && rng.random::<f64>() < epsilon {
            rng.random_range(0..self.num_actions)
        } else {
            self.best_action(state)
        }
    }

    /// Refit every action that has transitions in `batch`.
    ///
    /// Targets bootstrap from the weights as they were before this call.
    /// Actions absent from the batch keep their weights.
    pub fn batch_update<'a>(&mut self, batch: impl IntoIterator<Item = &'a Transition>) {
        let cols = self.state_dim + 1;
        let mut designs: Vec<Vec<Vec<f64>>> = vec![Vec::new(); self.num_actions];
        let mut targets: Vec<Vec<f64>> = vec![Vec::new(); self.num_actions];

        for t in batch {
            if t.action >= self.num_actions {
                tracing::warn!(action = t.action, "transition for unknown action skipped");
                continue;
            }
            let mut row = t.state.clone();
            row.resize(self.state_dim, 0.0);
            row.push(1.0);
            designs[t.action].push(row);
            let target = match &t.next_state {
                None => t.reward,
                Some(next) => t.reward + self.max_q(next),
            };
            targets[t.action].push(target);
        }

        for (action, (x, y)) in designs.iter().zip(&targets).enumerate() {
            if x.is_empty() {
                continue;
            }
            self.weights[action] = least_squares(x, y, cols);
            tracing::debug!(action, rows = x.len(), "action weights refit");
        }
    }

    pub fn snapshot(&self) -> PolicySnapshot {
        PolicySnapshot {
            version: SNAPSHOT_VERSION,
            actions: Action::ALL[..self.num_actions.min(Action::ALL.len())].to_vec(),
            state_dim: self.state_dim,
            weights: self.weights.clone(),
        }
    }

    /// Rebuild a policy, checking the weights agree with the declared shape.
    pub fn from_snapshot(snapshot: PolicySnapshot) -> Result<Self, DataError> {
        if snapshot.weights.len() != snapshot.actions.len() {
            return Err(DataError::DimensionMismatch {
                expected: snapshot.actions.len(),
                found: snapshot.weights.len(),
            });
        }
        for w in &snapshot.weights {
            if w.len() != snapshot.state_dim + 1 {
                return Err(DataError::DimensionMismatch {
                    expected: snapshot.state_dim + 1,
                    found: w.len(),
                });
            }
        }
        Ok(Self {
            num_actions: snapshot.actions.len(),
            state_dim: snapshot.state_dim,
            weights: snapshot.weights,
        })
    }
}

pub fn export_json(policy: &LinearPolicy) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&policy.snapshot())
}

/// Parse a snapshot, rejecting unknown versions and inconsistent shapes.
pub fn import_json(json: &str) -> serde_json::Result<LinearPolicy> {
    let snapshot: PolicySnapshot = serde_json::from_str(json)?;
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(serde_json::Error::custom(format!(
            "unsupported snapshot version {} (expected {SNAPSHOT_VERSION})",
            snapshot.version
        )));
    }
    LinearPolicy::from_snapshot(snapshot).map_err(serde_json::Error::custom)
}
