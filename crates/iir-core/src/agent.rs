//! Episode driver: turns observations into states, asks the policy for an
//! action, records transitions and triggers batch updates.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::buffer::BoundedBuffer;
use crate::constants::RESULT_FEATURES;
use crate::environment::Environment;
use crate::policy::{LinearPolicy, Transition};
use crate::retrieval::RankingList;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Steps kept in the history window.
    pub history_len: usize,
    /// Capacity of the training pool.
    pub train_pool_size: usize,
    /// New transitions collected before a batch update.
    pub update_every: usize,
    /// Feedback positions beyond this earn a negative reward.
    pub allowed_feedback_pos: usize,
    pub feedback_weight: f64,
    pub like_weight: f64,
    /// Exploration rate while training.
    pub epsilon: f64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            history_len: 5,
            train_pool_size: 64,
            update_every: 64,
            allowed_feedback_pos: 5,
            feedback_weight: 1.0,
            like_weight: 1.0,
            epsilon: 0.01,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Explore and update the policy.
    Train,
    /// Act greedily with frozen weights.
    Test,
}

/// One step of the history window.
#[derive(Clone, Debug, PartialEq)]
pub struct HistoryEntry {
    /// Action that produced the observation; `None` right after a query.
    pub action: Option<Action>,
    /// Weighted feedback signal that came with the observation.
    pub signal: f64,
    pub observation: RankingList,
}

/// Maps the history window to a fixed-length state vector.
pub trait StateEncoder {
    fn dim(&self) -> usize;
    fn encode(&self, history: &BoundedBuffer<HistoryEntry>) -> Vec<f64>;
}

/// One-hot of the last action followed by the top result scores of the last
/// observation, zero-padded.
#[derive(Clone, Debug)]
pub struct TopScoreEncoder {
    pub num_actions: usize,
    pub num_results: usize,
}

impl Default for TopScoreEncoder {
    fn default() -> Self {
        Self {
            num_actions: Action::ALL.len(),
            num_results: RESULT_FEATURES,
        }
    }
}

impl StateEncoder for TopScoreEncoder {
    fn dim(&self) -> usize {
        self.num_actions + self.num_results
    }

    fn encode(&self, history: &BoundedBuffer<HistoryEntry>) -> Vec<f64> {
        let mut features = vec![0.0; self.dim()];
        let Some(last) = history.last() else {
            return features;
        };
        if let Some(action) = last.action {
            features[action.id()] = 1.0;
        }
        for (slot, r) in features[self.num_actions..]
            .iter_mut()
            .zip(&last.observation)
        {
            *slot = r.score;
        }
        features
    }
}

/// Aggregates over a run of episodes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PlayStats {
    pub episodes: usize,
    pub avg_reward: f64,
    /// Completed queries over assigned queries, pooled across episodes.
    pub avg_completed: f64,
    pub avg_anger: f64,
    /// Episodes where every assigned query was completed.
    pub fully_completed: usize,
    pub batch_updates: usize,
}

impl PlayStats {
    pub fn fully_completed_ratio(&self) -> f64 {
        if self.episodes == 0 {
            0.0
        } else {
            self.fully_completed as f64 / self.episodes as f64
        }
    }
}

pub struct Agent<E: StateEncoder = TopScoreEncoder> {
    env: Environment,
    policy: LinearPolicy,
    encoder: E,
    config: AgentConfig,
    history: BoundedBuffer<HistoryEntry>,
    pool: BoundedBuffer<Transition>,
    collected: usize,
}

impl Agent<TopScoreEncoder> {
    /// Agent with the default encoder and a randomly initialised policy.
    pub fn new(env: Environment, config: AgentConfig, rng: &mut impl Rng) -> Self {
        let encoder = TopScoreEncoder {
            num_actions: env.actions().len(),
            ..TopScoreEncoder::default()
        };
        let policy = LinearPolicy::new(env.actions().len(), encoder.dim(), rng);
        Self::with_parts(env, policy, encoder, config)
    }
}

impl<E: StateEncoder> Agent<E> {
    pub fn with_parts(
        env: Environment,
        policy: LinearPolicy,
        encoder: E,
        config: AgentConfig,
    ) -> Self {
        Self {
            history: BoundedBuffer::new(config.history_len),
            pool: BoundedBuffer::new(config.train_pool_size),
            env,
            policy,
            encoder,
            config,
            collected: 0,
        }
    }

    pub fn policy(&self) -> &LinearPolicy {
        &self.policy
    }

    /// Swap in a trained policy, e.g. one loaded from disk.
    pub fn set_policy(&mut self, policy: LinearPolicy) {
        self.policy = policy;
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    pub fn history(&self) -> &BoundedBuffer<HistoryEntry> {
        &self.history
    }

    pub fn training_pool(&self) -> &BoundedBuffer<Transition> {
        &self.pool
    }

    fn state(&self) -> Vec<f64> {
        self.encoder.encode(&self.history)
    }

    fn record(&mut self, transition: Transition) {
        self.pool.push(transition);
        self.collected += 1;
    }

    /// Run one episode, returning its accumulated reward.
    pub fn run_episode(&mut self, mode: Mode, rng: &mut impl Rng) -> f64 {
        let (observation, _) = self.env.new_scenario();
        self.history.push(HistoryEntry {
            action: None,
            signal: 0.0,
            observation,
        });
        let mut state = self.state();
        let mut episode_reward = 0.0;
        let epsilon = match mode {
            Mode::Train => self.config.epsilon,
            Mode::Test => 0.0,
        };
        let actions = self.env.actions();

        loop {
            let action_id = self.policy.select(&state, epsilon, rng);
            let action = actions[action_id];
            let step = self.env.act(action);
            tracing::trace!(%action, like = ?step.like, "agent acted");

            match (step.observation, step.feedback_position) {
                (Some(observation), Some(position)) => {
                    let reward = self.config.feedback_weight
                        * (self.config.allowed_feedback_pos as f64 - position as f64);
                    self.history.push(HistoryEntry {
                        action: Some(action),
                        signal: reward,
                        observation,
                    });
                    let next_state = self.state();
                    self.record(Transition {
                        state,
                        action: action_id,
                        next_state: Some(next_state.clone()),
                        reward,
                    });
                    episode_reward += reward;
                    state = next_state;
                }
                _ => {
                    let reward = self.config.like_weight * step.like.value();
                    self.record(Transition {
                        state,
                        action: action_id,
                        next_state: None,
                        reward,
                    });
                    episode_reward += reward;
                    if step.terminal {
                        break;
                    }
                    let observation = self.env.next_query();
                    self.history.push(HistoryEntry {
                        action: None,
                        signal: 0.0,
                        observation,
                    });
                    state = self.state();
                }
            }
        }
        episode_reward
    }

    /// Run `episodes` episodes and aggregate user statistics.
    pub fn play(&mut self, episodes: usize, mode: Mode, rng: &mut impl Rng) -> PlayStats {
        let mut stats = PlayStats {
            episodes,
            ..PlayStats::default()
        };
        let mut total_reward = 0.0;
        let mut completed = 0usize;
        let mut assigned = 0usize;
        let mut anger = 0.0;

        for episode in 0..episodes {
            let reward = self.run_episode(mode, rng);

            if mode == Mode::Train && self.collected >= self.config.update_every {
                self.policy.batch_update(self.pool.iter());
                self.collected = 0;
                stats.batch_updates += 1;
                tracing::info!(episode, pool = self.pool.len(), "policy batch update");
            }

            if let Some(user) = self.env.user() {
                let user_stats = user.stats();
                completed += user_stats.completed_queries;
                assigned += user_stats.total_queries;
                anger += user_stats.anger_ratio;
                if user_stats.all_completed() {
                    stats.fully_completed += 1;
                }
                tracing::debug!(episode, reward, ?user_stats, "episode finished");
            }
            total_reward += reward;

            if (episode + 1) % 100 == 0 {
                tracing::info!(episode = episode + 1, of = episodes, "episodes played");
            }
        }

        if episodes > 0 {
            stats.avg_reward = total_reward / episodes as f64;
            stats.avg_anger = anger / episodes as f64;
        }
        if assigned > 0 {
            stats.avg_completed = completed as f64 / assigned as f64;
        }
        stats
    }
}
