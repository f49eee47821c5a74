//! The world the agent acts in: one scoring engine plus the user of the
//! current episode. The agent only sees rankings and the user's signals.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use rand::Rng;
use rand::rngs::SmallRng;
use rand::seq::index::sample;
use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::corpus::{Corpus, DataError, Dataset, DocId, SimKeywords};
use crate::query::Query;
use crate::retrieval::{RankingList, RetrievalConfig, RetrievalEngine};
use crate::user::{Like, SimulatedUser};

/// Distributions users are drawn from.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct UserConfig {
    /// Upper bound of the uniform per-user query count.
    pub max_queries: usize,
    pub patience_mean: f64,
    pub patience_std: f64,
    pub patience_min: u32,
    pub ap_threshold_mean: f64,
    pub ap_threshold_std: f64,
    pub ap_threshold_min: f64,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            max_queries: 5,
            patience_mean: 5.0,
            patience_std: 2.0,
            patience_min: 1,
            ap_threshold_mean: 0.7,
            ap_threshold_std: 0.1,
            ap_threshold_min: 0.1,
        }
    }
}

/// Result of one [`Environment::act`] call.
#[derive(Clone, Debug, PartialEq)]
pub struct Step {
    /// Re-ranked list, present only when the user accepted a feedback item.
    pub observation: Option<RankingList>,
    pub like: Like,
    pub terminal: bool,
    pub feedback_position: Option<usize>,
}

pub struct Environment {
    engine: RetrievalEngine,
    queries: Vec<Query>,
    answers: HashMap<String, HashSet<DocId>>,
    sim_keywords: Arc<SimKeywords>,
    config: UserConfig,
    user: Option<SimulatedUser>,
    rng: SmallRng,
}

impl Environment {
    pub fn new(
        corpus: Arc<Corpus>,
        dataset: Dataset,
        retrieval: RetrievalConfig,
        config: UserConfig,
        rng: SmallRng,
    ) -> Result<Self, DataError> {
        dataset.validate()?;
        let Dataset {
            queries,
            answers,
            sim_keywords,
        } = dataset;
        Ok(Self {
            engine: RetrievalEngine::new(corpus, retrieval),
            queries,
            answers,
            sim_keywords: Arc::new(sim_keywords),
            config,
            user: None,
            rng,
        })
    }

    pub fn actions(&self) -> &'static [Action] {
        &Action::ALL
    }

    pub fn engine(&self) -> &RetrievalEngine {
        &self.engine
    }

    /// The user of the running episode, if one has started.
    pub fn user(&self) -> Option<&SimulatedUser> {
        self.user.as_ref()
    }

    /// Start an episode with a freshly sampled user, issuing their first query.
    pub fn new_scenario(&mut self) -> (RankingList, &SimulatedUser) {
        let user = self.sample_user();
        tracing::debug!(
            queries = user.queries().len(),
            patience = user.patience(),
            ap_threshold = user.ap_threshold(),
            "new scenario"
        );
        let observation = self.engine.query(user.current_query());
        let user = self.user.insert(user);
        (observation, user)
    }

    /// Start an episode with a given user instead of a sampled one.
    pub fn new_scenario_with(&mut self, user: SimulatedUser) -> RankingList {
        let observation = self.engine.query(user.current_query());
        self.user = Some(user);
        observation
    }

    /// Offer the action's payload to the user and fold in whatever they accept.
    ///
    /// # Panics
    /// If no scenario is running.
    pub fn act(&mut self, action: Action) -> Step {
        let Some(user) = self.user.as_mut() else {
            panic!("act called before new_scenario");
        };
        let payload = self.engine.feedback_request(action);
        let reaction = user.react(self.engine.ranking(), &payload);

        let observation = reaction
            .feedback_position
            .and_then(|pos| payload.item(pos))
            .map(|item| self.engine.apply_feedback(&item));

        Step {
            observation,
            like: reaction.like,
            terminal: reaction.terminal,
            feedback_position: reaction.feedback_position,
        }
    }

    /// Advance the user to their next query and issue it.
    ///
    /// # Panics
    /// If no scenario is running or the user has no queries left.
    pub fn next_query(&mut self) -> RankingList {
        let Some(user) = self.user.as_mut() else {
            panic!("next_query called before new_scenario");
        };
        user.next_query();
        self.engine.query(user.current_query())
    }

    fn sample_user(&mut self) -> SimulatedUser {
        let max = self.config.max_queries.clamp(1, self.queries.len());
        let count = self.rng.random_range(1..=max);
        let picked: Vec<Query> = sample(&mut self.rng, self.queries.len(), count)
            .into_iter()
            .map(|i| self.queries[i].clone())
            .collect();
        let answers = picked
            .iter()
            .map(|q| {
                let id = q.identity();
                let ans = self.answers.get(&id).cloned().unwrap_or_default();
                (id, ans)
            })
            .collect();
        let patience = self.sample_patience();
        let ap_threshold = self.sample_ap_threshold();
        SimulatedUser::new(
            picked,
            answers,
            Arc::clone(&self.sim_keywords),
            patience,
            ap_threshold,
        )
    }

    fn sample_patience(&mut self) -> u32 {
        let draw = (self.config.patience_mean
            + self.config.patience_std * gauss_random(&mut self.rng))
        .ceil();
        if draw >= self.config.patience_min as f64 {
            draw as u32
        } else {
            self.config.patience_min
        }
    }

    fn sample_ap_threshold(&mut self) -> f64 {
        let draw = self.config.ap_threshold_mean
            + self.config.ap_threshold_std * gauss_random(&mut self.rng);
        if draw > self.config.ap_threshold_min {
            draw
        } else {
            self.config.ap_threshold_min
        }
    }
}

/// Box-Muller transform for generating Gaussian-distributed random numbers.
fn gauss_random(rng: &mut impl Rng) -> f64 {
    // Clamp u1 away from 0 to avoid ln(0) = -inf
    let u1: f64 = rng.random::<f64>().max(f64::MIN_POSITIVE);
    let u2: f64 = rng.random();
    (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{DOCS, corpus, dataset};
    use rand::SeedableRng;

    fn rng() -> SmallRng {
        SmallRng::seed_from_u64(42)
    }

    fn env(config: UserConfig) -> Environment {
        let ds = dataset(&[
            ("apple", &["d1", "d5"], &["banana"]),
            ("cherry", &["d2", "d3"], &["date"]),
            ("melon", &["d4", "d5"], &["grape"]),
        ]);
        Environment::new(
            Arc::new(corpus(DOCS)),
            ds,
            RetrievalConfig::default(),
            config,
            rng(),
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_invalid_dataset() {
        let result = Environment::new(
            Arc::new(corpus(DOCS)),
            Dataset::default(),
            RetrievalConfig::default(),
            UserConfig::default(),
            rng(),
        );
        assert!(matches!(result, Err(DataError::EmptyQueryList)));
    }

    #[test]
    fn test_actions() {
        let e = env(UserConfig::default());
        assert_eq!(e.actions(), &[Action::ReturnByDoc, Action::ReturnByKeyterm]);
    }

    #[test]
    fn test_sampled_users_respect_bounds() {
        let config = UserConfig {
            max_queries: 10,
            patience_mean: 0.0,
            patience_std: 3.0,
            patience_min: 2,
            ap_threshold_mean: 0.0,
            ap_threshold_std: 0.5,
            ap_threshold_min: 0.2,
        };
        let mut e = env(config);
        for _ in 0..200 {
            let (_, user) = e.new_scenario();
            let n = user.queries().len();
            assert!((1..=3).contains(&n), "query count {n} out of range");
            let unique: HashSet<String> = user.queries().iter().map(|q| q.identity()).collect();
            assert_eq!(unique.len(), n, "queries sampled with replacement");
            assert!(user.patience() >= 2);
            assert!(user.ap_threshold() >= 0.2);
        }
    }

    #[test]
    fn test_new_scenario_issues_first_query() {
        let mut e = env(UserConfig::default());
        let (observation, user) = e.new_scenario();
        let first = user.current_query().clone();
        assert_eq!(e.engine().current_query(), &first);
        assert_eq!(observation.as_slice(), e.engine().ranking());
    }

    #[test]
    fn test_accepted_feedback_returns_observation() {
        let mut e = env(UserConfig::default());
        let user = SimulatedUser::new(
            vec![Query::parse("apple"), Query::parse("cherry")],
            HashMap::from([
                ("apple".to_string(), HashSet::from(["d3".to_string()])),
                ("cherry".to_string(), HashSet::from(["d2".to_string()])),
            ]),
            Arc::new(SimKeywords::default()),
            5,
            0.99,
        );
        e.new_scenario_with(user);
        let step = e.act(Action::ReturnByDoc);
        assert_eq!(step.like, Like::Neutral);
        assert!(!step.terminal);
        let pos = step.feedback_position.expect("d3 is in the ranking");
        let observation = step.observation.expect("accepted feedback re-ranks");
        assert!(!observation.is_empty());
        assert!(pos < observation.len());
    }

    #[test]
    fn test_next_query_advances_and_requeries() {
        let mut e = env(UserConfig::default());
        let user = SimulatedUser::new(
            vec![Query::parse("apple"), Query::parse("melon")],
            HashMap::new(),
            Arc::new(SimKeywords::default()),
            5,
            0.5,
        );
        e.new_scenario_with(user);
        e.next_query();
        assert_eq!(e.engine().current_query(), &Query::parse("melon"));
        assert_eq!(
            e.user().map(|u| u.current_query().identity()),
            Some("melon".into())
        );
    }

    #[test]
    #[should_panic(expected = "before new_scenario")]
    fn test_act_without_scenario_panics() {
        let mut e = env(UserConfig::default());
        e.act(Action::ReturnByDoc);
    }

    #[test]
    fn test_gauss_moments() {
        let mut r = rng();
        let n = 20_000;
        let draws: Vec<f64> = (0..n).map(|_| gauss_random(&mut r)).collect();
        let mean = draws.iter().sum::<f64>() / n as f64;
        let var = draws.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n as f64;
        assert!(mean.abs() < 0.05, "mean {mean}");
        assert!((var - 1.0).abs() < 0.05, "variance {var}");
    }
}
