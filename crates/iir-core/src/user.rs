//! Scripted user with a patience budget and an average-precision bar.
//!
//! Each reaction costs the user patience unless the ranking already clears
//! their threshold. When anger exceeds patience the session ends badly.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::corpus::{DocId, SimKeywords};
use crate::query::Query;
use crate::retrieval::{FeedbackPayload, Keyterm, Ranked};

/// The user's verdict on the current result.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Like {
    Positive,
    Negative,
    Neutral,
}

impl Like {
    pub fn value(&self) -> f64 {
        match self {
            Self::Positive => 1.0,
            Self::Negative => -1.0,
            Self::Neutral => 0.0,
        }
    }
}

/// Outcome of one [`SimulatedUser::react`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Reaction {
    /// Position of the item the user points at in the offered payload.
    pub feedback_position: Option<usize>,
    pub like: Like,
    pub terminal: bool,
}

/// End-of-episode statistics.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UserStats {
    pub completed_queries: usize,
    pub total_queries: usize,
    pub completion_ratio: f64,
    pub anger_ratio: f64,
}

impl UserStats {
    pub fn all_completed(&self) -> bool {
        self.completed_queries == self.total_queries
    }
}

pub struct SimulatedUser {
    queries: Vec<Query>,
    answers: HashMap<String, HashSet<DocId>>,
    sim_keywords: Arc<SimKeywords>,
    patience: u32,
    ap_threshold: f64,
    anger: u32,
    completed: usize,
    current: usize,
}

impl SimulatedUser {
    /// `queries` must be non-empty; `answers` is keyed by query identity.
    pub fn new(
        queries: Vec<Query>,
        answers: HashMap<String, HashSet<DocId>>,
        sim_keywords: Arc<SimKeywords>,
        patience: u32,
        ap_threshold: f64,
    ) -> Self {
        assert!(!queries.is_empty(), "a simulated user needs at least one query");
        Self {
            queries,
            answers,
            sim_keywords,
            patience,
            ap_threshold,
            anger: 0,
            completed: 0,
            current: 0,
        }
    }

    pub fn current_query(&self) -> &Query {
        &self.queries[self.current]
    }

    pub fn queries(&self) -> &[Query] {
        &self.queries
    }

    pub fn patience(&self) -> u32 {
        self.patience
    }

    pub fn ap_threshold(&self) -> f64 {
        self.ap_threshold
    }

    pub fn anger(&self) -> u32 {
        self.anger
    }

    pub fn completed_queries(&self) -> usize {
        self.completed
    }

    fn on_last_query(&self) -> bool {
        self.current + 1 >= self.queries.len()
    }

    fn current_answers(&self) -> Option<&HashSet<DocId>> {
        self.answers.get(&self.current_query().identity())
    }

    /// Average precision of `ranking` against the current query's answers.
    pub fn average_precision(&self, ranking: &[Ranked]) -> f64 {
        match self.current_answers() {
            Some(answers) => average_precision(ranking, answers),
            None => 0.0,
        }
    }

    /// Move on to the next assigned query.
    ///
    /// # Panics
    /// If the current query is already the last one.
    pub fn next_query(&mut self) {
        assert!(
            !self.on_last_query(),
            "next_query called past the last assigned query"
        );
        self.current += 1;
    }

    /// Judge `ranking`, then, unless satisfied or out of patience, look for a
    /// relevant item in `payload`.
    pub fn react(&mut self, ranking: &[Ranked], payload: &FeedbackPayload) -> Reaction {
        let mut like = Like::Neutral;
        let mut terminal = false;
        let mut feedback_position = None;

        let ap = self.average_precision(ranking);
        if ap >= self.ap_threshold {
            like = Like::Positive;
            self.completed += 1;
            terminal = self.on_last_query();
        } else {
            self.anger += 1;
            if self.anger > self.patience {
                like = Like::Negative;
                terminal = true;
            }
        }

        if !terminal && like != Like::Positive {
            feedback_position = match payload {
                FeedbackPayload::Documents(docs) => self.pick_document(docs),
                FeedbackPayload::Keyterms(terms) => self.pick_keyterm(terms),
            };
            if feedback_position.is_none() && self.on_last_query() {
                terminal = true;
            }
        }

        tracing::debug!(
            ap,
            threshold = self.ap_threshold,
            anger = self.anger,
            ?like,
            terminal,
            ?feedback_position,
            "user reacted"
        );

        Reaction {
            feedback_position,
            like,
            terminal,
        }
    }

    /// First offered document that answers the current query.
    fn pick_document(&self, docs: &[Ranked]) -> Option<usize> {
        let answers = self.current_answers()?;
        docs.iter().position(|r| answers.contains(&r.doc_id))
    }

    /// First offered key term the user associates with the current query.
    fn pick_keyterm(&self, terms: &[Keyterm]) -> Option<usize> {
        let id = self.current_query().identity();
        terms
            .iter()
            .position(|k| self.sim_keywords.contains(&id, &k.term))
    }

    pub fn stats(&self) -> UserStats {
        let total = self.queries.len();
        let anger_ratio = if self.patience == 0 {
            self.anger as f64
        } else {
            self.anger as f64 / self.patience as f64
        };
        UserStats {
            completed_queries: self.completed,
            total_queries: total,
            completion_ratio: self.completed as f64 / total as f64,
            anger_ratio,
        }
    }
}

impl fmt::Display for SimulatedUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let queries: Vec<String> = self.queries.iter().map(|q| q.to_string()).collect();
        writeln!(f, "query list: [{}]", queries.join(", "))?;
        writeln!(f, "current query: {}", self.current_query())?;
        writeln!(f, "patience: {}", self.patience)?;
        writeln!(f, "ap threshold: {:.3}", self.ap_threshold)?;
        write!(f, "anger: {}", self.anger)
    }
}

/// `Σ (hits so far / rank) / |answers|` over the ranks holding a relevant
/// document. Zero for an empty answer set.
pub fn average_precision(ranking: &[Ranked], answers: &HashSet<DocId>) -> f64 {
    if answers.is_empty() {
        return 0.0;
    }
    let mut hits = 0usize;
    let mut ap = 0.0;
    for (i, r) in ranking.iter().enumerate() {
        if answers.contains(&r.doc_id) {
            hits += 1;
            ap += hits as f64 / (i + 1) as f64;
        }
    }
    ap / answers.len() as f64
}
