//! Interactive retrieval simulation engine.
//!
//! A Dirichlet-smoothed character/bi-character language model ranks
//! documents for a query. Simulated users judge rankings by average
//! precision, accept or reject feedback items, and lose patience. An agent
//! learns, by fitted-value iteration over a linear action-value function,
//! which kind of feedback to request.
//!
//! Zero I/O: tables arrive already parsed; loading lives in `iir-store`.

pub mod action;
pub mod agent;
pub mod buffer;
pub mod constants;
pub mod corpus;
pub mod environment;
pub mod linalg;
pub mod policy;
pub mod query;
pub mod retrieval;
pub mod user;

#[cfg(test)]
mod fixtures;

pub use action::Action;
pub use agent::{Agent, AgentConfig, HistoryEntry, Mode, PlayStats, StateEncoder, TopScoreEncoder};
pub use buffer::BoundedBuffer;
pub use constants::{EPSILON, MU};
pub use corpus::{Corpus, DataError, Dataset, DocId, Posting, SimKeywords};
pub use environment::{Environment, Step, UserConfig};
pub use policy::{
    LinearPolicy, PolicySnapshot, SNAPSHOT_VERSION, Transition, export_json, import_json,
};
pub use query::Query;
pub use retrieval::{
    FeedbackItem, FeedbackPayload, Keyterm, Ranked, RankingList, RetrievalConfig, RetrievalEngine,
    ScoreMap, rank,
};
pub use user::{Like, Reaction, SimulatedUser, UserStats, average_precision};
