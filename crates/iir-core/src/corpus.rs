//! Static tables produced by the offline preprocessing jobs.
//!
//! Everything here is read-only for the lifetime of a simulation run. The
//! scoring engine shares a [`Corpus`] through an `Arc`; users share
//! [`SimKeywords`] the same way.

use std::collections::{HashMap, HashSet};
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::query::Query;

pub type DocId = String;

/// One inverted-index entry for a character or bi-character unit.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Posting {
    /// Total occurrences of the unit across the corpus.
    pub total: u64,
    /// Term frequency per document, in index order.
    pub docs: IndexMap<DocId, u64>,
    /// Document frequency.
    pub df: u64,
}

/// Configuration error in the static tables.
#[derive(Debug, Clone, PartialEq)]
pub enum DataError {
    MissingDocLength(DocId),
    MissingDocument(DocId),
    MissingKeywords(DocId),
    InvalidBackground { unit: String, probability: f64 },
    EmptyQueryList,
    MissingAnswers(String),
    MissingSimKeywords(String),
    DimensionMismatch { expected: usize, found: usize },
}

impl fmt::Display for DataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingDocLength(doc) => write!(f, "no document length for '{doc}'"),
            Self::MissingDocument(doc) => write!(f, "no document text for '{doc}'"),
            Self::MissingKeywords(doc) => write!(f, "no keyword list for '{doc}'"),
            Self::InvalidBackground { unit, probability } => {
                write!(
                    f,
                    "invalid background probability {probability} for '{unit}'"
                )
            }
            Self::EmptyQueryList => write!(f, "query list is empty"),
            Self::MissingAnswers(q) => write!(f, "no answer set for query '{q}'"),
            Self::MissingSimKeywords(q) => write!(f, "no simulated keywords for query '{q}'"),
            Self::DimensionMismatch { expected, found } => {
                write!(f, "dimension mismatch: expected {expected}, found {found}")
            }
        }
    }
}

impl std::error::Error for DataError {}

/// Index, length, background and text tables the scoring engine reads.
#[derive(Clone, Debug, Default)]
pub struct Corpus {
    index: HashMap<String, Posting>,
    doc_lengths: HashMap<DocId, f64>,
    background: HashMap<String, f64>,
    keywords: HashMap<DocId, Vec<(String, f64)>>,
    documents: HashMap<DocId, Vec<String>>,
}

impl Corpus {
    /// Assemble the tables, rejecting any posting that references a document
    /// without a length, text or keyword list.
    pub fn new(
        index: HashMap<String, Posting>,
        doc_lengths: HashMap<DocId, f64>,
        background: HashMap<String, f64>,
        keywords: HashMap<DocId, Vec<(String, f64)>>,
        documents: HashMap<DocId, Vec<String>>,
    ) -> Result<Self, DataError> {
        for (unit, &probability) in &background {
            if !(probability.is_finite() && probability > 0.0) {
                return Err(DataError::InvalidBackground {
                    unit: unit.clone(),
                    probability,
                });
            }
        }

        for posting in index.values() {
            for doc in posting.docs.keys() {
                if !doc_lengths.contains_key(doc) {
                    return Err(DataError::MissingDocLength(doc.clone()));
                }
                if !documents.contains_key(doc) {
                    return Err(DataError::MissingDocument(doc.clone()));
                }
                if !keywords.contains_key(doc) {
                    return Err(DataError::MissingKeywords(doc.clone()));
                }
            }
        }

        Ok(Self {
            index,
            doc_lengths,
            background,
            keywords,
            documents,
        })
    }

    pub fn posting(&self, unit: &str) -> Option<&Posting> {
        self.index.get(unit)
    }

    pub fn doc_length(&self, doc: &str) -> f64 {
        self.doc_lengths.get(doc).copied().unwrap_or(0.0)
    }

    pub fn background(&self, unit: &str) -> Option<f64> {
        self.background.get(unit).copied()
    }

    pub fn keywords(&self, doc: &str) -> &[(String, f64)] {
        self.keywords.get(doc).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn document(&self, doc: &str) -> &[String] {
        self.documents.get(doc).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn num_units(&self) -> usize {
        self.index.len()
    }

    pub fn num_documents(&self) -> usize {
        self.documents.len()
    }
}

/// Query → related keywords considered relevant by the simulated user.
#[derive(Clone, Debug, Default)]
pub struct SimKeywords {
    table: HashMap<String, HashSet<String>>,
}

impl SimKeywords {
    pub fn new(table: HashMap<String, HashSet<String>>) -> Self {
        Self { table }
    }

    pub fn contains(&self, query_identity: &str, keyword: &str) -> bool {
        self.table
            .get(query_identity)
            .is_some_and(|set| set.contains(keyword))
    }

    pub fn has_query(&self, query_identity: &str) -> bool {
        self.table.contains_key(query_identity)
    }
}

/// Queries, relevance judgements and simulated keywords driving the users.
#[derive(Clone, Debug, Default)]
pub struct Dataset {
    pub queries: Vec<Query>,
    pub answers: HashMap<String, HashSet<DocId>>,
    pub sim_keywords: SimKeywords,
}

impl Dataset {
    /// Every query must have an answer set and a simulated-keyword entry.
    pub fn validate(&self) -> Result<(), DataError> {
        if self.queries.is_empty() {
            return Err(DataError::EmptyQueryList);
        }
        for query in &self.queries {
            let id = query.identity();
            if !self.answers.contains_key(&id) {
                return Err(DataError::MissingAnswers(id));
            }
            if !self.sim_keywords.has_query(&id) {
                return Err(DataError::MissingSimKeywords(id));
            }
        }
        Ok(())
    }
}
