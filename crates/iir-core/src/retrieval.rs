//! Language-model retrieval with a Dirichlet prior over character and
//! bi-character units, plus the feedback requests each action needs.
//!
//! The engine keeps the score map of the current query. A new query replaces
//! it; accepted feedback is folded into it with a fixed damping weight.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::constants::{
    BACKGROUND_FLOOR, BICHAR_WEIGHT, CHAR_WEIGHT, FEEDBACK_WEIGHT, KEYTERM_DOCS, KEYTERM_LIMIT, MU,
};
use crate::corpus::{Corpus, DocId};
use crate::query::Query;

/// Document score accumulated per query, in first-touched order.
pub type ScoreMap = IndexMap<DocId, f64>;

/// A scored document in a ranking.
#[derive(Clone, Debug, PartialEq)]
pub struct Ranked {
    pub doc_id: DocId,
    pub score: f64,
}

/// Documents in descending score order.
pub type RankingList = Vec<Ranked>;

/// A key term offered to the user with its information weight.
#[derive(Clone, Debug, PartialEq)]
pub struct Keyterm {
    pub term: String,
    pub weight: f64,
}

/// What the system shows the user for a given action.
#[derive(Clone, Debug, PartialEq)]
pub enum FeedbackPayload {
    Documents(RankingList),
    Keyterms(Vec<Keyterm>),
}

impl FeedbackPayload {
    pub fn action(&self) -> Action {
        match self {
            Self::Documents(_) => Action::ReturnByDoc,
            Self::Keyterms(_) => Action::ReturnByKeyterm,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Documents(docs) => docs.len(),
            Self::Keyterms(terms) => terms.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The item the user picked at `position`.
    pub fn item(&self, position: usize) -> Option<FeedbackItem> {
        match self {
            Self::Documents(docs) => docs
                .get(position)
                .map(|r| FeedbackItem::Document(r.doc_id.clone())),
            Self::Keyterms(terms) => terms
                .get(position)
                .map(|k| FeedbackItem::Keyterm(k.term.clone())),
        }
    }
}

/// An item the user accepted as positive feedback.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum FeedbackItem {
    Document(DocId),
    Keyterm(String),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub mu: f64,
    pub char_weight: f64,
    pub bichar_weight: f64,
    /// Damping applied to an accepted feedback item's scores.
    pub feedback_weight: f64,
    /// How many top documents feed the key-term proposal.
    pub keyterm_docs: usize,
    /// Maximum number of key terms proposed.
    pub keyterm_limit: usize,
    /// Background probability for indexed units missing from the background model.
    pub background_floor: f64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            mu: MU,
            char_weight: CHAR_WEIGHT,
            bichar_weight: BICHAR_WEIGHT,
            feedback_weight: FEEDBACK_WEIGHT,
            keyterm_docs: KEYTERM_DOCS,
            keyterm_limit: KEYTERM_LIMIT,
            background_floor: BACKGROUND_FLOOR,
        }
    }
}

pub struct RetrievalEngine {
    corpus: Arc<Corpus>,
    config: RetrievalConfig,
    query: Query,
    scores: ScoreMap,
    ranking: RankingList,
    revealed_docs: HashSet<DocId>,
    revealed_keyterms: HashSet<String>,
}

impl RetrievalEngine {
    pub fn new(corpus: Arc<Corpus>, config: RetrievalConfig) -> Self {
        Self {
            corpus,
            config,
            query: Query::default(),
            scores: ScoreMap::new(),
            ranking: Vec::new(),
            revealed_docs: HashSet::new(),
            revealed_keyterms: HashSet::new(),
        }
    }

    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    pub fn current_query(&self) -> &Query {
        &self.query
    }

    /// Ranking of the current query, including any folded feedback.
    pub fn ranking(&self) -> &[Ranked] {
        &self.ranking
    }

    /// Score every document touched by a character or bi-character of `terms`.
    ///
    /// Stateless: reads only the static tables.
    pub fn score(&self, terms: &[String]) -> ScoreMap {
        let mut scores = ScoreMap::new();
        for text in terms {
            let chars: Vec<char> = text.chars().collect();
            for ch in &chars {
                self.accumulate(&mut scores, &ch.to_string(), self.config.char_weight);
            }
            for pair in chars.windows(2) {
                let bichar: String = pair.iter().collect();
                self.accumulate(&mut scores, &bichar, self.config.bichar_weight);
            }
        }
        scores
    }

    fn accumulate(&self, scores: &mut ScoreMap, unit: &str, weight: f64) {
        let Some(posting) = self.corpus.posting(unit) else {
            return;
        };
        let bg = match self.corpus.background(unit) {
            Some(p) => p,
            None => {
                tracing::debug!(unit, "unit missing from background model, using floor");
                self.config.background_floor
            }
        };
        let mu = self.config.mu;
        for (doc, &tf) in &posting.docs {
            let doclen = self.corpus.doc_length(doc);
            let contribution = weight * ((mu + tf as f64 / bg) / (mu + doclen)).log2();
            *scores.entry(doc.clone()).or_insert(0.0) += contribution;
        }
    }

    /// Issue a new top-level query. Clears the score map and the revealed sets.
    pub fn query(&mut self, query: &Query) -> RankingList {
        self.revealed_docs.clear();
        self.revealed_keyterms.clear();
        self.query = query.clone();
        self.scores = self.score(query.terms());
        self.ranking = rank(&self.scores);
        tracing::debug!(query = %query, hits = self.ranking.len(), "query scored");
        self.ranking.clone()
    }

    /// Build what the user sees for `action`.
    pub fn feedback_request(&self, action: Action) -> FeedbackPayload {
        match action {
            Action::ReturnByDoc => FeedbackPayload::Documents(self.doc_request()),
            Action::ReturnByKeyterm => FeedbackPayload::Keyterms(self.keyterm_request()),
        }
    }

    /// The current ranking minus documents already fed back for this query.
    /// The live score map keeps them.
    fn doc_request(&self) -> RankingList {
        self.ranking
            .iter()
            .filter(|r| !self.revealed_docs.contains(&r.doc_id))
            .cloned()
            .collect()
    }

    /// Key terms of the top documents, weighted by `freq/N * log2(N/freq)`
    /// where `freq` is the number of top documents containing the term.
    fn keyterm_request(&self) -> Vec<Keyterm> {
        let top: Vec<&DocId> = self
            .ranking
            .iter()
            .take(self.config.keyterm_docs)
            .map(|r| &r.doc_id)
            .collect();
        let n = top.len();
        if n == 0 {
            return Vec::new();
        }

        let mut doc_freq: HashMap<&str, usize> = HashMap::new();
        for doc in &top {
            let words: HashSet<&str> = self
                .corpus
                .document(doc)
                .iter()
                .map(String::as_str)
                .collect();
            for word in words {
                *doc_freq.entry(word).or_insert(0) += 1;
            }
        }

        let mut candidates: Vec<&(String, f64)> = top
            .iter()
            .flat_map(|doc| self.corpus.keywords(doc))
            .collect();
        candidates.sort_by(|a, b| b.1.total_cmp(&a.1));

        let mut seen: HashSet<&str> = HashSet::new();
        let mut terms = Vec::new();
        for (keyword, _) in candidates.into_iter().take(self.config.keyterm_limit) {
            let Some(&freq) = doc_freq.get(keyword.as_str()) else {
                continue;
            };
            if self.revealed_keyterms.contains(keyword) || !seen.insert(keyword.as_str()) {
                continue;
            }
            let ratio = freq as f64 / n as f64;
            terms.push(Keyterm {
                term: keyword.clone(),
                weight: ratio * (n as f64 / freq as f64).log2(),
            });
        }
        terms.sort_by(|a, b| b.weight.total_cmp(&a.weight));
        terms
    }

    /// Fold an accepted item into the current ranking and mark it revealed.
    ///
    /// A document is rescored as one term made of its whole text; a key term
    /// as itself. The result is added to the score map with the configured
    /// damping weight.
    pub fn apply_feedback(&mut self, item: &FeedbackItem) -> RankingList {
        let aux_term = match item {
            FeedbackItem::Document(doc) => {
                let text = self.corpus.document(doc).concat();
                self.revealed_docs.insert(doc.clone());
                text
            }
            FeedbackItem::Keyterm(term) => {
                self.revealed_keyterms.insert(term.clone());
                term.clone()
            }
        };

        let aux = self.score(std::slice::from_ref(&aux_term));
        let weight = self.config.feedback_weight;
        for (doc, score) in aux {
            *self.scores.entry(doc).or_insert(0.0) += weight * score;
        }
        self.ranking = rank(&self.scores);
        tracing::debug!(?item, "feedback folded into ranking");
        self.ranking.clone()
    }

    pub fn is_revealed(&self, item: &FeedbackItem) -> bool {
        match item {
            FeedbackItem::Document(doc) => self.revealed_docs.contains(doc),
            FeedbackItem::Keyterm(term) => self.revealed_keyterms.contains(term),
        }
    }
}

/// Stable sort by descending score; ties keep score-map order.
pub fn rank(scores: &ScoreMap) -> RankingList {
    let mut ranking: RankingList = scores
        .iter()
        .map(|(doc, &score)| Ranked {
            doc_id: doc.clone(),
            score,
        })
        .collect();
    ranking.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranking
}
