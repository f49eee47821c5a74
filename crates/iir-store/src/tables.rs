//! Readers for the tables the offline preprocessing jobs leave on disk.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use iir_core::{Corpus, Dataset, DocId, Posting, Query, SimKeywords};
use serde::de::DeserializeOwned;

use crate::config::DataPaths;
use crate::error::{Result, StoreError};

fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| StoreError::io(path, e))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = read_text(path)?;
    serde_json::from_str(&text).map_err(|e| {
        StoreError::InvalidData(format!("{}: {e}", path.display()))
    })
}

/// Regular files in `dir`, keyed by file name.
fn read_dir_files(dir: &Path) -> Result<Vec<(String, String)>> {
    let entries = fs::read_dir(dir).map_err(|e| StoreError::io(dir, e))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| StoreError::io(dir, e))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            tracing::warn!(path = %path.display(), "skipping non UTF-8 file name");
            continue;
        };
        files.push((name.to_string(), read_text(&path)?));
    }
    files.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(files)
}

/// One query per non-blank line, terms separated by whitespace.
pub fn read_queries(path: &Path) -> Result<Vec<Query>> {
    let queries: Vec<Query> = read_text(path)?
        .lines()
        .map(Query::parse)
        .filter(|q| !q.is_empty())
        .collect();
    tracing::debug!(path = %path.display(), count = queries.len(), "queries read");
    Ok(queries)
}

/// Lines of `key value value ...` into a key → set table.
fn read_keyed_sets(path: &Path) -> Result<HashMap<String, HashSet<String>>> {
    let mut table = HashMap::new();
    for line in read_text(path)?.lines() {
        let mut fields = line.split_whitespace();
        let Some(key) = fields.next() else {
            continue;
        };
        let values: HashSet<String> = fields.map(str::to_string).collect();
        if values.is_empty() {
            tracing::warn!(path = %path.display(), key, "entry without values");
        }
        table.insert(key.to_string(), values);
    }
    Ok(table)
}

/// `query-identity doc doc ...` per line.
pub fn read_answers(path: &Path) -> Result<HashMap<String, HashSet<DocId>>> {
    read_keyed_sets(path)
}

/// `query-identity keyword keyword ...` per line.
pub fn read_sim_keywords(path: &Path) -> Result<SimKeywords> {
    read_keyed_sets(path).map(SimKeywords::new)
}

/// One file per document, each line `keyword score`.
pub fn read_keyword_dir(dir: &Path) -> Result<HashMap<DocId, Vec<(String, f64)>>> {
    let mut keywords = HashMap::new();
    for (doc, text) in read_dir_files(dir)? {
        let mut list = Vec::new();
        for (n, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let mut fields = line.split_whitespace();
            let parsed = match (fields.next(), fields.next(), fields.next()) {
                (Some(kw), Some(score), None) => score.parse::<f64>().ok().map(|s| (kw, s)),
                _ => None,
            };
            let Some((kw, score)) = parsed else {
                return Err(StoreError::InvalidData(format!(
                    "{}:{}: expected `keyword score`, got {line:?}",
                    dir.join(&doc).display(),
                    n + 1
                )));
            };
            list.push((kw.to_string(), score));
        }
        keywords.insert(doc, list);
    }
    tracing::debug!(dir = %dir.display(), docs = keywords.len(), "keyword lists read");
    Ok(keywords)
}

/// One file per document; the whitespace tokens of every line, in order.
pub fn read_doc_dir(dir: &Path) -> Result<HashMap<DocId, Vec<String>>> {
    let documents: HashMap<DocId, Vec<String>> = read_dir_files(dir)?
        .into_iter()
        .map(|(doc, text)| {
            let words = text.split_whitespace().map(str::to_string).collect();
            (doc, words)
        })
        .collect();
    tracing::debug!(dir = %dir.display(), docs = documents.len(), "documents read");
    Ok(documents)
}

pub fn read_index(path: &Path) -> Result<HashMap<String, Posting>> {
    read_json(path)
}

pub fn read_doc_lengths(path: &Path) -> Result<HashMap<DocId, f64>> {
    read_json(path)
}

pub fn read_background(path: &Path) -> Result<HashMap<String, f64>> {
    read_json(path)
}

/// Load and cross-check every table the scoring engine needs.
pub fn load_corpus(paths: &DataPaths) -> Result<Corpus> {
    let index = read_index(&paths.index)?;
    let doc_lengths = read_doc_lengths(&paths.doc_lengths)?;
    let background = read_background(&paths.background)?;
    let keywords = read_keyword_dir(&paths.keywords)?;
    let documents = read_doc_dir(&paths.documents)?;
    let corpus = Corpus::new(index, doc_lengths, background, keywords, documents)?;
    tracing::info!(
        units = corpus.num_units(),
        documents = corpus.num_documents(),
        "corpus loaded"
    );
    Ok(corpus)
}

/// Load queries, answers and simulated keywords, checking every query is covered.
pub fn load_dataset(paths: &DataPaths) -> Result<Dataset> {
    let dataset = Dataset {
        queries: read_queries(&paths.queries)?,
        answers: read_answers(&paths.answers)?,
        sim_keywords: read_sim_keywords(&paths.sim_keywords)?,
    };
    dataset.validate()?;
    tracing::info!(queries = dataset.queries.len(), "dataset loaded");
    Ok(dataset)
}
