//! Tiny in-memory corpora for unit tests, built the way the offline jobs
//! build the real tables: character and bi-character postings over the
//! whitespace-stripped text.

use std::collections::{HashMap, HashSet};

use crate::corpus::{Corpus, Dataset, DocId, Posting, SimKeywords};
use crate::query::Query;

pub(crate) fn corpus(docs: &[(&str, &str)]) -> Corpus {
    let mut index: HashMap<String, Posting> = HashMap::new();
    let mut lengths = HashMap::new();
    let mut documents = HashMap::new();
    let mut keywords = HashMap::new();
    let mut char_counts: HashMap<String, u64> = HashMap::new();
    let mut bichar_counts: HashMap<String, u64> = HashMap::new();

    for (doc, text) in docs {
        let words: Vec<String> = text.split_whitespace().map(str::to_string).collect();
        let chars: Vec<char> = words.concat().chars().collect();
        let bichars = chars
            .windows(2)
            .map(|w| (w.iter().collect::<String>(), false));
        let units = chars.iter().map(|c| (c.to_string(), true)).chain(bichars);
        for (unit, is_char) in units {
            let posting = index.entry(unit.clone()).or_default();
            posting.total += 1;
            *posting.docs.entry(doc.to_string()).or_insert(0) += 1;
            posting.df = posting.docs.len() as u64;
            let counts = if is_char {
                &mut char_counts
            } else {
                &mut bichar_counts
            };
            *counts.entry(unit).or_insert(0) += 1;
        }

        let mut kw: Vec<(String, f64)> = Vec::new();
        for w in &words {
            if w.chars().count() < 2 {
                continue;
            }
            match kw.iter_mut().find(|(k, _)| k == w) {
                Some(entry) => entry.1 += 1.0,
                None => kw.push((w.clone(), 1.0)),
            }
        }

        lengths.insert(doc.to_string(), chars.len() as f64);
        documents.insert(doc.to_string(), words);
        keywords.insert(doc.to_string(), kw);
    }

    let mut background = HashMap::new();
    for counts in [&char_counts, &bichar_counts] {
        let total: u64 = counts.values().sum();
        for (unit, &n) in counts {
            background.insert(unit.clone(), n as f64 / total as f64);
        }
    }

    Corpus::new(index, lengths, background, keywords, documents).unwrap()
}

/// `(query line, answer docs, simulated keywords)` per entry.
pub(crate) fn dataset(entries: &[(&str, &[&str], &[&str])]) -> Dataset {
    let mut answers: HashMap<String, HashSet<DocId>> = HashMap::new();
    let mut sim = HashMap::new();
    let mut queries = Vec::new();
    for (line, ans, kws) in entries {
        let q = Query::parse(line);
        answers.insert(q.identity(), ans.iter().map(|s| s.to_string()).collect());
        sim.insert(q.identity(), kws.iter().map(|s| s.to_string()).collect());
        queries.push(q);
    }
    Dataset {
        queries,
        answers,
        sim_keywords: SimKeywords::new(sim),
    }
}

pub(crate) const DOCS: &[(&str, &str)] = &[
    ("d1", "apple banana apple"),
    ("d2", "banana cherry"),
    ("d3", "cherry date elder"),
    ("d4", "fig grape melon"),
    ("d5", "apple melon"),
];
