//! End-to-end scenarios across the public API:
//! corpus → engine → user → environment → agent → policy snapshot.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use iir_core::{
    Action, Agent, AgentConfig, BoundedBuffer, Corpus, Dataset, Environment, FeedbackItem,
    FeedbackPayload, Like, Mode, Posting, Query, RetrievalConfig, RetrievalEngine, SimKeywords,
    SimulatedUser, Transition, UserConfig, export_json, import_json,
};
use rand::SeedableRng;
use rand::rngs::SmallRng;

fn rng() -> SmallRng {
    SmallRng::seed_from_u64(42)
}

const DOCS: &[(&str, &str)] = &[
    ("d1", "apple pie"),
    ("d2", "apple cider vinegar"),
    ("d3", "pear tart"),
    ("d4", "kiwi"),
    ("d5", "plum jam"),
];

/// Character/bi-character tables over `docs`; every word of two or more
/// characters doubles as a keyword.
fn build_corpus(docs: &[(&str, &str)]) -> Corpus {
    let mut index: HashMap<String, Posting> = HashMap::new();
    let mut counts: [HashMap<String, u64>; 2] = Default::default();
    let mut lengths = HashMap::new();
    let mut documents = HashMap::new();
    let mut keywords = HashMap::new();

    for (doc, text) in docs {
        let words: Vec<String> = text.split_whitespace().map(str::to_string).collect();
        let chars: Vec<char> = words.concat().chars().collect();
        let units = chars
            .iter()
            .map(|c| (c.to_string(), 0))
            .chain(chars.windows(2).map(|w| (w.iter().collect::<String>(), 1)));
        for (unit, kind) in units {
            let posting = index.entry(unit.clone()).or_default();
            posting.total += 1;
            *posting.docs.entry(doc.to_string()).or_insert(0) += 1;
            posting.df = posting.docs.len() as u64;
            *counts[kind].entry(unit).or_insert(0) += 1;
        }
        let kw = words
            .iter()
            .filter(|w| w.chars().count() >= 2)
            .map(|w| (w.clone(), 1.0))
            .collect::<Vec<_>>();
        lengths.insert(doc.to_string(), chars.len() as f64);
        keywords.insert(doc.to_string(), kw);
        documents.insert(doc.to_string(), words);
    }

    let mut background = HashMap::new();
    for table in &counts {
        let total: u64 = table.values().sum();
        for (unit, &n) in table {
            background.insert(unit.clone(), n as f64 / total as f64);
        }
    }
    Corpus::new(index, lengths, background, keywords, documents).unwrap()
}

fn all_words() -> HashSet<String> {
    DOCS.iter()
        .flat_map(|(_, text)| text.split_whitespace().map(str::to_string))
        .collect()
}

fn dataset() -> Dataset {
    let queries = vec![
        Query::parse("apple"),
        Query::parse("pear"),
        Query::parse("plum"),
    ];
    let answers = HashMap::from([
        ("apple".to_string(), HashSet::from(["d1".into(), "d2".into()])),
        ("pear".to_string(), HashSet::from(["d3".into()])),
        ("plum".to_string(), HashSet::from(["d5".into()])),
    ]);
    let sim = HashMap::from([
        ("apple".to_string(), HashSet::from(["pie".into(), "cider".into()])),
        ("pear".to_string(), HashSet::from(["tart".into()])),
        ("plum".to_string(), HashSet::from(["jam".into()])),
    ]);
    Dataset {
        queries,
        answers,
        sim_keywords: SimKeywords::new(sim),
    }
}

fn environment() -> Environment {
    Environment::new(
        Arc::new(build_corpus(DOCS)),
        dataset(),
        RetrievalConfig::default(),
        UserConfig::default(),
        rng(),
    )
    .unwrap()
}

fn single_query_user(query: &str, answers: &[&str], patience: u32, ap: f64) -> SimulatedUser {
    let q = Query::parse(query);
    let answers = HashMap::from([(
        q.identity(),
        answers.iter().map(|s| s.to_string()).collect(),
    )]);
    let sim = HashMap::from([(q.identity(), all_words())]);
    SimulatedUser::new(vec![q], answers, Arc::new(SimKeywords::new(sim)), patience, ap)
}

/// An impatient user whose answers are never retrieved gives up negatively.
#[test]
fn impatient_user_terminates_negatively() {
    let mut env = environment();
    env.new_scenario_with(single_query_user("apple", &["unindexed"], 1, 0.9));

    let mut rounds = 0;
    let last = loop {
        rounds += 1;
        let step = env.act(Action::ReturnByKeyterm);
        if step.terminal {
            break step;
        }
        assert!(step.observation.is_some(), "accepted key term re-ranks");
    };
    assert!(rounds <= 2, "took {rounds} rounds");
    assert_eq!(last.like, Like::Negative);
    assert_eq!(env.user().map(|u| u.completed_queries()), Some(0));
}

/// A ranking that already satisfies the user ends their only query at once.
#[test]
fn satisfied_user_terminates_immediately() {
    let mut env = environment();
    let ranking = env.new_scenario_with(single_query_user("kiwi", &["d4"], 3, 0.5));
    assert_eq!(ranking[0].doc_id, "d4");

    let step = env.act(Action::ReturnByDoc);
    assert_eq!(step.like, Like::Positive);
    assert!(step.terminal);
    assert!(step.observation.is_none());
    let stats = env.user().map(|u| u.stats()).unwrap();
    assert_eq!(stats.completed_queries, 1);
    assert!(stats.all_completed());
}

#[test]
fn training_pool_evicts_oldest() {
    let n = 4;
    let mut pool = BoundedBuffer::new(n);
    for i in 0..=n {
        pool.push(Transition {
            state: vec![i as f64],
            action: 0,
            next_state: None,
            reward: i as f64,
        });
    }
    assert_eq!(pool.len(), n);
    assert!(pool.iter().all(|t| t.reward != 0.0));
    assert_eq!(pool.first().map(|t| t.reward), Some(1.0));
}

#[test]
fn scoring_is_idempotent() {
    let mut engine = RetrievalEngine::new(Arc::new(build_corpus(DOCS)), RetrievalConfig::default());
    let terms = vec!["apple".to_string(), "pie".to_string()];
    assert_eq!(engine.score(&terms), engine.score(&terms));

    let q = Query::new(terms);
    let first = engine.query(&q);
    let second = engine.query(&q);
    assert_eq!(first, second);
}

#[test]
fn revealed_items_are_withheld_until_next_query() {
    let mut engine = RetrievalEngine::new(Arc::new(build_corpus(DOCS)), RetrievalConfig::default());
    let q = Query::parse("apple");
    let ranking = engine.query(&q);
    let top = FeedbackItem::Document(ranking[0].doc_id.clone());

    engine.apply_feedback(&top);
    assert!(engine.is_revealed(&top));
    let FeedbackPayload::Documents(offer) = engine.feedback_request(Action::ReturnByDoc) else {
        panic!("document action yields documents");
    };
    assert!(offer.iter().all(|r| r.doc_id != ranking[0].doc_id));
    assert!(engine.ranking().iter().any(|r| r.doc_id == ranking[0].doc_id));

    engine.query(&q);
    assert!(!engine.is_revealed(&top));
    assert_eq!(
        engine.feedback_request(Action::ReturnByDoc).len(),
        engine.ranking().len()
    );
}

/// Train, persist, reload and evaluate without touching the trained weights.
#[test]
fn train_then_test_with_reloaded_policy() {
    let mut r = rng();
    let mut agent = Agent::new(
        environment(),
        AgentConfig {
            update_every: 8,
            ..AgentConfig::default()
        },
        &mut r,
    );
    let train = agent.play(40, Mode::Train, &mut r);
    assert_eq!(train.episodes, 40);
    assert!(train.batch_updates > 0);

    let json = export_json(agent.policy()).unwrap();
    let reloaded = import_json(&json).unwrap();
    assert_eq!(reloaded.weights(), agent.policy().weights());

    let mut tester = Agent::new(environment(), AgentConfig::default(), &mut r);
    tester.set_policy(reloaded);
    let test = tester.play(20, Mode::Test, &mut r);
    assert_eq!(test.batch_updates, 0);
    assert_eq!(tester.policy().weights(), agent.policy().weights());
    assert!((0.0..=1.0).contains(&test.avg_completed));
}
