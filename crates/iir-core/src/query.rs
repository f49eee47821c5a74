use std::fmt;

/// An ordered sequence of query terms.
///
/// Identity is the concatenation of the terms, matching how answer and
/// simulated-keyword tables are keyed.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct Query {
    terms: Vec<String>,
}

impl Query {
    pub fn new(terms: Vec<String>) -> Self {
        Self { terms }
    }

    /// Split a line on whitespace into terms.
    pub fn parse(line: &str) -> Self {
        Self::new(line.split_whitespace().map(str::to_string).collect())
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn is_empty(&self) -> bool {
        self.terms.iter().all(|t| t.is_empty())
    }

    pub fn identity(&self) -> String {
        self.terms.concat()
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.terms.join(" "))
    }
}
