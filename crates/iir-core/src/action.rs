use std::fmt;

use serde::{Deserialize, Serialize};

/// Interactive actions the system can take to solicit feedback.
///
/// Adding a variant forces both the scoring engine's feedback request and the
/// simulated user's evaluator to handle it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Show the ranked documents; the user points at a relevant one.
    ReturnByDoc,
    /// Show candidate key terms; the user points at a related one.
    ReturnByKeyterm,
}

impl Action {
    /// Fixed action vocabulary, in action-id order.
    pub const ALL: [Action; 2] = [Action::ReturnByDoc, Action::ReturnByKeyterm];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReturnByDoc => "return_by_doc",
            Self::ReturnByKeyterm => "return_by_keyterm",
        }
    }

    /// Position of this action in [`Action::ALL`].
    pub fn id(&self) -> usize {
        match self {
            Self::ReturnByDoc => 0,
            Self::ReturnByKeyterm => 1,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
