/// Dirichlet prior strength for language-model smoothing.
pub const MU: f64 = 1000.0;

/// Weight of single-character units in query scoring.
pub const CHAR_WEIGHT: f64 = 1.0;

/// Weight of bi-character units in query scoring.
pub const BICHAR_WEIGHT: f64 = 1.0;

/// Damping applied when folding an accepted feedback item into the score map.
pub const FEEDBACK_WEIGHT: f64 = 0.05;

/// Number of top-ranked documents inspected when proposing key terms.
pub const KEYTERM_DOCS: usize = 30;

/// Maximum number of key terms offered to the user in one request.
pub const KEYTERM_LIMIT: usize = 50;

/// Background probability assumed for indexed units the background model lacks.
pub const BACKGROUND_FLOOR: f64 = 1e-8;

/// Number of ranking scores copied into the state vector.
pub const RESULT_FEATURES: usize = 5;

/// Relative eigenvalue cutoff for the pseudo-inverse.
pub const PINV_RCOND: f64 = 1e-12;

/// Numerical epsilon for near-zero comparisons
pub const EPSILON: f64 = 1e-10;
