use thiserror::Error;

/// Errors that can abort a detection run.
///
/// All variants are terminal for the run: inputs that trigger them need parameter tuning
/// by the caller (search radius, window width, elevation tolerances), there is no retry
/// and no fallback to a partial result.
#[derive(Debug, Error)]
pub enum DetectionError {
    /// The input of a stage does not contain enough points for the requested fit.
    #[error("{stage}: got {found} point(s), need at least {required}")]
    NotEnoughPoints {
        stage: &'static str,
        found: usize,
        required: usize,
    },

    /// A regression fit received a singular or empty training set.
    #[error("{stage}: degenerate fit ({details})")]
    DegenerateFit {
        stage: &'static str,
        details: String,
    },

    /// Semantic cluster selection could not identify a required boundary segment.
    #[error("could not identify the {segment} among {candidates} cluster(s)")]
    ClusterSelection {
        segment: &'static str,
        candidates: usize,
    },
}
