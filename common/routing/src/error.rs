use thiserror::Error;

#[derive(Debug, Error)]
pub enum RouteError {
    /// Two entries claim overlapping paths. `first` was registered earlier.
    #[error("route conflict on {pattern}: registered by {first} and {second}")]
    RouteConflict {
        pattern: String,
        first: &'static str,
        second: &'static str,
    },

    #[error("invalid route pattern {pattern:?} from {owner}: {reason}")]
    InvalidPattern {
        pattern: String,
        owner: &'static str,
        reason: &'static str,
    },
}
