// Domain errors for the fetch -> parse -> aggregate pipeline
use super::reading::TankId;
use std::time::Duration;
use thiserror::Error;

/// A single row could not be turned into a `Reading`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("missing {0} column")]
    MissingColumn(&'static str),

    #[error("tank id {0:?} is not an integer")]
    InvalidTank(String),

    #[error("cannot interpret {0:?} as a date-time")]
    InvalidTimestamp(String),
}

/// Aggregating one group's rows failed; the whole batch is rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AggregateError {
    #[error("row {row}: {source}")]
    Parse {
        row: usize,
        #[source]
        source: ParseError,
    },

    #[error("row {row}: unknown tank {tank}")]
    UnknownTank { row: usize, tank: TankId },
}

/// The external spreadsheet service call failed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    /// Error payload returned by the service itself
    #[error("{0}")]
    Service(String),

    #[error("request failed: {0}")]
    Transport(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

/// A summary was requested for a bucket without readings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("tank {0} has no readings")]
pub struct EmptyBucketError(pub TankId);

/// Failure of one group's load, as surfaced to `LoadState::Error`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LoadError {
    #[error("{group}: {source}")]
    Fetch {
        group: String,
        #[source]
        source: FetchError,
    },

    #[error("{group}: {source}")]
    Aggregate {
        group: String,
        #[source]
        source: AggregateError,
    },

    #[error("unknown tank group {0}")]
    UnknownGroup(String),

    #[error("sign-in timed out after {0:?}")]
    SignInTimeout(Duration),

    #[error("reload superseded by another authorized call")]
    Superseded,

    #[error("a load cycle is already in progress")]
    InProgress,

    #[error("dashboard controller has stopped")]
    ControllerStopped,
}
