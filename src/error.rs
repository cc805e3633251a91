use std::time::Duration;
use thiserror::Error;

/// Fatal conditions of an allocation run. None of them is retried.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AllocationError {
    #[error("{0}")]
    InvalidConfig(String),

    #[error("person `{person}` references unknown group `{group}`")]
    UnknownGroupReference { person: String, group: String },

    #[error("person `{person}` lists {count} avoidances, at most 3 are allowed")]
    TooManyAvoidances { person: String, count: usize },

    #[error("person `{0}` is listed more than once")]
    DuplicatePerson(String),

    #[error("group `{0}` is listed more than once")]
    DuplicateGroup(String),

    #[error("total capacity {capacity} is smaller than the number of persons {persons}")]
    InsufficientTotalCapacity { capacity: usize, persons: usize },

    #[error("no feasible assignment found within {0:.2?}")]
    NoSolutionFound(Duration),
}
