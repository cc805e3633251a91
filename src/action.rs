use std::ops::Add;
use thiserror::Error;
use crate::model::{condition::Score, entity::{GroupIndex, PersonIndex}};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub group_index: GroupIndex,
    pub member_index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Exchange the groups of two persons.
    Swap(PersonIndex, PersonIndex),
    /// Relocate one person, leaving a slot free in its old group.
    Move { person: PersonIndex, to: GroupIndex },
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ActionError {
    #[error("invalid person index {0}")]
    InvalidPerson(PersonIndex),
    #[error("invalid group index {0}")]
    InvalidGroup(GroupIndex),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ActionResult {
    ScoreDiff(Score),
    Failed(Vec<ActionError>),
}

impl ActionResult {
    pub fn score_diff(&self) -> Option<Score> {
        match self {
            ActionResult::ScoreDiff(s) => Some(*s),
            _ => None,
        }
    }
}

impl Add for ActionResult {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        match (self, rhs) {
            (ActionResult::ScoreDiff(s1), ActionResult::ScoreDiff(s2))
                => ActionResult::ScoreDiff(s1 + s2),
            (ActionResult::Failed(mut err1), ActionResult::Failed(err2)) => {
                err1.extend(err2);
                ActionResult::Failed(err1)
            }
            (failed @ ActionResult::Failed(_), _) | (_, failed @ ActionResult::Failed(_)) => failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn results_combine() {
        assert_eq!(
            ActionResult::ScoreDiff(3) + ActionResult::ScoreDiff(-1),
            ActionResult::ScoreDiff(2)
        );
        assert_eq!(
            ActionResult::Failed(vec![ActionError::InvalidPerson(1)])
                + ActionResult::Failed(vec![ActionError::InvalidGroup(2)]),
            ActionResult::Failed(vec![ActionError::InvalidPerson(1), ActionError::InvalidGroup(2)])
        );
        assert_eq!(
            ActionResult::ScoreDiff(1) + ActionResult::Failed(vec![ActionError::InvalidPerson(9)]),
            ActionResult::Failed(vec![ActionError::InvalidPerson(9)])
        );
    }
}
