use crate::action::{Action, ActionError, ActionResult, Position};
use crate::model::assignment::Assignment;
use crate::model::condition::{Score, ScoreMatrix};
use crate::model::entity::{GroupIndex, PersonIndex};
use crate::model::group::CapacityModel;


#[derive(Debug, Clone)]
struct GroupCache {
    pub members: Vec<PersonIndex>,
    pub capacity: usize,
}

impl GroupCache {
    fn has_room(&self) -> bool {
        self.members.len() < self.capacity
    }
}

/// Assignment state kept in sync under moves: rosters, each person's slot, and the total score.
#[derive(Debug, Clone)]
pub struct AssignmentCache {
    groups: Vec<GroupCache>,
    positions: Vec<Position>,
    score: Score,
}

impl AssignmentCache {
    pub fn create(
        assignment: &Assignment,
        capacities: &CapacityModel,
        scores: &ScoreMatrix,
    ) -> AssignmentCache {
        let mut groups: Vec<GroupCache> = capacities.groups().iter()
            .map(|group| GroupCache { members: Vec::new(), capacity: group.capacity })
            .collect();
        let positions = assignment.iter().map(|(person, group_index)| {
            let members = &mut groups[group_index].members;
            members.push(person);
            Position { group_index, member_index: members.len() - 1 }
        }).collect();
        AssignmentCache { groups, positions, score: assignment.score(scores) }
    }

    pub fn score(&self) -> Score {
        self.score
    }

    pub fn n_persons(&self) -> usize {
        self.positions.len()
    }

    pub fn n_groups(&self) -> usize {
        self.groups.len()
    }

    pub fn group_of(&self, person: PersonIndex) -> GroupIndex {
        self.positions[person].group_index
    }

    pub fn members(&self, group_index: GroupIndex) -> &[PersonIndex] {
        &self.groups[group_index].members
    }

    pub fn occupancy(&self, group_index: GroupIndex) -> usize {
        self.groups[group_index].members.len()
    }

    pub fn has_room(&self, group_index: GroupIndex) -> bool {
        self.groups[group_index].has_room()
    }

    pub fn to_assignment(&self) -> Assignment {
        Assignment::new(self.positions.iter().map(|pos| pos.group_index).collect())
    }

    fn get_position(&self, person: PersonIndex) -> Result<Position, ActionError> {
        self.positions.get(person).copied().ok_or(ActionError::InvalidPerson(person))
    }

    fn relocation_diff(
        &self,
        person: PersonIndex,
        to: GroupIndex,
        scores: &ScoreMatrix,
    ) -> ActionResult {
        match self.get_position(person) {
            Ok(from) => ActionResult::ScoreDiff(
                scores.weight(person, to) - scores.weight(person, from.group_index)
            ),
            Err(err) => ActionResult::Failed(vec![err]),
        }
    }

    /// Score change `action` would cause. Reads only the weights of the persons it touches.
    /// Capacity is not checked: a move is judged on its own, a chain of moves by the sum.
    pub fn simulate(&self, action: &Action, scores: &ScoreMatrix) -> ActionResult {
        match *action {
            Action::Swap(first, second) => {
                match (self.get_position(first), self.get_position(second)) {
                    (Ok(pos1), Ok(pos2)) => {
                        self.relocation_diff(first, pos2.group_index, scores)
                            + self.relocation_diff(second, pos1.group_index, scores)
                    }
                    (pos1, pos2) => ActionResult::Failed(
                        [pos1.err(), pos2.err()].into_iter().flatten().collect()
                    ),
                }
            }
            Action::Move { person, to } => {
                if to >= self.groups.len() {
                    return ActionResult::Failed(vec![ActionError::InvalidGroup(to)]);
                }
                self.relocation_diff(person, to, scores)
            }
        }
    }

    /// Applies `action` and returns the score change. Capacity is not enforced here.
    pub fn act(&mut self, action: Action, scores: &ScoreMatrix) -> Result<Score, ActionError> {
        match action {
            Action::Swap(first, second) => {
                let pos1 = self.get_position(first)?;
                let pos2 = self.get_position(second)?;
                let diff = scores.weight(first, pos2.group_index)
                    - scores.weight(first, pos1.group_index)
                    + scores.weight(second, pos1.group_index)
                    - scores.weight(second, pos2.group_index);
                self.groups[pos1.group_index].members[pos1.member_index] = second;
                self.groups[pos2.group_index].members[pos2.member_index] = first;
                self.positions[first] = pos2;
                self.positions[second] = pos1;
                self.score += diff;
                Ok(diff)
            }
            Action::Move { person, to } => {
                let from = self.get_position(person)?;
                if to >= self.groups.len() {
                    return Err(ActionError::InvalidGroup(to));
                }
                if from.group_index == to {
                    return Ok(0);
                }
                let diff = scores.weight(person, to) - scores.weight(person, from.group_index);

                let group_from = &mut self.groups[from.group_index];
                group_from.members.swap_remove(from.member_index);
                if let Some(&moved) = group_from.members.get(from.member_index) {
                    self.positions[moved].member_index = from.member_index;
                }
                let group_to = &mut self.groups[to];
                group_to.members.push(person);
                self.positions[person] =
                    Position { group_index: to, member_index: group_to.members.len() - 1 };

                self.score += diff;
                Ok(diff)
            }
        }
    }
}
