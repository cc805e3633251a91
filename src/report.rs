use std::fmt;

use itertools::Itertools;

use crate::model::entity::{Name, Person};
use crate::model::group::CapacityModel;
use crate::model::condition::Score;
use crate::solver::{Solution, SolveStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roster {
    pub group: Name,
    pub capacity: usize,
    pub members: Vec<Name>,
}

/// Read-only summary of a finished assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub score: Score,
    pub status: SolveStatus,
    /// One roster per group, in input order.
    pub rosters: Vec<Roster>,
    /// `rank_counts[r - 1]` persons got their rank-`r` wish.
    pub rank_counts: Vec<usize>,
    /// Persons whose group matches none of their wishes.
    pub unfulfilled: usize,
}

impl Report {
    pub fn build(solution: &Solution, persons: &[Person], capacities: &CapacityModel) -> Report {
        let mut rosters: Vec<Roster> = capacities.groups().iter()
            .map(|group| Roster {
                group: group.name.clone(),
                capacity: group.capacity,
                members: Vec::new(),
            })
            .collect();
        let max_rank = persons.iter().map(|p| p.wishes.len()).max().unwrap_or(0);
        let mut rank_counts = vec![0; max_rank];
        let mut unfulfilled = 0;

        for (person, group_index) in solution.assignment.iter() {
            let person = &persons[person];
            let roster = &mut rosters[group_index];
            roster.members.push(person.name.clone());
            match person.wish_rank(&roster.group) {
                Some(rank) => rank_counts[rank - 1] += 1,
                None => unfulfilled += 1,
            }
        }

        Report { score: solution.score, status: solution.status, rosters, rank_counts, unfulfilled }
    }

    /// Number of persons placed in their rank-`rank` wish (1-based).
    pub fn fulfilled_at(&self, rank: usize) -> usize {
        rank.checked_sub(1).and_then(|idx| self.rank_counts.get(idx)).copied().unwrap_or(0)
    }

    pub fn n_persons(&self) -> usize {
        self.rosters.iter().map(|r| r.members.len()).sum()
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Status: {}", self.status)?;
        writeln!(f, "Final score: {}", self.score)?;
        for roster in &self.rosters {
            writeln!(
                f,
                "  {} ({} of {}): {}",
                roster.group,
                roster.members.len(),
                roster.capacity,
                roster.members.iter().join(", "),
            )?;
        }
        for (idx, count) in self.rank_counts.iter().enumerate() {
            writeln!(f, "  Wish {}: {}", idx + 1, count)?;
        }
        writeln!(f, "  No wish fulfilled: {}", self.unfulfilled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::assignment::Assignment;
    use crate::model::entity::Group;

    #[test]
    fn counts_ranks_and_rosters() {
        let caps = CapacityModel::new(vec![Group::new("A", 2), Group::new("B", 2)]).unwrap();
        let persons = vec![
            Person::new("Max").with_wishes(["A", "B"]),
            Person::new("Julia").with_wishes(["A", "B"]),
            Person::new("Anne").with_wishes(["A"]),
            Person::new("Tom"),
        ];
        let solution = Solution::new(Assignment::new(vec![0, 1, 1, 0]), 120, SolveStatus::Optimal);
        let report = Report::build(&solution, &persons, &caps);

        assert_eq!(report.rank_counts, vec![1, 1]);
        assert_eq!(report.fulfilled_at(1), 1);
        assert_eq!(report.fulfilled_at(2), 1);
        assert_eq!(report.fulfilled_at(0), 0);
        assert_eq!(report.fulfilled_at(3), 0);
        assert_eq!(report.unfulfilled, 2);
        assert_eq!(report.rosters[0].members, vec!["Max", "Tom"]);
        assert_eq!(report.rosters[1].members, vec!["Julia", "Anne"]);
        assert_eq!(report.n_persons(), 4);

        let text = report.to_string();
        assert!(text.contains("A (2 of 2): Max, Tom"));
        assert!(text.contains("No wish fulfilled: 2"));
    }
}
