pub mod entity {
    pub type Name = String;
    pub type PersonIndex = usize;
    pub type GroupIndex = usize;

    /// Most avoidance entries a single person may declare.
    pub const MAX_AVOIDANCES: usize = 3;

    #[derive(Debug, Clone, PartialEq)]
    pub struct Person {
        pub name: Name,
        /// Wish list by rank, rank 1 first. `None` marks an unused rank.
        pub wishes: Vec<Option<Name>>,
        pub avoidances: Vec<Name>,
    }

    impl Person {
        pub fn new(name: impl Into<Name>) -> Person {
            Person {
                name: name.into(),
                wishes: Vec::new(),
                avoidances: Vec::new(),
            }
        }

        pub fn with_wishes<I, S>(mut self, wishes: I) -> Person
        where
            I: IntoIterator<Item = S>,
            S: Into<Name>,
        {
            self.wishes = wishes.into_iter().map(|w| Some(w.into())).collect();
            self
        }

        pub fn with_avoidances<I, S>(mut self, avoidances: I) -> Person
        where
            I: IntoIterator<Item = S>,
            S: Into<Name>,
        {
            self.avoidances = avoidances.into_iter().map(Into::into).collect();
            self
        }

        /// 1-based rank of `group` in the wish list, best rank if it is listed twice.
        pub fn wish_rank(&self, group: &str) -> Option<usize> {
            self.wishes
                .iter()
                .position(|w| w.as_deref() == Some(group))
                .map(|idx| idx + 1)
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    pub struct Group {
        pub name: Name,
        pub capacity: usize,
    }

    impl Group {
        pub fn new(name: impl Into<Name>, capacity: usize) -> Group {
            Group { name: name.into(), capacity }
        }
    }
}


pub mod group {
    use std::collections::HashMap;

    use super::entity::{Group, GroupIndex, Name};
    use crate::error::AllocationError;

    /// Admission limits of all groups, in input order.
    #[derive(Debug, Clone)]
    pub struct CapacityModel {
        groups: Vec<Group>,
        index: HashMap<Name, GroupIndex>,
    }

    impl CapacityModel {
        pub fn new(groups: Vec<Group>) -> Result<CapacityModel, AllocationError> {
            let mut index = HashMap::with_capacity(groups.len());
            for (group_index, group) in groups.iter().enumerate() {
                if index.insert(group.name.clone(), group_index).is_some() {
                    return Err(AllocationError::DuplicateGroup(group.name.clone()));
                }
            }
            Ok(CapacityModel { groups, index })
        }

        pub fn len(&self) -> usize {
            self.groups.len()
        }

        pub fn is_empty(&self) -> bool {
            self.groups.is_empty()
        }

        pub fn groups(&self) -> &[Group] {
            &self.groups
        }

        pub fn group(&self, group_index: GroupIndex) -> &Group {
            &self.groups[group_index]
        }

        pub fn capacity(&self, group_index: GroupIndex) -> usize {
            self.groups[group_index].capacity
        }

        /// Exact, case- and whitespace-sensitive name lookup.
        pub fn index_of(&self, name: &str) -> Option<GroupIndex> {
            self.index.get(name).copied()
        }

        pub fn total_capacity(&self) -> usize {
            self.groups.iter().map(|g| g.capacity).sum()
        }
    }
}

pub mod condition {
    use std::collections::HashSet;

    use serde::{Deserialize, Serialize};

    use super::entity::{GroupIndex, Person, PersonIndex, MAX_AVOIDANCES};
    use super::group::CapacityModel;
    use crate::error::AllocationError;

    pub type Score = i64;

    pub const DEFAULT_RANK_WEIGHTS: [Score; 10] = [90, 30, 10, 5, 4, 3, 2, 1, 1, 1];
    pub const DEFAULT_AVOIDANCE_PENALTY: Score = -10;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct RankWeightTable {
        pub rank_weights: Vec<Score>,
        pub avoidance_penalty: Score,
    }

    impl Default for RankWeightTable {
        fn default() -> Self {
            RankWeightTable {
                rank_weights: DEFAULT_RANK_WEIGHTS.to_vec(),
                avoidance_penalty: DEFAULT_AVOIDANCE_PENALTY,
            }
        }
    }

    impl RankWeightTable {
        pub fn new(rank_weights: Vec<Score>, avoidance_penalty: Score) -> RankWeightTable {
            RankWeightTable { rank_weights, avoidance_penalty }
        }

        /// Weight of 1-based wish `rank`. Ranks past the table reuse its last entry.
        pub fn weight_for_rank(&self, rank: usize) -> Score {
            let idx = rank.saturating_sub(1).min(self.rank_weights.len().saturating_sub(1));
            self.rank_weights.get(idx).copied().unwrap_or(0)
        }
    }

    /// How a group that is both wished for and avoided by one person is weighted.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
    #[serde(rename_all = "snake_case")]
    pub enum OverlapPolicy {
        #[default]
        WishWins,
        AvoidanceWins,
        Sum,
    }

    impl OverlapPolicy {
        fn combine(self, wish: Option<Score>, avoidance: Option<Score>) -> Score {
            match (self, wish, avoidance) {
                (OverlapPolicy::Sum, w, a) => w.unwrap_or(0) + a.unwrap_or(0),
                (OverlapPolicy::WishWins, Some(w), _) => w,
                (OverlapPolicy::AvoidanceWins, _, Some(a)) => a,
                (_, w, a) => w.or(a).unwrap_or(0),
            }
        }
    }

    /// Dense person x group weights. Immutable once built.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct ScoreMatrix {
        n_persons: usize,
        n_groups: usize,
        weights: Vec<Score>,
    }

    impl ScoreMatrix {
        pub fn build(
            persons: &[Person],
            capacities: &CapacityModel,
            table: &RankWeightTable,
            policy: OverlapPolicy,
        ) -> Result<ScoreMatrix, AllocationError> {
            let mut seen = HashSet::with_capacity(persons.len());
            let mut weights = Vec::with_capacity(persons.len() * capacities.len());
            for person in persons {
                if !seen.insert(person.name.as_str()) {
                    return Err(AllocationError::DuplicatePerson(person.name.clone()));
                }
                weights.extend(person_weights(person, capacities, table, policy)?);
            }
            Ok(ScoreMatrix {
                n_persons: persons.len(),
                n_groups: capacities.len(),
                weights,
            })
        }

        /// Builds a matrix from precomputed rows. Every row must have the same length.
        pub fn from_rows(rows: Vec<Vec<Score>>) -> ScoreMatrix {
            let n_groups = rows.first().map_or(0, Vec::len);
            debug_assert!(rows.iter().all(|row| row.len() == n_groups));
            ScoreMatrix {
                n_persons: rows.len(),
                n_groups,
                weights: rows.into_iter().flatten().collect(),
            }
        }

        pub fn n_persons(&self) -> usize {
            self.n_persons
        }

        pub fn n_groups(&self) -> usize {
            self.n_groups
        }

        #[inline]
        pub fn weight(&self, person: PersonIndex, group: GroupIndex) -> Score {
            self.weights[person * self.n_groups + group]
        }

        pub fn row(&self, person: PersonIndex) -> &[Score] {
            let start = person * self.n_groups;
            &self.weights[start..start + self.n_groups]
        }
    }

    fn person_weights(
        person: &Person,
        capacities: &CapacityModel,
        table: &RankWeightTable,
        policy: OverlapPolicy,
    ) -> Result<Vec<Score>, AllocationError> {
        if person.avoidances.len() > MAX_AVOIDANCES {
            return Err(AllocationError::TooManyAvoidances {
                person: person.name.clone(),
                count: person.avoidances.len(),
            });
        }
        let lookup = |group: &str| {
            capacities
                .index_of(group)
                .ok_or_else(|| AllocationError::UnknownGroupReference {
                    person: person.name.clone(),
                    group: group.to_string(),
                })
        };

        let mut wish = vec![None; capacities.len()];
        for (idx, name) in person.wishes.iter().enumerate() {
            if let Some(name) = name {
                let slot = &mut wish[lookup(name.as_str())?];
                if slot.is_none() {
                    *slot = Some(table.weight_for_rank(idx + 1));
                }
            }
        }
        let mut avoided = vec![None; capacities.len()];
        for name in &person.avoidances {
            avoided[lookup(name.as_str())?] = Some(table.avoidance_penalty);
        }

        Ok(wish
            .into_iter()
            .zip(avoided)
            .map(|(w, a)| policy.combine(w, a))
            .collect())
    }
}

pub mod assignment {
    use super::condition::{Score, ScoreMatrix};
    use super::entity::{GroupIndex, PersonIndex};
    use super::group::CapacityModel;

    /// Total mapping person -> group, indexed by person.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct Assignment {
        groups: Vec<GroupIndex>,
    }

    impl Assignment {
        pub fn new(groups: Vec<GroupIndex>) -> Assignment {
            Assignment { groups }
        }

        pub fn len(&self) -> usize {
            self.groups.len()
        }

        pub fn is_empty(&self) -> bool {
            self.groups.is_empty()
        }

        pub fn group_of(&self, person: PersonIndex) -> GroupIndex {
            self.groups[person]
        }

        pub fn as_slice(&self) -> &[GroupIndex] {
            &self.groups
        }

        pub fn iter(&self) -> impl Iterator<Item = (PersonIndex, GroupIndex)> + '_ {
            self.groups.iter().copied().enumerate()
        }

        /// Exchanges the groups of two persons. Occupancy is unchanged.
        pub fn swap(&mut self, first: PersonIndex, second: PersonIndex) {
            self.groups.swap(first, second);
        }

        pub fn occupancy(&self, n_groups: usize) -> Vec<usize> {
            let mut counts = vec![0; n_groups];
            for &g in &self.groups {
                counts[g] += 1;
            }
            counts
        }

        pub fn is_feasible(&self, capacities: &CapacityModel) -> bool {
            if self.groups.iter().any(|&g| g >= capacities.len()) {
                return false;
            }
            self.occupancy(capacities.len())
                .iter()
                .enumerate()
                .all(|(g, &count)| count <= capacities.capacity(g))
        }

        pub fn score(&self, scores: &ScoreMatrix) -> Score {
            self.iter().map(|(p, g)| scores.weight(p, g)).sum()
        }
    }
}
