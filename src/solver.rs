//! Exact solver for the assignment integer program.
//!
//! The program has one binary decision `x[p][g]` per person and group,
//! maximizes `sum w[p][g] * x[p][g]`, and is constrained by
//! `sum_g x[p][g] = 1` per person and `sum_p x[p][g] <= cap[g]` per group.
//! Its constraint matrix is that of a transportation problem, so the
//! integer optimum coincides with the network optimum and is found with
//! primal network methods:
//!
//! 1. **Construction**: every person is placed on its best group that still
//!    has room. Running out of time here leaves no feasible assignment.
//! 2. **Cycle cancelling**: groups form a residual graph where the edge
//!    `g -> h` carries the best gain of moving one member of `g` into `h`,
//!    and a hub node connects to every group and is reachable from every
//!    group with free capacity. A positive-gain cycle is a chain of moves
//!    that keeps capacities and raises the objective. When no such cycle
//!    exists, the assignment is optimal.
//!
//! Both phases check the deadline, so the solver is anytime: it returns the
//! incumbent with [`SolveStatus::FeasibleTimeout`] when the budget runs out
//! after construction.

use std::fmt;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::action::{Action, ActionResult};
use crate::cache::AssignmentCache;
use crate::limit::TimeLimit;
use crate::model::assignment::Assignment;
use crate::model::condition::{Score, ScoreMatrix};
use crate::model::entity::{GroupIndex, PersonIndex};
use crate::model::group::CapacityModel;

/// The integer program over a capacity model and its score matrix.
#[derive(Debug, Clone, Copy)]
pub struct AssignmentModel<'a> {
    capacities: &'a CapacityModel,
    scores: &'a ScoreMatrix,
}

impl<'a> AssignmentModel<'a> {
    pub fn new(capacities: &'a CapacityModel, scores: &'a ScoreMatrix) -> Self {
        debug_assert_eq!(capacities.len(), scores.n_groups());
        Self { capacities, scores }
    }

    pub fn capacities(&self) -> &'a CapacityModel {
        self.capacities
    }

    pub fn scores(&self) -> &'a ScoreMatrix {
        self.scores
    }

    pub fn n_persons(&self) -> usize {
        self.scores.n_persons()
    }

    pub fn n_groups(&self) -> usize {
        self.capacities.len()
    }

    pub fn decision_variables(&self) -> usize {
        self.n_persons() * self.n_groups()
    }

    /// One assignment row per person plus one capacity row per group.
    pub fn constraints(&self) -> usize {
        self.n_persons() + self.n_groups()
    }

    pub fn has_sufficient_capacity(&self) -> bool {
        self.capacities.total_capacity() >= self.n_persons()
    }

    pub fn objective(&self, assignment: &Assignment) -> Score {
        assignment.score(self.scores)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SolveStatus {
    Optimal,
    FeasibleTimeout,
    Infeasible,
    NoSolutionTimeout,
}

impl SolveStatus {
    pub fn has_solution(self) -> bool {
        matches!(self, SolveStatus::Optimal | SolveStatus::FeasibleTimeout)
    }
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolveStatus::Optimal => write!(f, "OPTIMAL"),
            SolveStatus::FeasibleTimeout => write!(f, "FEASIBLE_TIMEOUT"),
            SolveStatus::Infeasible => write!(f, "INFEASIBLE"),
            SolveStatus::NoSolutionTimeout => write!(f, "NO_SOLUTION_TIMEOUT"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Solution {
    pub assignment: Assignment,
    pub score: Score,
    pub status: SolveStatus,
}

impl Solution {
    pub fn new(assignment: Assignment, score: Score, status: SolveStatus) -> Self {
        Self { assignment, score, status }
    }

    /// Value of the decision variable `x[person][group]`.
    pub fn decision(&self, person: PersonIndex, group: GroupIndex) -> bool {
        self.assignment.group_of(person) == group
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolverResult {
    Optimal(Solution),
    FeasibleTimeout(Solution),
    /// Total capacity is below the number of persons.
    Infeasible,
    /// The deadline passed before any feasible assignment was built.
    NoSolutionTimeout,
}

impl SolverResult {
    pub fn status(&self) -> SolveStatus {
        match self {
            SolverResult::Optimal(_) => SolveStatus::Optimal,
            SolverResult::FeasibleTimeout(_) => SolveStatus::FeasibleTimeout,
            SolverResult::Infeasible => SolveStatus::Infeasible,
            SolverResult::NoSolutionTimeout => SolveStatus::NoSolutionTimeout,
        }
    }

    pub fn solution(&self) -> Option<&Solution> {
        match self {
            SolverResult::Optimal(s) | SolverResult::FeasibleTimeout(s) => Some(s),
            _ => None,
        }
    }

    pub fn into_solution(self) -> Option<Solution> {
        match self {
            SolverResult::Optimal(s) | SolverResult::FeasibleTimeout(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for SolverResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.solution() {
            Some(solution) => write!(f, "{}(objective={})", self.status(), solution.score),
            None => write!(f, "{}", self.status()),
        }
    }
}

/// Statistics collected during one solve.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SolverStatistics {
    pub decision_variables: usize,
    pub constraints: usize,
    /// Persons placed by the construction phase.
    pub construction_steps: u64,
    /// Objective right after construction.
    pub construction_score: Score,
    pub cycles_cancelled: u64,
    /// Bellman-Ford relaxation rounds over all cycle searches.
    pub relaxation_rounds: u64,
    pub time_total: Duration,
}

impl SolverStatistics {
    fn for_model(model: &AssignmentModel<'_>) -> Self {
        Self {
            decision_variables: model.decision_variables(),
            constraints: model.constraints(),
            ..Self::default()
        }
    }
}

impl fmt::Display for SolverStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Exact Solver Statistics:")?;
        writeln!(f, "  Decision variables:   {}", self.decision_variables)?;
        writeln!(f, "  Constraints:          {}", self.constraints)?;
        writeln!(f, "  Construction steps:   {}", self.construction_steps)?;
        writeln!(f, "  Construction score:   {}", self.construction_score)?;
        writeln!(f, "  Cycles cancelled:     {}", self.cycles_cancelled)?;
        writeln!(f, "  Relaxation rounds:    {}", self.relaxation_rounds)?;
        writeln!(f, "  Total time:           {:.2?}", self.time_total)?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SolverOutcome {
    result: SolverResult,
    statistics: SolverStatistics,
}

impl SolverOutcome {
    pub fn result(&self) -> &SolverResult {
        &self.result
    }

    pub fn statistics(&self) -> &SolverStatistics {
        &self.statistics
    }

    pub fn status(&self) -> SolveStatus {
        self.result.status()
    }

    pub fn into_parts(self) -> (SolverResult, SolverStatistics) {
        (self.result, self.statistics)
    }
}

#[derive(Debug, Clone, Copy)]
struct Edge {
    from: usize,
    to: usize,
    /// Negated gain, so a positive-gain cycle is a negative cycle.
    cost: Score,
    mover: Option<PersonIndex>,
}

enum CycleSearch {
    Found(Vec<Edge>),
    NoCycle,
    Expired,
}

#[derive(Debug, Clone)]
pub struct ExactSolver {
    time_limit: Duration,
}

impl ExactSolver {
    pub fn new(time_limit: Duration) -> Self {
        Self { time_limit }
    }

    pub fn time_limit(&self) -> Duration {
        self.time_limit
    }

    pub fn solve(&self, model: &AssignmentModel<'_>) -> SolverOutcome {
        let limit = TimeLimit::start(self.time_limit);
        let mut statistics = SolverStatistics::for_model(model);

        info!(
            event = "phase_start",
            phase = "Exact Solver",
            persons = model.n_persons(),
            groups = model.n_groups(),
            decision_variables = statistics.decision_variables,
            time_limit_ms = self.time_limit.as_millis() as u64,
        );

        let result = self.run(model, &limit, &mut statistics);
        statistics.time_total = limit.elapsed();

        match &result {
            SolverResult::Optimal(_) => info!("exact solver proved optimality"),
            SolverResult::FeasibleTimeout(_) => {
                warn!("exact solver hit its time limit, optimality not proven")
            }
            SolverResult::Infeasible => warn!(
                capacity = model.capacities().total_capacity(),
                persons = model.n_persons(),
                "model is infeasible, total capacity is too small"
            ),
            SolverResult::NoSolutionTimeout => {
                warn!("exact solver hit its time limit before finding a feasible assignment")
            }
        }
        info!(
            event = "phase_end",
            phase = "Exact Solver",
            status = %result.status(),
            duration_ms = statistics.time_total.as_millis() as u64,
            cycles = statistics.cycles_cancelled,
            score = result.solution().map(|s| s.score),
        );

        SolverOutcome { result, statistics }
    }

    fn run(
        &self,
        model: &AssignmentModel<'_>,
        limit: &TimeLimit,
        statistics: &mut SolverStatistics,
    ) -> SolverResult {
        if !model.has_sufficient_capacity() {
            return SolverResult::Infeasible;
        }
        let Some(initial) = construct(model, limit, statistics) else {
            return SolverResult::NoSolutionTimeout;
        };
        let mut cache = AssignmentCache::create(&initial, model.capacities(), model.scores());
        statistics.construction_score = cache.score();
        debug!(score = cache.score(), "construction finished");

        let proven = improve(&mut cache, model, limit, statistics);
        let assignment = cache.to_assignment();
        debug_assert!(assignment.is_feasible(model.capacities()));
        debug_assert_eq!(model.objective(&assignment), cache.score());

        if proven {
            SolverResult::Optimal(Solution::new(assignment, cache.score(), SolveStatus::Optimal))
        } else {
            SolverResult::FeasibleTimeout(Solution::new(
                assignment,
                cache.score(),
                SolveStatus::FeasibleTimeout,
            ))
        }
    }
}

/// Places every person on its best group with room, in input order.
fn construct(
    model: &AssignmentModel<'_>,
    limit: &TimeLimit,
    statistics: &mut SolverStatistics,
) -> Option<Assignment> {
    let capacities = model.capacities();
    let scores = model.scores();
    let mut occupancy = vec![0usize; model.n_groups()];
    let mut groups = Vec::with_capacity(model.n_persons());

    for person in 0..model.n_persons() {
        if limit.expired() {
            return None;
        }
        // some group always has room once total capacity covers all persons
        let group = (0..model.n_groups())
            .filter(|&g| occupancy[g] < capacities.capacity(g))
            .max_by_key(|&g| (scores.weight(person, g), std::cmp::Reverse(g)))?;
        occupancy[group] += 1;
        groups.push(group);
        statistics.construction_steps += 1;
    }
    Some(Assignment::new(groups))
}

/// Cancels positive-gain cycles until none is left (returns `true`) or time runs out.
fn improve(
    cache: &mut AssignmentCache,
    model: &AssignmentModel<'_>,
    limit: &TimeLimit,
    statistics: &mut SolverStatistics,
) -> bool {
    if cache.n_persons() == 0 {
        return true;
    }
    loop {
        if limit.expired() {
            return false;
        }
        match find_positive_cycle(cache, model.scores(), limit, statistics) {
            CycleSearch::NoCycle => return true,
            CycleSearch::Expired => return false,
            CycleSearch::Found(cycle) => {
                let moves: Vec<Action> = cycle
                    .iter()
                    .filter_map(|edge| {
                        edge.mover.map(|person| Action::Move { person, to: edge.to })
                    })
                    .collect();
                // every mover is a different person, so the moves' diffs add up
                let Some(gain) = moves
                    .iter()
                    .map(|action| cache.simulate(action, model.scores()))
                    .fold(ActionResult::ScoreDiff(0), |total, diff| total + diff)
                    .score_diff()
                else {
                    return false;
                };
                if gain <= 0 {
                    return false;
                }
                let before = cache.score();
                // cycle is in walk-back order: the move into a group with room comes first
                for action in moves {
                    if cache.act(action, model.scores()).is_err() {
                        return false;
                    }
                }
                debug_assert_eq!(cache.score(), before + gain);
                statistics.cycles_cancelled += 1;
            }
        }
    }
}

fn residual_edges(cache: &AssignmentCache, scores: &ScoreMatrix) -> Vec<Edge> {
    let n_groups = cache.n_groups();
    let hub = n_groups;
    let mut best: Vec<Option<(Score, PersonIndex)>> = vec![None; n_groups * n_groups];

    for person in 0..cache.n_persons() {
        let from = cache.group_of(person);
        let current = scores.weight(person, from);
        for (to, &weight) in scores.row(person).iter().enumerate() {
            if to == from {
                continue;
            }
            let gain = weight - current;
            let slot = &mut best[from * n_groups + to];
            if slot.map_or(true, |(g, _)| gain > g) {
                *slot = Some((gain, person));
            }
        }
    }

    let mut edges: Vec<Edge> = best
        .iter()
        .enumerate()
        .filter_map(|(idx, slot)| {
            slot.map(|(gain, person)| Edge {
                from: idx / n_groups,
                to: idx % n_groups,
                cost: -gain,
                mover: Some(person),
            })
        })
        .collect();
    for group in 0..n_groups {
        if cache.occupancy(group) > 0 {
            edges.push(Edge { from: hub, to: group, cost: 0, mover: None });
        }
        if cache.has_room(group) {
            edges.push(Edge { from: group, to: hub, cost: 0, mover: None });
        }
    }
    edges
}

/// Bellman-Ford negative cycle search on the residual graph.
fn find_positive_cycle(
    cache: &AssignmentCache,
    scores: &ScoreMatrix,
    limit: &TimeLimit,
    statistics: &mut SolverStatistics,
) -> CycleSearch {
    let edges = residual_edges(cache, scores);
    let n_nodes = cache.n_groups() + 1;
    let mut dist: Vec<Score> = vec![0; n_nodes];
    let mut pred: Vec<Option<usize>> = vec![None; n_nodes];
    let mut last_relaxed = None;

    for _ in 0..n_nodes {
        statistics.relaxation_rounds += 1;
        last_relaxed = None;
        for (idx, edge) in edges.iter().enumerate() {
            let candidate = dist[edge.from] + edge.cost;
            if candidate < dist[edge.to] {
                dist[edge.to] = candidate;
                pred[edge.to] = Some(idx);
                last_relaxed = Some(edge.to);
            }
        }
        if last_relaxed.is_none() {
            return CycleSearch::NoCycle;
        }
        if limit.expired() {
            return CycleSearch::Expired;
        }
    }

    let Some(mut node) = last_relaxed else {
        return CycleSearch::NoCycle;
    };
    // step back far enough to be sure to stand on the cycle
    for _ in 0..n_nodes {
        match pred[node] {
            Some(idx) => node = edges[idx].from,
            None => return CycleSearch::NoCycle,
        }
    }

    let start = node;
    let mut cycle = Vec::new();
    loop {
        let Some(idx) = pred[node] else {
            return CycleSearch::NoCycle;
        };
        cycle.push(edges[idx]);
        node = edges[idx].from;
        if node == start {
            break;
        }
    }
    debug_assert!(cycle.iter().map(|e| e.cost).sum::<Score>() < 0);
    CycleSearch::Found(cycle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::condition::{OverlapPolicy, RankWeightTable};
    use crate::model::entity::{Group, Person};
    use itertools::Itertools;

    fn solve(caps: &CapacityModel, scores: &ScoreMatrix, limit: Duration) -> SolverOutcome {
        ExactSolver::new(limit).solve(&AssignmentModel::new(caps, scores))
    }

    /// Exhaustive optimum over all capacity-feasible assignments.
    fn brute_force(caps: &CapacityModel, scores: &ScoreMatrix) -> Option<Score> {
        (0..scores.n_persons())
            .map(|_| 0..caps.len())
            .multi_cartesian_product()
            .map(Assignment::new)
            .filter(|a| a.is_feasible(caps))
            .map(|a| a.score(scores))
            .max()
    }

    #[test]
    fn three_friends_are_solved_optimally() {
        let caps =
            CapacityModel::new(vec![Group::new("A", 1), Group::new("B", 1), Group::new("C", 1)])
                .unwrap();
        let persons = vec![
            Person::new("Max").with_wishes(["A", "B"]).with_avoidances(["C"]),
            Person::new("Julia").with_wishes(["B"]).with_avoidances(["A", "C"]),
            Person::new("Anne").with_wishes(["C", "A", "B"]),
        ];
        let table = RankWeightTable::default();
        let scores = ScoreMatrix::build(&persons, &caps, &table, OverlapPolicy::default()).unwrap();
        let outcome = solve(&caps, &scores, Duration::from_secs(60));

        assert_eq!(outcome.status(), SolveStatus::Optimal);
        let solution = outcome.result().solution().unwrap();
        assert_eq!(solution.assignment, Assignment::new(vec![0, 1, 2]));
        assert_eq!(solution.score, 270);
        assert!(solution.decision(1, 1));
        assert!(!solution.decision(1, 0));
    }

    #[test]
    fn cycle_cancelling_fixes_greedy_construction() {
        // greedy puts person 0 into A and person 2 into C, the optimum moves all three
        let caps =
            CapacityModel::new(vec![Group::new("A", 1), Group::new("B", 1), Group::new("C", 1)])
                .unwrap();
        let scores = ScoreMatrix::from_rows(vec![
            vec![10, 9, 0],
            vec![10, 0, 0],
            vec![0, 10, 8],
        ]);
        let outcome = solve(&caps, &scores, Duration::from_secs(60));
        assert_eq!(outcome.status(), SolveStatus::Optimal);
        assert_eq!(outcome.result().solution().unwrap().score, 27);
        assert_eq!(outcome.statistics().construction_score, 18);
        assert!(outcome.statistics().cycles_cancelled >= 1);
    }

    #[test]
    fn matches_brute_force_on_small_instances() {
        let instances = [
            (vec![2, 1, 1], vec![vec![5, 3, -10], vec![5, 1, 0], vec![5, 9, 9], vec![0, 0, 4]]),
            (
                vec![0, 3, 2],
                vec![vec![90, 30, 10], vec![1, 2, 3], vec![-10, 0, 90], vec![30, 90, 0]],
            ),
            (
                vec![1, 1, 1, 2],
                vec![
                    vec![1, 2, 3, 4],
                    vec![4, 3, 2, 1],
                    vec![2, 2, 9, 2],
                    vec![0, 8, 8, 0],
                    vec![3, 1, 4, 1],
                ],
            ),
            (vec![4], vec![vec![-1], vec![-2], vec![0]]),
        ];
        for (capacities, rows) in instances {
            let caps = CapacityModel::new(
                capacities
                    .iter()
                    .enumerate()
                    .map(|(i, &c)| Group::new(format!("G{i}"), c))
                    .collect(),
            )
            .unwrap();
            let scores = ScoreMatrix::from_rows(rows);
            let outcome = solve(&caps, &scores, Duration::from_secs(60));
            let solution = outcome.result().solution().unwrap();
            assert_eq!(outcome.status(), SolveStatus::Optimal);
            assert!(solution.assignment.is_feasible(&caps));
            assert_eq!(solution.assignment.score(&scores), solution.score);
            assert_eq!(Some(solution.score), brute_force(&caps, &scores));
        }
    }

    #[test]
    fn insufficient_capacity_is_infeasible_without_solving() {
        let caps = CapacityModel::new(vec![Group::new("A", 1), Group::new("B", 0)]).unwrap();
        let scores = ScoreMatrix::from_rows(vec![vec![1, 1], vec![1, 1]]);
        let outcome = solve(&caps, &scores, Duration::from_secs(60));
        assert_eq!(outcome.status(), SolveStatus::Infeasible);
        assert_eq!(outcome.statistics().construction_steps, 0);
        assert!(outcome.result().solution().is_none());
    }

    #[test]
    fn zero_budget_finds_no_solution() {
        let caps =
            CapacityModel::new((0..20).map(|g| Group::new(format!("G{g}"), 50)).collect()).unwrap();
        let scores = ScoreMatrix::from_rows(
            (0..1000)
                .map(|p| (0..20).map(|g| ((p * 7 + g * 13) % 11) as Score).collect())
                .collect(),
        );
        let outcome = solve(&caps, &scores, Duration::ZERO);
        assert_eq!(outcome.status(), SolveStatus::NoSolutionTimeout);
        assert_eq!(outcome.result().clone().into_solution(), None);
    }

    #[test]
    fn empty_population_is_optimal() {
        let caps = CapacityModel::new(vec![Group::new("A", 0)]).unwrap();
        let scores =
            ScoreMatrix::build(&[], &caps, &RankWeightTable::default(), OverlapPolicy::default())
                .unwrap();
        let outcome = solve(&caps, &scores, Duration::ZERO);
        assert_eq!(outcome.status(), SolveStatus::Optimal);
        assert_eq!(outcome.result().solution().unwrap().score, 0);
    }

    #[test]
    fn larger_instance_is_feasible_and_at_least_greedy() {
        let caps =
            CapacityModel::new((0..8).map(|g| Group::new(format!("G{g}"), 13)).collect()).unwrap();
        let pattern = [90, 30, 10, 0, 0, -10, 0, 5];
        let scores = ScoreMatrix::from_rows(
            (0..100).map(|p| (0..8).map(|g| pattern[(p * 3 + g) % 8]).collect()).collect(),
        );
        let outcome = solve(&caps, &scores, Duration::from_secs(60));
        let solution = outcome.result().solution().unwrap();
        assert!(solution.assignment.is_feasible(&caps));
        assert_eq!(solution.assignment.len(), 100);
        assert!(solution.score >= outcome.statistics().construction_score);
        // every person can get its 90 since each column of the pattern has 12 or 13 persons
        assert_eq!(solution.score, 90 * 100);
    }

    #[test]
    fn budget_running_out_while_improving_keeps_the_incumbent() {
        // the first half fills group 0 greedily, the second half gains far more there;
        // fixing that takes one cancelled cycle per pair
        let half = 10_000;
        let caps = CapacityModel::new(vec![Group::new("A", half), Group::new("B", half)]).unwrap();
        let scores = ScoreMatrix::from_rows(
            (0..2 * half).map(|p| if p < half { vec![2, 1] } else { vec![100, 0] }).collect(),
        );
        let outcome = solve(&caps, &scores, Duration::from_millis(50));
        let statistics = outcome.statistics();

        assert_eq!(outcome.status(), SolveStatus::FeasibleTimeout);
        assert_eq!(statistics.construction_steps, (2 * half) as u64);
        assert_eq!(statistics.construction_score, 2 * half as Score);
        let solution = outcome.result().solution().unwrap();
        assert_eq!(solution.status, SolveStatus::FeasibleTimeout);
        assert!(solution.assignment.is_feasible(&caps));
        assert_eq!(solution.assignment.score(&scores), solution.score);
        assert!(solution.score >= statistics.construction_score);
        assert!(solution.score < 101 * half as Score);
    }

    #[test]
    fn status_display() {
        assert_eq!(SolveStatus::FeasibleTimeout.to_string(), "FEASIBLE_TIMEOUT");
        assert_eq!(SolverResult::NoSolutionTimeout.to_string(), "NO_SOLUTION_TIMEOUT");
        assert!(SolveStatus::Optimal.has_solution());
        assert!(!SolveStatus::Infeasible.has_solution());
    }
}
