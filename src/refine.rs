use std::time::{Duration, Instant};

use rand::Rng;
use tracing::{debug, info};

use crate::action::Action;
use crate::cache::AssignmentCache;
use crate::limit::TimeLimit;
use crate::model::condition::{Score, ScoreMatrix};
use crate::model::entity::PersonIndex;
use crate::model::group::CapacityModel;
use crate::solver::Solution;


#[derive(Debug, Clone, PartialEq)]
pub struct RefineParams {
    pub time_limit: Duration,
    /// Also accept swaps that leave the score unchanged (plateau moves).
    pub accept_equal: bool,
}

impl Default for RefineParams {
    fn default() -> Self {
        RefineParams { time_limit: Duration::from_secs(30), accept_equal: true }
    }
}

impl RefineParams {
    fn accepts(&self, delta: Score) -> bool {
        delta > 0 || (self.accept_equal && delta == 0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefineStats {
    /// Swaps between different groups that were evaluated.
    pub n_iterations: u64,
    /// Draws of two persons already sharing a group.
    pub n_discarded: u64,
    pub n_accepted: u64,
    pub n_improving: u64,
    pub initial_score: Score,
    pub final_score: Score,
    pub elapsed: Duration,
}

/// Draws two distinct persons uniformly at random.
struct SwapGenerator<'r, R: Rng> {
    n_persons: usize,
    rng: &'r mut R,
}

impl<'r, R: Rng> SwapGenerator<'r, R> {
    fn new(n_persons: usize, rng: &'r mut R) -> Self {
        assert!(n_persons > 1);
        SwapGenerator { n_persons, rng }
    }

    fn next(&mut self) -> (PersonIndex, PersonIndex) {
        let first = self.rng.gen_range(0..self.n_persons);
        let mut second = self.rng.gen_range(0..self.n_persons - 1);
        if second >= first {
            second += 1;
        }
        (first, second)
    }
}

/// Greedy hill climbing over two-person swaps, bounded by wall-clock time.
///
/// Swaps never change group occupancy, so the incumbent stays feasible and
/// capacities are never re-checked. The returned score is never below the
/// incumbent's.
#[derive(Debug, Clone, Default)]
pub struct LocalSearch {
    params: RefineParams,
}

impl LocalSearch {
    pub fn new(params: RefineParams) -> Self {
        LocalSearch { params }
    }

    pub fn params(&self) -> &RefineParams {
        &self.params
    }

    pub fn refine<R: Rng>(
        &self,
        incumbent: Solution,
        capacities: &CapacityModel,
        scores: &ScoreMatrix,
        rng: &mut R,
    ) -> (Solution, RefineStats) {
        let limit = TimeLimit::start(self.params.time_limit);
        let mut stats = RefineStats {
            initial_score: incumbent.score,
            final_score: incumbent.score,
            ..RefineStats::default()
        };

        info!(
            event = "phase_start",
            phase = "Local Search",
            time_limit_ms = self.params.time_limit.as_millis() as u64,
            accept_equal = self.params.accept_equal,
        );

        let mut cache = AssignmentCache::create(&incumbent.assignment, capacities, scores);
        debug_assert_eq!(cache.score(), incumbent.score);

        if cache.n_persons() > 1 {
            self.climb(&mut cache, scores, &limit, &mut stats, rng);
        }

        stats.final_score = cache.score();
        stats.elapsed = limit.elapsed();
        info!(
            event = "phase_end",
            phase = "Local Search",
            duration_ms = stats.elapsed.as_millis() as u64,
            steps = stats.n_iterations,
            accepted = stats.n_accepted,
            improving = stats.n_improving,
            score = stats.final_score,
        );

        let solution = if stats.n_accepted == 0 {
            incumbent
        } else {
            Solution::new(cache.to_assignment(), cache.score(), incumbent.status)
        };
        (solution, stats)
    }

    fn climb<R: Rng>(
        &self,
        cache: &mut AssignmentCache,
        scores: &ScoreMatrix,
        limit: &TimeLimit,
        stats: &mut RefineStats,
        rng: &mut R,
    ) {
        let mut generator = SwapGenerator::new(cache.n_persons(), rng);
        let mut last_progress = Instant::now();

        while !limit.expired() {
            let (first, second) = generator.next();
            if cache.group_of(first) == cache.group_of(second) {
                stats.n_discarded += 1;
                continue;
            }
            stats.n_iterations += 1;

            let action = Action::Swap(first, second);
            let Some(delta) = cache.simulate(&action, scores).score_diff() else {
                continue;
            };
            if self.params.accepts(delta) && cache.act(action, scores).is_ok() {
                stats.n_accepted += 1;
                if delta > 0 {
                    stats.n_improving += 1;
                }
            }

            if last_progress.elapsed() >= Duration::from_secs(1) {
                debug!(
                    event = "progress",
                    steps = stats.n_iterations,
                    score = cache.score(),
                );
                last_progress = Instant::now();
            }
        }
    }
}
