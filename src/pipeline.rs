use std::fmt;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, error, info};

use crate::config::AllocationConfig;
use crate::error::AllocationError;
use crate::model::condition::ScoreMatrix;
use crate::model::entity::{Group, Person};
use crate::model::group::CapacityModel;
use crate::refine::{LocalSearch, RefineStats};
use crate::report::Report;
use crate::solver::{AssignmentModel, ExactSolver, Solution, SolverResult, SolverStatistics};

/// Stages of one run. `Refined` is only reached with a solver solution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    ScoreBuilt,
    Solved,
    Refined,
    Reported,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Init => "INIT",
            Stage::ScoreBuilt => "SCORE_BUILT",
            Stage::Solved => "SOLVED",
            Stage::Refined => "REFINED",
            Stage::Reported => "REPORTED",
            Stage::Done => "DONE",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct Outcome {
    pub solution: Solution,
    pub solver: SolverStatistics,
    pub refinement: RefineStats,
    pub report: Report,
}

/// Runs the whole pipeline with a generator seeded from the config.
pub fn run(
    groups: Vec<Group>,
    persons: &[Person],
    config: &AllocationConfig,
) -> Result<Outcome, AllocationError> {
    let mut rng = match config.random_seed {
        Some(seed) => SmallRng::seed_from_u64(seed),
        None => SmallRng::from_entropy(),
    };
    run_with_rng(groups, persons, config, &mut rng)
}

pub fn run_with_rng<R: Rng>(
    groups: Vec<Group>,
    persons: &[Person],
    config: &AllocationConfig,
    rng: &mut R,
) -> Result<Outcome, AllocationError> {
    debug!(stage = %Stage::Init, groups = groups.len(), persons = persons.len());
    config.validate().map_err(|err| AllocationError::InvalidConfig(err.to_string()))?;
    let capacities = CapacityModel::new(groups)?;
    let scores =
        ScoreMatrix::build(persons, &capacities, &config.weight_table(), config.overlap_policy)?;
    debug!(stage = %Stage::ScoreBuilt);

    let capacity = capacities.total_capacity();
    if capacity < persons.len() {
        error!(capacity, persons = persons.len(), "total capacity is too small");
        return Err(AllocationError::InsufficientTotalCapacity { capacity, persons: persons.len() });
    }

    let model = AssignmentModel::new(&capacities, &scores);
    let (result, solver) = ExactSolver::new(config.mip_time()).solve(&model).into_parts();
    let solution = match result {
        SolverResult::Optimal(solution) | SolverResult::FeasibleTimeout(solution) => solution,
        SolverResult::Infeasible => {
            return Err(AllocationError::InsufficientTotalCapacity {
                capacity,
                persons: persons.len(),
            });
        }
        SolverResult::NoSolutionTimeout => {
            error!("no feasible assignment within the solver time limit");
            return Err(AllocationError::NoSolutionFound(config.mip_time()));
        }
    };
    info!(stage = %Stage::Solved, status = %solution.status, score = solution.score);

    let (solution, refinement) =
        LocalSearch::new(config.refine_params()).refine(solution, &capacities, &scores, rng);
    info!(
        stage = %Stage::Refined,
        score = solution.score,
        gain = refinement.final_score - refinement.initial_score,
    );

    let report = Report::build(&solution, persons, &capacities);
    debug!(stage = %Stage::Reported, unfulfilled = report.unfulfilled);

    debug!(stage = %Stage::Done);
    Ok(Outcome { solution, solver, refinement, report })
}
