use std::path::{Path, PathBuf};
use std::time::Duration;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use group_assign::model::condition::{OverlapPolicy, RankWeightTable, ScoreMatrix};
use group_assign::model::group::CapacityModel;
use group_assign::refine::{LocalSearch, RefineParams};
use group_assign::solver::{AssignmentModel, ExactSolver};
use group_assign::{
    io, run, run_with_rng, AllocationConfig, AllocationError, Group, Person, SolveStatus,
};

fn three_friends() -> (Vec<Group>, Vec<Person>) {
    let groups = vec![Group::new("A", 1), Group::new("B", 1), Group::new("C", 1)];
    let persons = vec![
        Person::new("Max").with_wishes(["A", "B"]).with_avoidances(["C"]),
        Person::new("Julia").with_wishes(["B"]).with_avoidances(["A", "C"]),
        Person::new("Anne").with_wishes(["C", "A", "B"]),
    ];
    (groups, persons)
}

/// Persons with random wishes over `n_groups` groups of equal capacity.
fn random_instance(
    rng: &mut SmallRng,
    n_persons: usize,
    n_groups: usize,
    capacity: usize,
) -> (Vec<Group>, Vec<Person>) {
    let groups: Vec<Group> =
        (0..n_groups).map(|g| Group::new(format!("Group {g}"), capacity)).collect();
    let persons = (0..n_persons)
        .map(|p| {
            let wishes: Vec<String> =
                (0..3).map(|_| groups[rng.gen_range(0..n_groups)].name.clone()).collect();
            let avoid = groups[rng.gen_range(0..n_groups)].name.clone();
            Person::new(format!("Person {p}")).with_wishes(wishes).with_avoidances([avoid])
        })
        .collect();
    (groups, persons)
}

#[test]
fn three_friends_get_their_first_wish() {
    let (groups, persons) = three_friends();
    let config = AllocationConfig::default().with_local_time_secs(0.05).with_random_seed(1);
    let outcome = run(groups, &persons, &config).unwrap();

    assert_eq!(outcome.solution.status, SolveStatus::Optimal);
    assert_eq!(outcome.solution.score, 270);
    assert_eq!(outcome.solution.assignment.as_slice(), &[0, 1, 2]);
    assert_eq!(outcome.report.unfulfilled, 0);
    assert_eq!(outcome.report.fulfilled_at(1), 3);
    assert_eq!(outcome.report.rosters[1].members, vec!["Julia"]);
}

#[test]
fn insufficient_capacity_fails_fast() {
    let (mut groups, persons) = three_friends();
    groups[2].capacity = 0;
    let config = AllocationConfig::default();
    let err = run(groups, &persons, &config).unwrap_err();
    assert_eq!(err, AllocationError::InsufficientTotalCapacity { capacity: 2, persons: 3 });
}

#[test]
fn exhausted_solver_budget_is_fatal() {
    let mut rng = SmallRng::seed_from_u64(5);
    let (groups, persons) = random_instance(&mut rng, 2_000, 40, 60);
    let config = AllocationConfig::default().with_mip_time_secs(1e-9).with_local_time_secs(5.0);
    let err = run_with_rng(groups, &persons, &config, &mut rng).unwrap_err();
    assert_eq!(err, AllocationError::NoSolutionFound(Duration::from_nanos(1)));
}

#[test]
fn invalid_config_is_rejected_by_the_library() {
    let (groups, persons) = three_friends();
    let config = AllocationConfig { rank_weights: Vec::new(), ..AllocationConfig::default() };
    assert!(matches!(
        run(groups.clone(), &persons, &config),
        Err(AllocationError::InvalidConfig(_))
    ));

    let config = AllocationConfig::default().with_mip_time_secs(0.0);
    assert!(matches!(run(groups, &persons, &config), Err(AllocationError::InvalidConfig(_))));
}

#[test]
fn solver_timeout_after_construction_still_reports() {
    // everybody wants A; the first half takes it greedily although the second half
    // would gain more there, and the solver has no time to undo that
    let half = 10_000;
    let groups = vec![Group::new("A", half), Group::new("B", half)];
    let persons: Vec<Person> = (0..2 * half)
        .map(|p| {
            let person = Person::new(format!("Person {p}"));
            if p < half {
                person.with_wishes(["A", "B"])
            } else {
                person.with_wishes(["A"]).with_avoidances(["B"])
            }
        })
        .collect();
    let config = AllocationConfig::default()
        .with_mip_time_secs(0.05)
        .with_local_time_secs(0.0)
        .with_random_seed(3);

    let outcome = run(groups, &persons, &config).unwrap();
    assert_eq!(outcome.solution.status, SolveStatus::FeasibleTimeout);
    assert_eq!(outcome.report.status, SolveStatus::FeasibleTimeout);
    assert_eq!(outcome.solver.construction_steps, (2 * half) as u64);
    assert!(outcome.solution.score >= outcome.solver.construction_score);
    assert_eq!(
        outcome.report.rosters.iter().map(|r| r.members.len()).collect::<Vec<_>>(),
        vec![half, half]
    );
}

#[test]
fn solutions_are_feasible_and_refinement_is_monotonic() {
    let mut rng = SmallRng::seed_from_u64(11);
    for (n_persons, n_groups, capacity) in [(30, 4, 8), (60, 7, 9), (25, 5, 5)] {
        let (groups, persons) = random_instance(&mut rng, n_persons, n_groups, capacity);
        let caps = CapacityModel::new(groups).unwrap();
        let table = RankWeightTable::default();
        let scores = ScoreMatrix::build(&persons, &caps, &table, OverlapPolicy::default()).unwrap();
        let model = AssignmentModel::new(&caps, &scores);
        let outcome = ExactSolver::new(Duration::from_secs(30)).solve(&model);
        assert_eq!(outcome.status(), SolveStatus::Optimal);

        let solution = outcome.result().solution().unwrap().clone();
        assert_eq!(solution.assignment.len(), n_persons);
        assert!(solution.assignment.is_feasible(&caps));
        assert_eq!(solution.assignment.score(&scores), solution.score);

        let params = RefineParams { time_limit: Duration::from_millis(20), accept_equal: true };
        let (refined, _) =
            LocalSearch::new(params).refine(solution.clone(), &caps, &scores, &mut rng);
        assert!(refined.assignment.is_feasible(&caps));
        // the solver result is optimal, so swaps can only walk the plateau
        assert_eq!(refined.score, solution.score);
        assert_eq!(refined.assignment.occupancy(n_groups), solution.assignment.occupancy(n_groups));
    }
}

#[test]
fn runs_from_csv_files() {
    let dir = tempfile::tempdir().unwrap();
    let caps = dir.path().join("capacities.csv");
    let prefs = dir.path().join("preferences.csv");
    let out = dir.path().join("result.csv");
    std::fs::write(&caps, "A,B,C\n1,1,1\n").unwrap();
    std::fs::write(
        &prefs,
        "Name,W1,W2,W3,N1,N2,N3\nMax,A,B,,C,,\nJulia,B,,,A,C,\nAnne,C,A,B,,,\n",
    )
    .unwrap();

    let groups = io::read_capacities(&caps).unwrap();
    let persons = io::read_preferences(&prefs).unwrap();
    let config = AllocationConfig::default().with_local_time_secs(0.0);
    let outcome = run(groups, &persons, &config).unwrap();
    io::write_result_file(&out, &outcome.report).unwrap();

    let written = std::fs::read_to_string(&out).unwrap();
    assert_eq!(written, "A (1 of 1),B (1 of 1),C (1 of 1)\nMax,Julia,Anne\n");
}

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("data").join(name)
}

#[test]
fn runs_from_workbooks() {
    let groups = io::read_capacities(&fixture("capacities.xlsx")).unwrap();
    assert_eq!(groups, vec![Group::new("A", 1), Group::new("B", 1), Group::new("C", 1)]);

    let persons = io::read_preferences(&fixture("preferences.xlsx")).unwrap();
    let (_, expected) = three_friends();
    assert_eq!(persons.len(), 3);
    for (read, expected) in persons.iter().zip(&expected) {
        assert_eq!(read.name, expected.name);
        assert_eq!(read.avoidances, expected.avoidances);
        assert_eq!(read.wish_rank("A"), expected.wish_rank("A"));
        assert_eq!(read.wish_rank("B"), expected.wish_rank("B"));
        assert_eq!(read.wish_rank("C"), expected.wish_rank("C"));
    }

    let config = AllocationConfig::default().with_local_time_secs(0.0);
    let outcome = run(groups, &persons, &config).unwrap();
    assert_eq!(outcome.solution.score, 270);
    assert_eq!(outcome.report.unfulfilled, 0);
}
