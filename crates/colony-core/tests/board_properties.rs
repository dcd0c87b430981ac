use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;

use colony_core::goal::evaluate;
use colony_core::{RecipeCatalog, SupplyChain, TaskStore};
use contracts::{
    EntityState, Goal, PlannerConfig, Selector, TaskDraft, TaskKind, TaskOrigin, WorldSnapshot,
};
use proptest::prelude::*;

fn haul(goal: Goal) -> TaskDraft {
    TaskDraft {
        kind: TaskKind::Transport,
        description: format!("satisfy {goal}"),
        goal,
        preconditions: Vec::new(),
        priority: 5,
        required_capability: None,
        metadata: None,
        origin: TaskOrigin::External,
    }
}

proptest! {
    #[test]
    fn prefix_goals_sum_matching_stock(a in 0_i64..1_000, b in 0_i64..1_000, other in 0_i64..1_000) {
        let snapshot = WorldSnapshot::new(vec![
            EntityState::facility("Shelf_A", "Shelf").with_item(9, a),
            EntityState::facility("Shelf_B", "Shelf").with_item(9, b),
            EntityState::facility("Barrel", "Barrel").with_item(9, other),
        ]);
        let at_least = |n| Goal::stock_at_least(Selector::prefix("Shelf"), 9, n);
        prop_assert!(evaluate(&at_least(a + b), &snapshot));
        prop_assert!(!evaluate(&at_least(a + b + 1), &snapshot));
    }

    #[test]
    fn ensure_is_idempotent(
        local in 0_i64..20,
        elsewhere in 0_i64..40,
        amount in 1_i64..30,
    ) {
        let board = TaskStore::new();
        let catalog = RecipeCatalog::default();
        let config = PlannerConfig::default();
        let snapshot = WorldSnapshot::new(vec![
            EntityState::facility("Storage", "Storage").with_item(5, elsewhere),
            EntityState::facility("F", "WorkStation").with_item(5, local),
        ]);
        let chain = SupplyChain::new(&board, &catalog, &config);

        let first = chain.ensure(5, amount, "F", &snapshot);
        let count = board.len();
        let second = chain.ensure(5, amount, "F", &snapshot);

        prop_assert_eq!(first.clone(), second);
        prop_assert_eq!(board.len(), count);
        prop_assert_eq!(count, usize::from(local < amount));
    }

    #[test]
    fn retire_removes_exactly_the_satisfied_tasks(
        thresholds in proptest::collection::btree_set(0_i64..100, 1..12),
        stock in 0_i64..100,
    ) {
        let board = TaskStore::new();
        for threshold in &thresholds {
            board.post(haul(Goal::stock_at_least(Selector::named("F"), 1, *threshold)));
        }
        let snapshot = WorldSnapshot::new(vec![EntityState::facility("F", "Depot").with_item(1, stock)]);

        let retired = board
            .retire(&snapshot)
            .into_iter()
            .map(|task| task.goal.expected.to_string())
            .collect::<BTreeSet<_>>();
        let expected = thresholds
            .iter()
            .filter(|threshold| **threshold <= stock)
            .map(|threshold| threshold.to_string())
            .collect::<BTreeSet<_>>();

        prop_assert_eq!(retired, expected);
        prop_assert_eq!(board.len(), thresholds.iter().filter(|t| **t > stock).count());
        for task in board.tasks() {
            prop_assert!(!evaluate(&task.goal, &snapshot));
        }
    }
}

#[test]
fn concurrent_posts_of_one_goal_yield_one_task() {
    let board = Arc::new(TaskStore::new());
    let ids = thread::scope(|scope| {
        let handles = (0..8)
            .map(|_| {
                let board = Arc::clone(&board);
                scope.spawn(move || {
                    board.post(haul(Goal::stock_at_least(Selector::named("F"), 1, 10)))
                })
            })
            .collect::<Vec<_>>();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("poster thread"))
            .collect::<BTreeSet<_>>()
    });
    assert_eq!(ids.len(), 1);
    assert_eq!(board.len(), 1);
}
