//! Dependency ordering of steps
//!
//! Each required key must have exactly one producer. Steps are ordered with
//! Kahn's algorithm; among steps that are ready at the same time the one
//! declared first goes first, so a dependency-free scenario keeps its
//! declaration order.

use std::collections::{BTreeSet, HashMap, HashSet};

use super::step::Step;
use crate::common::{Error, Result};

/// Validated execution plan for a list of steps
#[derive(Debug)]
pub struct Plan {
    /// Step indices in execution order
    pub order: Vec<usize>,
    /// Producing step index per context key
    pub producers: HashMap<String, usize>,
}

/// Compute the execution order, rejecting unsatisfiable graphs
pub fn plan(steps: &[Step]) -> Result<Plan> {
    let mut seen = HashSet::new();
    for step in steps {
        if !seen.insert(step.id()) {
            return Err(Error::Dependency(format!(
                "step id '{}' is declared more than once",
                step.id()
            )));
        }
    }

    let mut producers: HashMap<String, usize> = HashMap::new();
    for (index, step) in steps.iter().enumerate() {
        for key in step.produced_keys() {
            if let Some(&other) = producers.get(key) {
                return Err(Error::Dependency(format!(
                    "key '{}' is produced by both '{}' and '{}'",
                    key,
                    steps[other].id(),
                    step.id()
                )));
            }
            producers.insert(key.clone(), index);
        }
    }

    // dependents[p] lists the steps waiting on p
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); steps.len()];
    let mut indegree = vec![0usize; steps.len()];

    for (index, step) in steps.iter().enumerate() {
        let mut upstream = BTreeSet::new();
        for key in step.required_keys() {
            let &producer = producers.get(key).ok_or_else(|| {
                Error::Dependency(format!(
                    "step '{}' requires '{}' but no step produces it",
                    step.id(),
                    key
                ))
            })?;
            if producer == index {
                return Err(Error::Dependency(format!(
                    "dependency cycle: step '{}' requires '{}' which it produces itself",
                    step.id(),
                    key
                )));
            }
            upstream.insert(producer);
        }
        indegree[index] = upstream.len();
        for producer in upstream {
            dependents[producer].push(index);
        }
    }

    let mut ready: BTreeSet<usize> = (0..steps.len()).filter(|&i| indegree[i] == 0).collect();
    let mut order = Vec::with_capacity(steps.len());

    while let Some(next) = ready.pop_first() {
        order.push(next);
        for &dependent in &dependents[next] {
            indegree[dependent] -= 1;
            if indegree[dependent] == 0 {
                ready.insert(dependent);
            }
        }
    }

    if order.len() < steps.len() {
        let stuck: Vec<&str> = (0..steps.len())
            .filter(|&i| indegree[i] > 0)
            .map(|i| steps[i].id())
            .collect();
        return Err(Error::Dependency(format!(
            "dependency cycle among steps: {}",
            stuck.join(", ")
        )));
    }

    Ok(Plan { order, producers })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::step::{StepAction, StepEnv};
    use async_trait::async_trait;

    struct Noop;

    #[async_trait]
    impl StepAction for Noop {
        async fn run(&self, _env: &mut StepEnv<'_>) -> Result<()> {
            Ok(())
        }
    }

    fn step(id: &str, requires: &[&str], produces: &[&str]) -> Step {
        Step::new(id, Noop)
            .requires(requires.iter().copied())
            .produces(produces.iter().copied())
    }

    fn ids(steps: &[Step], plan: &Plan) -> Vec<String> {
        plan.order.iter().map(|&i| steps[i].id().to_string()).collect()
    }

    #[test]
    fn test_orders_consumers_after_producers() {
        let steps = vec![
            step("delete", &["id", "token"], &[]),
            step("read", &["id"], &[]),
            step("auth", &[], &["token"]),
            step("create", &[], &["id"]),
        ];
        let plan = plan(&steps).unwrap();
        assert_eq!(ids(&steps, &plan), vec!["auth", "create", "delete", "read"]);
    }

    #[test]
    fn test_keeps_declaration_order_between_independent_steps() {
        let steps = vec![
            step("create", &[], &["id"]),
            step("read", &["id"], &[]),
            step("update", &["id"], &[]),
            step("delete", &["id"], &[]),
        ];
        let plan = plan(&steps).unwrap();
        assert_eq!(ids(&steps, &plan), vec!["create", "read", "update", "delete"]);
    }

    #[test]
    fn test_cycle_is_rejected() {
        let steps = vec![
            step("a", &["b_out"], &["a_out"]),
            step("b", &["a_out"], &["b_out"]),
            step("c", &[], &[]),
        ];
        match plan(&steps) {
            Err(Error::Dependency(msg)) => {
                assert!(msg.contains("cycle"));
                assert!(msg.ends_with("steps: a, b"), "{}", msg);
            }
            other => panic!("Expected Dependency error, got {:?}", other),
        }
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let steps = vec![step("loop", &["x"], &["x"])];
        assert!(matches!(plan(&steps), Err(Error::Dependency(_))));
    }

    #[test]
    fn test_missing_producer_is_rejected() {
        let steps = vec![step("read", &["bookingid"], &[])];
        match plan(&steps) {
            Err(Error::Dependency(msg)) => assert!(msg.contains("bookingid")),
            other => panic!("Expected Dependency error, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_producer_is_rejected() {
        let steps = vec![step("a", &[], &["id"]), step("b", &[], &["id"])];
        assert!(matches!(plan(&steps), Err(Error::Dependency(_))));
    }

    #[test]
    fn test_duplicate_step_id_is_rejected() {
        let steps = vec![step("a", &[], &[]), step("a", &[], &[])];
        assert!(matches!(plan(&steps), Err(Error::Dependency(_))));
    }
}
