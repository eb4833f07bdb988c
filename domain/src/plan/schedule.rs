//! Pure dependency-ordering logic for plan execution.
//!
//! The pipeline drives scheduling; this module answers the questions it
//! asks: which steps are ready, is the dependency graph acyclic, and
//! which steps are transitively downstream of a failed one.

use std::collections::{HashMap, HashSet};

/// Normalize a sparse dependency map into a dense per-step prerequisite
/// list, dropping duplicates.
pub fn normalize(dependencies: &HashMap<usize, Vec<usize>>, step_count: usize) -> Vec<Vec<usize>> {
    let mut normalized = vec![Vec::new(); step_count];
    for (&index, prerequisites) in dependencies {
        if index >= step_count {
            continue;
        }
        let mut seen = HashSet::new();
        for &dep in prerequisites {
            if dep < step_count && seen.insert(dep) {
                normalized[index].push(dep);
            }
        }
    }
    normalized
}

/// Compute a dense prerequisite list straight from a plan's dependency map.
pub fn prerequisites(plan: &super::entities::Plan) -> Vec<Vec<usize>> {
    normalize(&plan.dependencies, plan.len())
}

/// Kahn's algorithm cycle check. Returns `Err(index)` naming one step on
/// a cycle when the graph is not a DAG.
pub fn check_acyclic(prerequisites: &[Vec<usize>]) -> Result<(), usize> {
    let n = prerequisites.len();
    let mut indegree = vec![0usize; n];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];

    for (index, deps) in prerequisites.iter().enumerate() {
        indegree[index] = deps.len();
        for &dep in deps {
            dependents[dep].push(index);
        }
    }

    let mut queue: Vec<usize> = (0..n).filter(|&i| indegree[i] == 0).collect();
    let mut visited = 0;
    while let Some(index) = queue.pop() {
        visited += 1;
        for &dependent in &dependents[index] {
            indegree[dependent] -= 1;
            if indegree[dependent] == 0 {
                queue.push(dependent);
            }
        }
    }

    if visited == n {
        Ok(())
    } else {
        // Any step with remaining indegree sits on (or behind) a cycle;
        // report the lowest index for a stable error.
        let index = (0..n).find(|&i| indegree[i] > 0).unwrap_or(0);
        Err(index)
    }
}

/// Steps whose prerequisites are all in `satisfied` and which are not in
/// `dispatched`, in plan order.
pub fn ready_steps(
    prerequisites: &[Vec<usize>],
    satisfied: &HashSet<usize>,
    dispatched: &HashSet<usize>,
) -> Vec<usize> {
    prerequisites
        .iter()
        .enumerate()
        .filter(|(index, deps)| {
            !dispatched.contains(index) && deps.iter().all(|dep| satisfied.contains(dep))
        })
        .map(|(index, _)| index)
        .collect()
}

/// Transitive closure of steps downstream of any step in `failed`.
pub fn dependents_closure(prerequisites: &[Vec<usize>], failed: &HashSet<usize>) -> HashSet<usize> {
    let mut blocked = HashSet::new();
    let mut changed = true;
    while changed {
        changed = false;
        for (index, deps) in prerequisites.iter().enumerate() {
            if blocked.contains(&index) || failed.contains(&index) {
                continue;
            }
            if deps
                .iter()
                .any(|dep| failed.contains(dep) || blocked.contains(dep))
            {
                blocked.insert(index);
                changed = true;
            }
        }
    }
    blocked
}
