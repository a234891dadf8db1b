use std::collections::{HashMap, VecDeque};

use crate::idgen::Handle;

/// Execution order over physical edges plus ordering-only constraints.
///
/// Virtual edges are not physical edges, so a graph with recurrent state
/// stays acyclic. The only constraint they add is that a MemoryInput runs
/// before its paired MemoryOutput within one iteration.
pub struct Scheduler {
    nodes: Vec<Handle>,
    edges: Vec<(Handle, Handle)>,
}

impl Scheduler {
    /// `nodes` in insertion order; ties are broken by it
    pub fn new(nodes: Vec<Handle>) -> Self {
        Self {
            nodes,
            edges: Vec::new(),
        }
    }

    /// `before` must execute before `after`
    pub fn add_constraint(&mut self, before: Handle, after: Handle) {
        self.edges.push((before, after));
    }

    /// Topological order (Kahn). Sources come first, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns a node that sits on a cycle.
    pub fn order(&self) -> Result<Vec<Handle>, Handle> {
        let mut indegree: HashMap<Handle, usize> = self.nodes.iter().map(|h| (*h, 0)).collect();
        let mut successors: HashMap<Handle, Vec<Handle>> = HashMap::new();
        for (before, after) in &self.edges {
            if let Some(d) = indegree.get_mut(after) {
                *d += 1;
            }
            successors.entry(*before).or_default().push(*after);
        }

        let mut ready: VecDeque<Handle> = self
            .nodes
            .iter()
            .copied()
            .filter(|h| indegree.get(h) == Some(&0))
            .collect();
        let mut result = Vec::with_capacity(self.nodes.len());

        while let Some(node) = ready.pop_front() {
            result.push(node);
            for next in successors.get(&node).into_iter().flatten() {
                if let Some(d) = indegree.get_mut(next) {
                    *d -= 1;
                    if *d == 0 {
                        ready.push_back(*next);
                    }
                }
            }
        }

        if result.len() == self.nodes.len() {
            Ok(result)
        } else {
            let stuck = self
                .nodes
                .iter()
                .copied()
                .find(|h| indegree.get(h).is_some_and(|d| *d > 0))
                .unwrap_or(self.nodes[0]);
            Err(stuck)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(id: i64) -> Handle {
        Handle::new(id)
    }

    #[test]
    fn test_chain() {
        let mut scheduler = Scheduler::new(vec![h(3), h(2), h(1)]);
        scheduler.add_constraint(h(1), h(2));
        scheduler.add_constraint(h(2), h(3));
        assert_eq!(scheduler.order().unwrap(), vec![h(1), h(2), h(3)]);
    }

    #[test]
    fn test_sources_first_in_insertion_order() {
        let mut scheduler = Scheduler::new(vec![h(1), h(2), h(3), h(4)]);
        scheduler.add_constraint(h(1), h(2));
        scheduler.add_constraint(h(3), h(4));
        assert_eq!(scheduler.order().unwrap(), vec![h(1), h(3), h(2), h(4)]);
    }

    #[test]
    fn test_diamond() {
        let mut scheduler = Scheduler::new(vec![h(1), h(2), h(3), h(4)]);
        scheduler.add_constraint(h(1), h(2));
        scheduler.add_constraint(h(1), h(3));
        scheduler.add_constraint(h(2), h(4));
        scheduler.add_constraint(h(3), h(4));
        let order = scheduler.order().unwrap();
        assert_eq!(order.first(), Some(&h(1)));
        assert_eq!(order.last(), Some(&h(4)));
    }

    #[test]
    fn test_cycle() {
        let mut scheduler = Scheduler::new(vec![h(1), h(2)]);
        scheduler.add_constraint(h(1), h(2));
        scheduler.add_constraint(h(2), h(1));
        assert!(scheduler.order().is_err());
    }
}
