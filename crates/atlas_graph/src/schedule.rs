// SPDX-License-Identifier: MIT OR Apache-2.0
//! Execution order resolution.
//!
//! The order is built in two phases:
//! 1. Every node that is the destination of a link is listed in the order its
//!    first incoming link was created, then stabilized: whenever an entry has
//!    a predecessor listed after it, the two entries are swapped and scanning
//!    resumes. This settles every node after all of its producers.
//! 2. Nodes that never appear as a destination (roots and unlinked nodes) are
//!    prepended in declaration order.
//!
//! Ties are therefore broken by link discovery order, not by node id.
//! Stabilization is capped at `n²` swaps for `n` destination nodes; hitting
//! the cap means the links contain a directed cycle, reported as
//! [`SchedulerWarning::PossibleCycle`] alongside a best-effort order.

use crate::link::Link;
use crate::node::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Non-fatal problem found while resolving an order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum SchedulerWarning {
    /// Stabilization did not settle; the listed nodes still precede one of
    /// their producers, so their inputs may be stale
    #[error("Possible cycle involving nodes {nodes:?}")]
    PossibleCycle {
        /// Nodes suspected to sit on a cycle
        nodes: Vec<NodeId>,
    },
}

/// Resolved evaluation order for one topology
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExecutionOrder {
    nodes: Vec<NodeId>,
    warning: Option<SchedulerWarning>,
}

impl ExecutionOrder {
    /// Nodes in evaluation order
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    /// Iterate over nodes in evaluation order
    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().copied()
    }

    /// Position of `node` in the order
    pub fn index_of(&self, node: NodeId) -> Option<usize> {
        self.nodes.iter().position(|n| *n == node)
    }

    /// Whether `node` is scheduled
    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains(&node)
    }

    /// Number of scheduled nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether nothing is scheduled
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Warning attached by the scheduler, if any
    pub fn warning(&self) -> Option<&SchedulerWarning> {
        self.warning.as_ref()
    }
}

/// A destination node and the distinct nodes feeding it
struct Entry {
    node: NodeId,
    preds: Vec<NodeId>,
}

/// Resolve an execution order.
///
/// `nodes` must be in declaration order and `links` in creation order; every
/// link endpoint must name a node in `nodes`.
pub fn linearize<'a, I>(nodes: &[NodeId], links: I) -> ExecutionOrder
where
    I: IntoIterator<Item = &'a Link>,
{
    let mut working: Vec<Entry> = Vec::new();
    let mut slot: HashMap<NodeId, usize> = HashMap::new();

    for link in links {
        let destination = link.destination_node();
        let index = *slot.entry(destination).or_insert_with(|| {
            working.push(Entry {
                node: destination,
                preds: Vec::new(),
            });
            working.len() - 1
        });
        let preds = &mut working[index].preds;
        if !preds.contains(&link.source_node()) {
            preds.push(link.source_node());
        }
    }

    let cap = (working.len() * working.len()).max(1);
    let mut swaps = 0;
    let mut index = 0;

    // Entries before `index` never gain a later predecessor from a swap at
    // `index`, so resuming here is the same as rescanning from the top.
    while index < working.len() && swaps < cap {
        match later_predecessor(&working, &slot, index) {
            Some(later) => {
                working.swap(index, later);
                slot.insert(working[index].node, index);
                slot.insert(working[later].node, later);
                swaps += 1;
            }
            None => index += 1,
        }
    }

    let mut suspects: Vec<NodeId> = (index..working.len())
        .filter(|&i| later_predecessor(&working, &slot, i).is_some())
        .map(|i| working[i].node)
        .collect();
    for entry in &working {
        if entry.preds.contains(&entry.node) && !suspects.contains(&entry.node) {
            suspects.push(entry.node);
        }
    }

    let warning = if suspects.is_empty() {
        None
    } else {
        tracing::warn!(
            nodes = ?suspects,
            swaps,
            "execution order did not stabilize; graph may contain a cycle"
        );
        Some(SchedulerWarning::PossibleCycle { nodes: suspects })
    };

    let order = nodes
        .iter()
        .copied()
        .filter(|node| !slot.contains_key(node))
        .chain(working.iter().map(|entry| entry.node))
        .collect();

    ExecutionOrder {
        nodes: order,
        warning,
    }
}

/// Position of the first predecessor of `working[index]` listed after it
fn later_predecessor(working: &[Entry], slot: &HashMap<NodeId, usize>, index: usize) -> Option<usize> {
    working[index]
        .preds
        .iter()
        .filter_map(|pred| slot.get(pred).copied())
        .find(|&position| position > index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::LinkId;
    use crate::port::{PortRef, PortType};

    fn link(from: u64, to: u64) -> Link {
        Link {
            id: LinkId::new(),
            source: PortRef::output(NodeId(from), "Out", PortType::Int),
            destination: PortRef::input(NodeId(to), format!("In{from}"), PortType::Int),
        }
    }

    fn ids(raw: &[u64]) -> Vec<NodeId> {
        raw.iter().copied().map(NodeId).collect()
    }

    fn assert_respects(order: &ExecutionOrder, links: &[Link]) {
        for l in links {
            let s = order.index_of(l.source_node()).unwrap();
            let d = order.index_of(l.destination_node()).unwrap();
            assert!(s < d, "{} must run before {}", l.source_node(), l.destination_node());
        }
    }

    #[test]
    fn test_single_node_without_links() {
        let order = linearize(&ids(&[1]), &[]);
        assert_eq!(order.nodes(), ids(&[1]).as_slice());
        assert!(order.warning().is_none());
    }

    #[test]
    fn test_empty_graph() {
        let order = linearize(&[], &[]);
        assert!(order.is_empty());
        assert!(order.warning().is_none());
    }

    #[test]
    fn test_chain_created_backwards() {
        // 1 -> 2 -> 3 -> 4, links created sink-first
        let links = vec![link(3, 4), link(2, 3), link(1, 2)];
        let order = linearize(&ids(&[1, 2, 3, 4]), &links);
        assert_eq!(order.nodes(), ids(&[1, 2, 3, 4]).as_slice());
        assert_respects(&order, &links);
        assert!(order.warning().is_none());
    }

    #[test]
    fn test_ties_follow_link_discovery_order() {
        // Both 3 and 4 depend only on roots; 4's link was made first.
        let links = vec![link(2, 4), link(1, 3)];
        let order = linearize(&ids(&[1, 2, 3, 4]), &links);
        assert_eq!(order.nodes(), ids(&[1, 2, 4, 3]).as_slice());
    }

    #[test]
    fn test_roots_prepended_in_declaration_order() {
        // 5 is unlinked, 2 and 1 are roots declared in that order.
        let links = vec![link(1, 3), link(2, 3)];
        let order = linearize(&ids(&[2, 5, 1, 3]), &links);
        assert_eq!(order.nodes(), ids(&[2, 5, 1, 3]).as_slice());
    }

    #[test]
    fn test_diamond() {
        let links = vec![link(4, 5), link(2, 4), link(3, 4), link(1, 2), link(1, 3)];
        let order = linearize(&ids(&[1, 2, 3, 4, 5]), &links);
        assert_eq!(order.len(), 5);
        assert_respects(&order, &links);
        assert_eq!(order.nodes()[0], NodeId(1));
        assert_eq!(order.nodes()[4], NodeId(5));
    }

    #[test]
    fn test_duplicate_predecessors_collapse() {
        let mut second = link(1, 2);
        second.destination.name = "Other".into();
        let links = vec![link(1, 2), second];
        let order = linearize(&ids(&[1, 2]), &links);
        assert_eq!(order.nodes(), ids(&[1, 2]).as_slice());
    }

    #[test]
    fn test_cycle_is_reported_with_full_order() {
        let links = vec![link(0, 1), link(1, 2), link(2, 1)];
        let order = linearize(&ids(&[0, 1, 2]), &links);
        assert_eq!(order.len(), 3);
        assert!(order.contains(NodeId(0)));
        assert_eq!(order.nodes()[0], NodeId(0));
        match order.warning() {
            Some(SchedulerWarning::PossibleCycle { nodes }) => assert!(!nodes.is_empty()),
            None => panic!("expected a cycle warning"),
        }
    }

    #[test]
    fn test_self_loop_is_reported() {
        let links = vec![link(1, 1)];
        let order = linearize(&ids(&[1]), &links);
        assert_eq!(order.nodes(), ids(&[1]).as_slice());
        assert_eq!(
            order.warning(),
            Some(&SchedulerWarning::PossibleCycle { nodes: ids(&[1]) })
        );
    }

    #[test]
    fn test_long_reversed_chain_stays_under_cap() {
        let n = 40u64;
        let links: Vec<Link> = (1..n).rev().map(|i| link(i, i + 1)).collect();
        let nodes: Vec<NodeId> = (1..=n).map(NodeId).collect();
        let order = linearize(&nodes, &links);
        assert!(order.warning().is_none());
        assert_eq!(order.nodes(), nodes.as_slice());
    }
}
