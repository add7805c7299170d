//! Rollout cost totals over a forest of costed nodes.
//!
//! Each node contributes a range: `min` (what the rollout costs if optional
//! work is skipped and the cheapest alternatives are picked), `max` (every
//! task done, priciest alternatives) and `actual` (money already committed).
//! Choice-group nodes hold mutually exclusive alternatives; until one is
//! selected they contribute the cheapest and dearest alternative and no
//! committed spend.

use std::collections::{HashMap, HashSet};
use std::ops::{Add, AddAssign};

use serde::Serialize;
use tracing::debug;

use crate::cost::{committed_cost, CostLayer, CostPolicy, Money};
use crate::task::Task;

/// One node of the cost forest, linked to its parent by id.
#[derive(Debug, Clone, PartialEq)]
pub struct CostNode {
    pub id: String,
    pub parent_id: Option<String>,
    pub cost: CostLayer,
    pub is_optional: bool,
    pub is_choice_group: bool,
    pub selected_child_id: Option<String>,
}

impl CostNode {
    pub fn new(id: impl Into<String>, parent_id: Option<String>, cost: CostLayer) -> Self {
        CostNode {
            id: id.into(),
            parent_id,
            cost,
            is_optional: false,
            is_choice_group: false,
            selected_child_id: None,
        }
    }
}

impl From<&Task> for CostNode {
    fn from(task: &Task) -> Self {
        CostNode {
            id: task.id.clone(),
            parent_id: task.parent_id.clone(),
            cost: task.cost,
            is_optional: task.is_optional,
            is_choice_group: task.is_choice_group,
            selected_child_id: task.selected_child_id.clone(),
        }
    }
}

/// Minimum, maximum and committed cost.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CostRange {
    pub min: Money,
    pub max: Money,
    pub actual: Money,
}

impl CostRange {
    pub fn new(min: Money, max: Money, actual: Money) -> Self {
        CostRange { min, max, actual }
    }
}

impl Add for CostRange {
    type Output = CostRange;

    fn add(self, rhs: CostRange) -> CostRange {
        CostRange {
            min: self.min + rhs.min,
            max: self.max + rhs.max,
            actual: self.actual + rhs.actual,
        }
    }
}

impl AddAssign for CostRange {
    fn add_assign(&mut self, rhs: CostRange) {
        *self = *self + rhs;
    }
}

impl std::iter::Sum for CostRange {
    fn sum<I: Iterator<Item = CostRange>>(iter: I) -> CostRange {
        iter.fold(CostRange::default(), |acc, r| acc + r)
    }
}

/// Indexed view of a node list.
pub struct CostGraph<'a> {
    nodes: HashMap<&'a str, &'a CostNode>,
    children: HashMap<&'a str, Vec<&'a CostNode>>,
    policy: CostPolicy<'a>,
}

impl<'a> CostGraph<'a> {
    /// Index `nodes` by id. A repeated id keeps its first node; the later
    /// ones are left out of the graph entirely.
    pub fn new(nodes: &'a [CostNode], policy: CostPolicy<'a>) -> Self {
        let mut index = HashMap::new();
        let mut children: HashMap<&str, Vec<&CostNode>> = HashMap::new();
        for node in nodes {
            if index.contains_key(node.id.as_str()) {
                debug!(node = %node.id, "duplicate cost node id, keeping the first");
                continue;
            }
            index.insert(node.id.as_str(), node);
            if let Some(parent) = node.parent_id.as_deref() {
                children.entry(parent).or_default().push(node);
            }
        }
        CostGraph { nodes: index, children, policy }
    }

    /// Nodes without a parent. Nodes whose parent id points nowhere are not
    /// roots and contribute nothing.
    pub fn roots(&self) -> Vec<&'a CostNode> {
        let mut roots: Vec<&CostNode> = self
            .nodes
            .values()
            .copied()
            .filter(|n| n.parent_id.is_none())
            .collect();
        roots.sort_by(|a, b| a.id.cmp(&b.id));
        roots
    }

    pub fn orphans(&self) -> Vec<&'a CostNode> {
        self.nodes
            .values()
            .copied()
            .filter(|n| matches!(n.parent_id.as_deref(), Some(p) if !self.nodes.contains_key(p)))
            .collect()
    }

    /// A node's own contribution, ignoring children.
    pub fn self_cost(&self, node: &CostNode) -> CostRange {
        let effective = self.policy.resolve(&node.cost).value.max(0.0);
        let actual = committed_cost(&node.cost);
        let min = if node.is_optional && actual == 0.0 { 0.0 } else { effective };
        CostRange::new(min, effective, actual)
    }

    /// Rolled-up range of the subtree rooted at `id`. Unknown ids are zero.
    pub fn roll_up_node(&self, id: &str) -> CostRange {
        let mut visiting = HashSet::new();
        self.roll(id, &mut visiting)
    }

    fn roll(&self, id: &str, visiting: &mut HashSet<String>) -> CostRange {
        let Some(node) = self.nodes.get(id).copied() else {
            debug!(node = id, "cost node not found, counting as zero");
            return CostRange::default();
        };
        if !visiting.insert(node.id.clone()) {
            debug!(node = id, "cycle in cost graph, counting as zero");
            return CostRange::default();
        }
        let children = self.children.get(id).map(Vec::as_slice).unwrap_or(&[]);
        let range = if node.is_choice_group && !children.is_empty() {
            self.roll_choice(node, children, visiting)
        } else {
            children
                .iter()
                .map(|c| self.roll(&c.id, visiting))
                .fold(self.self_cost(node), |acc, r| acc + r)
        };
        visiting.remove(&node.id);
        range
    }

    fn roll_choice(
        &self,
        node: &CostNode,
        children: &[&CostNode],
        visiting: &mut HashSet<String>,
    ) -> CostRange {
        if let Some(selected) = node.selected_child_id.as_deref() {
            if children.iter().any(|c| c.id == selected) {
                return self.roll(selected, visiting);
            }
            debug!(node = %node.id, selected, "selected alternative is not a child, ignoring it");
        }
        let ranges: Vec<CostRange> = children.iter().map(|c| self.roll(&c.id, visiting)).collect();
        let min = ranges.iter().map(|r| r.min).fold(f64::INFINITY, f64::min);
        let max = ranges.iter().map(|r| r.max).fold(0.0, f64::max);
        CostRange::new(min, max, 0.0)
    }
}

/// Roll up the given roots.
pub fn roll_up(root_ids: &[String], nodes: &[CostNode], policy: CostPolicy) -> CostRange {
    let graph = CostGraph::new(nodes, policy);
    root_ids.iter().map(|id| graph.roll_up_node(id)).sum()
}

/// Dashboard total: every root plus the flat miscellaneous expenses.
pub fn roll_up_all(nodes: &[CostNode], expenses: &[CostLayer], policy: CostPolicy) -> CostRange {
    let graph = CostGraph::new(nodes, policy);
    let orphans = graph.orphans();
    if !orphans.is_empty() {
        debug!(count = orphans.len(), "cost nodes with a missing parent are not counted");
    }
    let tree: CostRange = graph.roots().iter().map(|n| graph.roll_up_node(&n.id)).sum();
    let misc: CostRange = expenses
        .iter()
        .map(|e| {
            let effective = policy.resolve(e).value.max(0.0);
            CostRange::new(effective, effective, committed_cost(e))
        })
        .sum();
    tree + misc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::CostModel;

    fn node(id: &str, parent: Option<&str>, cost: CostLayer) -> CostNode {
        CostNode::new(id, parent.map(str::to_string), cost)
    }

    fn est(v: Money) -> CostLayer {
        CostLayer::estimated(v)
    }

    /// Two alternatives with min/max 100/150 and 80/200.
    fn choice_nodes() -> Vec<CostNode> {
        let mut group = node("versions", None, CostLayer::default());
        group.is_choice_group = true;
        let mut a_opt = node("a-extra", Some("a"), est(50.0));
        a_opt.is_optional = true;
        let mut b_opt = node("b-extra", Some("b"), est(120.0));
        b_opt.is_optional = true;
        vec![
            group,
            node("a", Some("versions"), CostLayer { actual: 100.0, ..est(90.0) }),
            a_opt,
            node("b", Some("versions"), est(80.0)),
            b_opt,
        ]
    }

    #[test]
    fn test_leaf() {
        let nodes = vec![node("t", None, CostLayer { quoted: 120.0, ..est(100.0) })];
        let r = roll_up(&["t".into()], &nodes, CostPolicy::default());
        assert_eq!(r, CostRange::new(120.0, 120.0, 0.0));
    }

    #[test]
    fn test_optional_leaf_min_zero_until_paid() {
        let mut n = node("t", None, est(100.0));
        n.is_optional = true;
        let r = roll_up(&["t".into()], &[n.clone()], CostPolicy::default());
        assert_eq!(r, CostRange::new(0.0, 100.0, 0.0));

        n.cost.paid = 90.0;
        let r = roll_up(&["t".into()], &[n], CostPolicy::default());
        assert_eq!(r, CostRange::new(90.0, 90.0, 90.0));
    }

    #[test]
    fn test_internal_sums_children_and_self() {
        let nodes = vec![
            node("song", None, est(10.0)),
            node("mix", Some("song"), est(300.0)),
            node("master", Some("song"), CostLayer { actual: 120.0, ..est(100.0) }),
        ];
        let r = roll_up(&["song".into()], &nodes, CostPolicy::default());
        assert_eq!(r, CostRange::new(430.0, 430.0, 120.0));
    }

    #[test]
    fn test_choice_group_unselected() {
        let nodes = choice_nodes();
        let r = roll_up(&["versions".into()], &nodes, CostPolicy::default());
        assert_eq!(r, CostRange::new(80.0, 200.0, 0.0));
    }

    #[test]
    fn test_choice_group_selected() {
        let mut nodes = choice_nodes();
        nodes[0].selected_child_id = Some("a".into());
        let graph = CostGraph::new(&nodes, CostPolicy::default());
        let a = graph.roll_up_node("a");
        assert_eq!(a, CostRange::new(100.0, 150.0, 100.0));
        assert_eq!(graph.roll_up_node("versions"), a);
    }

    #[test]
    fn test_choice_group_bad_selection_is_ignored() {
        let mut nodes = choice_nodes();
        nodes[0].selected_child_id = Some("zzz".into());
        let r = roll_up(&["versions".into()], &nodes, CostPolicy::default());
        assert_eq!(r, CostRange::new(80.0, 200.0, 0.0));
    }

    #[test]
    fn test_orphans_and_unknown_roots() {
        let nodes = vec![node("a", None, est(10.0)), node("lost", Some("gone"), est(999.0))];
        let r = roll_up_all(&nodes, &[], CostPolicy::default());
        assert_eq!(r, CostRange::new(10.0, 10.0, 0.0));
        assert_eq!(roll_up(&["gone".into()], &nodes, CostPolicy::default()), CostRange::default());
    }

    #[test]
    fn test_cycle_does_not_hang() {
        let nodes = vec![node("a", Some("b"), est(1.0)), node("b", Some("a"), est(2.0))];
        let r = roll_up(&["a".into()], &nodes, CostPolicy::default());
        assert_eq!(r, CostRange::new(3.0, 3.0, 0.0));
    }

    #[test]
    fn test_repeated_id_counts_once() {
        let nodes = vec![
            node("song", None, est(10.0)),
            node("mix", Some("song"), est(100.0)),
            node("mix", Some("song"), est(300.0)),
        ];
        let r = roll_up_all(&nodes, &[], CostPolicy::default());
        assert_eq!(r, CostRange::new(110.0, 110.0, 0.0));
    }

    #[test]
    fn test_roll_up_all_adds_expenses() {
        let nodes = vec![node("a", None, est(10.0)), node("b", None, est(5.0))];
        let expenses = vec![CostLayer { estimated: 40.0, paid: 25.0, ..Default::default() }];
        let r = roll_up_all(&nodes, &expenses, CostPolicy::default());
        assert_eq!(r, CostRange::new(40.0, 40.0, 25.0));
    }

    #[test]
    fn test_policy_changes_totals() {
        let nodes = vec![node("a", None, CostLayer { quoted: 20.0, ..est(10.0) })];
        let r = roll_up_all(&nodes, &[], CostPolicy::new(CostModel::EstimatedFirst, None));
        assert_eq!(r.max, 10.0);
    }

    #[test]
    fn test_from_task() {
        let mut t = Task::new("t", "Mix", "song");
        t.parent_id = Some("song".into());
        t.is_choice_group = true;
        let n = CostNode::from(&t);
        assert_eq!(n.parent_id.as_deref(), Some("song"));
        assert!(n.is_choice_group);
    }
}
