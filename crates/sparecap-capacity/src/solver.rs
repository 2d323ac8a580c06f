//! Capacity solver: the fewest relocations that make room for a node.
//!
//! When the fleet is down to zero spare hosts, the solver looks for a short
//! sequence of moves of *other* workload nodes that frees enough room on a
//! spare host for the node that could not be re-homed.
//!
//! The search is a memoized recursion:
//!
//! ```text
//! make_room_for(node, host, moves_considered, moves_made):
//!     if free(host, moves_made) satisfies node: done, no moves
//!     for each subset S of host's children (size <= max_subset_size):
//!         if free + resources(S) does not satisfy node: skip
//!         for each child c in S:
//!             for each other host t:
//!                 make_room_for(c, t, ...) then move c to t
//!     keep the shortest
//! ```
//!
//! Subset enumeration is bounded by `max_subset_size`, and hosts with more
//! children than `max_children_considered` (at most 31) are not searched at
//! all. Both bound the search rather than define correctness: a solution
//! outside them is simply not found.
//!
//! `max_iterations` bounds the running time. Every recursive call, every
//! subset tried and every destination tried costs one step, and once the
//! budget is spent each loop stops at its next step.

use std::collections::{BTreeSet, HashMap};

use sparecap_core::config::SolverConfig;
use sparecap_core::{Allocation, Hostname, Move, Node, NodeState};
use tracing::{debug, trace};

use crate::error::{CapacityError, CapacityResult};
use crate::resources::AllocationResources;
use crate::simulator::{try_allocate_node, violates_policy_with};
use crate::topology::{Topology, WorkingSet};

/// Hard ceiling on children taking part in subset enumeration.
pub const MAX_CHILDREN_CONSIDERED: usize = 31;

/// Tunables for the solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolverSettings {
    pub max_subset_size: usize,
    pub max_children_considered: usize,
    pub max_iterations: u64,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            max_subset_size: 5,
            max_children_considered: MAX_CHILDREN_CONSIDERED,
            max_iterations: 10_000,
        }
    }
}

impl From<&SolverConfig> for SolverSettings {
    fn from(config: &SolverConfig) -> Self {
        Self {
            max_subset_size: config.max_subset_size,
            max_children_considered: config.max_children_considered.min(MAX_CHILDREN_CONSIDERED),
            max_iterations: config.max_iterations,
        }
    }
}

/// A canonical set of moves. Free capacity depends only on which moves
/// were made, not on their order.
pub type MoveSet = BTreeSet<Move>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SolutionKey {
    node: Hostname,
    host: Hostname,
    considered: MoveSet,
    made: MoveSet,
}

/// Searches for relocation sequences over one topology snapshot.
///
/// Holds the memo table and the iteration budget; use a fresh solver per
/// analysis pass. Memoized solutions are only valid for the destination
/// hosts they were found with, so a call with a different host list starts
/// from an empty memo.
pub struct CapacitySolver<'t> {
    topology: &'t Topology,
    settings: SolverSettings,
    iterations: u64,
    /// Destination hosts the memo was built for.
    hosts: Vec<Hostname>,
    solutions: HashMap<SolutionKey, Option<Vec<Move>>>,
}

impl<'t> CapacitySolver<'t> {
    pub fn new(topology: &'t Topology, settings: SolverSettings) -> Self {
        Self {
            topology,
            settings,
            iterations: 0,
            hosts: Vec::new(),
            solutions: HashMap::new(),
        }
    }

    /// Search steps used so far.
    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    /// Take one search step. Returns `false` once the budget is spent.
    fn step(&mut self) -> bool {
        if self.iterations >= self.settings.max_iterations {
            return false;
        }
        self.iterations += 1;
        true
    }

    fn exhausted(&self) -> bool {
        self.iterations >= self.settings.max_iterations
    }

    /// Drop memoized solutions found for another destination host list.
    fn use_hosts(&mut self, hosts: &[&Node]) {
        if self.hosts.len() == hosts.len() && self.hosts.iter().zip(hosts).all(|(a, b)| *a == b.hostname) {
            return;
        }
        self.solutions.clear();
        self.hosts = hosts.iter().map(|h| h.hostname.clone()).collect();
    }

    /// Try every spare host as the place to make room for `node`, moving
    /// other nodes only onto `hosts`. Returns the shortest sequence found.
    pub fn find_mitigation(&mut self, node: &Node, spare_hosts: &[&Node], hosts: &[&Node]) -> Option<Vec<Move>> {
        self.use_hosts(hosts);
        let empty = MoveSet::new();
        let mut shortest: Option<Vec<Move>> = None;

        for spare in spare_hosts {
            if self.exhausted() {
                debug!(node = %node.hostname, iterations = self.iterations, "solver iteration budget exhausted");
                break;
            }
            let allocations = self.allocations_with(&empty, spare);
            if violates_policy_with(node, spare, &allocations) {
                debug!(node = %node.hostname, spare = %spare.hostname, "spare host violates placement policy");
                continue;
            }
            let Some(moves) = self.solve(node, spare, hosts, &empty, &empty) else {
                debug!(node = %node.hostname, spare = %spare.hostname, "no way to make room on spare host");
                continue;
            };
            debug!(
                node = %node.hostname,
                spare = %spare.hostname,
                moves = moves.len(),
                "found candidate mitigation"
            );
            if shortest.as_ref().is_none_or(|s| moves.len() < s.len()) {
                shortest = Some(moves);
            }
        }
        shortest
    }

    /// The shortest list of moves, in execution order, after which `host`
    /// has room for `node`, given that `moves_made` have already happened.
    ///
    /// The returned list holds only the new moves. `None` if no sequence
    /// was found within the search bounds.
    pub fn make_room_for(
        &mut self,
        node: &Node,
        host: &Node,
        hosts: &[&Node],
        moves_considered: &MoveSet,
        moves_made: &MoveSet,
    ) -> Option<Vec<Move>> {
        self.use_hosts(hosts);
        self.solve(node, host, hosts, moves_considered, moves_made)
    }

    fn solve(
        &mut self,
        node: &Node,
        host: &Node,
        hosts: &[&Node],
        moves_considered: &MoveSet,
        moves_made: &MoveSet,
    ) -> Option<Vec<Move>> {
        let key = SolutionKey {
            node: node.hostname.clone(),
            host: host.hostname.clone(),
            considered: moves_considered.clone(),
            made: moves_made.clone(),
        };
        if let Some(solution) = self.solutions.get(&key) {
            return solution.clone();
        }

        let solution = self.find_room_for(node, host, hosts, moves_considered, moves_made);
        self.solutions.insert(key, solution.clone());
        solution
    }

    fn find_room_for(
        &mut self,
        node: &Node,
        host: &Node,
        hosts: &[&Node],
        moves_considered: &MoveSet,
        moves_made: &MoveSet,
    ) -> Option<Vec<Move>> {
        if !self.step() {
            trace!(node = %node.hostname, host = %host.hostname, "solver iteration budget exhausted");
            return None;
        }

        let footprint = node.footprint();
        if !host.resources.satisfies(&footprint) {
            return None;
        }
        let required = AllocationResources::required_by(&footprint);
        let free = self.free_capacity_with(moves_made, host)?;
        if free.satisfies(&required) {
            return Some(Vec::new());
        }

        let topology = self.topology;
        let children: Vec<&Node> = topology
            .children_of(&host.hostname)
            .iter()
            .filter(|c| !moves_node(moves_made, c))
            .collect();
        if children.len() > self.settings.max_children_considered.min(MAX_CHILDREN_CONSIDERED) {
            trace!(host = %host.hostname, children = children.len(), "too many children for subset search");
            return None;
        }

        let mut shortest: Option<Vec<Move>> = None;
        let subsets = Subsets::new(
            &children,
            self.settings.max_subset_size,
            self.settings.max_children_considered,
        );
        for subset in subsets {
            if !self.step() {
                break;
            }
            // Every child in the subset costs at least one move.
            if shortest.as_ref().is_some_and(|s| subset.len() >= s.len()) {
                continue;
            }
            let freed = subset.iter().fold(free, |acc, c| {
                acc.add(&AllocationResources::required_by(&c.footprint()))
            });
            if !freed.satisfies(&required) {
                continue;
            }
            let Some(moves) = self.move_all(&subset, host, hosts, moves_considered, moves_made) else {
                continue;
            };
            if shortest.as_ref().is_none_or(|s| moves.len() < s.len()) {
                shortest = Some(moves);
            }
        }
        shortest
    }

    /// Move every node in `nodes` off `from`, one after another.
    fn move_all(
        &mut self,
        nodes: &[&Node],
        from: &Node,
        hosts: &[&Node],
        moves_considered: &MoveSet,
        moves_made: &MoveSet,
    ) -> Option<Vec<Move>> {
        let mut moves: Vec<Move> = Vec::new();
        for node in nodes {
            if self.exhausted() {
                return None;
            }
            let mut made = moves_made.clone();
            made.extend(moves.iter().cloned());
            let node_moves = self.move_node(node, from, hosts, moves_considered, &made)?;
            moves.extend(node_moves);
        }
        Some(moves)
    }

    /// The shortest way to move `node` from `from` to any other host.
    fn move_node(
        &mut self,
        node: &Node,
        from: &Node,
        hosts: &[&Node],
        moves_considered: &MoveSet,
        moves_made: &MoveSet,
    ) -> Option<Vec<Move>> {
        if moves_node(moves_considered, node) || moves_node(moves_made, node) {
            return None;
        }

        let mut shortest: Option<Vec<Move>> = None;
        for target in hosts {
            if !self.step() {
                break;
            }
            if target.hostname == from.hostname || !target.accepts_new_children() {
                continue;
            }
            // Hosts being cleared further up the search are off limits.
            if moves_considered.iter().any(|m| m.from == target.hostname) {
                continue;
            }
            let allocations = self.allocations_with(moves_made, target);
            if violates_policy_with(node, target, &allocations) {
                continue;
            }

            let mv = Move::new(&node.hostname, &from.hostname, &target.hostname);
            let mut considered = moves_considered.clone();
            considered.insert(mv.clone());

            let Some(mut moves) = self.solve(node, target, hosts, &considered, moves_made) else {
                continue;
            };
            if shortest.as_ref().is_none_or(|s| moves.len() + 1 < s.len()) {
                moves.push(mv);
                shortest = Some(moves);
            }
        }
        shortest
    }

    /// Free resources on `host` once `moves` have been applied.
    fn free_capacity_with(&self, moves: &MoveSet, host: &Node) -> Option<AllocationResources> {
        let mut free = *self.topology.available(&host.hostname)?;
        for mv in moves {
            let Some(moved) = self.topology.child(&mv.node) else {
                continue;
            };
            let required = AllocationResources::required_by(&moved.footprint());
            if mv.to == host.hostname {
                free = free.subtract(&required);
            }
            if mv.from == host.hostname {
                free = free.add(&required);
            }
        }
        Some(free)
    }

    /// Allocations on `host` once `moves` have been applied.
    fn allocations_with(&self, moves: &MoveSet, host: &Node) -> Vec<Allocation> {
        let moved_out = |child: &Node| {
            moves
                .iter()
                .any(|m| m.node == child.hostname && m.from == host.hostname)
        };
        let mut allocations: Vec<Allocation> = self
            .topology
            .children_of(&host.hostname)
            .iter()
            .filter(|c| !moved_out(c))
            .filter_map(|c| c.allocation.clone())
            .collect();

        allocations.extend(
            moves
                .iter()
                .filter(|m| m.to == host.hostname)
                .filter_map(|m| self.topology.child(&m.node))
                .filter_map(|n| n.allocation.clone()),
        );
        allocations
    }
}

fn moves_node(moves: &MoveSet, node: &Node) -> bool {
    moves.iter().any(|m| m.node == node.hostname)
}

/// The hosts that should be kept free as spares: active hosts with a free
/// IP, most free capacity first.
pub fn find_spare_hosts<'t>(topology: &Topology, candidates: &[&'t Node], count: usize) -> Vec<&'t Node> {
    let mut spares: Vec<(&Node, AllocationResources)> = candidates
        .iter()
        .filter(|h| h.state == NodeState::Active)
        .filter_map(|h| topology.available(&h.hostname).map(|a| (*h, *a)))
        .filter(|(_, available)| available.ips > 0)
        .collect();

    spares.sort_by(|(a, fa), (b, fb)| {
        fb.resources
            .compare_size(&fa.resources)
            .then_with(|| a.hostname.cmp(&b.hostname))
    });
    spares.into_iter().take(count).map(|(h, _)| h).collect()
}

/// Replay `moves` in order on a private copy of the snapshot.
///
/// Each move is placed through the simulator with its destination as the
/// only candidate, so capacity and policy are checked exactly as during
/// analysis. Fails on the first move that does not fit.
pub fn apply_moves(topology: &Topology, moves: &[Move]) -> CapacityResult<WorkingSet> {
    let mut working = topology.working_set();

    for mv in moves {
        let invalid = |reason: String| CapacityError::InvalidMove {
            node: mv.node.clone(),
            reason,
        };

        let node = topology
            .child(&mv.node)
            .ok_or_else(|| invalid("not a workload node in this snapshot".to_string()))?;
        if node.parent_hostname.as_deref() != Some(mv.from.as_str()) {
            return Err(invalid(format!("not placed on {}", mv.from)));
        }
        let target = topology
            .host(&mv.to)
            .ok_or_else(|| invalid(format!("unknown destination {}", mv.to)))?;

        if try_allocate_node(node, &[target], &mut working).is_none() {
            return Err(invalid(format!("no room on {}", mv.to)));
        }
        release(&mut working, node, &mv.from);
    }
    Ok(working)
}

/// Give back what `node` held on `host`.
fn release(working: &mut WorkingSet, node: &Node, host: &str) {
    let required = AllocationResources::required_by(&node.footprint());
    if let Some(available) = working.resources.get_mut(host) {
        *available = available.add(&required);
    }
    if let Some(allocation) = &node.allocation
        && let Some(allocations) = working.allocations.get_mut(host)
        && let Some(i) = allocations.iter().position(|a| a == allocation)
    {
        allocations.remove(i);
    }
}

/// Subsets of up to `max_size` items, in increasing bitmask order over the
/// first `max_items` items. The empty set is skipped.
struct Subsets<'a, T> {
    items: &'a [T],
    max_size: u32,
    mask: u64,
    end: u64,
}

impl<'a, T: Copy> Subsets<'a, T> {
    fn new(items: &'a [T], max_size: usize, max_items: usize) -> Self {
        let len = items.len().min(max_items).min(MAX_CHILDREN_CONSIDERED);
        let items = &items[..len];
        Self {
            items,
            max_size: max_size.min(64) as u32,
            mask: 0,
            end: 1u64 << len,
        }
    }
}

impl<T: Copy> Iterator for Subsets<'_, T> {
    type Item = Vec<T>;

    fn next(&mut self) -> Option<Vec<T>> {
        if self.max_size == 0 || self.mask >= self.end {
            return None;
        }

        let mut mask = self.mask + 1;
        // Adding the lowest set bit skips every mask in between, all of
        // which have at least as many bits set.
        while mask.count_ones() > self.max_size {
            mask += mask & mask.wrapping_neg();
        }
        self.mask = mask;
        if mask >= self.end {
            return None;
        }

        Some(
            (0..self.items.len())
                .filter(|i| mask & (1u64 << i) != 0)
                .map(|i| self.items[i])
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sparecap_core::{ApplicationId, Architecture, ClusterKind, ClusterSpec, NodeResources};

    fn resources(vcpu: f64) -> NodeResources {
        NodeResources::new(vcpu, vcpu * 4.0, vcpu * 10.0)
    }

    fn host(hostname: &str, vcpu: f64) -> Node {
        Node::host(hostname, resources(vcpu)).with_ip_pool((0..4).map(|i| format!("{hostname}-ip{i}")))
    }

    fn child(hostname: &str, parent: &str, app: &str, vcpu: f64) -> Node {
        Node::child(hostname, parent, resources(vcpu))
            .with_primary_ips([format!("{parent}-ip-{hostname}")])
            .with_allocation(Allocation {
                owner: ApplicationId::new("t", app, "default"),
                cluster: ClusterSpec::new(ClusterKind::Container, "c"),
                requested: resources(vcpu),
                retired: false,
            })
    }

    fn names(moves: &[Move]) -> Vec<String> {
        moves.iter().map(|m| format!("{}:{}->{}", m.node, m.from, m.to)).collect()
    }

    #[test]
    fn subsets_follow_bitmask_order() {
        let items = ['a', 'b', 'c'];
        let subsets: Vec<String> = Subsets::new(&items, 2, 31)
            .map(|s| s.into_iter().collect())
            .collect();
        assert_eq!(subsets, vec!["a", "b", "ab", "c", "ac", "bc"]);
    }

    #[test]
    fn subsets_respect_item_limit() {
        let items: Vec<usize> = (0..40).collect();
        let max = Subsets::new(&items, 1, 100).map(|s| s[0]).max();
        assert_eq!(max, Some(30));

        let limited: Vec<usize> = Subsets::new(&items, 1, 3).map(|s| s[0]).collect();
        assert_eq!(limited, vec![0, 1, 2]);
    }

    #[test]
    fn subsets_of_size_zero_are_empty() {
        let items = [1, 2, 3];
        assert_eq!(Subsets::new(&items, 0, 31).count(), 0);
    }

    #[test]
    fn no_moves_when_room_exists() {
        let nodes = vec![host("h1", 8.0), child("a", "h1", "a", 2.0)];
        let topology = Topology::build(&nodes).unwrap();
        let mut solver = CapacitySolver::new(&topology, SolverSettings::default());
        let n = child("n", "gone", "n", 6.0);

        let moves = solver.make_room_for(&n, &nodes[0], &[], &MoveSet::new(), &MoveSet::new());
        assert_eq!(moves, Some(Vec::new()));
    }

    #[test]
    fn host_too_small_is_hopeless() {
        let nodes = vec![host("h1", 4.0), host("h2", 16.0)];
        let topology = Topology::build(&nodes).unwrap();
        let mut solver = CapacitySolver::new(&topology, SolverSettings::default());
        let n = child("n", "gone", "n", 6.0);

        let moves = solver.make_room_for(&n, &nodes[0], &[&nodes[1]], &MoveSet::new(), &MoveSet::new());
        assert!(moves.is_none());
    }

    #[test]
    fn respects_exclusivity_at_destination() {
        let nodes = vec![
            host("h1", 8.0),
            host("h2", 8.0),
            child("a", "h1", "a", 2.0),
            child("b", "h1", "b", 2.0),
            child("a2", "h2", "a", 1.0),
        ];
        let topology = Topology::build(&nodes).unwrap();
        let mut solver = CapacitySolver::new(&topology, SolverSettings::default());
        let n = child("n", "gone", "n", 6.0);

        let moves = solver
            .make_room_for(&n, &nodes[0], &[&nodes[1]], &MoveSet::new(), &MoveSet::new())
            .unwrap();
        assert_eq!(names(&moves), vec!["b:h1->h2"]);
    }

    #[test]
    fn chains_moves_to_make_room_downstream() {
        let arm = |vcpu: f64| resources(vcpu).with_architecture(Architecture::Arm64);
        let arm_child = |hostname: &str, app: &str| {
            Node::child(hostname, "h1", arm(2.0))
                .with_primary_ips([format!("h1-ip-{hostname}")])
                .with_allocation(Allocation {
                    owner: ApplicationId::new("t", app, "default"),
                    cluster: ClusterSpec::new(ClusterKind::Container, "c"),
                    requested: arm(2.0),
                    retired: false,
                })
        };
        let nodes = vec![
            Node::host("h1", arm(8.0)).with_ip_pool(["h1-ip0", "h1-ip1", "h1-ip2", "h1-ip3"]),
            Node::host("h2", arm(4.0)).with_ip_pool(["h2-ip0", "h2-ip1"]),
            Node::host("h3", resources(4.0).with_architecture(Architecture::X86_64))
                .with_ip_pool(["h3-ip0", "h3-ip1"]),
            arm_child("a", "a"),
            arm_child("b", "b"),
            child("c", "h2", "c", 3.0),
        ];
        let topology = Topology::build(&nodes).unwrap();
        let mut solver = CapacitySolver::new(&topology, SolverSettings::default());
        let n = child("n", "gone", "n", 6.0);
        let hosts = vec![&nodes[1], &nodes[2]];

        let moves = solver
            .make_room_for(&n, &nodes[0], &hosts, &MoveSet::new(), &MoveSet::new())
            .unwrap();
        assert_eq!(names(&moves), vec!["c:h2->h3", "a:h1->h2"]);

        let working = apply_moves(&topology, &moves).unwrap();
        let required = AllocationResources::required_by(&n.footprint());
        assert!(working.available("h1").unwrap().satisfies(&required));
    }

    #[test]
    fn crowded_host_is_not_searched() {
        let nodes = vec![host("h1", 8.0), host("h2", 8.0), child("a", "h1", "a", 2.0), child("b", "h1", "b", 2.0)];
        let topology = Topology::build(&nodes).unwrap();
        let settings = SolverSettings {
            max_children_considered: 1,
            ..SolverSettings::default()
        };
        let mut solver = CapacitySolver::new(&topology, settings);
        let n = child("n", "gone", "n", 6.0);

        assert!(
            solver
                .make_room_for(&n, &nodes[0], &[&nodes[1]], &MoveSet::new(), &MoveSet::new())
                .is_none()
        );
    }

    #[test]
    fn iteration_budget_stops_the_search() {
        let nodes = vec![host("h1", 8.0), host("h2", 4.0), child("a", "h1", "a", 2.0), child("b", "h1", "b", 2.0)];
        let topology = Topology::build(&nodes).unwrap();
        let settings = SolverSettings {
            max_iterations: 1,
            ..SolverSettings::default()
        };
        let mut solver = CapacitySolver::new(&topology, settings);
        let n = child("n", "gone", "n", 6.0);

        assert!(
            solver
                .make_room_for(&n, &nodes[0], &[&nodes[1]], &MoveSet::new(), &MoveSet::new())
                .is_none()
        );
    }

    /// `hosts` full hosts of 31 one-vcpu nodes each. With `shared_apps`
    /// every host runs the same applications, so every destination violates
    /// exclusivity.
    fn full_fleet(hosts: usize, shared_apps: bool) -> Vec<Node> {
        let mut nodes: Vec<Node> = (0..hosts).map(|h| host(&format!("h{h}"), 31.0)).collect();
        for h in 0..hosts {
            for i in 0..31 {
                let app = if shared_apps { format!("app{i}") } else { format!("app{h}-{i}") };
                nodes.push(child(&format!("h{h}-n{i}"), &format!("h{h}"), &app, 1.0));
            }
        }
        nodes
    }

    #[test]
    fn iteration_budget_bounds_search_of_full_fleet() {
        for shared_apps in [true, false] {
            let nodes = full_fleet(8, shared_apps);
            let topology = Topology::build(&nodes).unwrap();
            let settings = SolverSettings {
                max_iterations: 2_000,
                ..SolverSettings::default()
            };
            let mut solver = CapacitySolver::new(&topology, settings);
            let n = child("n", "gone", "n", 4.0);
            let spare = topology.host("h0").unwrap();
            let hosts: Vec<&Node> = topology.hosts().iter().skip(1).collect();

            let started = std::time::Instant::now();
            assert!(solver.find_mitigation(&n, &[spare], &hosts).is_none());
            assert_eq!(solver.iterations(), 2_000, "shared_apps={shared_apps}");
            assert!(started.elapsed() < std::time::Duration::from_secs(10));
        }
    }

    #[test]
    fn different_host_list_is_not_served_from_memo() {
        let nodes = vec![
            host("h1", 8.0),
            host("h2", 8.0),
            host("h3", 8.0),
            child("a", "h1", "a", 2.0),
            child("b", "h1", "b", 2.0),
        ];
        let topology = Topology::build(&nodes).unwrap();
        let mut solver = CapacitySolver::new(&topology, SolverSettings::default());
        let n = child("n", "gone", "n", 6.0);

        let onto_h2 = solver
            .make_room_for(&n, &nodes[0], &[&nodes[1]], &MoveSet::new(), &MoveSet::new())
            .unwrap();
        assert_eq!(names(&onto_h2), vec!["a:h1->h2"]);

        let onto_h3 = solver
            .make_room_for(&n, &nodes[0], &[&nodes[2]], &MoveSet::new(), &MoveSet::new())
            .unwrap();
        assert_eq!(names(&onto_h3), vec!["a:h1->h3"]);
    }

    #[test]
    fn memoizes_solutions() {
        let nodes = vec![host("h1", 8.0), host("h2", 4.0), child("a", "h1", "a", 2.0), child("b", "h1", "b", 2.0)];
        let topology = Topology::build(&nodes).unwrap();
        let mut solver = CapacitySolver::new(&topology, SolverSettings::default());
        let n = child("n", "gone", "n", 6.0);
        let hosts = vec![&nodes[1]];

        let first = solver.make_room_for(&n, &nodes[0], &hosts, &MoveSet::new(), &MoveSet::new());
        let used = solver.iterations();
        let second = solver.make_room_for(&n, &nodes[0], &hosts, &MoveSet::new(), &MoveSet::new());

        assert_eq!(first, second);
        assert_eq!(solver.iterations(), used);
    }

    #[test]
    fn mitigation_picks_shortest_spare() {
        let nodes = vec![
            host("s1", 8.0),
            host("s2", 8.0),
            host("t1", 8.0),
            child("a", "s1", "a", 2.0),
            child("b", "s1", "b", 2.0),
            child("c", "s1", "c", 2.0),
            child("d", "s2", "d", 3.0),
        ];
        let topology = Topology::build(&nodes).unwrap();
        let mut solver = CapacitySolver::new(&topology, SolverSettings::default());
        let n = child("n", "gone", "n", 6.0);

        let spares = vec![&nodes[0], &nodes[1]];
        let moves = solver.find_mitigation(&n, &spares, &[&nodes[2]]).unwrap();
        assert_eq!(names(&moves), vec!["d:s2->t1"]);
    }

    #[test]
    fn spare_hosts_are_the_emptiest_active_hosts() {
        let nodes = vec![
            host("full", 8.0),
            host("empty", 8.0),
            host("half", 8.0),
            host("ready", 16.0).with_state(NodeState::Ready),
            Node::host("no-ips", resources(32.0)),
            child("f1", "full", "a", 6.0),
            child("h1", "half", "a", 4.0),
        ];
        let topology = Topology::build(&nodes).unwrap();
        let candidates: Vec<&Node> = topology.hosts().iter().collect();

        let spares: Vec<&str> = find_spare_hosts(&topology, &candidates, 2)
            .iter()
            .map(|h| h.hostname.as_str())
            .collect();
        assert_eq!(spares, vec!["empty", "half"]);
    }

    #[test]
    fn apply_moves_rejects_move_without_room() {
        let nodes = vec![host("h1", 8.0), host("h2", 1.0), child("a", "h1", "a", 2.0)];
        let topology = Topology::build(&nodes).unwrap();

        let err = apply_moves(&topology, &[Move::new("a", "h1", "h2")]).unwrap_err();
        assert!(matches!(err, CapacityError::InvalidMove { .. }));

        let err = apply_moves(&topology, &[Move::new("a", "h2", "h1")]).unwrap_err();
        assert!(matches!(err, CapacityError::InvalidMove { ref reason, .. } if reason.contains("not placed")));
    }

    #[test]
    fn settings_clamp_children_considered() {
        let config = SolverConfig {
            max_subset_size: 3,
            max_children_considered: 64,
            max_iterations: 5,
        };
        let settings = SolverSettings::from(&config);
        assert_eq!(settings.max_children_considered, MAX_CHILDREN_CONSIDERED);
        assert_eq!(settings.max_subset_size, 3);
    }
}
