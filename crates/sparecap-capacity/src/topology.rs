//! Topology snapshot: hosts, their children and what is left on each.
//!
//! Built once per analysis pass from a flat node list. The snapshot itself
//! is never mutated; simulations work on a [`WorkingSet`] copied out of it.

use std::collections::{BTreeMap, HashMap, HashSet};

use sparecap_core::{Allocation, Hostname, Node};
use tracing::debug;

use crate::error::{CapacityError, CapacityResult};
use crate::resources::AllocationResources;

/// Host → resources still available.
pub type ResourceMap = BTreeMap<Hostname, AllocationResources>;

/// Host → allocations placed on it.
pub type AllocationMap = BTreeMap<Hostname, Vec<Allocation>>;

/// Read-only view of the fleet for one analysis pass.
#[derive(Debug, Clone)]
pub struct Topology {
    hosts: Vec<Node>,
    host_index: HashMap<Hostname, usize>,
    children: BTreeMap<Hostname, Vec<Node>>,
    /// Child hostname → parent hostname.
    parents: HashMap<Hostname, Hostname>,
    available: ResourceMap,
}

impl Topology {
    /// Build the snapshot from every node in the inventory.
    ///
    /// Only nodes in a relevant state take part. A workload node whose
    /// parent is absent from `nodes` altogether is rejected; one whose
    /// parent is present but irrelevant is skipped.
    pub fn build(nodes: &[Node]) -> CapacityResult<Self> {
        let all_hostnames: HashSet<&str> = nodes.iter().map(|n| n.hostname.as_str()).collect();

        let hosts: Vec<Node> = nodes
            .iter()
            .filter(|n| n.is_host() && n.state.is_relevant())
            .cloned()
            .collect();
        let host_index: HashMap<Hostname, usize> = hosts
            .iter()
            .enumerate()
            .map(|(i, h)| (h.hostname.clone(), i))
            .collect();

        let mut children: BTreeMap<Hostname, Vec<Node>> = hosts
            .iter()
            .map(|h| (h.hostname.clone(), Vec::new()))
            .collect();
        let mut parents = HashMap::new();

        for node in nodes.iter().filter(|n| n.state.is_relevant()) {
            let Some(parent) = &node.parent_hostname else {
                continue;
            };
            match children.get_mut(parent) {
                Some(group) => {
                    group.push(node.clone());
                    parents.insert(node.hostname.clone(), parent.clone());
                }
                None if all_hostnames.contains(parent.as_str()) => {
                    debug!(
                        node = %node.hostname,
                        parent = %parent,
                        "skipping child of host outside capacity analysis"
                    );
                }
                None => {
                    return Err(CapacityError::UnknownParent {
                        node: node.hostname.clone(),
                        parent: parent.clone(),
                    });
                }
            }
        }

        let available = hosts
            .iter()
            .map(|host| {
                let pool: HashSet<&str> = host.ip_pool.iter().map(String::as_str).collect();
                let mut free = host.resources;
                let mut occupied_ips = 0usize;
                for child in &children[&host.hostname] {
                    free = free.subtract(&child.footprint().numbers_only());
                    occupied_ips += child
                        .primary_ips
                        .iter()
                        .filter(|ip| pool.contains(ip.as_str()))
                        .count();
                }
                let ips = pool.len() as i64 - occupied_ips as i64;
                (host.hostname.clone(), AllocationResources::new(free, ips))
            })
            .collect();

        Ok(Self {
            hosts,
            host_index,
            children,
            parents,
            available,
        })
    }

    /// All hosts, in inventory order.
    pub fn hosts(&self) -> &[Node] {
        &self.hosts
    }

    pub fn host(&self, hostname: &str) -> Option<&Node> {
        self.host_index.get(hostname).map(|&i| &self.hosts[i])
    }

    /// Children of `hostname`, in inventory order. Unknown hosts have none.
    pub fn children_of(&self, hostname: &str) -> &[Node] {
        self.children.get(hostname).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Look up a workload node by hostname.
    pub fn child(&self, hostname: &str) -> Option<&Node> {
        let parent = self.parents.get(hostname)?;
        self.children_of(parent)
            .iter()
            .find(|c| c.hostname == hostname)
    }

    pub fn available(&self, hostname: &str) -> Option<&AllocationResources> {
        self.available.get(hostname)
    }

    /// Hosts whose children use more than the host has in any numeric
    /// dimension.
    pub fn overcommitted_hosts(&self) -> Vec<&Node> {
        self.hosts
            .iter()
            .filter(|h| {
                self.available
                    .get(&h.hostname)
                    .is_some_and(|a| a.resources.is_negative())
            })
            .collect()
    }

    /// Resolve hostnames to hosts, failing on the first unknown name.
    pub fn hosts_from_hostnames(&self, hostnames: &[String]) -> CapacityResult<Vec<&Node>> {
        hostnames
            .iter()
            .map(|name| {
                self.host(name)
                    .ok_or_else(|| CapacityError::UnknownHost(name.clone()))
            })
            .collect()
    }

    /// Allocations currently placed on each host.
    pub fn contained_allocations(&self) -> AllocationMap {
        self.children
            .iter()
            .map(|(host, children)| {
                let allocations = children
                    .iter()
                    .filter_map(|c| c.allocation.clone())
                    .collect();
                (host.clone(), allocations)
            })
            .collect()
    }

    /// A fresh private copy of the mutable state a simulation works on.
    pub fn working_set(&self) -> WorkingSet {
        WorkingSet {
            resources: self.available.clone(),
            allocations: self.contained_allocations(),
        }
    }
}

/// Mutable copy of free resources and placed allocations.
///
/// Each simulation owns its working set, so alternative branches of a
/// search never observe each other's placements.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkingSet {
    pub resources: ResourceMap,
    pub allocations: AllocationMap,
}

impl WorkingSet {
    pub fn available(&self, hostname: &str) -> Option<&AllocationResources> {
        self.resources.get(hostname)
    }

    pub fn allocations_on(&self, hostname: &str) -> &[Allocation] {
        self.allocations
            .get(hostname)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sparecap_core::{NodeResources, NodeState};

    fn fleet() -> Vec<Node> {
        vec![
            Node::host("h1", NodeResources::new(8.0, 32.0, 200.0))
                .with_ip_pool(["10.0.0.1", "10.0.0.2", "10.0.0.3"]),
            Node::host("h2", NodeResources::new(4.0, 16.0, 100.0)).with_ip_pool(["10.0.1.1"]),
            Node::child("n1", "h1", NodeResources::new(2.0, 8.0, 50.0)).with_primary_ips(["10.0.0.1"]),
            Node::child("n2", "h1", NodeResources::new(3.0, 4.0, 20.0))
                .with_primary_ips(["10.0.0.2", "192.168.0.9"]),
        ]
    }

    #[test]
    fn groups_children_and_computes_available() {
        let topology = Topology::build(&fleet()).unwrap();

        assert_eq!(topology.hosts().len(), 2);
        assert_eq!(topology.children_of("h1").len(), 2);
        assert!(topology.children_of("h2").is_empty());

        let h1 = topology.available("h1").unwrap();
        assert_eq!(h1.resources.vcpu, 3.0);
        assert_eq!(h1.resources.memory_gb, 20.0);
        assert_eq!(h1.resources.disk_gb, 130.0);
        // Only addresses drawn from the host pool count as occupied.
        assert_eq!(h1.ips, 1);

        assert_eq!(topology.available("h2").unwrap().ips, 1);
    }

    #[test]
    fn build_is_deterministic() {
        let a = Topology::build(&fleet()).unwrap();
        let b = Topology::build(&fleet()).unwrap();
        assert_eq!(a.working_set(), b.working_set());
    }

    #[test]
    fn unknown_parent_is_rejected() {
        let mut nodes = fleet();
        nodes.push(Node::child("orphan", "h9", NodeResources::new(1.0, 1.0, 1.0)));

        let err = Topology::build(&nodes).unwrap_err();
        assert!(matches!(err, CapacityError::UnknownParent { ref parent, .. } if parent == "h9"));
    }

    #[test]
    fn irrelevant_nodes_are_ignored() {
        let mut nodes = fleet();
        nodes.push(Node::host("h3", NodeResources::new(4.0, 16.0, 100.0)).with_state(NodeState::Failed));
        nodes.push(Node::child("n3", "h3", NodeResources::new(1.0, 1.0, 1.0)));
        nodes.push(
            Node::child("n4", "h2", NodeResources::new(1.0, 1.0, 1.0)).with_state(NodeState::Parked),
        );

        let topology = Topology::build(&nodes).unwrap();
        assert!(topology.host("h3").is_none());
        assert!(topology.child("n3").is_none());
        assert!(topology.children_of("h2").is_empty());
    }

    #[test]
    fn detects_overcommitted_host() {
        let nodes = vec![
            Node::host("h1", NodeResources::new(8.0, 32.0, 200.0)),
            Node::child("a", "h1", NodeResources::new(6.0, 8.0, 50.0)),
            Node::child("b", "h1", NodeResources::new(4.0, 8.0, 50.0)),
        ];
        let topology = Topology::build(&nodes).unwrap();

        assert_eq!(topology.available("h1").unwrap().resources.vcpu, -2.0);
        let over: Vec<&str> = topology
            .overcommitted_hosts()
            .iter()
            .map(|h| h.hostname.as_str())
            .collect();
        assert_eq!(over, vec!["h1"]);
    }

    #[test]
    fn resolves_hostnames() {
        let topology = Topology::build(&fleet()).unwrap();

        let hosts = topology
            .hosts_from_hostnames(&["h2".to_string(), "h1".to_string()])
            .unwrap();
        assert_eq!(hosts[0].hostname, "h2");

        assert!(matches!(
            topology.hosts_from_hostnames(&["nope".to_string()]),
            Err(CapacityError::UnknownHost(_))
        ));
    }

    #[test]
    fn finds_child_by_hostname() {
        let topology = Topology::build(&fleet()).unwrap();
        assert_eq!(topology.child("n2").unwrap().parent_hostname.as_deref(), Some("h1"));
        assert!(topology.child("h1").is_none());
    }
}
