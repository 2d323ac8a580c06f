//! Allocation simulator: greedy first-fit re-homing of workload nodes.
//!
//! Nodes are placed in the order given, each on the first candidate host
//! (in the caller's order) that passes the placement policy and has room.
//! There is no backtracking, and a failure does not roll back the
//! placements already made in the same call.

use sparecap_core::{Allocation, Node};
use tracing::trace;

use crate::diagnostics::AllocationHistory;
use crate::resources::AllocationResources;
use crate::topology::WorkingSet;

/// Whether placing `node` on `host` breaks the reservation or exclusivity
/// policy, given what the working set already has on that host.
pub fn violates_policy(node: &Node, host: &Node, working: &WorkingSet) -> bool {
    violates_policy_with(node, host, working.allocations_on(&host.hostname))
}

/// Policy check against an explicit list of allocations on `host`.
///
/// Unallocated nodes have no owner and never violate.
pub fn violates_policy_with(node: &Node, host: &Node, allocations: &[Allocation]) -> bool {
    let Some(allocation) = &node.allocation else {
        return false;
    };

    if let Some(tenant) = &host.reserved_to
        && *tenant != allocation.owner.tenant
    {
        return true;
    }

    allocations
        .iter()
        .any(|a| a.owner == allocation.owner && a.cluster.overlaps(&allocation.cluster))
}

/// Try to place every node in `nodes` on one of `hosts`.
///
/// Returns the first node that could not be placed. Successful placements
/// are charged to `working`, which the caller owns and may discard.
pub fn try_allocate<'a, I>(
    nodes: I,
    hosts: &[&Node],
    working: &mut WorkingSet,
    mut history: Option<&mut AllocationHistory>,
) -> Option<&'a Node>
where
    I: IntoIterator<Item = &'a Node>,
{
    for node in nodes {
        let eligible = if history.is_some() {
            eligible_hosts(node, hosts, working)
        } else {
            0
        };

        let placed = try_allocate_node(node, hosts, working);

        if let Some(h) = history.as_deref_mut() {
            h.record(node, placed.map(|p| p.hostname.as_str()), eligible);
        }
        if placed.is_none() {
            return Some(node);
        }
    }
    None
}

/// Place a single node, returning the host it landed on.
pub fn try_allocate_node<'h>(
    node: &Node,
    hosts: &[&'h Node],
    working: &mut WorkingSet,
) -> Option<&'h Node> {
    let required = AllocationResources::required_by(&node.footprint());

    for &host in hosts {
        if violates_policy(node, host, working) {
            continue;
        }
        let Some(available) = working.resources.get_mut(&host.hostname) else {
            continue;
        };
        if !available.satisfies(&required) {
            continue;
        }

        *available = available.subtract(&required);
        if let Some(allocation) = &node.allocation {
            working
                .allocations
                .entry(host.hostname.clone())
                .or_default()
                .push(allocation.clone());
        }
        trace!(node = %node.hostname, host = %host.hostname, "simulated placement");
        return Some(host);
    }
    None
}

/// Number of hosts that would currently accept `node`.
fn eligible_hosts(node: &Node, hosts: &[&Node], working: &WorkingSet) -> usize {
    let required = AllocationResources::required_by(&node.footprint());
    hosts
        .iter()
        .filter(|h| {
            !violates_policy(node, h, working)
                && working
                    .available(&h.hostname)
                    .is_some_and(|a| a.satisfies(&required))
        })
        .count()
}
