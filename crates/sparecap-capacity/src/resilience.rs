//! Resilience analyzer: how many hosts can the fleet lose?
//!
//! Finds the smallest prefix of a risk-ordered host list whose simultaneous
//! removal leaves some child with nowhere to go. The risk order comes from
//! a repeatability heuristic: the fewer times a host's children can be
//! evacuated onto the rest of the fleet in a row, the riskier the host.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::Serialize;
use sparecap_core::{Hostname, Node};
use sparecap_core::config::AnalyzerConfig;
use tracing::{debug, info};

use crate::diagnostics::{AllocationFailureReasonList, AllocationHistory, collate_failures};
use crate::error::{CapacityError, CapacityResult};
use crate::simulator::try_allocate;
use crate::topology::Topology;

/// Tunables for the analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckerSettings {
    /// Cap on back-to-back evacuations simulated per host.
    pub max_repeated_removals: u32,
}

impl Default for CheckerSettings {
    fn default() -> Self {
        Self {
            max_repeated_removals: 100,
        }
    }
}

impl From<&AnalyzerConfig> for CheckerSettings {
    fn from(config: &AnalyzerConfig) -> Self {
        Self {
            max_repeated_removals: config.max_repeated_removals,
        }
    }
}

/// Why removing a set of hosts could not be absorbed.
///
/// Both `host` and `tenant` are empty when there was no valid target host
/// left at all.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostRemovalFailure {
    pub host: Option<Hostname>,
    pub tenant: Option<Node>,
    pub failures: AllocationFailureReasonList,
}

impl HostRemovalFailure {
    pub fn none() -> Self {
        Self {
            host: None,
            tenant: None,
            failures: AllocationFailureReasonList::default(),
        }
    }

    pub fn create(host: &Node, tenant: &Node, failures: AllocationFailureReasonList) -> Self {
        Self {
            host: Some(host.hostname.clone()),
            tenant: Some(tenant.clone()),
            failures,
        }
    }
}

impl fmt::Display for HostRemovalFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (Some(host), Some(tenant)) = (&self.host, &self.tenant) else {
            return write!(f, "No removal candidates exists.");
        };
        write!(
            f,
            "Failure to remove host {}\n\tNo new host found for tenant {}:\n\t\tSingular Reasons: {}\n\t\tTotal Reasons:    {}",
            host,
            tenant.hostname,
            self.failures.singular_reason_failures(),
            self.failures,
        )
    }
}

/// The hosts whose loss cannot be absorbed, and what broke.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostFailurePath {
    pub hosts_causing_failure: Vec<Hostname>,
    pub failure: HostRemovalFailure,
    /// Placements simulated for the failing removal set.
    pub history: AllocationHistory,
}

impl HostFailurePath {
    /// How many hosts can be lost without re-homing becoming impossible.
    pub fn spare_host_capacity(&self) -> usize {
        self.hosts_causing_failure.len().saturating_sub(1)
    }
}

/// Answers host-loss questions about one topology snapshot.
pub struct CapacityChecker<'t> {
    topology: &'t Topology,
    settings: CheckerSettings,
}

impl<'t> CapacityChecker<'t> {
    pub fn new(topology: &'t Topology, settings: CheckerSettings) -> Self {
        Self { topology, settings }
    }

    pub fn topology(&self) -> &'t Topology {
        self.topology
    }

    pub fn overcommitted_hosts(&self) -> Vec<&'t Node> {
        self.topology.overcommitted_hosts()
    }

    /// The smallest set of hosts, in removal-priority order, whose loss
    /// cannot be absorbed. `None` for an empty fleet.
    pub fn worst_case_host_loss_leading_to_failure(&self) -> CapacityResult<Option<HostFailurePath>> {
        let hosts = self.topology.hosts();
        if hosts.is_empty() {
            return Ok(None);
        }

        let priority = self.removal_priority();
        for i in 1..=priority.len() {
            let to_remove = &priority[..i];
            if let Some((failure, history)) = self.removal_failure(to_remove) {
                let path = HostFailurePath {
                    hosts_causing_failure: to_remove.iter().map(|h| h.hostname.clone()).collect(),
                    failure,
                    history,
                };
                info!(
                    hosts = path.hosts_causing_failure.len(),
                    spare_host_capacity = path.spare_host_capacity(),
                    "found host failure path"
                );
                return Ok(Some(path));
            }
            debug!(removed = i, "fleet absorbs host removal");
        }

        Err(CapacityError::NoFailurePath(hosts.len()))
    }

    /// Whether losing exactly the named hosts can be absorbed.
    ///
    /// Returns the failure if not, `None` if every child finds a new home.
    pub fn find_host_removal_failure(&self, hostnames: &[String]) -> CapacityResult<Option<HostFailurePath>> {
        let to_remove = self.topology.hosts_from_hostnames(hostnames)?;
        Ok(self
            .removal_failure(&to_remove)
            .map(|(failure, history)| HostFailurePath {
                hosts_causing_failure: hostnames.to_vec(),
                failure,
                history,
            }))
    }

    /// Hosts ordered from most to least likely to cause trouble when lost.
    ///
    /// Fewest repeated removals first; among equals, the largest host
    /// first, then by hostname.
    pub fn removal_priority(&self) -> Vec<&'t Node> {
        let removals = self.repeated_removals();
        let mut hosts: Vec<&Node> = self.topology.hosts().iter().collect();
        hosts.sort_by(|a, b| {
            removals[&a.hostname]
                .cmp(&removals[&b.hostname])
                .then_with(|| b.resources.compare_size(&a.resources))
                .then_with(|| a.hostname.cmp(&b.hostname))
        });
        hosts
    }

    /// For each host, how many times in a row its children can be moved
    /// onto the other hosts before one of them no longer fits.
    ///
    /// Hosts without children are never a risk and get `u32::MAX`.
    pub fn repeated_removals(&self) -> BTreeMap<Hostname, u32> {
        let hosts = self.topology.hosts();
        let mut removals = BTreeMap::new();

        for host in hosts {
            let children = self.topology.children_of(&host.hostname);
            if children.is_empty() {
                removals.insert(host.hostname.clone(), u32::MAX);
                continue;
            }

            let targets: Vec<&Node> = hosts.iter().filter(|h| h.hostname != host.hostname).collect();
            let mut working = self.topology.working_set();
            let mut times = 0;
            while times < self.settings.max_repeated_removals
                && try_allocate(children, &targets, &mut working, None).is_none()
            {
                times += 1;
            }

            debug!(host = %host.hostname, times, "repeated removals");
            removals.insert(host.hostname.clone(), times);
        }
        removals
    }

    /// Simulate losing `to_remove` at once. Does not touch the snapshot.
    fn removal_failure(&self, to_remove: &[&Node]) -> Option<(HostRemovalFailure, AllocationHistory)> {
        let removed: HashSet<&str> = to_remove.iter().map(|h| h.hostname.as_str()).collect();
        let targets: Vec<&Node> = self
            .topology
            .hosts()
            .iter()
            .filter(|h| !removed.contains(h.hostname.as_str()))
            .filter(|h| h.accepts_new_children())
            .collect();

        let mut history = AllocationHistory::default();
        if targets.is_empty() {
            return Some((HostRemovalFailure::none(), history));
        }

        let mut working = self.topology.working_set();
        for host in to_remove {
            let children = self.topology.children_of(&host.hostname);
            if let Some(unplaced) = try_allocate(children, &targets, &mut working, Some(&mut history)) {
                let failures = collate_failures(unplaced, &targets, &working);
                debug!(
                    host = %host.hostname,
                    tenant = %unplaced.hostname,
                    "child could not be re-homed"
                );
                return Some((HostRemovalFailure::create(host, unplaced, failures), history));
            }
        }
        None
    }
}
