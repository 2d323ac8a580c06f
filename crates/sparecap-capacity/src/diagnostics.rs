//! Failure diagnostics: why each candidate host rejected a node.
//!
//! Pure classification used for operator-facing reports when a node could
//! not be re-homed anywhere.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;
use sparecap_core::{Hostname, Node, NodeResources};

use crate::simulator::violates_policy;
use crate::topology::WorkingSet;

/// The reasons one host rejected a node. Flags are independent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AllocationFailureReason {
    pub host: Hostname,
    pub insufficient_vcpu: bool,
    pub insufficient_memory: bool,
    pub insufficient_disk: bool,
    pub incompatible_disk_speed: bool,
    pub incompatible_storage_type: bool,
    pub incompatible_architecture: bool,
    pub insufficient_ips: bool,
    pub violates_policy: bool,
}

impl AllocationFailureReason {
    fn flags(&self) -> [(bool, &'static str); 8] {
        [
            (self.insufficient_vcpu, "insufficientVcpu"),
            (self.insufficient_memory, "insufficientMemoryGb"),
            (self.insufficient_disk, "insufficientDiskGb"),
            (self.incompatible_disk_speed, "incompatibleDiskSpeed"),
            (self.incompatible_storage_type, "incompatibleStorageType"),
            (self.incompatible_architecture, "incompatibleArchitecture"),
            (self.insufficient_ips, "insufficientAvailableIps"),
            (self.violates_policy, "violatesParentHostPolicy"),
        ]
    }

    pub fn reason_count(&self) -> usize {
        self.flags().iter().filter(|(set, _)| *set).count()
    }
}

impl fmt::Display for AllocationFailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reasons: Vec<&str> = self
            .flags()
            .iter()
            .filter(|(set, _)| *set)
            .map(|(_, name)| *name)
            .collect();
        write!(f, "[{}]", reasons.join(", "))
    }
}

/// Rejection reasons across a set of hosts, with tallies per reason.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AllocationFailureReasonList {
    pub reasons: Vec<AllocationFailureReason>,
}

impl AllocationFailureReasonList {
    pub fn new(reasons: Vec<AllocationFailureReason>) -> Self {
        Self { reasons }
    }

    fn count(&self, flag: impl Fn(&AllocationFailureReason) -> bool) -> usize {
        self.reasons.iter().filter(|r| flag(r)).count()
    }

    pub fn insufficient_vcpu(&self) -> usize {
        self.count(|r| r.insufficient_vcpu)
    }

    pub fn insufficient_memory(&self) -> usize {
        self.count(|r| r.insufficient_memory)
    }

    pub fn insufficient_disk(&self) -> usize {
        self.count(|r| r.insufficient_disk)
    }

    pub fn incompatible_disk_speed(&self) -> usize {
        self.count(|r| r.incompatible_disk_speed)
    }

    pub fn incompatible_storage_type(&self) -> usize {
        self.count(|r| r.incompatible_storage_type)
    }

    pub fn incompatible_architecture(&self) -> usize {
        self.count(|r| r.incompatible_architecture)
    }

    pub fn insufficient_ips(&self) -> usize {
        self.count(|r| r.insufficient_ips)
    }

    pub fn violates_policy(&self) -> usize {
        self.count(|r| r.violates_policy)
    }

    /// Hosts that rejected the node for exactly one reason.
    pub fn singular_reason_failures(&self) -> Self {
        Self::new(
            self.reasons
                .iter()
                .filter(|r| r.reason_count() == 1)
                .cloned()
                .collect(),
        )
    }

    /// Hosts that rejected the node for more than one reason.
    pub fn multiple_reason_failures(&self) -> Self {
        Self::new(
            self.reasons
                .iter()
                .filter(|r| r.reason_count() > 1)
                .cloned()
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.reasons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reasons.is_empty()
    }
}

impl fmt::Display for AllocationFailureReasonList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CPU ({:3}), Memory ({:3}), Disk size ({:3}), Disk speed ({:3}), Storage type ({:3}), \
             Architecture ({:3}), IP ({:3}), Parent-Host Policy ({:3})",
            self.insufficient_vcpu(),
            self.insufficient_memory(),
            self.insufficient_disk(),
            self.incompatible_disk_speed(),
            self.incompatible_storage_type(),
            self.incompatible_architecture(),
            self.insufficient_ips(),
            self.violates_policy(),
        )
    }
}

/// Classify why each of `hosts` cannot take `node` in the given state.
pub fn collate_failures(node: &Node, hosts: &[&Node], working: &WorkingSet) -> AllocationFailureReasonList {
    let required = node.footprint();

    let reasons = hosts
        .iter()
        .map(|host| {
            let mut reason = AllocationFailureReason {
                host: host.hostname.clone(),
                violates_policy: violates_policy(node, host, working),
                ..Default::default()
            };
            match working.available(&host.hostname) {
                Some(available) => {
                    classify(&mut reason, &available.resources, &required);
                    reason.insufficient_ips = available.ips < 1;
                }
                None => {
                    classify(&mut reason, &NodeResources::default(), &required);
                    reason.insufficient_ips = true;
                }
            }
            reason
        })
        .collect();

    AllocationFailureReasonList::new(reasons)
}

fn classify(reason: &mut AllocationFailureReason, available: &NodeResources, required: &NodeResources) {
    reason.insufficient_vcpu = available.vcpu < required.vcpu;
    reason.insufficient_memory = available.memory_gb < required.memory_gb;
    reason.insufficient_disk = available.disk_gb < required.disk_gb;
    reason.incompatible_disk_speed = !available.disk_speed_compatible(required);
    reason.incompatible_storage_type = !available.storage_type_compatible(required);
    reason.incompatible_architecture = !available.architecture_compatible(required);
}

// ── Allocation history ────────────────────────────────────────────

/// One simulated placement decision.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocationHistoryEntry {
    pub tenant: Hostname,
    pub resources: NodeResources,
    pub old_parent: Option<Hostname>,
    /// Host the node landed on, `None` if it could not be placed.
    pub new_parent: Option<Hostname>,
    /// Hosts that would have accepted the node at the time.
    pub eligible_parents: usize,
}

/// Trace of the placements made while searching for a failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AllocationHistory {
    pub entries: Vec<AllocationHistoryEntry>,
}

impl AllocationHistory {
    pub fn record(&mut self, tenant: &Node, new_parent: Option<&str>, eligible_parents: usize) {
        self.entries.push(AllocationHistoryEntry {
            tenant: tenant.hostname.clone(),
            resources: tenant.footprint(),
            old_parent: tenant.parent_hostname.clone(),
            new_parent: new_parent.map(str::to_string),
            eligible_parents,
        });
    }

    pub fn old_parents(&self) -> BTreeSet<&str> {
        self.entries
            .iter()
            .filter_map(|e| e.old_parent.as_deref())
            .collect()
    }

    pub fn new_parents(&self) -> BTreeSet<&str> {
        self.entries
            .iter()
            .filter_map(|e| e.new_parent.as_deref())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for AllocationHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            writeln!(
                f,
                "{:<20} {:<65} -> {:>15} [{:3} valid]",
                short_name(&entry.tenant),
                entry.resources.to_string(),
                entry.new_parent.as_deref().map(short_name).unwrap_or("x"),
                entry.eligible_parents,
            )?;
        }
        Ok(())
    }
}

/// First label of a fully qualified hostname.
fn short_name(hostname: &str) -> &str {
    hostname.split('.').next().unwrap_or(hostname)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::Topology;
    use sparecap_core::{Allocation, ApplicationId, ClusterKind, ClusterSpec, DiskSpeed};

    fn reason(host: &str) -> AllocationFailureReason {
        AllocationFailureReason {
            host: host.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn classifies_each_dimension() {
        let nodes = vec![
            Node::host("small", NodeResources::new(1.0, 64.0, 1000.0)).with_ip_pool(["a"]),
            Node::host("slow", NodeResources::new(16.0, 64.0, 1000.0).with_disk_speed(DiskSpeed::Slow)),
            Node::host("reserved", NodeResources::new(16.0, 64.0, 1000.0))
                .with_ip_pool(["b"])
                .reserved_to("other"),
        ];
        let topology = Topology::build(&nodes).unwrap();
        let working = topology.working_set();
        let hosts: Vec<&Node> = nodes.iter().collect();

        let resources = NodeResources::new(4.0, 16.0, 100.0).with_disk_speed(DiskSpeed::Fast);
        let node = Node::child("n", "gone", resources).with_allocation(Allocation {
            owner: ApplicationId::new("t", "a", "default"),
            cluster: ClusterSpec::new(ClusterKind::Content, "c"),
            requested: resources,
            retired: false,
        });

        let failures = collate_failures(&node, &hosts, &working);

        assert_eq!(failures.len(), 3);
        assert!(failures.reasons[0].insufficient_vcpu);
        assert!(!failures.reasons[0].insufficient_memory);
        assert!(failures.reasons[1].incompatible_disk_speed);
        assert!(failures.reasons[1].insufficient_ips);
        assert!(failures.reasons[2].violates_policy);
        assert_eq!(failures.insufficient_vcpu(), 1);
        assert_eq!(failures.incompatible_disk_speed(), 3);
        assert_eq!(failures.violates_policy(), 1);
    }

    #[test]
    fn partitions_singular_and_multiple() {
        let mut cpu_only = reason("h1");
        cpu_only.insufficient_vcpu = true;
        let mut cpu_and_mem = reason("h2");
        cpu_and_mem.insufficient_vcpu = true;
        cpu_and_mem.insufficient_memory = true;
        let mut policy_only = reason("h3");
        policy_only.violates_policy = true;

        let list = AllocationFailureReasonList::new(vec![cpu_only, cpu_and_mem, policy_only]);

        let singular = list.singular_reason_failures();
        assert_eq!(singular.len(), 2);
        assert_eq!(singular.insufficient_vcpu(), 1);
        assert_eq!(singular.violates_policy(), 1);

        let multiple = list.multiple_reason_failures();
        assert_eq!(multiple.len(), 1);
        assert_eq!(multiple.reasons[0].host, "h2");
    }

    #[test]
    fn reason_display_lists_flags() {
        let mut r = reason("h1");
        r.insufficient_memory = true;
        r.insufficient_ips = true;
        assert_eq!(r.to_string(), "[insufficientMemoryGb, insufficientAvailableIps]");
        assert_eq!(reason("h2").to_string(), "[]");
    }

    #[test]
    fn list_display_tallies() {
        let mut r = reason("h1");
        r.insufficient_vcpu = true;
        let text = AllocationFailureReasonList::new(vec![r]).to_string();
        assert!(text.starts_with("CPU (  1), Memory (  0)"));
        assert!(text.ends_with("Parent-Host Policy (  0)"));
    }

    #[test]
    fn history_tracks_parents() {
        let mut history = AllocationHistory::default();
        let a = Node::child("a.example.com", "h1", NodeResources::new(1.0, 1.0, 1.0));
        let b = Node::child("b.example.com", "h1", NodeResources::new(1.0, 1.0, 1.0));
        history.record(&a, Some("h2.example.com"), 2);
        history.record(&b, None, 0);

        assert_eq!(history.old_parents().into_iter().collect::<Vec<_>>(), vec!["h1"]);
        assert_eq!(history.new_parents().into_iter().collect::<Vec<_>>(), vec!["h2.example.com"]);

        let text = history.to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("a "));
        assert!(lines[0].ends_with("h2 [  2 valid]"));
        assert!(lines[1].ends_with("x [  0 valid]"));
    }
}
