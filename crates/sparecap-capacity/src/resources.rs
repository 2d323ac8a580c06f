//! Resources as seen by the allocator: a footprint plus an IP count.

use serde::Serialize;
use sparecap_core::NodeResources;

/// A resource footprint paired with a number of IP addresses.
///
/// On a host this is what is still free; for a workload node it is what
/// the node needs, which always includes exactly one address.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AllocationResources {
    pub resources: NodeResources,
    pub ips: i64,
}

impl AllocationResources {
    pub fn new(resources: NodeResources, ips: i64) -> Self {
        Self { resources, ips }
    }

    /// What a workload node with this footprint requires from a host.
    pub fn required_by(footprint: &NodeResources) -> Self {
        Self::new(*footprint, 1)
    }

    pub fn satisfies(&self, other: &AllocationResources) -> bool {
        self.resources.satisfies(&other.resources) && self.ips >= other.ips
    }

    pub fn add(&self, other: &AllocationResources) -> Self {
        Self::new(self.resources.add(&other.resources), self.ips + other.ips)
    }

    pub fn subtract(&self, other: &AllocationResources) -> Self {
        Self::new(self.resources.subtract(&other.resources), self.ips - other.ips)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sparecap_core::DiskSpeed;

    #[test]
    fn requires_an_ip() {
        let req = AllocationResources::required_by(&NodeResources::new(1.0, 4.0, 10.0));
        let no_ips = AllocationResources::new(NodeResources::new(8.0, 32.0, 100.0), 0);
        let one_ip = AllocationResources::new(NodeResources::new(8.0, 32.0, 100.0), 1);

        assert_eq!(req.ips, 1);
        assert!(!no_ips.satisfies(&req));
        assert!(one_ip.satisfies(&req));
    }

    #[test]
    fn subtract_consumes_ip_and_keeps_host_discretes() {
        let host = AllocationResources::new(
            NodeResources::new(8.0, 32.0, 100.0).with_disk_speed(DiskSpeed::Fast),
            2,
        );
        let req = AllocationResources::required_by(&NodeResources::new(2.0, 8.0, 25.0));
        let left = host.subtract(&req);

        assert_eq!(left.ips, 1);
        assert_eq!(left.resources.vcpu, 6.0);
        assert_eq!(left.resources.disk_speed, DiskSpeed::Fast);
        assert_eq!(left.add(&req), host);
    }
}
