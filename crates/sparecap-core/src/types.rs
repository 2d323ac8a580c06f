//! Domain types for the sparecap engine.
//!
//! These types describe a read-only snapshot of the node inventory: hosts,
//! the workload nodes placed on them, and the resource footprints both
//! demand and supply. All types are serializable to/from JSON so an
//! inventory can be captured to a file and replayed.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Hostname of a node; the identity used throughout the engine.
pub type Hostname = String;

/// Name of the tenant owning an application.
pub type TenantName = String;

// ── Resources ─────────────────────────────────────────────────────

/// Required or offered disk speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiskSpeed {
    #[default]
    Any,
    Fast,
    Slow,
}

/// Required or offered storage attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageType {
    #[default]
    Any,
    Local,
    Remote,
}

/// Required or offered CPU architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Architecture {
    #[default]
    Any,
    X86_64,
    Arm64,
}

/// A resource footprint: capacity demanded by a workload node or supplied
/// by a host.
///
/// Arithmetic never clamps. A negative numeric dimension after subtraction
/// is how an overcommitted host shows up.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NodeResources {
    pub vcpu: f64,
    pub memory_gb: f64,
    pub disk_gb: f64,
    #[serde(default)]
    pub disk_speed: DiskSpeed,
    #[serde(default)]
    pub storage_type: StorageType,
    #[serde(default)]
    pub architecture: Architecture,
}

impl NodeResources {
    /// Numeric-only footprint with `any` for every discrete dimension.
    pub fn new(vcpu: f64, memory_gb: f64, disk_gb: f64) -> Self {
        Self {
            vcpu,
            memory_gb,
            disk_gb,
            ..Self::default()
        }
    }

    pub fn with_disk_speed(mut self, disk_speed: DiskSpeed) -> Self {
        self.disk_speed = disk_speed;
        self
    }

    pub fn with_storage_type(mut self, storage_type: StorageType) -> Self {
        self.storage_type = storage_type;
        self
    }

    pub fn with_architecture(mut self, architecture: Architecture) -> Self {
        self.architecture = architecture;
        self
    }

    /// The numeric dimensions only, discrete dimensions reset to `any`.
    pub fn numbers_only(&self) -> Self {
        Self::new(self.vcpu, self.memory_gb, self.disk_gb)
    }

    /// Componentwise sum. Discrete dimensions are taken from `self`.
    pub fn add(&self, other: &NodeResources) -> Self {
        Self {
            vcpu: self.vcpu + other.vcpu,
            memory_gb: self.memory_gb + other.memory_gb,
            disk_gb: self.disk_gb + other.disk_gb,
            ..*self
        }
    }

    /// Componentwise difference, unclamped. Discrete dimensions are taken
    /// from `self`.
    pub fn subtract(&self, other: &NodeResources) -> Self {
        Self {
            vcpu: self.vcpu - other.vcpu,
            memory_gb: self.memory_gb - other.memory_gb,
            disk_gb: self.disk_gb - other.disk_gb,
            ..*self
        }
    }

    /// Whether these resources are enough to host `other`.
    ///
    /// Every numeric dimension must be at least as large, and every
    /// discrete dimension of `other` must be `any` or equal to ours.
    pub fn satisfies(&self, other: &NodeResources) -> bool {
        self.vcpu >= other.vcpu
            && self.memory_gb >= other.memory_gb
            && self.disk_gb >= other.disk_gb
            && self.disk_speed_compatible(other)
            && self.storage_type_compatible(other)
            && self.architecture_compatible(other)
    }

    pub fn disk_speed_compatible(&self, other: &NodeResources) -> bool {
        other.disk_speed == DiskSpeed::Any || other.disk_speed == self.disk_speed
    }

    pub fn storage_type_compatible(&self, other: &NodeResources) -> bool {
        other.storage_type == StorageType::Any || other.storage_type == self.storage_type
    }

    pub fn architecture_compatible(&self, other: &NodeResources) -> bool {
        other.architecture == Architecture::Any || other.architecture == self.architecture
    }

    /// True if any numeric dimension has gone below zero.
    pub fn is_negative(&self) -> bool {
        self.vcpu < 0.0 || self.memory_gb < 0.0 || self.disk_gb < 0.0
    }

    /// Size ordering used to rank hosts: memory, then vcpu, then disk.
    pub fn compare_size(&self, other: &NodeResources) -> Ordering {
        self.memory_gb
            .total_cmp(&other.memory_gb)
            .then(self.vcpu.total_cmp(&other.vcpu))
            .then(self.disk_gb.total_cmp(&other.disk_gb))
    }
}

impl fmt::Display for NodeResources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[vcpu: {:.1}, memory: {:.1} Gb, disk: {:.1} Gb",
            self.vcpu, self.memory_gb, self.disk_gb
        )?;
        if self.disk_speed != DiskSpeed::Any {
            write!(f, ", disk speed: {:?}", self.disk_speed)?;
        }
        if self.storage_type != StorageType::Any {
            write!(f, ", storage type: {:?}", self.storage_type)?;
        }
        if self.architecture != Architecture::Any {
            write!(f, ", architecture: {:?}", self.architecture)?;
        }
        write!(f, "]")
    }
}

// ── Allocation ────────────────────────────────────────────────────

/// Identity of a deployed application.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ApplicationId {
    pub tenant: TenantName,
    pub application: String,
    #[serde(default = "default_instance")]
    pub instance: String,
}

fn default_instance() -> String {
    "default".to_string()
}

impl ApplicationId {
    pub fn new(tenant: &str, application: &str, instance: &str) -> Self {
        Self {
            tenant: tenant.to_string(),
            application: application.to_string(),
            instance: instance.to_string(),
        }
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.tenant, self.application, self.instance)
    }
}

/// Kind of cluster an allocation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterKind {
    Admin,
    Container,
    Content,
    Combined,
}

impl ClusterKind {
    /// Content and combined clusters both hold content nodes.
    pub fn is_content(&self) -> bool {
        matches!(self, ClusterKind::Content | ClusterKind::Combined)
    }
}

/// Identity of a cluster within an application.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClusterSpec {
    pub kind: ClusterKind,
    pub id: String,
}

impl ClusterSpec {
    pub fn new(kind: ClusterKind, id: &str) -> Self {
        Self {
            kind,
            id: id.to_string(),
        }
    }

    /// Whether two cluster identities denote the same cluster.
    ///
    /// Ids must match. Content and combined clusters overlap each other;
    /// any other kinds must be equal.
    pub fn overlaps(&self, other: &ClusterSpec) -> bool {
        if self.id != other.id {
            return false;
        }
        if self.kind.is_content() || other.kind.is_content() {
            return self.kind.is_content() == other.kind.is_content();
        }
        self.kind == other.kind
    }
}

/// Present on workload nodes that are in use by an application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    pub owner: ApplicationId,
    pub cluster: ClusterSpec,
    /// Resources requested by the application, which may differ from the
    /// node's physical resources.
    pub requested: NodeResources,
    /// Pending removal from the cluster.
    #[serde(default)]
    pub retired: bool,
}

// ── Node ──────────────────────────────────────────────────────────

/// Lifecycle state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    Provisioned,
    Ready,
    Reserved,
    Active,
    Inactive,
    Dirty,
    Failed,
    Parked,
    Deprovisioned,
    Breakfixed,
}

impl NodeState {
    /// States whose nodes take part in capacity analysis.
    pub const RELEVANT: [NodeState; 6] = [
        NodeState::Active,
        NodeState::Inactive,
        NodeState::Dirty,
        NodeState::Provisioned,
        NodeState::Ready,
        NodeState::Reserved,
    ];

    pub fn is_relevant(&self) -> bool {
        Self::RELEVANT.contains(self)
    }
}

/// A machine: either a host (no parent) or a workload node placed on a
/// parent host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub hostname: Hostname,
    #[serde(default)]
    pub parent_hostname: Option<Hostname>,
    pub resources: NodeResources,
    /// Addresses a host can hand out to its children.
    #[serde(default)]
    pub ip_pool: Vec<String>,
    /// Addresses occupied by this node.
    #[serde(default)]
    pub primary_ips: Vec<String>,
    pub state: NodeState,
    /// Tenant this host is exclusively reserved for.
    #[serde(default)]
    pub reserved_to: Option<TenantName>,
    #[serde(default)]
    pub allocation: Option<Allocation>,
    #[serde(default)]
    pub want_to_retire: bool,
    #[serde(default)]
    pub want_to_fail: bool,
}

impl Node {
    /// A host with the given capacity and no IP pool.
    pub fn host(hostname: &str, resources: NodeResources) -> Self {
        Self {
            hostname: hostname.to_string(),
            parent_hostname: None,
            resources,
            ip_pool: Vec::new(),
            primary_ips: Vec::new(),
            state: NodeState::Active,
            reserved_to: None,
            allocation: None,
            want_to_retire: false,
            want_to_fail: false,
        }
    }

    /// An unallocated workload node on `parent`.
    pub fn child(hostname: &str, parent: &str, resources: NodeResources) -> Self {
        Self {
            parent_hostname: Some(parent.to_string()),
            ..Self::host(hostname, resources)
        }
    }

    pub fn with_ip_pool<I, S>(mut self, ips: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ip_pool = ips.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_primary_ips<I, S>(mut self, ips: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_ips = ips.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_allocation(mut self, allocation: Allocation) -> Self {
        self.allocation = Some(allocation);
        self
    }

    pub fn with_state(mut self, state: NodeState) -> Self {
        self.state = state;
        self
    }

    pub fn reserved_to(mut self, tenant: &str) -> Self {
        self.reserved_to = Some(tenant.to_string());
        self
    }

    pub fn is_host(&self) -> bool {
        self.parent_hostname.is_none()
    }

    /// Resources this node occupies on its host: the requested resources
    /// when allocated, the physical resources otherwise.
    pub fn footprint(&self) -> NodeResources {
        self.allocation
            .as_ref()
            .map(|a| a.requested)
            .unwrap_or(self.resources)
    }

    /// Hosts flagged for retirement or failure never receive new children.
    pub fn accepts_new_children(&self) -> bool {
        !self.want_to_retire && !self.want_to_fail
    }

    /// Whether the allocation on this node is already being retired.
    pub fn is_retired(&self) -> bool {
        self.allocation.as_ref().is_some_and(|a| a.retired)
    }
}

// ── Move ──────────────────────────────────────────────────────────

/// A proposed relocation of one workload node to another host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Move {
    pub node: Hostname,
    pub from: Hostname,
    pub to: Hostname,
}

impl Move {
    pub fn new(node: &str, from: &str, to: &str) -> Self {
        Self {
            node: node.to_string(),
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "move {} from {} to {}", self.node, self.from, self.to)
    }
}
