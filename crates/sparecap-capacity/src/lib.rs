//! sparecap capacity engine: how much host loss a fleet can absorb, and
//! how to win back spare capacity when it cannot.
//!
//! Everything here works on an immutable [`Topology`] snapshot built from a
//! flat node list. Simulations copy the mutable parts into a private
//! [`WorkingSet`], so the same snapshot can be analysed any number of times
//! and always gives the same answer.
//!
//! # Components
//!
//! - **`resources`**: Resource footprint with IP accounting
//! - **`topology`**: Snapshot of hosts, children and available resources
//! - **`simulator`**: Greedy first-fit placement and the placement policy
//! - **`diagnostics`**: Why a placement failed, and what the simulation did
//! - **`resilience`**: Removal priority and the worst-case host failure path
//! - **`solver`**: Fewest relocations that free a spare host

pub mod diagnostics;
pub mod error;
pub mod resilience;
pub mod resources;
pub mod simulator;
pub mod solver;
pub mod topology;

pub use diagnostics::{
    AllocationFailureReason, AllocationFailureReasonList, AllocationHistory, AllocationHistoryEntry,
    collate_failures,
};
pub use error::{CapacityError, CapacityResult};
pub use resilience::{CapacityChecker, CheckerSettings, HostFailurePath, HostRemovalFailure};
pub use resources::AllocationResources;
pub use simulator::{try_allocate, try_allocate_node, violates_policy, violates_policy_with};
pub use solver::{CapacitySolver, MoveSet, SolverSettings, apply_moves, find_spare_hosts};
pub use topology::{AllocationMap, ResourceMap, Topology, WorkingSet};
