//! sparecap-maintainer: keeps the fleet able to lose a host.
//!
//! Each pass reads the node inventory, asks the capacity engine how many
//! hosts can be lost before some workload node can no longer be re-homed,
//! and when the answer is zero, finds and executes the first move of the
//! shortest mitigation.
//!
//! # Pass
//!
//! ```text
//! path = worst_case_host_loss_leading_to_failure()
//! if path.spare_host_capacity > 0: done
//!
//! node   = path.failure.tenant          // the node that could not move
//! spares = spare_count emptiest hosts that fit node
//! moves  = shortest make_room_for(node, spare) over all spares
//! if moves valid: execute moves[0]      // one move per pass
//! ```
//!
//! Moves are executed through a callback so the node repository stays
//! outside this crate.

pub mod maintainer;
pub mod source;

pub use maintainer::{BoxFuture, MaintainerSettings, MaintenanceReport, Mitigation, MoveCallback, SpareCapacityMaintainer};
pub use source::{JsonInventory, NodeSource};
