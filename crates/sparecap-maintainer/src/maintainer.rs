//! Spare capacity maintainer: one maintenance pass and the periodic loop.
//!
//! A pass never mutates the fleet itself. The only side effect is the
//! optional move callback, invoked with at most one move per pass; the
//! next pass re-reads the inventory and continues from the new state.

use std::time::Duration;

use serde::Serialize;
use sparecap_capacity::{
    CapacityChecker, CapacityResult, CapacitySolver, CheckerSettings, SolverSettings, Topology, apply_moves,
    find_spare_hosts, try_allocate_node,
};
use sparecap_core::{Hostname, Move, Node, SparecapConfig};
use tracing::{debug, info, warn};

use crate::source::NodeSource;

/// Callback type for executing a move.
///
/// The maintainer calls this with the move to start. Completing the move
/// (retiring the node and provisioning its replacement) is up to the
/// receiver.
pub type MoveCallback = Box<dyn Fn(Move) -> BoxFuture + Send + Sync>;

pub type BoxFuture = std::pin::Pin<Box<dyn std::future::Future<Output = anyhow::Result<()>> + Send>>;

/// Tunables for a maintenance pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaintainerSettings {
    /// Hosts considered as the place to make room.
    pub spare_count: usize,
    pub checker: CheckerSettings,
    pub solver: SolverSettings,
}

impl Default for MaintainerSettings {
    fn default() -> Self {
        Self {
            spare_count: 1,
            checker: CheckerSettings::default(),
            solver: SolverSettings::default(),
        }
    }
}

impl From<&SparecapConfig> for MaintainerSettings {
    fn from(config: &SparecapConfig) -> Self {
        Self {
            spare_count: config.maintainer.spare_count,
            checker: CheckerSettings::from(&config.analyzer),
            solver: SolverSettings::from(&config.solver),
        }
    }
}

/// Outcome of one maintenance pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MaintenanceReport {
    pub overcommitted_hosts: Vec<Hostname>,
    /// Hosts whose combined loss cannot be absorbed.
    pub hosts_causing_failure: Vec<Hostname>,
    /// How many hosts can be lost; `None` for an empty fleet. Counts the
    /// executed move as a regained spare.
    pub spare_host_capacity: Option<usize>,
    pub mitigation: Option<Mitigation>,
}

/// The mitigation attempted for the node that could not be re-homed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mitigation {
    pub node: Hostname,
    /// Shortest relocation sequence found, empty if none.
    pub moves: Vec<Move>,
    /// First move, when it was started.
    pub executed: Option<Move>,
    pub success: bool,
}

/// Runs maintenance passes over a node inventory.
pub struct SpareCapacityMaintainer {
    settings: MaintainerSettings,
    /// Callback to start a move. Without one, passes only report.
    move_fn: Option<MoveCallback>,
}

impl SpareCapacityMaintainer {
    pub fn new(settings: MaintainerSettings) -> Self {
        Self {
            settings,
            move_fn: None,
        }
    }

    pub fn from_config(config: &SparecapConfig) -> Self {
        Self::new(MaintainerSettings::from(config))
    }

    /// Set the callback used to execute moves.
    pub fn with_move_fn(mut self, f: MoveCallback) -> Self {
        self.move_fn = Some(f);
        self
    }

    pub fn settings(&self) -> &MaintainerSettings {
        &self.settings
    }

    /// Analyse `nodes` and, when no host can be lost, start the first move
    /// of the shortest mitigation.
    pub async fn maintain(&self, nodes: &[Node]) -> anyhow::Result<MaintenanceReport> {
        let topology = Topology::build(nodes)?;
        let checker = CapacityChecker::new(&topology, self.settings.checker);

        let mut report = MaintenanceReport {
            overcommitted_hosts: checker
                .overcommitted_hosts()
                .iter()
                .map(|h| h.hostname.clone())
                .collect(),
            ..Default::default()
        };
        if !report.overcommitted_hosts.is_empty() {
            warn!(hosts = ?report.overcommitted_hosts, "overcommitted hosts");
        }

        let Some(path) = checker.worst_case_host_loss_leading_to_failure()? else {
            debug!("no hosts to analyse");
            return Ok(report);
        };
        let spare_host_capacity = path.spare_host_capacity();
        report.hosts_causing_failure = path.hosts_causing_failure.clone();
        report.spare_host_capacity = Some(spare_host_capacity);

        if spare_host_capacity > 0 {
            info!(spare_host_capacity, "fleet can absorb host loss");
            return Ok(report);
        }
        warn!(failure = %path.failure, "no spare host capacity");

        let Some(node) = &path.failure.tenant else {
            return Ok(report);
        };

        let (moves, spares) = self.find_mitigation(&topology, node).unwrap_or_default();
        let mut mitigation = Mitigation {
            node: node.hostname.clone(),
            moves,
            executed: None,
            success: false,
        };

        let Some(first) = mitigation.moves.first().cloned() else {
            warn!(node = %node.hostname, "no mitigation possible");
            report.mitigation = Some(mitigation);
            return Ok(report);
        };

        match makes_room(&topology, node, &mitigation.moves, &spares) {
            Ok(true) => {}
            Ok(false) => {
                warn!(node = %node.hostname, "mitigation leaves no room on a spare host, not executing");
                report.mitigation = Some(mitigation);
                return Ok(report);
            }
            Err(e) => {
                warn!(node = %node.hostname, error = %e, "mitigation does not replay, not executing");
                report.mitigation = Some(mitigation);
                return Ok(report);
            }
        }

        info!(
            node = %node.hostname,
            moves = mitigation.moves.len(),
            first = %first,
            "found mitigation"
        );
        if self.execute(&topology, &first).await {
            mitigation.executed = Some(first);
            mitigation.success = true;
            report.spare_host_capacity = Some(spare_host_capacity + 1);
        }
        report.mitigation = Some(mitigation);
        Ok(report)
    }

    /// Shortest way to make room for `node` on one of the spare hosts,
    /// along with the spares that were tried.
    fn find_mitigation<'t>(&self, topology: &'t Topology, node: &Node) -> Option<(Vec<Move>, Vec<&'t Node>)> {
        let footprint = node.footprint();
        let candidates: Vec<&Node> = topology
            .hosts()
            .iter()
            .filter(|h| node.parent_hostname.as_ref() != Some(&h.hostname))
            .filter(|h| h.resources.satisfies(&footprint))
            .collect();
        let spares = find_spare_hosts(topology, &candidates, self.settings.spare_count);
        if spares.is_empty() {
            debug!(node = %node.hostname, "no spare host fits node");
            return None;
        }

        let hosts: Vec<&Node> = topology
            .hosts()
            .iter()
            .filter(|h| !spares.iter().any(|s| s.hostname == h.hostname))
            .collect();

        let mut solver = CapacitySolver::new(topology, self.settings.solver);
        let moves = solver.find_mitigation(node, &spares, &hosts);
        debug!(
            node = %node.hostname,
            spares = spares.len(),
            iterations = solver.iterations(),
            "solver finished"
        );
        moves.map(|m| (m, spares))
    }

    /// Start `mv`. Returns whether the move is now under way.
    async fn execute(&self, topology: &Topology, mv: &Move) -> bool {
        if topology.child(&mv.node).is_some_and(Node::is_retired) {
            info!(node = %mv.node, "node already retiring, move in progress");
            return true;
        }

        let Some(ref move_fn) = self.move_fn else {
            info!(%mv, "no move executor configured");
            return false;
        };
        match move_fn(mv.clone()).await {
            Ok(()) => {
                info!(%mv, "started move");
                true
            }
            Err(e) => {
                warn!(%mv, error = %e, "move failed");
                false
            }
        }
    }

    /// Read the inventory and run one pass.
    pub async fn run_once(&self, source: &dyn NodeSource) -> anyhow::Result<MaintenanceReport> {
        let nodes = source.nodes()?;
        self.maintain(&nodes).await
    }

    /// Run the maintainer loop.
    pub async fn run(
        &self,
        source: &dyn NodeSource,
        interval: Duration,
        mut shutdown: tokio::sync::watch::Receiver<bool>,
    ) {
        info!(interval_secs = interval.as_secs(), "maintainer started");

        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    match self.run_once(source).await {
                        Ok(report) => debug!(?report, "maintenance pass finished"),
                        Err(e) => tracing::error!(error = %e, "maintenance pass failed"),
                    }
                }
                _ = shutdown.changed() => {
                    info!("maintainer shutting down");
                    break;
                }
            }
        }
    }
}

/// Whether replaying `moves` leaves room for `node` on one of `spares`.
fn makes_room(topology: &Topology, node: &Node, moves: &[Move], spares: &[&Node]) -> CapacityResult<bool> {
    let mut working = apply_moves(topology, moves)?;
    Ok(try_allocate_node(node, spares, &mut working).is_some())
}
