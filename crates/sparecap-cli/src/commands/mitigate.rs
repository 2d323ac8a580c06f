use std::fmt::Write as _;
use std::path::Path;

use sparecap_core::SparecapConfig;
use sparecap_maintainer::{MaintenanceReport, SpareCapacityMaintainer};

use super::load_nodes;

pub async fn mitigate(config: &SparecapConfig, inventory: &Path, format: &str) -> anyhow::Result<()> {
    let nodes = load_nodes(inventory)?;
    // No executor: the pass only reports what it would do.
    let maintainer = SpareCapacityMaintainer::from_config(config);
    let report = maintainer.maintain(&nodes).await?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        _ => print!("{}", format_report(&report)),
    }
    Ok(())
}

pub fn format_report(report: &MaintenanceReport) -> String {
    let mut out = String::new();
    if !report.overcommitted_hosts.is_empty() {
        let _ = writeln!(out, "Overcommitted hosts: {}", report.overcommitted_hosts.join(", "));
    }
    match report.spare_host_capacity {
        Some(capacity) => {
            let _ = writeln!(out, "Spare host capacity: {capacity}");
        }
        None => {
            let _ = writeln!(out, "No hosts in inventory.");
            return out;
        }
    }

    match &report.mitigation {
        None => {}
        Some(mitigation) if mitigation.moves.is_empty() => {
            let _ = writeln!(out, "No mitigation possible for {}", mitigation.node);
        }
        Some(mitigation) => {
            let _ = writeln!(
                out,
                "Mitigation for {} ({} moves):",
                mitigation.node,
                mitigation.moves.len()
            );
            for mv in &mitigation.moves {
                let _ = writeln!(out, "  {mv}");
            }
        }
    }
    out
}
