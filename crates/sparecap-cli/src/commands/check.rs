use std::fmt::Write as _;
use std::path::Path;

use sparecap_capacity::{CapacityChecker, CheckerSettings, HostFailurePath, Topology};
use sparecap_core::SparecapConfig;
use tracing::warn;

use super::load_nodes;

pub fn check(config: &SparecapConfig, inventory: &Path, format: &str) -> anyhow::Result<()> {
    let nodes = load_nodes(inventory)?;
    let topology = Topology::build(&nodes)?;
    let checker = CapacityChecker::new(&topology, CheckerSettings::from(&config.analyzer));

    let overcommitted: Vec<&str> = checker
        .overcommitted_hosts()
        .iter()
        .map(|h| h.hostname.as_str())
        .collect();
    if !overcommitted.is_empty() {
        warn!(hosts = ?overcommitted, "overcommitted hosts");
    }

    let path = checker.worst_case_host_loss_leading_to_failure()?;

    match format {
        "json" => {
            let output = serde_json::json!({
                "overcommitted_hosts": overcommitted,
                "spare_host_capacity": path.as_ref().map(HostFailurePath::spare_host_capacity),
                "failure_path": path,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        _ => {
            if !overcommitted.is_empty() {
                println!("Overcommitted hosts: {}", overcommitted.join(", "));
            }
            match &path {
                Some(path) => print!("{}", format_failure_path(path)),
                None => println!("No hosts in inventory."),
            }
        }
    }

    Ok(())
}

pub fn remove(config: &SparecapConfig, inventory: &Path, hosts: &[String], format: &str) -> anyhow::Result<()> {
    let nodes = load_nodes(inventory)?;
    let topology = Topology::build(&nodes)?;
    let checker = CapacityChecker::new(&topology, CheckerSettings::from(&config.analyzer));

    let failure = checker.find_host_removal_failure(hosts)?;

    match format {
        "json" => {
            let output = serde_json::json!({
                "hosts": hosts,
                "absorbed": failure.is_none(),
                "failure_path": failure,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        _ => match &failure {
            Some(path) => print!("{}", format_failure_path(path)),
            None => println!("✓ Removing {} leaves every node a new host", hosts.join(", ")),
        },
    }

    Ok(())
}

/// Operator report for a failure path.
pub fn format_failure_path(path: &HostFailurePath) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Spare host capacity: {}", path.spare_host_capacity());
    let _ = writeln!(out, "Hosts causing failure: {}", path.hosts_causing_failure.join(", "));
    let _ = writeln!(out, "{}", path.failure);
    if !path.history.is_empty() {
        let _ = writeln!(out, "Allocation history:");
        let _ = write!(out, "{}", path.history);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use sparecap_core::{Node, NodeResources};

    #[test]
    fn report_names_failing_hosts() {
        let nodes = vec![
            Node::host("h1", NodeResources::new(8.0, 32.0, 100.0)).with_ip_pool(["10.0.0.1"]),
            Node::host("h2", NodeResources::new(4.0, 16.0, 50.0)).with_ip_pool(["10.0.1.1"]),
            Node::child("n1", "h1", NodeResources::new(6.0, 24.0, 60.0)),
        ];
        let topology = Topology::build(&nodes).unwrap();
        let checker = CapacityChecker::new(&topology, CheckerSettings::default());
        let path = checker.worst_case_host_loss_leading_to_failure().unwrap().unwrap();

        let report = format_failure_path(&path);
        assert!(report.starts_with("Spare host capacity: 0\n"), "{report}");
        assert!(report.contains("Hosts causing failure: h1\n"), "{report}");
        assert!(report.contains("Failure to remove host h1"), "{report}");
        assert!(report.contains("Allocation history:"), "{report}");
    }
}
