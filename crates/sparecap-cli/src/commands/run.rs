use std::path::Path;

use sparecap_core::{SparecapConfig, parse_duration};
use sparecap_maintainer::{JsonInventory, MoveCallback, SpareCapacityMaintainer};
use tokio::sync::watch;
use tracing::{error, info};

pub async fn run(config: &SparecapConfig, inventory: &Path, interval: Option<&str>) -> anyhow::Result<()> {
    let interval = match interval {
        Some(s) => parse_duration(s)?,
        None => config.maintainer_interval()?,
    };

    let dry_run: MoveCallback = Box::new(|mv| {
        Box::pin(async move {
            info!(%mv, "dry run: move not executed");
            Ok::<(), anyhow::Error>(())
        })
    });
    let maintainer = SpareCapacityMaintainer::from_config(config).with_move_fn(dry_run);
    let source = JsonInventory::new(inventory);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
            return;
        }
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    maintainer.run(&source, interval, shutdown_rx).await;
    info!("sparecap maintainer stopped");
    Ok(())
}
