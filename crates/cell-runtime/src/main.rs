//! `pocket-cell`: run one storage cell in a single process.
//!
//! ```text
//! CELL_ID / ZONE_ID        cell identity (defaults: cell1 / zone1)
//! POCKET_DATA_DIR          state root (default: ./data)
//! POCKET_OSD_COUNT         local daemons to start (default: 3)
//! RUST_LOG                 tracing filter (default: info)
//! ```

use cell_runtime::{init_tracing, Cell, RocksDbConfig};
use shared_types::CellConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("info");

    let config = CellConfig::from_env();
    let data_dir =
        std::env::var("POCKET_DATA_DIR").unwrap_or_else(|_| "./data".to_string());
    let osd_count: usize = std::env::var("POCKET_OSD_COUNT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3);

    let cell = Cell::start(config, data_dir, osd_count, RocksDbConfig::default()).await?;
    tracing::info!("[runtime] ready; ctrl-c to stop");

    tokio::signal::ctrl_c().await?;
    cell.shutdown().await;
    Ok(())
}
