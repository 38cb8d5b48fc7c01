use crate::config::Settings;
use crate::support::{or_exit, resolve_layout};
use deidmap_transform::HistoryLayout;
use std::path::PathBuf;

pub fn init_history(
    layout: &HistoryLayout,
    column: &str,
    overwrite: bool,
) -> Result<Vec<PathBuf>, String> {
    layout.init(column, overwrite).map_err(|e| e.to_string())
}

pub fn run(history: Option<String>, column: String, overwrite: bool, settings: &Settings) {
    let layout = or_exit(resolve_layout(history, None, settings));
    let created = or_exit(init_history(&layout, &column, overwrite));

    println!("deidmap init-history {}", layout.history().display());
    for path in created {
        println!("  created {}", path.display());
    }
}
