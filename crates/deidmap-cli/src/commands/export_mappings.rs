use crate::config::Settings;
use crate::support::{or_exit, resolve_layout};
use deidmap_store::OFFSET_COLUMN;
use deidmap_store::records::RecordFile;
use deidmap_transform::{HistoryLayout, combined_mappings, write_table};

pub fn export(layout: &HistoryLayout, column: &str, out: &str) -> Result<usize, String> {
    let mut files: Vec<RecordFile> = Vec::new();
    for name in [column, OFFSET_COLUMN] {
        if let Some(file) = layout.store_snapshot(name).map_err(|e| e.to_string())? {
            files.push(file);
        }
    }
    if files.is_empty() {
        return Err("both stores are empty; nothing to export".to_string());
    }

    let refs: Vec<&RecordFile> = files.iter().collect();
    let table = combined_mappings(&refs).map_err(|e| e.to_string())?;
    write_table(out, &table).map_err(|e| e.to_string())?;
    Ok(table.len())
}

pub fn run(
    out: String,
    column: String,
    history: Option<String>,
    work_dir: Option<String>,
    settings: &Settings,
) {
    let layout = or_exit(resolve_layout(history, work_dir, settings));
    let rows = or_exit(export(&layout, &column, &out));
    println!("deidmap export-mappings: wrote {rows} rows to {out}");
}
