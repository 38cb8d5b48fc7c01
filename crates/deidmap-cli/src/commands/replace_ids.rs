use crate::config::{self, Settings};
use crate::support::{describe_transform, or_exit, resolve_layout};
use deidmap_store::IdentifierPool;
use deidmap_transform::{read_table, replace_ids, write_table};

#[derive(Debug, Clone)]
pub struct Args {
    pub input: String,
    pub output: String,
    pub pool: Option<String>,
    pub id_column: Option<String>,
    pub history: Option<String>,
    pub work_dir: Option<String>,
}

pub fn replace(args: Args, settings: &Settings) -> Result<usize, String> {
    let pool_path = config::require(args.pool, settings.pool.as_ref(), "pool")?;
    let id_column = config::require(args.id_column, settings.id_column.as_ref(), "id-column")?;
    let layout = resolve_layout(args.history, args.work_dir, settings)?;

    let pool = IdentifierPool::load(&pool_path).map_err(|e| e.to_string())?;
    let store = layout
        .mapping_store(pool.column())
        .map_err(|e| e.to_string())?;

    let table = read_table(&args.input).map_err(|e| e.to_string())?;
    let replaced = replace_ids(table, &id_column, &pool, &store).map_err(describe_transform)?;
    write_table(&args.output, &replaced).map_err(|e| e.to_string())?;
    Ok(replaced.len())
}

pub fn run(args: Args, settings: &Settings) {
    let output = args.output.clone();
    let rows = or_exit(replace(args, settings));
    println!("deidmap replace-ids: wrote {rows} rows to {output}");
}
