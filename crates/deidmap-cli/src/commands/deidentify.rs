use crate::config::{self, Settings};
use crate::support::{describe_transform, offset_rng, or_exit, resolve_layout};
use deidmap_store::IdentifierPool;
use deidmap_transform::{deidentify, read_table, write_table};

#[derive(Debug, Clone)]
pub struct Args {
    pub input: String,
    pub output: String,
    pub pool: Option<String>,
    pub id_column: Option<String>,
    pub date_columns: Vec<String>,
    pub history: Option<String>,
    pub work_dir: Option<String>,
    pub window: Option<i64>,
    pub seed: Option<u64>,
}

pub fn transform(args: Args, settings: &Settings) -> Result<usize, String> {
    let pool_path = config::require(args.pool, settings.pool.as_ref(), "pool")?;
    let id_column = config::require(args.id_column, settings.id_column.as_ref(), "id-column")?;
    let date_columns = if args.date_columns.is_empty() {
        settings.date_columns.clone()
    } else {
        args.date_columns
    };
    let layout = resolve_layout(args.history, args.work_dir, settings)?;

    let pool = IdentifierPool::load(&pool_path).map_err(|e| e.to_string())?;
    let mapping_store = layout
        .mapping_store(pool.column())
        .map_err(|e| e.to_string())?;
    let mut offset_store = layout.offset_store().map_err(|e| e.to_string())?;
    if let Some(window) = args.window.or(settings.window) {
        if window <= 0 {
            return Err(format!("--window must be positive, got {window}"));
        }
        offset_store = offset_store.with_window(window);
    }

    let table = read_table(&args.input).map_err(|e| e.to_string())?;
    let mut rng = offset_rng(args.seed);
    let transformed = deidentify(
        table,
        &id_column,
        &date_columns,
        &pool,
        &mapping_store,
        &offset_store,
        &mut rng,
    )
    .map_err(describe_transform)?;
    write_table(&args.output, &transformed).map_err(|e| e.to_string())?;
    Ok(transformed.len())
}

pub fn run(args: Args, settings: &Settings) {
    let output = args.output.clone();
    let rows = or_exit(transform(args, settings));
    println!("deidmap deidentify: wrote {rows} rows to {output}");
}
