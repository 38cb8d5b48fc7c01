use crate::config::{self, Settings};
use crate::support::{describe_transform, offset_rng, or_exit, resolve_layout};
use deidmap_transform::{read_table, shift_dates, write_table};

#[derive(Debug, Clone)]
pub struct Args {
    pub input: String,
    pub output: String,
    pub id_column: Option<String>,
    pub date_columns: Vec<String>,
    pub history: Option<String>,
    pub work_dir: Option<String>,
    pub window: Option<i64>,
    pub seed: Option<u64>,
}

pub fn shift(args: Args, settings: &Settings) -> Result<usize, String> {
    let id_column = config::require(args.id_column, settings.id_column.as_ref(), "id-column")?;
    let date_columns = if args.date_columns.is_empty() {
        settings.date_columns.clone()
    } else {
        args.date_columns
    };
    if date_columns.is_empty() {
        return Err(
            "no date columns given (pass --date-column or set date_columns in the config file)"
                .to_string(),
        );
    }
    let layout = resolve_layout(args.history, args.work_dir, settings)?;

    let mut store = layout.offset_store().map_err(|e| e.to_string())?;
    if let Some(window) = args.window.or(settings.window) {
        if window <= 0 {
            return Err(format!("--window must be positive, got {window}"));
        }
        store = store.with_window(window);
    }

    let table = read_table(&args.input).map_err(|e| e.to_string())?;
    let mut rng = offset_rng(args.seed);
    let shifted = shift_dates(table, &id_column, &date_columns, &store, &mut rng)
        .map_err(describe_transform)?;
    write_table(&args.output, &shifted).map_err(|e| e.to_string())?;
    Ok(shifted.len())
}

pub fn run(args: Args, settings: &Settings) {
    let output = args.output.clone();
    let rows = or_exit(shift(args, settings));
    println!("deidmap shift-dates: wrote {rows} rows to {output}");
}
