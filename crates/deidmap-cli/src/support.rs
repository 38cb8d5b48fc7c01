use crate::config::{self, Settings};
use deidmap_transform::{HistoryLayout, TransformError};
use rand::SeedableRng;
use rand::rngs::StdRng;

pub fn or_exit<T>(result: Result<T, String>) -> T {
    result.unwrap_or_else(|e| {
        eprintln!("error: {e}");
        std::process::exit(1);
    })
}

/// Resolve the history/work-dir pair from flags, then config, then the
/// work-dir default.
pub fn resolve_layout(
    history: Option<String>,
    work_dir: Option<String>,
    settings: &Settings,
) -> Result<HistoryLayout, String> {
    let history = config::require(history, settings.history.as_ref(), "history")?;
    let work_dir = work_dir
        .or_else(|| settings.work_dir.clone())
        .unwrap_or_else(config::default_work_dir);
    Ok(HistoryLayout::new(history, work_dir))
}

/// A seeded generator reproduces a draw; an unseeded one never repeats.
pub fn offset_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

pub fn describe_transform(err: TransformError) -> String {
    let retryable = matches!(&err, TransformError::Store(store) if store.is_retryable());
    if retryable {
        format!("{err} (another run published first; safe to retry)")
    } else {
        err.to_string()
    }
}
