use crate::support::or_exit;
use deidmap_checksum::{GenerateIds, SurrogateId, generate_ids};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct Args {
    pub count: u64,
    pub prefix: String,
    pub offset: u64,
    pub length: Option<usize>,
    pub column: String,
    pub out: String,
}

pub fn write_pool(args: &Args) -> Result<Vec<SurrogateId>, String> {
    if args.count == 0 {
        return Err("--count must be at least 1".to_string());
    }
    let ids = generate_ids(&GenerateIds {
        count: args.count,
        prefix: args.prefix.clone(),
        offset: args.offset,
        length: args.length,
    })
    .map_err(|e| e.to_string())?;

    let mut text = String::with_capacity(ids.len() * 12);
    text.push_str(&args.column);
    text.push('\n');
    for id in &ids {
        text.push_str(id.as_str());
        text.push('\n');
    }

    let out = Path::new(&args.out);
    if let Some(parent) = out.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .map_err(|e| format!("failed to create {}: {e}", parent.display()))?;
    }
    fs::write(out, text).map_err(|e| format!("failed to write {}: {e}", out.display()))?;
    Ok(ids)
}

pub fn run(args: Args) {
    let ids = or_exit(write_pool(&args));
    println!(
        "deidmap generate-ids: wrote {} identifiers to {}",
        ids.len(),
        args.out
    );
}
