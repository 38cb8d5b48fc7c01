use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "deidmap",
    about = "Replace subject identifiers with checksum-valid surrogates and shift dates, \
             against a shared version-controlled mapping history",
    version
)]
pub struct Cli {
    /// Path to a TOML config file supplying defaults
    #[arg(long, global = true, default_value = "deidmap.toml")]
    pub config: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the bare history repositories for both stores
    InitHistory {
        /// Directory that will hold the shared bare repositories
        #[arg(long)]
        history: Option<String>,

        /// Surrogate-id column name (names the mapping repository)
        #[arg(long, default_value = "jdc_person_id")]
        column: String,

        /// Recreate existing histories (destroys previous history!)
        #[arg(long)]
        overwrite: bool,
    },

    /// Generate a pool file of checksum-valid surrogate identifiers
    GenerateIds {
        /// Number of identifiers to generate
        #[arg(long)]
        count: u64,

        /// Alphanumeric prefix for every identifier
        #[arg(long, default_value = "")]
        prefix: String,

        /// Numeric bodies start at offset + 1
        #[arg(long, default_value_t = 0)]
        offset: u64,

        /// Minimum total identifier length (zero-padded)
        #[arg(long)]
        length: Option<usize>,

        /// Header naming the surrogate-id column downstream
        #[arg(long, default_value = "jdc_person_id")]
        column: String,

        /// Output pool file path
        #[arg(long)]
        out: String,
    },

    /// Verify the check digit of one identifier
    VerifyId {
        /// Identifier to verify
        id: String,
    },

    /// Replace local ids in a table with surrogate ids from a pool
    ReplaceIds {
        /// Input table (CSV)
        #[arg(long)]
        input: String,

        /// Output table (CSV)
        #[arg(long)]
        output: String,

        /// Pool file of pre-generated identifiers
        #[arg(long)]
        pool: Option<String>,

        /// Column holding the local subject id
        #[arg(long)]
        id_column: Option<String>,

        /// Shared history directory
        #[arg(long)]
        history: Option<String>,

        /// Directory for this process's working copies
        #[arg(long)]
        work_dir: Option<String>,
    },

    /// Shift date columns by each subject's fixed day offset
    ShiftDates {
        /// Input table (CSV)
        #[arg(long)]
        input: String,

        /// Output table (CSV)
        #[arg(long)]
        output: String,

        /// Column holding the subject id to key offsets on
        #[arg(long)]
        id_column: Option<String>,

        /// Date column to shift (repeatable)
        #[arg(long = "date-column")]
        date_columns: Vec<String>,

        /// Shared history directory
        #[arg(long)]
        history: Option<String>,

        /// Directory for this process's working copies
        #[arg(long)]
        work_dir: Option<String>,

        /// Shift window width in days (offsets fall in ±window/2)
        #[arg(long)]
        window: Option<i64>,

        /// Seed for reproducible offset draws
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Replace ids, then shift dates keyed on the new surrogate column
    Deidentify {
        /// Input table (CSV)
        #[arg(long)]
        input: String,

        /// Output table (CSV)
        #[arg(long)]
        output: String,

        /// Pool file of pre-generated identifiers
        #[arg(long)]
        pool: Option<String>,

        /// Column holding the local subject id
        #[arg(long)]
        id_column: Option<String>,

        /// Date column to shift (repeatable)
        #[arg(long = "date-column")]
        date_columns: Vec<String>,

        /// Shared history directory
        #[arg(long)]
        history: Option<String>,

        /// Directory for this process's working copies
        #[arg(long)]
        work_dir: Option<String>,

        /// Shift window width in days (offsets fall in ±window/2)
        #[arg(long)]
        window: Option<i64>,

        /// Seed for reproducible offset draws
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Join both stores into one convenience CSV for operators
    ExportMappings {
        /// Output CSV path
        #[arg(long)]
        out: String,

        /// Surrogate-id column name (names the mapping repository)
        #[arg(long, default_value = "jdc_person_id")]
        column: String,

        /// Shared history directory
        #[arg(long)]
        history: Option<String>,

        /// Directory for this process's working copies
        #[arg(long)]
        work_dir: Option<String>,
    },
}
