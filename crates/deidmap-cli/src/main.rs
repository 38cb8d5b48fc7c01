//! Deidmap CLI: the `deidmap` command.

mod cli;
mod commands;
mod config;
mod support;

use clap::Parser;
use cli::{Cli, Commands};
use config::Settings;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = support::or_exit(Settings::load(&cli.config));

    match cli.command {
        Commands::InitHistory {
            history,
            column,
            overwrite,
        } => commands::init_history::run(history, column, overwrite, &settings),

        Commands::GenerateIds {
            count,
            prefix,
            offset,
            length,
            column,
            out,
        } => commands::generate_ids::run(commands::generate_ids::Args {
            count,
            prefix,
            offset,
            length,
            column,
            out,
        }),

        Commands::VerifyId { id } => commands::verify_id::run(id),

        Commands::ReplaceIds {
            input,
            output,
            pool,
            id_column,
            history,
            work_dir,
        } => commands::replace_ids::run(
            commands::replace_ids::Args {
                input,
                output,
                pool,
                id_column,
                history,
                work_dir,
            },
            &settings,
        ),

        Commands::ShiftDates {
            input,
            output,
            id_column,
            date_columns,
            history,
            work_dir,
            window,
            seed,
        } => commands::shift_dates::run(
            commands::shift_dates::Args {
                input,
                output,
                id_column,
                date_columns,
                history,
                work_dir,
                window,
                seed,
            },
            &settings,
        ),

        Commands::Deidentify {
            input,
            output,
            pool,
            id_column,
            date_columns,
            history,
            work_dir,
            window,
            seed,
        } => commands::deidentify::run(
            commands::deidentify::Args {
                input,
                output,
                pool,
                id_column,
                date_columns,
                history,
                work_dir,
                window,
                seed,
            },
            &settings,
        ),

        Commands::ExportMappings {
            out,
            column,
            history,
            work_dir,
        } => commands::export_mappings::run(out, column, history, work_dir, &settings),
    }
}
