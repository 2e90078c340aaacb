use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use clap::builder::RangedU64ValueParser;

use note_importer::config::DEFAULT_CONFIG_PATH;
use note_importer::pipeline::DEFAULT_BATCH_SIZE;
use note_importer::{ImportOptions, init_logger, run};

#[derive(Parser, Debug)]
#[command(
    name = "note-importer",
    version,
    about = "Import past Misskey notes into Meilisearch"
)]
struct Args {
    /// Path of the Misskey config file (.config/default.yml).
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Resume with notes older than this aid (the last id printed by a previous run).
    #[arg(long)]
    id: Option<String>,

    /// Number of notes to import per batch.
    #[arg(
        long,
        default_value_t = DEFAULT_BATCH_SIZE,
        value_parser = RangedU64ValueParser::<usize>::new().range(1..)
    )]
    batch_size: usize,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    init_logger();

    let args = Args::parse();
    let options = ImportOptions {
        config_path: args.config,
        resume_id: args.id,
        batch_size: args.batch_size,
    };

    match run(options).await {
        Ok(summary) => {
            println!(
                "Imported {} notes in {} batches",
                summary.imported, summary.batches
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            let mut stderr = io::stderr();
            let _ = writeln!(stderr, "error: {err}");
            if !err.is_startup() {
                let _ = writeln!(
                    stderr,
                    "batches committed before the failure stay indexed; rerun with the --id logged above"
                );
            }
            ExitCode::FAILURE
        }
    }
}
