use clap::{ArgAction, Parser};
use snapshot_export::export::{ensure_output_folder, Exporter, FileOutcome, FileReport, MetadataOutcome};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "Usage: snapshot-export <exportFolderPath> <outputFolderPath> <exportCode>";

#[derive(Parser)]
#[command(
    name = "snapshot-export",
    about = "Decrypt an exported snapshot folder into JPEG images and JSON metadata",
    override_usage = "snapshot-export <EXPORT_FOLDER> <OUTPUT_FOLDER> <EXPORT_CODE>"
)]
struct Cli {
    /// Folder containing the encrypted snapshot files
    export_folder: PathBuf,
    /// Folder to write decrypted images and metadata into (created if missing)
    output_folder: PathBuf,
    /// Export code shown when the export was created; spaces and hyphens are ignored
    export_code: String,
    /// Log more detail to stderr (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() {
    // Bad arguments are not an error exit: print usage and stop.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            if e.use_stderr() {
                println!("{USAGE}");
            } else {
                let _ = e.print();
            }
            return;
        }
    };

    init_logging(cli.verbose);

    println!("Reading snapshots from: {}", cli.export_folder.display());
    println!("Writing content to: {}", cli.output_folder.display());
    println!("Export code: {}", cli.export_code);
    println!();

    if !cli.output_folder.is_dir() {
        println!("The output folder path doesn't exist.");
        println!("Creating directory: {}", cli.output_folder.display());
        println!();
    }

    let result = ensure_output_folder(&cli.output_folder)
        .and_then(|()| Exporter::new(&cli.export_code))
        .and_then(|exporter| exporter.export_folder(&cli.export_folder, &cli.output_folder, print_file));

    match result {
        Ok(report) => {
            println!();
            println!("{}", report.summary());
        }
        Err(e) => {
            tracing::error!(error = %e, "export aborted");
            println!("Decryption of snapshot and metadata has failed.");
        }
    }
}

fn print_file(file: &FileReport) {
    let name = &file.file_name;
    match &file.outcome {
        FileOutcome::Failed(_) => {
            println!("Decryption of the file has failed. FileName: {name}");
        }
        FileOutcome::Exported { image, metadata } => {
            println!("Decrypted screenshot: {}", display_name(image));
            match metadata {
                MetadataOutcome::Written(path) => println!("Decrypted metadata: {}", display_name(path)),
                MetadataOutcome::Absent => {}
                MetadataOutcome::Failed(_) => {
                    println!("Decryption of the metadata has failed. FileName: {name}");
                }
            }
        }
    }
}

fn display_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
