use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use imgsort_core::{CancellationToken, ClusteringConfig, OrganizeOptions, RenameOptions, RunControl, RunReport};
use indicatif::{ProgressBar, ProgressStyle};

#[derive(Parser)]
#[command(name = "imgsort", version, about = "Rename photos by capture time and sort them into trip folders")]
struct Cli {
    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Print the run report as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rename images to img_<YYYYMMDD_HHmmss>_<ID>.<EXT>
    Rename {
        /// Folder containing the images
        folder: PathBuf,

        /// Simulate the actions without modifying the file system
        #[arg(long)]
        dry_run: bool,

        /// Also process subfolders
        #[arg(short, long)]
        recursive: bool,

        /// Disable date guessing from filenames
        #[arg(long)]
        no_guess: bool,

        /// Do not fall back to the file modification time
        #[arg(long)]
        no_mtime: bool,
    },

    /// Move normalized images into folders by time and place
    Organize {
        /// Folder containing the images
        folder: PathBuf,

        /// Simulate the actions without modifying the file system
        #[arg(long)]
        dry_run: bool,

        /// Also process subfolders
        #[arg(short, long)]
        recursive: bool,

        /// JSON file with clustering settings (flags below override it)
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Max seconds between consecutive pictures of one folder
        #[arg(long, value_name = "SECS")]
        time_gap: Option<u64>,

        /// Max meters between consecutive pictures of one folder
        #[arg(long, value_name = "METERS")]
        distance: Option<f64>,

        /// Keep pictures together when either time or distance is close enough
        #[arg(long)]
        either: bool,

        /// Allow folders to span a new year and do not nest them under <YYYY>/
        #[arg(long)]
        no_year_split: bool,

        /// Leave clusters with fewer pictures where they are
        #[arg(long, value_name = "N")]
        min_cluster_size: Option<usize>,
    },
}

fn progress_bar(hidden: bool) -> anyhow::Result<ProgressBar> {
    if hidden {
        return Ok(ProgressBar::hidden());
    }
    let pb = ProgressBar::new(0);
    pb.set_style(ProgressStyle::with_template("{spinner} [{prefix}] {pos}/{len} {msg}")?);
    Ok(pb)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    let token = CancellationToken::new();
    {
        let token = token.clone();
        ctrlc::set_handler(move || {
            eprintln!("\nInterrupted, finishing the current file...");
            token.cancel();
        })
        .context("installing Ctrl-C handler")?;
    }
    let control = RunControl::new().with_cancel_token(token);

    // Log lines and a live bar do not mix well
    let pb = progress_bar(cli.json || cli.verbose > 0)?;
    let on_progress = |stage: &str, current: u64, total: u64, message: &str| {
        pb.set_prefix(stage.to_string());
        pb.set_length(total);
        pb.set_position(current + 1);
        pb.set_message(message.to_string());
    };

    let report = match cli.command {
        Commands::Rename {
            folder,
            dry_run,
            recursive,
            no_guess,
            no_mtime,
        } => {
            let options = RenameOptions {
                folder,
                dry_run,
                recursive,
                no_guess,
                no_mtime,
            };
            imgsort_core::rename_with(&options, &imgsort_core::ExifReader, &control, &on_progress)?
        }
        Commands::Organize {
            folder,
            dry_run,
            recursive,
            config,
            time_gap,
            distance,
            either,
            no_year_split,
            min_cluster_size,
        } => {
            let mut clustering = match &config {
                Some(path) => {
                    let cfg = ClusteringConfig::from_json_file(path)?;
                    log::info!("Loaded clustering config from {}", path.display());
                    cfg
                }
                None => ClusteringConfig::default(),
            };
            if let Some(secs) = time_gap {
                clustering.time_gap_threshold = secs;
            }
            if let Some(meters) = distance {
                clustering.distance_threshold = meters;
            }
            if either {
                clustering.require_both = false;
            }
            if no_year_split {
                clustering.split_by_year = false;
            }
            if let Some(n) = min_cluster_size {
                clustering.min_cluster_size = n;
            }
            clustering.validate()?;

            let options = OrganizeOptions {
                folder,
                dry_run,
                recursive,
                clustering,
            };
            imgsort_core::organize_with(&options, &imgsort_core::ExifReader, &control, &on_progress)?
        }
    };
    pb.finish_and_clear();

    print_report(&report, cli.json)?;

    if report.cancelled {
        anyhow::bail!("interrupted before all files were processed");
    }
    Ok(())
}

fn print_report(report: &RunReport, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        println!("{}", report);
    }
    Ok(())
}
