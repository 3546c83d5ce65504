use clap::{Parser, Subcommand};
use geocells::{Config, Pipeline, Result};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "geocells", version, about = "Partition geo-tagged images into hexagonal cell classes")]
struct Args {
    /// Configuration file (.json or .toml); defaults are used when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the per-bucket stage files
    #[arg(long, global = true, default_value = "work")]
    work_dir: PathBuf,

    /// Override the configured worker count (0 = one per core)
    #[arg(long, global = true)]
    workers: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate cell centers for every tiling
    Centers,
    /// Split the image manifest into region buckets
    Split {
        #[arg(long)]
        manifest: PathBuf,
    },
    /// Assign bucketed images to cell centers
    Assign,
    /// Merge assignments into heading-variant label lines
    Merge,
    /// Build the class cache from the label files
    Cache {
        #[arg(long, default_value = "cache.bin")]
        output: PathBuf,
    },
    /// Run every stage from manifest to cache
    Run {
        #[arg(long)]
        manifest: PathBuf,

        #[arg(long, default_value = "cache.bin")]
        output: PathBuf,
    },
    /// Print the effective configuration as JSON
    Config,
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path),
        None => Ok(Config::default()),
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut config = load_config(args.config.as_deref())?;
    if let Some(workers) = args.workers {
        config = config.with_workers(workers);
    }

    if let Command::Config = args.command {
        println!("{}", config.to_json()?);
        return Ok(());
    }

    let pipeline = Pipeline::new(config, &args.work_dir)?;
    match args.command {
        Command::Centers => {
            pipeline.generate_centers()?;
        }
        Command::Split { manifest } => {
            pipeline.split_manifest(&manifest)?;
        }
        Command::Assign => {
            pipeline.assign()?;
        }
        Command::Merge => {
            pipeline.merge_labels()?;
        }
        Command::Cache { output } => {
            pipeline.build_cache(&output)?;
        }
        Command::Run { manifest, output } => {
            let stats = pipeline.run(&manifest, &output)?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Command::Config => {}
    }
    Ok(())
}
