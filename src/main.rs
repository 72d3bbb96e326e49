use std::path::PathBuf;
use std::process;

use anyhow::{anyhow, Context};
use clap::Parser;
use log::LevelFilter;
use phaeton::{run, ConfigError, CountingHandler, RunConfig};

/// Count the points, paths and relations of an OpenStreetMap extract
#[derive(Debug, Parser)]
#[command(name = "phaeton", disable_version_flag = true)]
struct Args {
    /// Input *.osm.pbf file
    input: Option<PathBuf>,

    /// Zoom level for spatial processing (0-20)
    #[arg(short, long, value_name = "N")]
    zoom: Option<u32>,

    /// Print version
    #[arg(short = 'v', long)]
    version: bool,

    /// Verbose logging on stderr (--verbose, --verbose --verbose, ...)
    #[arg(long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .format_module_path(false)
        .format_timestamp_millis()
        .init();
}

fn run_cli(args: Args) -> anyhow::Result<()> {
    let input = args
        .input
        .ok_or(ConfigError::MissingInput)
        .context("invalid configuration")?;
    let config = RunConfig::new(input, args.zoom).context("invalid configuration")?;

    let counts = run(&config, CountingHandler::new())
        .map_err(|e| anyhow!("{}: {}", e.category(), e))?;

    println!("{counts}");
    Ok(())
}

fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        // --help
        Err(err) if !err.use_stderr() => err.exit(),
        Err(err) => {
            let _ = err.print();
            process::exit(1);
        }
    };

    if args.version {
        println!("phaeton {}", env!("CARGO_PKG_VERSION"));
        return;
    }

    init_logging(args.verbose);

    if let Err(e) = run_cli(args) {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}
