use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{ Result, Error };
use clap::{ Parser, Subcommand, Args };
use indicatif::{ ProgressBar, ProgressStyle };
use tracing::{ info, warn, error };

use crate::client::LookupClient;
use crate::dispatch::DispatcherOpt;

mod client;
mod dispatch;
mod extract;
mod logger;
mod report;
mod result;
mod utils;

#[derive(Parser)]
#[command(
    version,
    about = "Bulk IP fraud-risk checker",
    long_about = "Bulk IP fraud-risk checker\n\n\
    Fraudscan fetches the public fraud-risk page for every IP address in a\n\
    list, extracts the embedded risk record from the page markup, and\n\
    writes a CSV report with one row per input address."
)]
struct Cli {
    #[command(subcommand)]
    subcommand: SubCommands,
    /// Increase logging verbosity
    #[arg(short('v'), long, action = clap::ArgAction::Count)]
    verbosity: u8,
}

#[derive(Subcommand)]
pub enum SubCommands {
    #[command(
        about = "Check a list of IP addresses and write a CSV report",
        name = "check"
    )] CheckCommand(CheckArgs),
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Input file with one IP address per line
    #[arg(short('i'), long, env = "FRAUDSCAN_INPUT", value_name = "path")]
    input: PathBuf,
    /// Output CSV file; missing parent directories are created
    #[arg(short('o'), long, env = "FRAUDSCAN_OUTPUT", value_name = "path")]
    output: PathBuf,
    /// File with one User-Agent string per line; built-in list when omitted
    #[arg(short('u'), long, env = "FRAUDSCAN_USERAGENTS", value_name = "path")]
    useragents: Option<PathBuf>,
    /// Number of concurrent lookup workers
    #[arg(
        short('t'),
        long,
        env = "FRAUDSCAN_THREADS",
        value_name = "count",
        default_value_t = 10
    )]
    threads: usize,
    /// Root URL of the fraud-risk lookup service
    #[arg(
        long = "base-url",
        env = "FRAUDSCAN_BASE_URL",
        value_name = "url",
        default_value = "https://scamalytics.com"
    )]
    base_url: String,
    /// Emit logs as JSON
    #[arg(long = "json-logging", env = "FRAUDSCAN_JSON_LOGGING", default_value_t = false)]
    json_logging: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    run(Cli::parse()).await
}

fn log_startup_err(context: &str, err: Error) -> Error {
    error!("error {}: {:?}", context, err);
    err
}

async fn run(args: Cli) -> Result<()> {
    let SubCommands::CheckCommand(cargs) = args.subcommand;
    let level = logger::verbosity_to_level_filter(args.verbosity);
    let sub = logger::setup_logger(level, cargs.json_logging)?;
    tracing::subscriber::set_global_default(sub)?;

    let ips = utils
        ::read_lines(&cargs.input)
        .map_err(|e| log_startup_err("reading input file", e))?;
    if ips.is_empty() {
        warn!("no IP addresses found in {}", cargs.input.display());
    }
    info!("checking {} IP addresses using {} workers", ips.len(), cargs.threads);

    let user_agents = match &cargs.useragents {
        Some(path) if path.is_file() =>
            utils::read_lines(path).map_err(|e| log_startup_err("reading user agent file", e))?,
        Some(path) => {
            warn!("user agent file {} not found, using built-in list", path.display());
            vec![]
        }
        None => vec![],
    };

    let client = Arc::new(
        LookupClient::new(&cargs.base_url, user_agents).map_err(|e|
            log_startup_err("building http client", e)
        )?
    );

    let progress = ProgressBar::new(ips.len() as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("█▓░")
    );
    let bar = progress.clone();
    let opt = DispatcherOpt {
        client,
        ips,
        threads: cargs.threads,
        progress: Some(
            Box::new(move |done, _total, ip| {
                bar.set_position(done as u64);
                bar.set_message(ip.to_string());
            })
        ),
    };
    let results = dispatch::run_batch(opt).await;
    progress.finish_and_clear();

    report
        ::write_report(&cargs.output, &results)
        .map_err(|e| log_startup_err("writing report", e))?;
    println!("Wrote {} records to {}", results.len(), cargs.output.display());
    Ok(())
}
