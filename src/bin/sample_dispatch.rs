//! sample-dispatch: 批量音频特征提取的命令行入口
//!
//! Usage:
//!   sample-dispatch run --params <file.json> [--keys <file>]   Extract features for the keys
//!   sample-dispatch config                                     Show the effective configuration
//!   sample-dispatch version                                    Show version information

use anyhow::{bail, Context};
use sample_dispatch::config::DispatchConfig;
use sample_dispatch::features::{AudioKeyFilter, FeatureDispatch, ProcessParams};
use sample_dispatch::Error;
use std::io::Read;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    let outcome = match args[1].as_str() {
        "run" => cmd_run(&args[2..]).await,
        "config" => cmd_config(),
        "version" | "--version" | "-V" => {
            cmd_version();
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    };

    if let Err(e) = outcome {
        eprintln!("error: {}", describe(&e));
        std::process::exit(1);
    }
}

fn print_usage() {
    println!(
        r#"sample-dispatch: 批量音频特征提取

USAGE:
    sample-dispatch <COMMAND> [OPTIONS]

COMMANDS:
    run --params <file> [--keys <file>]   Extract features; keys are read from stdin without --keys
    config                                Print the effective configuration
    version                               Show version information
    help                                  Show this help message

ENVIRONMENT:
    SERVICE_URL                 Feature worker base URL (default http://localhost:8080)
    MAX_CONCURRENCY             Batch calls in flight (default 5)
    CHUNK_SIZE                  Keys per batch (default 100)
    RETRY_ATTEMPTS              Attempts per batch (default 3)
    RETRY_DELAY_MS              Pause between attempts (default 1000)
    HTTP_TIMEOUT_SECS           Request write timeout (default 60)
    HTTP_CONNECT_TIMEOUT_SECS   Connect timeout (default 20)
    HTTP_READ_TIMEOUT_SECS      Response wait timeout (default 600)
    RUST_LOG                    Log filter (default info)"#
    );
}

fn cmd_version() {
    println!("sample-dispatch {}", env!("CARGO_PKG_VERSION"));
}

/// Errors surfaced by the engine are reported without their chain; a failed batch shows only
/// the generic retry message.
fn describe(e: &anyhow::Error) -> String {
    match e.downcast_ref::<Error>() {
        Some(Error::RetryExhausted { .. }) => "processing failed after retries".to_string(),
        Some(inner) => inner.to_string(),
        None => format!("{:#}", e),
    }
}

fn flag_value(args: &[String], flag: &str) -> Option<PathBuf> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from)
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn cmd_config() -> anyhow::Result<()> {
    let config = DispatchConfig::from_env()?;
    println!("service_url       {}", config.service_url);
    println!("max_concurrency   {}", config.max_concurrency);
    println!("chunk_size        {}", config.chunk_size);
    println!("retry_attempts    {}", config.retry_attempts);
    println!("retry_delay       {:?}", config.retry_delay);
    println!("timeout_total     {:?}", config.timeouts.total);
    println!("timeout_connect   {:?}", config.timeouts.connect);
    println!("timeout_read      {:?}", config.timeouts.read);
    Ok(())
}

fn read_keys(path: Option<&PathBuf>) -> anyhow::Result<Vec<String>> {
    let raw = match path {
        Some(p) => std::fs::read_to_string(p)
            .with_context(|| format!("cannot read keys from {}", p.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("cannot read keys from stdin")?;
            buf
        }
    };
    Ok(parse_keys(&raw))
}

/// One key per line; surrounding whitespace and blank lines are dropped.
fn parse_keys(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect()
}

async fn cmd_run(args: &[String]) -> anyhow::Result<()> {
    init_logging();

    let Some(params_path) = flag_value(args, "--params") else {
        bail!("missing --params <file.json>");
    };
    let params_raw = std::fs::read_to_string(&params_path)
        .with_context(|| format!("cannot read params from {}", params_path.display()))?;
    let params: ProcessParams = serde_json::from_str(&params_raw)
        .with_context(|| format!("invalid params in {}", params_path.display()))?;

    let listed = read_keys(flag_value(args, "--keys").as_ref())?;
    let listed_count = listed.len();
    let keys = AudioKeyFilter::new().filter(listed);
    info!(
        listed = listed_count,
        audio = keys.len(),
        max_files = params.max_files,
        "keys loaded"
    );

    let client = FeatureDispatch::new(DispatchConfig::from_env()?)?;
    let (set, stats) = client.extract_with_stats(keys, params).await?;
    info!(
        files = set.len(),
        batches = stats.batch_count,
        max_active = stats.max_active,
        elapsed_ms = stats.elapsed.as_millis() as u64,
        "extraction finished"
    );

    println!("{}", serde_json::to_string(&set)?);
    Ok(())
}
