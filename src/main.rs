use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use abx_client::config::{parse_duration, ClientConfig, DEFAULT_HOST, DEFAULT_OUTPUT, DEFAULT_PORT};
use abx_client::logging::{init_logging, LogFormat, LogLevel};
use abx_client::run_session;
use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};

#[derive(Debug, Parser)]
#[command(name = "abx-client", version, about = "Retrieve, gap-fill and save the ABX exchange packet stream")]
struct Args {
    /// Exchange server host
    #[arg(long, env = "ABX_HOST", default_value = DEFAULT_HOST)]
    host: String,

    /// Exchange server port
    #[arg(long, short = 'p', env = "ABX_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Output JSON file path
    #[arg(long, short = 'o', env = "ABX_OUTPUT", default_value = DEFAULT_OUTPUT)]
    output: PathBuf,

    /// Connect timeout (e.g. 500ms, 5s)
    #[arg(long, value_parser = duration_arg)]
    connect_timeout: Option<Duration>,

    /// Socket read/write timeout (e.g. 500ms, 5s)
    #[arg(long, value_parser = duration_arg)]
    read_timeout: Option<Duration>,

    /// Use a second connection for resend requests
    #[arg(long, default_value_t = false)]
    reconnect_for_repairs: bool,

    /// Log output format (stderr)
    #[arg(long, value_name = "FORMAT", default_value = "text")]
    log_format: LogFormat,

    /// Minimum log level (stderr)
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    log_level: LogLevel,
}

fn duration_arg(input: &str) -> Result<Duration, String> {
    parse_duration(input).map_err(|e| e.to_string())
}

impl Args {
    fn config(&self) -> ClientConfig {
        ClientConfig {
            host: self.host.clone(),
            port: self.port,
            output: self.output.clone(),
            connect_timeout: self.connect_timeout,
            read_timeout: self.read_timeout,
            reconnect_for_repairs: self.reconnect_for_repairs,
        }
    }
}

fn run(config: &ClientConfig) -> Result<()> {
    let report = run_session(config)
        .with_context(|| format!("session with {} failed", config.address()))?;

    if !report.failures.is_empty() {
        let failed: Vec<(i32, i32)> = report
            .failures
            .iter()
            .map(|f| (f.sequence, f.last))
            .collect();
        warn!(
            unrecovered = report.stats.repair_failures(),
            ?failed,
            "some missing packets could not be recovered"
        );
    }
    info!(
        packets = report.packets.len(),
        path = %config.output.display(),
        "data successfully saved"
    );
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.log_format, args.log_level);

    match run(&args.config()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
