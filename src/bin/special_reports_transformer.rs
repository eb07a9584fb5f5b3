use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use miette::IntoDiagnostic;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use special_reports_transformer::api::{self, SpecialReportService};
use special_reports_transformer::catalog::Catalog;
use special_reports_transformer::config::{
    Config, ConfigLoader, DEFAULT_BASE_URL, DEFAULT_TME_BASE_URL, LogFormat,
};
use special_reports_transformer::error::TransformerError;
use special_reports_transformer::tme::TmeHttpClient;

#[derive(Parser)]
#[command(name = "special-reports-transformer")]
#[command(about = "A RESTful API for transforming TME Special Reports to UP json")]
#[command(version, author)]
struct Cli {
    #[arg(long, env = "TME_USERNAME", default_value = "", hide_env_values = true)]
    tme_username: String,

    #[arg(long, env = "TME_PASSWORD", default_value = "", hide_env_values = true)]
    tme_password: String,

    #[arg(long, env = "TOKEN", default_value = "", hide_env_values = true)]
    token: String,

    #[arg(long, env = "BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    #[arg(long, env = "TME_BASE_URL", default_value = DEFAULT_TME_BASE_URL)]
    tme_base_url: String,

    #[arg(long, env = "PORT", default_value_t = 8080)]
    port: u16,

    #[arg(long, env = "MAX_RECORDS", default_value_t = 10000)]
    max_records: usize,

    #[arg(long, env = "SLICES", default_value_t = 10)]
    slices: usize,

    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    request_timeout_secs: u64,

    #[arg(long, env = "MAX_RETRIES", default_value_t = 5)]
    max_retries: usize,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Json)]
    log_format: LogFormat,
}

impl Cli {
    fn into_config(self) -> Config {
        Config {
            tme_username: self.tme_username,
            tme_password: self.tme_password,
            token: self.token,
            base_url: self.base_url,
            tme_base_url: self.tme_base_url,
            port: self.port,
            max_records: self.max_records,
            slices: self.slices,
            request_timeout_secs: self.request_timeout_secs,
            max_retries: self.max_retries,
        }
    }
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<TransformerError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &TransformerError) -> u8 {
    match error {
        TransformerError::InvalidConfig(_) => 2,
        err if err.is_upstream() => 3,
        _ => 1,
    }
}

fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init(),
    }
}

fn run() -> miette::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_format);

    let resolved = ConfigLoader::resolve_config(cli.into_config())?;
    let port = resolved.port;

    let client = TmeHttpClient::new(resolved.tme)?;
    let catalog = Catalog::load(client, resolved.catalog).inspect_err(|err| {
        error!(error = %err, "error while creating special reports service");
    })?;
    info!(count = catalog.count(), "special reports service ready");

    // The blocking TME client must not be dropped inside the async runtime,
    // so this handle outlives it.
    let service: Arc<dyn SpecialReportService> = Arc::new(catalog);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .into_diagnostic()?;
    let served = runtime.block_on(api::serve(Arc::clone(&service), port));
    drop(runtime);
    drop(service);

    served?;
    Ok(())
}
