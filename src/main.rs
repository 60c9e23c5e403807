// Entrypoint for the CLI application.
// - Parses flags (with environment fallbacks) into a `Config`.
// - Logs in to the controller, then hands a `Context` to the menu loop.

use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use apic_cli::config::{Config, HttpConfig, DEFAULT_SPARK_URL};
use apic_cli::library::Library;
use apic_cli::spark::SparkSession;
use apic_cli::transport::ReqwestTransport;
use apic_cli::ui::{self, Context};
use clap::Parser;

/// Interactive client for the APIC-EM controller with Cisco Spark relay.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Controller host, e.g. https://sandboxapic.cisco.com.
    #[clap(long, env = "APIC_HOST")]
    host: Option<String>,

    /// Controller user name.
    #[clap(long, env = "APIC_USER")]
    user: Option<String>,

    /// Controller password. Prompted for when absent.
    #[clap(long, env = "APIC_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Spark user token, without the "Bearer" prefix.
    #[clap(long, env = "SPARK_TOKEN", hide_env_values = true)]
    spark_token: Option<String>,

    /// Spark API root.
    #[clap(long, env = "SPARK_API_URL", default_value = DEFAULT_SPARK_URL)]
    spark_url: String,

    /// Request timeout in seconds.
    #[clap(long, default_value_t = 10)]
    timeout: u64,

    /// Seconds to wait for a path trace before fetching its result.
    #[clap(long, default_value_t = 10)]
    path_trace_wait: u64,

    /// Verify TLS certificates. Off by default because controllers
    /// usually present self-signed certificates.
    #[clap(long)]
    verify_certs: bool,

    /// Log debug output to stderr.
    #[clap(short, long)]
    verbose: bool,
}

impl Args {
    fn into_config(self) -> Config {
        Config {
            http: HttpConfig::default()
                .with_timeout(Duration::from_secs(self.timeout))
                .accept_invalid_certs(!self.verify_certs),
            apic_host: self.host,
            apic_user: self.user,
            apic_password: self.password,
            spark_url: self.spark_url,
            spark_token: self.spark_token,
            path_trace_wait: Duration::from_secs(self.path_trace_wait),
        }
    }
}

fn start(config: Config) -> Result<()> {
    let transport = ReqwestTransport::new(&config.http)?;

    ui::banner();
    let library: Library<ReqwestTransport> = ui::connect(&config, &transport)?;
    ui::clear_screen()?;

    let mut spark = SparkSession::new(&config.spark_url, transport)?;
    if let Some(token) = &config.spark_token {
        if !spark.set_token(token) {
            println!("The configured Spark user token is not valid.");
        }
    }

    let mut ctx = Context::new(library, spark, config.path_trace_wait);
    ui::main_menu(&mut ctx)
}

fn main() -> ExitCode {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or(default_level.into()))
        .with_writer(std::io::stderr)
        .init();

    let config = args.into_config();
    tracing::debug!(?config, "starting");

    match start(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
