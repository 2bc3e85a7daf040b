use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use packet_sniff::{AcquisitionMode, CaptureConfig, PendingSession};


/// Capture packets for all interfaces (default) or a given interface.
#[derive(Parser)]
#[clap(name = "packet-sniff", version)]
struct Opts {
    /// Decode through the packet source (using the interface's link type) instead of reading raw frames
    #[clap(long)]
    decode_source: bool,

    /// Hand over each frame as it arrives instead of batching through the capture buffer
    #[clap(long)]
    syscalls: bool,

    /// Print lots of debugging messages
    #[clap(long)]
    debug: bool,

    /// Interface from which to capture, default to all
    #[clap(short, long, default_value = "")]
    interface: String,

    /// Close the capture after given number of seconds, 0 to never close
    #[clap(long, default_value_t = 0)]
    timeout: u64,

    /// Capture filter expression, e.g. "udp port 53"
    filter: Vec<String>,
}
impl Opts {
    fn to_config(&self) -> CaptureConfig {
        let mode = if self.decode_source {
            AcquisitionMode::Mediated
        } else {
            AcquisitionMode::Raw
        };
        CaptureConfig {
            interface: self.interface.clone(),
            mode,
            use_syscalls: self.syscalls,
            ..CaptureConfig::default()
        }
            .with_timeout_secs(self.timeout)
            .with_filter_words(self.filter.as_slice())
    }
}


fn init_logging(debug: bool) -> WorkerGuard {
    let (writer, guard) = tracing_appender::non_blocking(std::io::stderr());
    let default_level = if debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(writer)
        .init();
    guard
}


#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let opts = Opts::parse();
    let _log_guard = init_logging(opts.debug);
    let config = opts.to_config();

    eprintln!("capturing from interface {}", config.device_name());
    let session = PendingSession::open(&config)
        .context("failed to open capture")?
        .attach_filter(&config.filter)
        .context("unexpected error setting filter")?;

    let handle = session.handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        if let Ok(true) = tokio::task::spawn_blocking(move || handle.close()).await {
            info!("interrupted, capture closed");
        }
    });

    session.run(|summary| print!("{}", summary)).await?;
    Ok(())
}
