use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use viaduct::proxy::{Proxy, ProxyConfig};
use viaduct::upstream::effective_timeout;

#[derive(Parser)]
#[command(name = "viaduct")]
#[command(about = "UDP to DNS-over-HTTPS proxy", long_about = None)]
struct Args {
    /// Local UDP listen address
    #[arg(short, long, default_value = "0.0.0.0:53")]
    listen: SocketAddr,

    /// Upstream DNS-over-HTTPS endpoint
    #[arg(short = 's', long, default_value = "https://dns.google/dns-query")]
    server: String,

    /// Disable TLS certificate verification
    #[arg(short = 'n', long)]
    no_verify: bool,

    /// CA bundle path (defaults to rootCA.bin next to the executable)
    #[arg(short = 'c', long)]
    ca_bundle: Option<PathBuf>,

    /// Upstream request timeout in seconds (values below 1 fall back to 3)
    #[arg(short = 't', long, default_value = "3")]
    timeout: i64,

    /// Log file path; logs to the console when unset
    #[arg(long)]
    logfile: Option<PathBuf>,
}

/// Initialize tracing, keeping the file writer's flush guard alive when
/// logging to a file.
fn init_logging(logfile: Option<&Path>) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match logfile {
        Some(path) => {
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
            let name = path.file_name().unwrap_or_else(|| "viaduct.log".as_ref());
            let appender = tracing_appender::rolling::never(dir.unwrap_or(Path::new(".")), name);
            let (writer, guard) = tracing_appender::non_blocking(appender);

            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();

            Some(guard)
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            None
        }
    }
}

/// rootCA.bin in the executable's directory, if that can be determined.
fn default_ca_bundle() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    Some(exe.parent()?.join("rootCA.bin"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let _guard = init_logging(args.logfile.as_deref());

    let config = ProxyConfig {
        listen_addr: args.listen,
        doh_url: args.server,
        verify_disabled: args.no_verify,
        ca_bundle: args.ca_bundle.or_else(default_ca_bundle),
        timeout: effective_timeout(args.timeout),
    };

    let proxy = match Proxy::bind(config).await {
        Ok(proxy) => proxy,
        Err(e) => {
            error!(error = %e, "failed to start proxy");
            return Err(e.into());
        }
    };

    proxy.run().await;

    Ok(())
}
