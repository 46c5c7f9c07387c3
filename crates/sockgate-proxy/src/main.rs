//! `sockgate` binary
//!
//! Exposes a Unix-socket HTTP service (the Docker Engine API by default) on a
//! TCP port behind TLS, generating and persisting its own CA, server and
//! client certificates on first start.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};

use sockgate_certs::{CertConfig, CertManager};
use sockgate_core::resolve_hosts;
use sockgate_proxy::{TlsServer, UnixSocketProxy};

const DEFAULT_LOG_FILTER: &str = "sockgate=info,sockgate_proxy=info,sockgate_certs=info";

#[derive(Parser, Debug)]
#[command(name = "sockgate")]
#[command(version, about = "TLS gateway for a Unix-socket HTTP service")]
struct Cli {
    /// Directory holding the CA, server and client certificates
    #[arg(long, global = true, default_value = "/certs", env = "SOCKGATE_CERTPATH")]
    certpath: PathBuf,

    /// Organization written into every generated certificate
    #[arg(long, global = true, default_value = "unknown", env = "SOCKGATE_ORGANIZATION")]
    organization: String,

    /// Keep generated certificates in memory only; nothing is written to disk.
    #[arg(long, global = true, env = "SOCKGATE_EPHEMERAL")]
    ephemeral: bool,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long, global = true, env = "SOCKGATE_LOG_JSON")]
    log_json: bool,

    /// Defaults to `serve` with no extra hosts.
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the TLS proxy (default)
    Serve(ServeArgs),
    /// Only obtain or generate the client certificate bundle, then exit
    ClientCert,
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Backend Unix socket
    #[arg(long, default_value = "/var/run/docker.sock", env = "SOCKGATE_SOCKPATH")]
    sockpath: PathBuf,

    /// TCP bind address
    #[arg(long, default_value = "0.0.0.0:2376", env = "SOCKGATE_ADDR")]
    addr: SocketAddr,

    /// Do not add local interface IPv4 addresses to the server certificate
    #[arg(long)]
    no_discover: bool,

    /// Require clients to present a certificate signed by the local CA
    #[arg(long, env = "SOCKGATE_REQUIRE_CLIENT_CERT")]
    require_client_cert: bool,

    /// Extra host names or addresses for the server certificate
    hosts: Vec<String>,
}

/// `serve` options taken from defaults and the environment only, for a bare
/// `sockgate` invocation.
#[derive(Parser, Debug)]
#[command(name = "sockgate")]
struct DefaultServe {
    #[command(flatten)]
    args: ServeArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    sockgate_core::tracing_init::init_tracing(DEFAULT_LOG_FILTER, cli.log_json)
        .context("failed to initialise logging")?;

    let config = CertConfig {
        ephemeral: cli.ephemeral,
        ..CertConfig::default().with_organization(cli.organization.clone())
    };
    if !config.ephemeral {
        ensure_cert_dir(&cli.certpath)?;
    }
    let manager = CertManager::new(cli.certpath.clone(), config);

    match cli.command {
        Some(Command::ClientCert) => {
            manager
                .obtain_client_bundle()
                .context("failed to obtain client certificate")?;
            info!(dir = %cli.certpath.display(), "Client certificate ready");
            Ok(())
        }
        Some(Command::Serve(args)) => serve(&manager, args).await,
        None => {
            let defaults = DefaultServe::try_parse_from(["sockgate"])?;
            serve(&manager, defaults.args).await
        }
    }
}

async fn serve(manager: &CertManager, args: ServeArgs) -> anyhow::Result<()> {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = %args.addr,
        sockpath = %args.sockpath.display(),
        certpath = %manager.dir().display(),
        ephemeral = manager.config().ephemeral,
        "Starting sockgate"
    );

    let hosts = resolve_hosts(!args.no_discover, &args.hosts)
        .context("failed to enumerate network interfaces")?;
    if hosts.is_empty() {
        warn!("Server certificate will carry no subject alternative names");
    }

    let server_bundle = manager
        .obtain_server_bundle(&hosts)
        .context("failed to obtain server certificate")?;
    let tls = if args.require_client_cert {
        info!("Client certificates required");
        server_bundle.mutual_tls_config()
    } else {
        server_bundle.tls_config()
    }
    .context("invalid server certificate material")?;

    manager
        .obtain_client_bundle()
        .context("failed to obtain client certificate")?;

    let app = UnixSocketProxy::new(args.sockpath).router();
    let server = TlsServer::bind(args.addr, tls).await?;

    #[cfg(unix)]
    sd_notify::notify(true, &[sd_notify::NotifyState::Ready])?;

    info!(addr = %server.local_addr()?, "sockgate ready");
    server.serve_with_shutdown(app, shutdown_signal()).await;

    info!("sockgate stopped");
    Ok(())
}

fn ensure_cert_dir(dir: &Path) -> anyhow::Result<()> {
    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder
        .create(dir)
        .with_context(|| format!("failed to create certificate directory {}", dir.display()))
}

async fn shutdown_signal() {
    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C shutdown signal");
        }
        () = sigterm => {
            info!("Received SIGTERM shutdown signal");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn client_cert_after_global_flag() {
        let cli = Cli::try_parse_from(["sockgate", "--certpath", "x", "client-cert"]).unwrap();
        assert!(matches!(cli.command, Some(Command::ClientCert)));
        assert_eq!(cli.certpath, PathBuf::from("x"));
    }

    #[test]
    fn client_cert_before_global_flag() {
        let cli = Cli::try_parse_from(["sockgate", "client-cert", "--certpath", "x"]).unwrap();
        assert!(matches!(cli.command, Some(Command::ClientCert)));
        assert_eq!(cli.certpath, PathBuf::from("x"));
    }

    #[test]
    fn serve_takes_hosts() {
        let cli = Cli::try_parse_from([
            "sockgate",
            "--certpath",
            "x",
            "serve",
            "--no-discover",
            "docker.local",
            "10.0.0.5",
        ])
        .unwrap();
        let Some(Command::Serve(args)) = cli.command else {
            panic!("expected the serve subcommand");
        };
        assert!(args.no_discover);
        assert_eq!(args.hosts, ["docker.local", "10.0.0.5"]);
    }

    #[test]
    fn bare_invocation_has_no_command() {
        let cli = Cli::try_parse_from(["sockgate", "--ephemeral"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.ephemeral);
    }

    #[test]
    fn stray_host_without_serve_is_rejected() {
        assert!(Cli::try_parse_from(["sockgate", "docker.local"]).is_err());
    }
}
