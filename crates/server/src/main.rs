//! Lanshare Server
//!
//! Ad-hoc file sharing over HTTP for local networks.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use clap::Parser;
use server::auth::AuthGate;
use server::config::ServerConfig;
use server::files::PathResolver;
use server::http::{router, AppState};
use server::share::ShareLinkStore;
use server::sync::SyncHub;
use server::trust::TrustResolver;

/// Lanshare - share a directory over HTTP with live sync.
#[derive(Parser, Debug)]
#[command(name = "lanshare")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Address to bind to
    #[arg(short = 'i', long, value_name = "IP")]
    bind_ip: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Directory to serve
    #[arg(short = 'd', long, value_name = "DIR")]
    webroot: Option<PathBuf>,

    /// Directory uploads land in (defaults to the webroot)
    #[arg(short = 'u', long, value_name = "DIR")]
    upload_dir: Option<PathBuf>,

    /// Serve files but refuse uploads and deletes
    #[arg(long)]
    read_only: bool,

    /// Accept uploads but refuse listings, downloads and deletes
    #[arg(long)]
    upload_only: bool,

    /// Refuse deletes while allowing everything else
    #[arg(long)]
    no_delete: bool,

    /// Disable the shared clipboard
    #[arg(long)]
    no_clipboard: bool,

    /// Allow viewers to run shell commands on the host
    #[arg(long)]
    enable_command: bool,

    /// Basic-auth credential as user:password or user:bcrypt-hash
    #[arg(short = 'a', long, value_name = "USER:PASS")]
    auth: Option<String>,

    /// Comma-separated CIDR allow-list
    #[arg(short = 'w', long, value_name = "CIDRS")]
    whitelist: Option<String>,

    /// Comma-separated CIDRs of proxies whose forwarded headers are trusted
    #[arg(long, value_name = "CIDRS")]
    trusted_proxies: Option<String>,

    /// PEM certificate for TLS
    #[arg(long, value_name = "FILE")]
    tls_cert: Option<PathBuf>,

    /// PEM key for TLS
    #[arg(long, value_name = "FILE")]
    tls_key: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// Overlay CLI flags on top of the loaded configuration.
    fn apply(&self, config: &mut ServerConfig) {
        if let Some(ip) = &self.bind_ip {
            config.bind_ip = ip.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(webroot) = &self.webroot {
            config.webroot = webroot.clone();
        }
        if let Some(upload_dir) = &self.upload_dir {
            config.upload_dir = Some(upload_dir.clone());
        }
        if self.read_only {
            config.read_only = true;
        }
        if self.upload_only {
            config.upload_only = true;
        }
        if self.no_delete {
            config.no_delete = true;
        }
        if self.no_clipboard {
            config.no_clipboard = true;
        }
        if self.enable_command {
            config.enable_command = true;
        }
        if let Some(auth) = &self.auth {
            config.credential = Some(auth.clone());
        }
        if let Some(whitelist) = &self.whitelist {
            config.whitelist = whitelist.clone();
        }
        if let Some(proxies) = &self.trusted_proxies {
            config.trusted_proxies = proxies.clone();
        }
        if let Some(cert) = &self.tls_cert {
            config.tls_cert = Some(cert.clone());
        }
        if let Some(key) = &self.tls_key {
            config.tls_key = Some(key.clone());
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = if let Some(config_path) = &cli.config {
        tracing::info!(path = %config_path.display(), "loading config file");
        ServerConfig::load(config_path)?
    } else {
        ServerConfig::default()
    };
    cli.apply(&mut config);
    config.validate()?;

    if config.enable_command {
        tracing::warn!("remote command execution is enabled");
    }
    if config.credential.is_none() {
        tracing::info!("no credential configured, serving without auth");
    }

    let addr: SocketAddr = format!("{}:{}", config.bind_ip, config.port).parse()?;
    let trust = TrustResolver::new(
        &config.whitelist,
        !config.whitelist.is_empty(),
        &config.trusted_proxies,
    )?;
    let auth = config
        .credential
        .as_deref()
        .and_then(AuthGate::from_credential);

    let state = Arc::new(AppState {
        resolver: PathResolver::new(config.webroot.clone()),
        trust,
        auth,
        shares: ShareLinkStore::new(),
        hub: SyncHub::spawn(!config.no_clipboard, config.enable_command),
        config: config.clone(),
    });
    let app = router(state).into_make_service_with_connect_info::<SocketAddr>();

    let handle = Handle::new();
    tokio::spawn(shutdown_on_ctrl_c(handle.clone()));

    tracing::info!(
        %addr,
        webroot = %config.webroot.display(),
        tls = config.tls_enabled(),
        "lanshare serving"
    );

    // Bound header reads so stalled handshakes cannot pin workers, while
    // leaving body transfers untimed for large files.
    if let (Some(cert), Some(key)) = (&config.tls_cert, &config.tls_key) {
        let tls = RustlsConfig::from_pem_file(cert, key).await?;
        let mut server = axum_server::bind_rustls(addr, tls);
        server
            .http_builder()
            .http1()
            .header_read_timeout(Duration::from_secs(10));
        server.handle(handle).serve(app).await?;
    } else {
        let mut server = axum_server::bind(addr);
        server
            .http_builder()
            .http1()
            .header_read_timeout(Duration::from_secs(10));
        server.handle(handle).serve(app).await?;
    }

    tracing::info!("lanshare stopped");
    Ok(())
}

async fn shutdown_on_ctrl_c(handle: Handle) {
    if tokio::signal::ctrl_c().await.is_err() {
        return;
    }
    tracing::info!("shutdown signal received");
    handle.graceful_shutdown(Some(Duration::from_secs(10)));
}
