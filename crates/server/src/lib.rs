//! # Lanshare Server Library
//!
//! This crate provides the server side of lanshare, an ad-hoc file
//! sharing service for local networks.
//!
//! ## Overview
//!
//! The server exposes one directory tree over HTTP and layers the rest of
//! the feature set on top of it:
//!
//! - **Directory listings**: JSON listings with per-directory ACL overlays
//! - **Capability shares**: expiring, download-limited share tokens
//! - **Uploads**: streamed multipart and raw-body uploads with atomic renames
//! - **Real-time sync**: shared clipboard and remote commands over WebSocket
//! - **Network trust**: CIDR allow-lists and trusted-proxy IP resolution
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                       HTTP Façade                          │
//! │        (router, trust + auth guard, query dispatch)        │
//! ├────────────────────────────────────────────────────────────┤
//! │                                                            │
//! │  ┌─────────────┐  ┌──────────────┐  ┌──────────────────┐  │
//! │  │    Files    │  │    Shares    │  │     Sync Hub     │  │
//! │  │ (resolver,  │  │ (capability  │  │  (clipboard +    │  │
//! │  │  listings,  │  │   tokens)    │  │   commands)      │  │
//! │  │  uploads,   │  └──────────────┘  └──────────────────┘  │
//! │  │  archives)  │                                          │
//! │  └─────────────┘  ┌──────────────┐  ┌──────────────────┐  │
//! │                   │     Auth     │  │      Trust       │  │
//! │                   │ (basic auth) │  │ (CIDR + proxies) │  │
//! │                   └──────────────┘  └──────────────────┘  │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use server::auth::AuthGate;
//! use server::config::ServerConfig;
//! use server::files::PathResolver;
//! use server::http::{router, AppState};
//! use server::share::ShareLinkStore;
//! use server::sync::SyncHub;
//! use server::trust::TrustResolver;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = ServerConfig::default();
//! config.validate()?;
//!
//! let state = Arc::new(AppState {
//!     resolver: PathResolver::new(config.webroot.clone()),
//!     trust: TrustResolver::new(&config.whitelist, false, &config.trusted_proxies)?,
//!     auth: config.credential.as_deref().and_then(AuthGate::from_credential),
//!     shares: ShareLinkStore::new(),
//!     hub: SyncHub::spawn(!config.no_clipboard, config.enable_command),
//!     config,
//! });
//! let app = router(state);
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod command;
pub mod config;
pub mod error;
pub mod files;
pub mod http;
pub mod share;
pub mod sync;
pub mod trust;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use http::{router, AppState, SharedState};
pub use share::ShareLinkStore;
pub use sync::SyncHub;
pub use trust::TrustResolver;
