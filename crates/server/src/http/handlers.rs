//! Request handlers.
//!
//! Every operation is addressed by the request path plus query
//! parameters: `?json` and the default both return a listing, `?download`
//! forces an attachment (zipping directories), `?bulk&file=a&file=b`
//! archives a selection, `?share` mints a capability token, `?token=`
//! spends one, `?delete` removes the target, `?ws` upgrades to the sync
//! socket and `?cbDown` downloads the clipboard.

use std::path::Path as FsPath;
use std::time::Duration;

use axum::body::Body;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Extension, Multipart, Path, Request, State};
use axum::http::header::{
    AUTHORIZATION, CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE, LAST_MODIFIED,
};
use axum::http::{HeaderMap, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;
use tokio_util::io::ReaderStream;
use url::form_urlencoded;

use crate::auth::verify_overlay_credential;
use crate::error::{ServerError, ServerResult};
use crate::files::{
    build_zip, clean_request_path, list_directory, receive_stream, sanitize_filename,
    AclOverlay, ArchiveTarget, Resolved,
};
use crate::http::{ClientIp, SharedState};
use crate::share::{DEFAULT_DOWNLOAD_LIMIT, DEFAULT_TTL_SECS};
use crate::sync::run_session;

/// Parsed query parameters. Flags are true when the key is present, with
/// or without a value.
#[derive(Debug, Default)]
struct Query {
    ws: bool,
    json: bool,
    download: bool,
    bulk: bool,
    share: bool,
    delete: bool,
    cb_down: bool,
    token: Option<String>,
    expires: Option<String>,
    limit: Option<String>,
    files: Vec<String>,
}

impl Query {
    fn parse(raw: Option<&str>) -> Self {
        let mut query = Query::default();
        for (key, value) in form_urlencoded::parse(raw.unwrap_or("").as_bytes()) {
            match key.as_ref() {
                "ws" => query.ws = true,
                "json" => query.json = true,
                "download" => query.download = true,
                "bulk" => query.bulk = true,
                "share" => query.share = true,
                "delete" => query.delete = true,
                "cbDown" => query.cb_down = true,
                "token" => query.token = Some(value.into_owned()),
                "expires" => query.expires = Some(value.into_owned()),
                "limit" => query.limit = Some(value.into_owned()),
                "file" => query.files.push(value.into_owned()),
                _ => {}
            }
        }
        query
    }
}

/// Whether a raw query string carries a share token.
pub fn query_has_token(raw: Option<&str>) -> bool {
    Query::parse(raw).token.is_some()
}

fn request_path(path: Option<&Path<String>>) -> String {
    match path {
        Some(Path(p)) => format!("/{p}"),
        None => "/".to_string(),
    }
}

/// Enforce a directory overlay's auth requirement against the request.
fn check_overlay_auth(overlay: &AclOverlay, headers: &HeaderMap) -> ServerResult<()> {
    if !overlay.requires_auth() {
        return Ok(());
    }
    let authorized = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| verify_overlay_credential(&overlay.auth, v))
        .unwrap_or(false);
    if authorized {
        Ok(())
    } else {
        Err(ServerError::Unauthorized)
    }
}

pub async fn handle_get(
    State(state): State<SharedState>,
    path: Option<Path<String>>,
    Extension(ClientIp(client_ip)): Extension<ClientIp>,
    uri: Uri,
    headers: HeaderMap,
    ws: Option<WebSocketUpgrade>,
) -> ServerResult<Response> {
    let query = Query::parse(uri.query());
    let req_path = request_path(path.as_ref());

    // Capability downloads bypass path resolution entirely: the grant
    // already names its target and survived the original ACL check.
    if let Some(token) = &query.token {
        return serve_share(&state, token).await;
    }

    if query.ws {
        let upgrade = ws.ok_or_else(|| {
            ServerError::BadRequest("websocket upgrade headers required".to_string())
        })?;
        if state.config.no_clipboard && !state.config.enable_command {
            return Err(ServerError::NotFound);
        }
        let hub = state.hub.clone();
        return Ok(upgrade.on_upgrade(move |socket| run_session(socket, hub, client_ip)));
    }

    if query.cb_down {
        if state.config.no_clipboard {
            return Err(ServerError::NotFound);
        }
        let dump = state.hub.dump_json().await?;
        let name = format!("clipboard_{}.json", chrono::Utc::now().format("%Y%m%d%H%M%S"));
        return Ok((
            [
                (CONTENT_TYPE, "application/json".to_string()),
                (CONTENT_DISPOSITION, format!("attachment; filename=\"{name}\"")),
            ],
            dump,
        )
            .into_response());
    }

    if query.delete {
        return delete_target(&state, &req_path, &headers).await;
    }

    if state.config.upload_only {
        return Err(ServerError::Forbidden(
            "server is in upload-only mode".to_string(),
        ));
    }

    let resolved = state.resolver.resolve(&req_path)?;
    check_overlay_auth(&resolved.overlay, &headers)?;

    if query.share {
        return create_share(&state, &req_path, &resolved, &query);
    }

    if resolved.is_dir {
        if query.bulk {
            return serve_bulk(&state, &req_path, &query).await;
        }
        if query.download {
            return serve_dir_zip(&state, &resolved).await;
        }
        let entries = list_directory(
            &resolved.full_path,
            &resolved.overlay,
            state.config.read_only,
            state.config.no_delete || state.config.read_only,
        )?;
        return Ok(Json(entries).into_response());
    }

    serve_file(&resolved.full_path, query.download).await
}

pub async fn handle_post(
    State(state): State<SharedState>,
    path: Option<Path<String>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> ServerResult<Response> {
    if state.config.read_only {
        return Err(ServerError::Forbidden(
            "server is in read-only mode".to_string(),
        ));
    }
    let req_path = request_path(path.as_ref());
    let dest_dir = upload_destination(&state, &req_path, &headers)?;

    let mut uploaded = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("multipart: {e}")))?
    {
        let Some(raw_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let name = sanitize_filename(&raw_name)?;
        receive_stream(&dest_dir, &name, Box::pin(field)).await?;
        uploaded.push(name);
    }

    if uploaded.is_empty() {
        return Err(ServerError::BadRequest("no files in request".to_string()));
    }
    Ok(Json(serde_json::json!({ "uploaded": uploaded })).into_response())
}

pub async fn handle_put(
    State(state): State<SharedState>,
    path: Option<Path<String>>,
    headers: HeaderMap,
    request: Request,
) -> ServerResult<Response> {
    if state.config.read_only {
        return Err(ServerError::Forbidden(
            "server is in read-only mode".to_string(),
        ));
    }
    let req_path = request_path(path.as_ref());
    let rel = clean_request_path(&req_path);
    let raw_name = rel
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| ServerError::BadRequest("missing target filename".to_string()))?;
    let name = sanitize_filename(&raw_name)?;

    let parent_req = match rel.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            format!("/{}", parent.to_string_lossy())
        }
        _ => "/".to_string(),
    };
    let parent = state.resolver.resolve(&parent_req)?;
    if !parent.is_dir {
        return Err(ServerError::BadRequest(
            "upload target is not a directory".to_string(),
        ));
    }
    check_overlay_auth(&parent.overlay, &headers)?;
    if parent.overlay.blocks_file(&name) {
        return Err(ServerError::NotFound);
    }

    let stream = request.into_body().into_data_stream();
    let final_path = receive_stream(&parent.full_path, &name, Box::pin(stream)).await?;
    Ok(Json(serde_json::json!({
        "uploaded": [final_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or(name)]
    }))
    .into_response())
}

pub async fn handle_delete(
    State(state): State<SharedState>,
    path: Option<Path<String>>,
    uri: Uri,
    headers: HeaderMap,
) -> ServerResult<Response> {
    let query = Query::parse(uri.query());
    if let Some(token) = &query.token {
        state.shares.delete(token);
        tracing::info!("share link revoked");
        return Ok(Json(serde_json::json!({ "revoked": true })).into_response());
    }
    delete_target(&state, &request_path(path.as_ref()), &headers).await
}

/// Where POST uploads land: the configured upload directory when set,
/// otherwise the resolved request directory inside the webroot.
fn upload_destination(
    state: &SharedState,
    req_path: &str,
    headers: &HeaderMap,
) -> ServerResult<std::path::PathBuf> {
    if let Some(upload_dir) = &state.config.upload_dir {
        return Ok(upload_dir.clone());
    }
    let resolved = state.resolver.resolve(req_path)?;
    if !resolved.is_dir {
        return Err(ServerError::BadRequest(
            "upload target is not a directory".to_string(),
        ));
    }
    check_overlay_auth(&resolved.overlay, headers)?;
    Ok(resolved.full_path)
}

async fn delete_target(
    state: &SharedState,
    req_path: &str,
    headers: &HeaderMap,
) -> ServerResult<Response> {
    if state.config.read_only || state.config.no_delete || state.config.upload_only {
        return Err(ServerError::Forbidden("deletion is disabled".to_string()));
    }
    let resolved = state.resolver.resolve(req_path)?;
    check_overlay_auth(&resolved.overlay, headers)?;
    if resolved.rel_path.as_os_str().is_empty() {
        return Err(ServerError::BadRequest(
            "refusing to delete the webroot".to_string(),
        ));
    }
    if resolved.is_dir {
        tokio::fs::remove_dir_all(&resolved.full_path).await?;
    } else {
        tokio::fs::remove_file(&resolved.full_path).await?;
    }
    tracing::info!(path = %resolved.full_path.display(), "deleted");
    Ok(Json(serde_json::json!({ "deleted": true })).into_response())
}

fn create_share(
    state: &SharedState,
    req_path: &str,
    resolved: &Resolved,
    query: &Query,
) -> ServerResult<Response> {
    // A capability that bypasses the credential gate is meaningless when
    // no gate exists; plain downloads already cover that case.
    if state.auth.is_none() {
        return Err(ServerError::Forbidden(
            "share links require authentication to be enabled".to_string(),
        ));
    }
    let ttl_secs = match &query.expires {
        Some(raw) => raw.parse::<u64>().map_err(|_| {
            ServerError::BadRequest(format!("expires must be an integer in seconds, got {raw:?}"))
        })?,
        None => DEFAULT_TTL_SECS,
    };
    let limit = match &query.limit {
        Some(raw) => raw.parse::<i64>().map_err(|_| {
            ServerError::BadRequest(format!("limit must be an integer, got {raw:?}"))
        })?,
        None => DEFAULT_DOWNLOAD_LIMIT,
    };
    if limit == 0 || limit < -1 {
        return Err(ServerError::BadRequest(format!(
            "invalid download limit {limit}"
        )));
    }
    let token = state.shares.create(
        resolved.full_path.clone(),
        resolved.is_dir,
        Duration::from_secs(ttl_secs),
        limit,
    );
    tracing::info!(path = %resolved.full_path.display(), ttl_secs, limit, "share link created");
    let url = if req_path == "/" {
        format!("/?token={token}")
    } else {
        format!("{req_path}?token={token}")
    };
    Ok(Json(serde_json::json!({
        "token": token,
        "url": url,
        "expires_in_secs": ttl_secs,
        "downloads": limit,
    }))
    .into_response())
}

async fn serve_share(state: &SharedState, token: &str) -> ServerResult<Response> {
    let grant = state.shares.consume(token).ok_or(ServerError::NotFound)?;
    if grant.is_dir {
        let name = archive_name(&grant.file_path);
        let targets = vec![ArchiveTarget {
            full_path: grant.file_path.clone(),
            entry_name: name.trim_end_matches(".zip").to_string(),
        }];
        let spool = build_zip(state.resolver.clone(), targets).await?;
        zip_response(spool, &name)
    } else {
        serve_file(&grant.file_path, true).await
    }
}

async fn serve_dir_zip(state: &SharedState, resolved: &Resolved) -> ServerResult<Response> {
    let name = archive_name(&resolved.full_path);
    let targets = vec![ArchiveTarget {
        full_path: resolved.full_path.clone(),
        entry_name: name.trim_end_matches(".zip").to_string(),
    }];
    let spool = build_zip(state.resolver.clone(), targets).await?;
    zip_response(spool, &name)
}

async fn serve_bulk(
    state: &SharedState,
    req_path: &str,
    query: &Query,
) -> ServerResult<Response> {
    let mut targets = Vec::new();
    for file in &query.files {
        let child_path = if req_path == "/" {
            format!("/{file}")
        } else {
            format!("{req_path}/{file}")
        };
        // Resolution applies the block lists; unknown names are skipped
        // so one stale selection does not fail the batch.
        match state.resolver.resolve(&child_path) {
            Ok(child) => {
                let entry_name = child
                    .full_path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| file.clone());
                targets.push(ArchiveTarget {
                    full_path: child.full_path,
                    entry_name,
                });
            }
            Err(e) => {
                tracing::debug!(name = %file, error = %e, "skipping bulk selection");
            }
        }
    }
    if targets.is_empty() {
        return Err(ServerError::BadRequest(
            "no downloadable files selected".to_string(),
        ));
    }
    let name = format!("bulk_{}.zip", chrono::Utc::now().format("%Y%m%d%H%M%S"));
    let spool = build_zip(state.resolver.clone(), targets).await?;
    zip_response(spool, &name)
}

fn archive_name(path: &FsPath) -> String {
    let base = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "archive".to_string());
    format!("{base}.zip")
}

fn zip_response(spool: tokio::fs::File, name: &str) -> ServerResult<Response> {
    Response::builder()
        .header(CONTENT_TYPE, "application/zip")
        .header(CONTENT_DISPOSITION, format!("attachment; filename=\"{name}\""))
        .body(Body::from_stream(ReaderStream::new(spool)))
        .map_err(|e| ServerError::Internal(e.to_string()))
}

async fn serve_file(path: &FsPath, download: bool) -> ServerResult<Response> {
    let file = tokio::fs::File::open(path).await?;
    let meta = file.metadata().await?;
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "file".to_string());

    let mut builder = Response::builder()
        .header(CONTENT_TYPE, mime.as_ref())
        .header(CONTENT_LENGTH, meta.len());
    if let Ok(modified) = meta.modified() {
        builder = builder.header(LAST_MODIFIED, httpdate::fmt_http_date(modified));
    }
    if download {
        builder = builder.header(
            CONTENT_DISPOSITION,
            format!("attachment; filename=\"{name}\""),
        );
    }
    builder
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| ServerError::Internal(e.to_string()))
}
