//! HTTP front door: static pages plus the form endpoint that relays
//! submissions to the ingest worker.

use std::{
    future::Future,
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{
        header::{CONTENT_TYPE, LOCATION},
        StatusCode,
    },
    response::{IntoResponse, Response},
    routing::{get, post, MethodRouter},
    Router,
};
use tokio::{fs, net::TcpListener};

use crate::{error::FrontDoorError, relay::relay, settings::Settings, structures::Submission};

const HTML: &str = "text/html; charset=utf-8";

const NOT_FOUND_PAGE: &str = "<!DOCTYPE html>
<html>
<head><title>404 Not Found</title></head>
<body><h1>404 Not Found</h1><p>Nothing lives at this address.</p></body>
</html>
";

#[derive(Debug, Clone)]
pub struct FrontDoor {
    pub static_root: PathBuf,
    pub relay_addr: String,
    pub relay_timeout: Duration,
}

type Shared = Arc<FrontDoor>;

impl FrontDoor {
    pub fn from_settings(cfg: &Settings) -> Self {
        FrontDoor {
            static_root: cfg.static_root.clone(),
            relay_addr: cfg.relay_addr(),
            relay_timeout: cfg.relay_timeout(),
        }
    }

    pub fn router(self) -> Router {
        Router::new()
            .route("/", page("index.html"))
            .route("/index.html", page("index.html"))
            .route("/message.html", page("message.html"))
            .route("/style.css", page("static/style.css"))
            .route("/logo.png", page("static/logo.png"))
            .route(
                "/message",
                post(submit)
                    .fallback(not_found)
                    .layer(DefaultBodyLimit::disable()),
            )
            .fallback(not_found)
            .with_state(Arc::new(self))
    }

    async fn serve_file(&self, relative: &str) -> Result<Response, FrontDoorError> {
        let path = self.static_root.join(relative);
        match fs::read(&path).await {
            Ok(body) => Ok(([(CONTENT_TYPE, content_type(&path))], body).into_response()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::debug!("Missing resource {}", path.display());
                Ok(self.not_found_page().await)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn not_found_page(&self) -> Response {
        match fs::read(self.static_root.join("error.html")).await {
            Ok(body) => (StatusCode::NOT_FOUND, [(CONTENT_TYPE, HTML)], body).into_response(),
            Err(_) => (StatusCode::NOT_FOUND, [(CONTENT_TYPE, HTML)], NOT_FOUND_PAGE).into_response(),
        }
    }
}

/// Serves the HTTP front door on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, door: FrontDoor, shutdown: F) -> io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    log::info!("HTTP server running on {}", listener.local_addr()?);
    axum::serve(listener, door.router())
        .with_graceful_shutdown(shutdown)
        .await
}

// GET (and HEAD) serve the file, every other method gets the 404 page.
fn page(relative: &'static str) -> MethodRouter<Shared> {
    get(move |State(door): State<Shared>| async move { door.serve_file(relative).await })
        .fallback(not_found)
}

async fn not_found(State(door): State<Shared>) -> Response {
    door.not_found_page().await
}

// Forms are relayed whatever their size, the body is only bounded by its
// declared length.
async fn submit(State(door): State<Shared>, body: Bytes) -> Result<Response, FrontDoorError> {
    let submission = Submission::from_form(&body);
    relay(&door.relay_addr, &submission, door.relay_timeout).await?;
    Ok((StatusCode::FOUND, [(LOCATION, "/")]).into_response())
}

/// Content type by file extension.
pub fn content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("html" | "htm") => HTML,
        Some("css") => "text/css; charset=utf-8",
        Some("js") => "text/javascript; charset=utf-8",
        Some("json") => "application/json",
        Some("txt") => "text/plain; charset=utf-8",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        _ => "application/octet-stream",
    }
}
