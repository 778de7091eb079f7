use std::{net::SocketAddr, thread};

use axum::Router;
use axum::http::header;
use axum::routing::get;
use camino::Utf8PathBuf;
use console::style;
use tower_http::services::ServeDir;
use tracing::{error, info};

use crate::live::client_script;

/// Route of the live reload client, to be referenced by a `<script>` tag.
pub const RELOAD_SCRIPT: &str = "/__assetline/reload.js";

const PORT: u16 = 8080;

/// Serves `root` on its own single-threaded runtime.
pub fn start(root: Utf8PathBuf, ws_port: u16) -> thread::JoinHandle<Result<(), anyhow::Error>> {
    info!(url = %style(format!("http://localhost:{PORT}/")).yellow(), "starting a HTTP server");
    spawn(root, ws_port, PORT)
}

/// The join handle is usually dropped, so the thread logs its own failure.
fn spawn(root: Utf8PathBuf, ws_port: u16, port: u16) -> thread::JoinHandle<Result<(), anyhow::Error>> {
    thread::spawn(move || {
        let result = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(anyhow::Error::from)
            .and_then(|rt| rt.block_on(serve(router(root, ws_port), port)));

        if let Err(e) = &result {
            error!(port, "HTTP server stopped: {e:#}");
        }

        result
    })
}

fn router(root: Utf8PathBuf, ws_port: u16) -> Router {
    let script = client_script(ws_port);

    Router::new()
        .route(
            RELOAD_SCRIPT,
            get(move || {
                let script = script.clone();
                async move { ([(header::CONTENT_TYPE, "text/javascript")], script) }
            }),
        )
        .fallback_service(ServeDir::new(root))
}

async fn serve(router: Router, port: u16) -> Result<(), anyhow::Error> {
    let address = SocketAddr::from(([127, 0, 0, 1], port));
    let address = tokio::net::TcpListener::bind(address).await?;

    axum::serve(address, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_failure_is_reported() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = taken.local_addr().unwrap().port();

        let result = spawn(Utf8PathBuf::from("."), 1337, port).join().unwrap();
        assert!(result.is_err());
    }
}
