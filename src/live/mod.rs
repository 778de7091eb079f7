//! Live reload.
//!
//! Tasks report what they wrote through a [`Notifier`]. In build mode nobody
//! is listening and [`Silent`] swallows everything; in watch mode
//! [`LiveReload`] broadcasts a [`Signal`] over WebSocket to every connected
//! browser tab, where the [`client_script`] either hot-swaps a stylesheet or
//! reloads the page.

#[cfg(feature = "server")]
pub(crate) mod http;
#[cfg(feature = "live")]
pub(crate) mod watch;

#[cfg(feature = "live")]
use std::net::{TcpListener, TcpStream};
#[cfg(feature = "live")]
use std::sync::mpsc::Sender;
#[cfg(feature = "live")]
use std::sync::{Arc, Mutex};
#[cfg(feature = "live")]
use std::thread::JoinHandle;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
#[cfg(feature = "live")]
use tungstenite::WebSocket;

#[cfg(feature = "live")]
use crate::error::WatchError;

#[cfg(feature = "live")]
pub use watch::{WatchLoop, watch};

/// Receiver of "this output changed" events, shared by every task.
///
/// Notifications are best-effort: implementations log delivery problems and
/// never fail the calling task.
pub trait Notifier: Send + Sync {
    /// A single artifact was rewritten and can be swapped in place.
    fn notify_asset(&self, path: &Utf8Path);

    /// Something structural changed, reload the whole page.
    fn notify_reload(&self);
}

/// Notifier used when no browser can be connected.
#[derive(Debug, Default, Clone, Copy)]
pub struct Silent;

impl Notifier for Silent {
    fn notify_asset(&self, _: &Utf8Path) {}

    fn notify_reload(&self) {}
}

/// Message pushed to connected browsers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Signal {
    /// Path of the rewritten file, relative to the served root.
    Asset { path: String },
    Reload,
}

impl Signal {
    /// Builds an asset signal for `path`, made relative to `root` and using
    /// forward slashes so it can be compared with URLs.
    pub fn asset(root: &Utf8Path, path: &Utf8Path) -> Self {
        let relative = path.strip_prefix(root).unwrap_or(path);
        let path = relative
            .components()
            .map(|c| c.as_str())
            .collect::<Vec<_>>()
            .join("/");

        Signal::Asset { path }
    }
}

/// Returns the JavaScript snippet connecting a page to the live reload socket.
///
/// Stylesheet updates replace the matching `<link>` with a cache-busted copy,
/// every other update reloads the page.
pub fn client_script(port: u16) -> String {
    format!(
        r#"
const socket = new WebSocket("ws://localhost:{port}");
socket.addEventListener("message", event => {{
    const signal = JSON.parse(event.data);
    if (signal.kind === "asset" && signal.path.endsWith(".css")) {{
        for (const link of document.querySelectorAll('link[rel="stylesheet"]')) {{
            const url = new URL(link.href);
            if (url.pathname.endsWith(signal.path)) {{
                url.searchParams.set("v", Date.now());
                link.href = url.toString();
                return;
            }}
        }}
    }}
    window.location.reload();
}});
"#
    )
}

/// Connection set of open browser tabs, fed through a dedicated thread.
#[cfg(feature = "live")]
pub struct LiveReload {
    root: Utf8PathBuf,
    port: u16,
    tx: Sender<Signal>,
    _threads: (JoinHandle<()>, JoinHandle<()>),
}

#[cfg(feature = "live")]
impl LiveReload {
    /// Binds the WebSocket port and starts the accept and broadcast threads.
    pub fn bind(root: impl Into<Utf8PathBuf>) -> Result<Self, WatchError> {
        let (tcp, port) = reserve_port().map_err(WatchError::Bind)?;
        let clients = Arc::new(Mutex::new(vec![]));

        let thread_i = new_thread_ws_incoming(tcp, clients.clone());
        let (tx, thread_o) = new_thread_ws_broadcast(clients);

        tracing::info!(port, "live reload socket listening");

        Ok(Self {
            root: root.into(),
            port,
            tx,
            _threads: (thread_i, thread_o),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    fn send(&self, signal: Signal) {
        if self.tx.send(signal).is_err() {
            tracing::warn!("live reload thread is gone, dropping signal");
        }
    }
}

#[cfg(feature = "live")]
impl Notifier for LiveReload {
    fn notify_asset(&self, path: &Utf8Path) {
        self.send(Signal::asset(&self.root, path));
    }

    fn notify_reload(&self) {
        self.send(Signal::Reload);
    }
}

#[cfg(feature = "live")]
fn reserve_port() -> std::io::Result<(TcpListener, u16)> {
    let listener = match TcpListener::bind("127.0.0.1:1337") {
        Ok(sock) => sock,
        Err(_) => TcpListener::bind("127.0.0.1:0")?,
    };

    let addr = listener.local_addr()?;
    let port = addr.port();
    Ok((listener, port))
}

#[cfg(feature = "live")]
type Clients = Arc<Mutex<Vec<WebSocket<TcpStream>>>>;

#[cfg(feature = "live")]
fn new_thread_ws_incoming(server: TcpListener, clients: Clients) -> JoinHandle<()> {
    std::thread::spawn(move || {
        for stream in server.incoming() {
            let stream = match stream {
                Ok(stream) => stream,
                Err(e) => {
                    tracing::warn!("live reload connection failed: {e}");
                    continue;
                }
            };

            match tungstenite::accept(stream) {
                Ok(socket) => match clients.lock() {
                    Ok(mut clients) => clients.push(socket),
                    Err(_) => return,
                },
                Err(e) => tracing::warn!("live reload handshake failed: {e}"),
            }
        }
    })
}

#[cfg(feature = "live")]
fn new_thread_ws_broadcast(clients: Clients) -> (Sender<Signal>, JoinHandle<()>) {
    let (tx, rx) = std::sync::mpsc::channel::<Signal>();

    let thread = std::thread::spawn(move || {
        while let Ok(signal) = rx.recv() {
            let text = match serde_json::to_string(&signal) {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!("couldn't encode {signal:?}: {e}");
                    continue;
                }
            };

            let Ok(mut clients) = clients.lock() else {
                return;
            };
            let mut broken = vec![];

            for (i, socket) in clients.iter_mut().enumerate() {
                match socket.send(text.as_str().into()) {
                    Ok(_) => {}
                    Err(tungstenite::error::Error::Io(e)) => {
                        if e.kind() == std::io::ErrorKind::BrokenPipe {
                            broken.push(i);
                        }
                    }
                    Err(
                        tungstenite::error::Error::ConnectionClosed
                        | tungstenite::error::Error::AlreadyClosed,
                    ) => broken.push(i),
                    Err(e) => {
                        tracing::error!("Error: {e:?}");
                    }
                }
            }

            for i in broken.into_iter().rev() {
                clients.remove(i);
            }

            // Close all but the last 10 connections
            let len = clients.len();
            if len > 10 {
                for mut socket in clients.drain(0..len - 10) {
                    socket.close(None).ok();
                }
            }
        }
    });

    (tx, thread)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Notifier recording every call, in order.
    #[derive(Default)]
    pub(crate) struct Recorder {
        pub(crate) signals: std::sync::Mutex<Vec<Signal>>,
    }

    impl Recorder {
        pub(crate) fn take(&self) -> Vec<Signal> {
            std::mem::take(&mut *self.signals.lock().unwrap())
        }
    }

    impl Notifier for Recorder {
        fn notify_asset(&self, path: &Utf8Path) {
            self.signals.lock().unwrap().push(Signal::Asset {
                path: path.to_string(),
            });
        }

        fn notify_reload(&self) {
            self.signals.lock().unwrap().push(Signal::Reload);
        }
    }

    #[test]
    fn test_signal_wire_format() {
        let asset = Signal::asset(
            Utf8Path::new("/site"),
            Utf8Path::new("/site/css/base/style.min.css"),
        );

        assert_eq!(
            serde_json::to_string(&asset).unwrap(),
            r#"{"kind":"asset","path":"css/base/style.min.css"}"#
        );
        assert_eq!(
            serde_json::to_string(&Signal::Reload).unwrap(),
            r#"{"kind":"reload"}"#
        );
    }

    #[test]
    fn test_client_script_port() {
        let script = client_script(4242);
        assert!(script.contains("ws://localhost:4242"));
        assert!(script.contains("window.location.reload()"));
    }
}
