// src/reload/server.rs

//! Websocket broadcaster for reload signals.
//!
//! Two plain threads: one accepts clients, one fans signals out to them.
//! Clients whose socket broke are pruned and only the most recent
//! [`MAX_CLIENTS`] connections are kept open.

use std::io::ErrorKind;
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use anyhow::{anyhow, Context, Result};
use tracing::{debug, info, warn};
use tungstenite::WebSocket;

use super::{ReloadSignal, ReloadTransport};
use crate::types::RefreshKind;

pub const MAX_CLIENTS: usize = 10;

type Clients = Arc<Mutex<Vec<WebSocket<TcpStream>>>>;

#[derive(Debug)]
pub struct ReloadServer {
    port: u16,
    clients: Clients,
    tx: Mutex<Sender<RefreshKind>>,
    _accept: JoinHandle<()>,
    _broadcast: JoinHandle<()>,
}

impl ReloadServer {
    /// Listen on `127.0.0.1:port`, or on any free port if that one is taken.
    pub fn start(port: u16) -> Result<Self> {
        let (listener, port) = reserve_port(port).context("binding reload server")?;
        let clients: Clients = Arc::default();

        let accept = spawn_accept_thread(listener, Arc::clone(&clients));
        let (tx, broadcast) = spawn_broadcast_thread(Arc::clone(&clients));

        info!(port, "reload server listening");
        Ok(Self {
            port,
            clients,
            tx: Mutex::new(tx),
            _accept: accept,
            _broadcast: broadcast,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn client_count(&self) -> usize {
        lock(&self.clients).len()
    }
}

impl ReloadTransport for ReloadServer {
    fn send(&self, signal: &ReloadSignal) -> Result<()> {
        self.tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .send(signal.kind)
            .map_err(|_| anyhow!("reload broadcast thread has stopped"))
    }
}

fn lock(clients: &Clients) -> MutexGuard<'_, Vec<WebSocket<TcpStream>>> {
    clients.lock().unwrap_or_else(PoisonError::into_inner)
}

fn reserve_port(port: u16) -> std::io::Result<(TcpListener, u16)> {
    let listener = match TcpListener::bind(("127.0.0.1", port)) {
        Ok(sock) => sock,
        Err(e) => {
            warn!(port, error = %e, "reload port taken; using a random port");
            TcpListener::bind("127.0.0.1:0")?
        }
    };
    let port = listener.local_addr()?.port();
    Ok((listener, port))
}

fn spawn_accept_thread(listener: TcpListener, clients: Clients) -> JoinHandle<()> {
    std::thread::spawn(move || {
        for stream in listener.incoming() {
            let stream = match stream {
                Ok(stream) => stream,
                Err(e) => {
                    warn!(error = %e, "reload client connection failed");
                    continue;
                }
            };
            match tungstenite::accept(stream) {
                Ok(socket) => {
                    debug!("reload client connected");
                    lock(&clients).push(socket);
                }
                Err(e) => warn!(error = %e, "reload client handshake failed"),
            }
        }
    })
}

fn spawn_broadcast_thread(clients: Clients) -> (Sender<RefreshKind>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel::<RefreshKind>();

    let thread = std::thread::spawn(move || {
        while let Ok(kind) = rx.recv() {
            let mut clients = lock(&clients);
            let mut broken = vec![];

            for (i, socket) in clients.iter_mut().enumerate() {
                match socket.send(kind.as_message().into()) {
                    Ok(_) => {}
                    Err(tungstenite::Error::Io(e))
                        if matches!(e.kind(), ErrorKind::BrokenPipe | ErrorKind::ConnectionReset) =>
                    {
                        broken.push(i);
                    }
                    Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                        broken.push(i);
                    }
                    Err(e) => warn!(error = %e, "failed to send reload message"),
                }
            }

            for i in broken.into_iter().rev() {
                clients.remove(i);
            }

            let len = clients.len();
            if len > MAX_CLIENTS {
                for mut socket in clients.drain(0..len - MAX_CLIENTS) {
                    socket.close(None).ok();
                }
            }
            debug!(kind = %kind, clients = clients.len(), "reload broadcast");
        }
    });

    (tx, thread)
}
