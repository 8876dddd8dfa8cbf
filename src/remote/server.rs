use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::os::fd::AsRawFd;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::session::{Session, SessionEnd};
use super::{RemoteError, ServerConfig};
use crate::process::signal::ShutdownSignals;

/// Requests a server shutdown. Cloneable; every clone shares one flag.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandle {
    /// Returns `true` only for the call that actually started the shutdown.
    pub fn request(&self) -> bool {
        !self.flag.swap(true, Ordering::SeqCst)
    }

    pub fn is_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// State shared by the listener and every client worker.
#[derive(Debug)]
struct ServerState {
    shutdown: ShutdownHandle,
    next_client_id: AtomicUsize,
}

impl ServerState {
    fn new() -> Self {
        Self {
            shutdown: ShutdownHandle::default(),
            next_client_id: AtomicUsize::new(1),
        }
    }

    fn next_client_id(&self) -> usize {
        self.next_client_id.fetch_add(1, Ordering::Relaxed)
    }
}

pub struct Server {
    listener: TcpListener,
    config: ServerConfig,
    state: Arc<ServerState>,
}

impl Server {
    /// Binds the listening socket. Failing to bind is fatal to the caller.
    pub fn bind(config: ServerConfig) -> Result<Self, RemoteError> {
        let addr = config.address();
        let listener =
            TcpListener::bind(&addr).map_err(|source| RemoteError::Bind { addr, source })?;
        listener.set_nonblocking(true)?;

        Ok(Self {
            listener,
            config,
            state: Arc::new(ServerState::new()),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.state.shutdown.clone()
    }

    /// Routes SIGINT and SIGTERM to this server's shutdown flag.
    pub fn register_signals(&self) -> io::Result<ShutdownSignals> {
        ShutdownSignals::register(Arc::clone(&self.state.shutdown.flag))
    }

    /// Accepts clients until a shutdown is requested. In threaded mode,
    /// sessions still running at that point finish on their own.
    pub fn run(self) -> Result<(), RemoteError> {
        info!(
            address = %self.local_addr()?,
            threaded = self.config.threaded,
            "server listening"
        );

        while !self.state.shutdown.is_requested() {
            match wait_readable(&self.listener, self.config.poll_interval) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }

            match self.listener.accept() {
                Ok((stream, peer)) => self.dispatch(stream, peer),
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                    ) => {}
                Err(e) => warn!(error = %e, "accept failed"),
            }
        }

        info!("server stopped");
        Ok(())
    }

    fn dispatch(&self, stream: TcpStream, peer: SocketAddr) {
        let id = self.state.next_client_id();
        info!(client = id, %peer, "client connected");

        if let Err(e) = stream.set_nonblocking(false) {
            warn!(client = id, error = %e, "cannot configure client socket");
            return;
        }

        let buffer_size = self.config.buffer_size;
        if !self.config.threaded {
            serve_client(id, stream, buffer_size, &self.state);
            return;
        }

        let state = Arc::clone(&self.state);
        let spawned = thread::Builder::new()
            .name(format!("rdsh-client-{}", id))
            .spawn(move || serve_client(id, stream, buffer_size, &state));
        if let Err(e) = spawned {
            warn!(client = id, error = %e, "cannot start client worker");
        }
    }
}

fn serve_client(id: usize, stream: TcpStream, buffer_size: usize, state: &ServerState) {
    let end = Session::new(id, stream, buffer_size).and_then(|mut session| session.run());
    match end {
        Ok(SessionEnd::StopServer) => {
            if state.shutdown.request() {
                info!(client = id, "stop-server received, shutting down");
            } else {
                debug!(client = id, "shutdown already in progress");
            }
        }
        Ok(end) => info!(client = id, ?end, "client done"),
        Err(e) => warn!(client = id, error = %e, "client session failed"),
    }
}

/// Waits up to `timeout` for a pending connection.
fn wait_readable(listener: &TcpListener, timeout: Duration) -> io::Result<bool> {
    let mut pollfd = libc::pollfd {
        fd: listener.as_raw_fd(),
        events: libc::POLLIN,
        revents: 0,
    };
    let millis = timeout.as_millis().min(libc::c_int::MAX as u128) as libc::c_int;

    // SAFETY: pollfd is a single valid entry that outlives the call.
    let ready = unsafe { libc::poll(&mut pollfd, 1, millis) };
    if ready < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(ready > 0)
}
