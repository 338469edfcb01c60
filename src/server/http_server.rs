use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info};

use super::request::into_http_request;
use super::response::{into_tiny_response, reject_response};
use super::HttpService;
use crate::config::ServerConfig;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Serves an [`HttpService`] over HTTP/1.1.
pub struct HttpServer<S> {
    service: Arc<S>,
    config: ServerConfig,
}

/// Handle to a running server
///
/// Provides methods for waiting until the server is ready, stopping it
/// gracefully, or joining the worker threads.
pub struct ServerHandle {
    addr: SocketAddr,
    stop: Arc<AtomicBool>,
    server: Arc<tiny_http::Server>,
    workers: Vec<JoinHandle<()>>,
}

impl ServerHandle {
    /// Address the listener is bound to (useful with port 0).
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Wait for the server to be ready to accept connections
    ///
    /// Polls the server address by attempting TCP connections until successful.
    ///
    /// # Errors
    ///
    /// Returns `TimedOut` if the server doesn't become ready within ~250ms
    /// (50 attempts × 5ms).
    pub fn wait_ready(&self) -> io::Result<()> {
        for _ in 0..50 {
            if TcpStream::connect(self.addr).is_ok() {
                return Ok(());
            }
            thread::sleep(Duration::from_millis(5));
        }
        Err(io::Error::new(io::ErrorKind::TimedOut, "server not ready"))
    }

    /// Stop accepting requests, let in-flight requests finish and join the
    /// workers.
    pub fn stop(self) {
        self.stop.store(true, Ordering::Release);
        for _ in 0..self.workers.len() {
            self.server.unblock();
        }
        let addr = self.addr;
        if self.join().is_err() {
            error!(%addr, "A server worker panicked");
        }
        info!(%addr, "HTTP server stopped");
    }

    /// Block until every worker has exited.
    ///
    /// Workers exit once the flag from [`ServerHandle::stop_flag`] is set or
    /// the listener fails.
    ///
    /// # Errors
    ///
    /// Returns the panic payload if a worker thread panicked.
    pub fn join(self) -> thread::Result<()> {
        let mut result = Ok(());
        for worker in self.workers {
            if let Err(payload) = worker.join() {
                result = Err(payload);
            }
        }
        result
    }

    /// Flag that stops the workers when set; lets another thread (a signal
    /// handler) trigger shutdown while this one is in [`ServerHandle::join`].
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }
}

impl<S: HttpService> HttpServer<S> {
    pub fn new(service: Arc<S>, config: ServerConfig) -> Self {
        Self { service, config }
    }

    /// Bind `addr` and start the worker threads.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid, the port cannot be bound
    /// or a worker thread cannot be spawned.
    pub fn start<A: ToSocketAddrs>(self, addr: A) -> io::Result<ServerHandle> {
        let addr = addr
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "invalid address"))?;
        let server = tiny_http::Server::http(addr).map_err(|e| io::Error::other(e.to_string()))?;
        let bound = server.server_addr().to_ip().unwrap_or(addr);
        let server = Arc::new(server);
        let stop = Arc::new(AtomicBool::new(false));

        let workers = self.config.workers.max(1);
        let mut handles = Vec::with_capacity(workers);
        for id in 0..workers {
            let server = Arc::clone(&server);
            let service = Arc::clone(&self.service);
            let stop = Arc::clone(&stop);
            let max_body = self.config.max_body_bytes;
            let handle = thread::Builder::new()
                .name(format!("whisk-worker-{id}"))
                .stack_size(self.config.stack_size)
                .spawn(move || worker_loop(&server, service.as_ref(), &stop, max_body))?;
            handles.push(handle);
        }

        info!(
            addr = %bound,
            workers,
            stack_size = self.config.stack_size,
            max_body_bytes = self.config.max_body_bytes,
            "HTTP server listening"
        );
        Ok(ServerHandle {
            addr: bound,
            stop,
            server,
            workers: handles,
        })
    }
}

fn worker_loop<S: HttpService>(server: &tiny_http::Server, service: &S, stop: &AtomicBool, max_body: usize) {
    while !stop.load(Ordering::Acquire) {
        match server.recv_timeout(POLL_INTERVAL) {
            Ok(Some(request)) => handle_request(service, request, max_body),
            Ok(None) => {}
            Err(e) => {
                error!(error = %e, "Listener failed, worker exiting");
                break;
            }
        }
    }
}

fn handle_request<S: HttpService>(service: &S, mut request: tiny_http::Request, max_body: usize) {
    let response = match into_http_request(&mut request, max_body) {
        Ok(req) => service.call(req),
        Err(reason) => {
            debug!(%reason, url = request.url(), "Rejected request");
            reject_response(&reason)
        }
    };
    if let Err(e) = request.respond(into_tiny_response(response)) {
        debug!(error = %e, "Failed to write response");
    }
}
