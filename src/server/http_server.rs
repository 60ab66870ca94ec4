use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream as StdTcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use http::header::{HeaderName, HeaderValue, CONNECTION, CONTENT_LENGTH, TRANSFER_ENCODING};
use http::{HeaderMap, Method, Version};
use may::coroutine::{self, JoinHandle};
use may::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use super::response::{encode, plain};
use super::Request;
use crate::config::ServerConfig;
use crate::context::Response;
use crate::dispatcher::Dispatcher;
use crate::error::Error;
use crate::runtime_config::RuntimeConfig;

const MAX_HEADERS: usize = 64;
const READ_CHUNK: usize = 8 * 1024;

/// Something that turns a request into a response.
pub trait Service: Send + Sync + 'static {
    /// # Errors
    ///
    /// A failure the server answers with a bare `500`.
    fn call(&self, request: Request) -> Result<Response, Error>;
}

impl Service for Dispatcher {
    fn call(&self, request: Request) -> Result<Response, Error> {
        self.serve(request)
    }
}

/// HTTP/1.1 server on the `may` runtime, one coroutine per connection.
pub struct HttpServer<S> {
    service: Arc<S>,
    config: ServerConfig,
    stack_size: usize,
}

/// Handle to a running HTTP server
pub struct ServerHandle {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl ServerHandle {
    /// Address the server is bound to; useful after binding port `0`.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Poll the listening socket until it accepts connections.
    ///
    /// # Errors
    ///
    /// `TimedOut` if the server doesn't become ready within ~250ms.
    pub fn wait_ready(&self) -> io::Result<()> {
        for _ in 0..50 {
            if StdTcpStream::connect(self.addr).is_ok() {
                return Ok(());
            }
            thread::sleep(Duration::from_millis(5));
        }
        Err(io::Error::new(io::ErrorKind::TimedOut, "server not ready"))
    }

    /// Stop accepting connections and wait for the accept loop to end.
    pub fn stop(self) {
        // SAFETY: cancel() is unsafe in may because a cancelled coroutine
        // unwinds at its next blocking point. The accept loop holds no locks
        // and owns only the listener, which is dropped on unwind.
        unsafe {
            self.handle.coroutine().cancel();
        }
        let _ = self.handle.join();
        info!(addr = %self.addr, "HTTP server stopped");
    }

    /// Block until the accept loop ends.
    ///
    /// # Errors
    ///
    /// The accept coroutine panicked.
    pub fn join(self) -> std::thread::Result<()> {
        self.handle.join()
    }
}

impl<S: Service> HttpServer<S> {
    #[must_use]
    pub fn new(service: Arc<S>, config: ServerConfig) -> Self {
        Self {
            service,
            config,
            stack_size: RuntimeConfig::from_env().stack_size,
        }
    }

    /// Stack size of connection coroutines.
    #[must_use]
    pub fn stack_size(mut self, stack_size: usize) -> Self {
        self.stack_size = stack_size;
        self
    }

    /// Bind `addr` and start accepting connections.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid or the port cannot be bound.
    pub fn start<A: ToSocketAddrs>(self, addr: A) -> io::Result<ServerHandle> {
        let addr = addr
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "invalid address"))?;
        let listener = TcpListener::bind(addr)?;
        let addr = listener.local_addr()?;
        let stack_size = self.stack_size;

        // SAFETY: Builder::spawn is unsafe in may because coroutines must not
        // block the worker thread with thread-local blocking calls or hold
        // thread-local references across yields. The accept loop only uses
        // may's non-blocking net types.
        let handle = unsafe {
            coroutine::Builder::new()
                .name("brrtweb-accept".to_string())
                .stack_size(stack_size)
                .spawn(move || self.accept_loop(&listener))
        }?;
        info!(%addr, stack_size, "HTTP server listening");
        Ok(ServerHandle { addr, handle })
    }

    fn accept_loop(self, listener: &TcpListener) {
        let shared = Arc::new(self);
        for stream in listener.incoming() {
            let stream = match stream {
                Ok(s) => s,
                Err(e) => {
                    warn!(error = %e, "Accept failed");
                    continue;
                }
            };
            let server = Arc::clone(&shared);
            // SAFETY: see `start`; connection coroutines only block on may
            // sockets, and handlers run synchronously on this coroutine.
            let spawned = unsafe {
                coroutine::Builder::new()
                    .stack_size(server.stack_size)
                    .spawn(move || {
                        let peer = stream.peer_addr().ok();
                        if let Err(e) = server.serve_connection(stream, peer) {
                            debug!(peer = ?peer, error = %e, "Connection closed with error");
                        }
                    })
            };
            if let Err(e) = spawned {
                error!(error = %e, "Failed to spawn connection coroutine");
            }
        }
    }

    fn serve_connection(&self, mut stream: TcpStream, peer: Option<SocketAddr>) -> io::Result<()> {
        let _ = stream.set_nodelay(true);
        stream.set_write_timeout(Some(self.config.write_timeout()))?;
        let mut buf: Vec<u8> = Vec::with_capacity(READ_CHUNK);
        let mut served = 0usize;

        loop {
            // Between keep-alive requests the idle timeout applies
            let timeout = if served > 0 && buf.is_empty() {
                self.config.idle_timeout()
            } else {
                self.config.read_timeout()
            };
            stream.set_read_timeout(Some(timeout))?;

            let head = match self.read_head(&mut stream, &mut buf)? {
                Head::Parsed(head) => head,
                Head::Closed => return Ok(()),
                Head::Reject(status) => {
                    stream.write_all(&encode(&plain(status), false, false))?;
                    return Ok(());
                }
            };

            if head.chunked {
                stream.write_all(&encode(&plain(501), false, false))?;
                return Ok(());
            }
            if head.content_length > self.config.max_body_size {
                stream.write_all(&encode(&plain(413), false, false))?;
                return Ok(());
            }

            stream.set_read_timeout(Some(self.config.read_timeout()))?;
            let total = head.len + head.content_length;
            while buf.len() < total {
                if fill(&mut stream, &mut buf)? == 0 {
                    return Ok(());
                }
            }
            let body = buf[head.len..total].to_vec();
            buf.drain(..total);

            let keep_alive = head.keep_alive;
            let head_only = head.request.method == Method::HEAD;
            let mut request = head.request;
            request.body = body;
            request.remote_addr = peer;

            let response = self.service.call(request).unwrap_or_else(|_| Response::internal_error());
            stream.write_all(&encode(&response, head_only, keep_alive))?;
            served += 1;
            if !keep_alive {
                return Ok(());
            }
        }
    }

    fn read_head(&self, stream: &mut TcpStream, buf: &mut Vec<u8>) -> io::Result<Head> {
        loop {
            if !buf.is_empty() {
                match parse_head(buf) {
                    Ok(Some(head)) => return Ok(Head::Parsed(head)),
                    Ok(None) if buf.len() > self.config.max_header_size => {
                        return Ok(Head::Reject(431));
                    }
                    Ok(None) => {}
                    Err(status) => return Ok(Head::Reject(status)),
                }
            }
            match fill(stream, buf) {
                Ok(0) => return Ok(Head::Closed),
                Ok(_) => {}
                Err(e) if is_timeout(&e) => return Ok(Head::Closed),
                Err(e) => return Err(e),
            }
        }
    }
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}

/// Read once into the tail of `buf`; reads go to the heap, not the small
/// coroutine stack.
fn fill(stream: &mut TcpStream, buf: &mut Vec<u8>) -> io::Result<usize> {
    let start = buf.len();
    buf.resize(start + READ_CHUNK, 0);
    let read = stream.read(&mut buf[start..]);
    buf.truncate(start + *read.as_ref().unwrap_or(&0));
    read
}

enum Head {
    Parsed(ParsedHead),
    Closed,
    Reject(u16),
}

struct ParsedHead {
    request: Request,
    len: usize,
    content_length: usize,
    chunked: bool,
    keep_alive: bool,
}

/// Parse a request head from the front of `buf`.
///
/// `Ok(None)` means more bytes are needed; `Err(status)` is the status to
/// reject the request with.
fn parse_head(buf: &[u8]) -> Result<Option<ParsedHead>, u16> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut req = httparse::Request::new(&mut headers);
    let len = match req.parse(buf) {
        Ok(httparse::Status::Complete(len)) => len,
        Ok(httparse::Status::Partial) => return Ok(None),
        Err(httparse::Error::TooManyHeaders) => return Err(431),
        Err(_) => return Err(400),
    };

    let method = Method::from_bytes(req.method.unwrap_or("GET").as_bytes()).map_err(|_| 400u16)?;
    let version = if req.version == Some(0) {
        Version::HTTP_10
    } else {
        Version::HTTP_11
    };
    let mut map = HeaderMap::with_capacity(req.headers.len());
    for h in req.headers.iter() {
        let name = HeaderName::from_bytes(h.name.as_bytes()).map_err(|_| 400u16)?;
        let value = HeaderValue::from_bytes(h.value).map_err(|_| 400u16)?;
        map.append(name, value);
    }

    let content_length = match map.get(CONTENT_LENGTH) {
        Some(v) => v
            .to_str()
            .ok()
            .and_then(|s| s.trim().parse::<usize>().ok())
            .ok_or(400u16)?,
        None => 0,
    };
    let chunked = map
        .get_all(TRANSFER_ENCODING)
        .iter()
        .any(|v| v.to_str().is_ok_and(|s| s.to_ascii_lowercase().contains("chunked")));
    let connection = map
        .get(CONNECTION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    let keep_alive = match version {
        Version::HTTP_10 => connection.contains("keep-alive"),
        _ => !connection.contains("close"),
    };

    let mut request = Request::new(method, req.path.unwrap_or("/"));
    request.version = version;
    request.headers = map;
    Ok(Some(ParsedHead {
        request,
        len,
        content_length,
        chunked,
        keep_alive,
    }))
}
