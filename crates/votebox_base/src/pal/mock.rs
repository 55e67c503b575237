use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicU16, Ordering};

use parking_lot::Mutex;

use crate::VoteboxResult;
use crate::error::{ErrorKind, VoteboxError};

use super::FilePath;
use super::http::{
    HttpRequest, HttpResponse, HttpServerConfig, HttpServerHandle, HttpService,
    internal_error_response,
};
use super::traits::Pal;

/* 📖 # Why does MockPal dispatch requests itself?

A started "server" is just the service stored under a port number.
simulate_request calls it on the current thread and applies the same
error-to-500 conversion as RealPal, so API tests see what a client would see
without binding a socket.
*/

/// In-memory PAL implementation for testing.
///
/// ```
/// use votebox_base::{FilePath, MockPal, Pal};
///
/// let mock = MockPal::new();
/// mock.add_file(FilePath::from("votebox.toml"), b"port = 0".to_vec());
/// let content = mock.read_file_to_string(&FilePath::from("votebox.toml")).unwrap();
/// assert_eq!(content, "port = 0");
/// ```
#[derive(Debug, Clone)]
pub struct MockPal {
    files: Arc<Mutex<HashMap<FilePath, Vec<u8>>>>,
    http_servers: Arc<Mutex<HashMap<u16, HttpServerInfo>>>,
    next_port: Arc<AtomicU16>,
}

#[derive(Debug)]
struct HttpServerInfo {
    service: Arc<dyn HttpService>,
    handle: HttpServerHandle,
}

impl MockPal {
    pub fn new() -> Self {
        Self {
            files: Arc::new(Mutex::new(HashMap::new())),
            http_servers: Arc::new(Mutex::new(HashMap::new())),
            next_port: Arc::new(AtomicU16::new(10000)),
        }
    }

    /// Add a file to the mock storage.
    pub fn add_file(&self, path: FilePath, content: Vec<u8>) {
        self.files.lock().insert(path, content);
    }

    /// Simulate an HTTP request to a running server.
    ///
    /// Returns an error if no server is registered on the port or the server
    /// was shut down. Errors from the service become 500 responses.
    pub fn simulate_request(&self, port: u16, request: HttpRequest) -> VoteboxResult<HttpResponse> {
        let service = {
            let servers = self.http_servers.lock();
            let server_info = servers
                .get(&port)
                .ok_or_else(|| crate::err!("No HTTP server registered on port {}", port))?;
            if server_info.handle.is_shutdown() {
                crate::bail!("HTTP server on port {} has been shut down", port);
            }
            server_info.service.clone()
        };

        match service.handle_request(request) {
            Ok(response) => Ok(response),
            Err(e) => Ok(internal_error_response(&e)),
        }
    }

    /// Number of servers started on this PAL.
    pub fn http_server_count(&self) -> usize {
        self.http_servers.lock().len()
    }
}

impl Default for MockPal {
    fn default() -> Self {
        Self::new()
    }
}

impl Pal for MockPal {
    fn file_exists(&self, path: &FilePath) -> VoteboxResult<bool> {
        Ok(self.files.lock().contains_key(path))
    }

    fn read_file(&self, path: &FilePath) -> VoteboxResult<Box<dyn Read + 'static>> {
        let files = self.files.lock();
        let content = files
            .get(path)
            .ok_or_else(|| {
                Box::new(VoteboxError::new(ErrorKind::FileError {
                    path: path.as_path().to_path_buf(),
                    source: std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        format!("File not found: {}", path),
                    ),
                }))
            })?
            .clone();
        Ok(Box::new(Cursor::new(content)))
    }

    fn start_http_server(
        &self,
        service: Box<dyn HttpService>,
        config: HttpServerConfig,
    ) -> VoteboxResult<HttpServerHandle> {
        let port = match config.port {
            Some(p) if p != 0 => p,
            _ => self.next_port.fetch_add(1, Ordering::SeqCst),
        };
        let mut servers = self.http_servers.lock();
        if servers.contains_key(&port) {
            crate::bail!("Port {} is already in use", port);
        }
        let handle = HttpServerHandle::new(port);
        servers.insert(
            port,
            HttpServerInfo {
                service: Arc::from(service),
                handle: handle.observer(),
            },
        );
        Ok(handle)
    }
}
