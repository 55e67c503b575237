use std::fs;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{debug, error, instrument, warn};

use crate::{VoteboxError, VoteboxResult, error::ErrorKind};

use super::FilePath;
use super::http::{
    HttpMethod, HttpRequest, HttpResponse, HttpServerConfig, HttpServerHandle, HttpService,
    HttpStatusCode, internal_error_response,
};
use super::traits::Pal;

/* 📖 # Why tiny_http and a polling accept loop?

tiny_http is synchronous and small, which fits a service whose handlers only
touch an in-memory store. The accept loop uses recv_timeout so the thread can
notice the shutdown flag without a connection arriving.
*/

const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// PAL implementation backed by the real filesystem and network.
///
/// File paths are resolved relative to the configured base directory.
#[derive(Debug)]
pub struct RealPal {
    base_dir: PathBuf,
}

impl RealPal {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    fn resolve_path(&self, path: &FilePath) -> PathBuf {
        self.base_dir.join(path.as_path())
    }
}

impl Pal for RealPal {
    #[instrument(skip(self), fields(path = %path))]
    fn file_exists(&self, path: &FilePath) -> VoteboxResult<bool> {
        let resolved = self.resolve_path(path);
        let exists = resolved.exists();
        debug!(exists, resolved = %resolved.display(), "checked file existence");
        Ok(exists)
    }

    #[instrument(skip(self), fields(path = %path))]
    fn read_file(&self, path: &FilePath) -> VoteboxResult<Box<dyn Read + 'static>> {
        let resolved = self.resolve_path(path);
        debug!(resolved = %resolved.display(), "opening file for reading");
        let file = fs::File::open(&resolved).map_err(|e| {
            debug!(error = %e, "failed to open file");
            Box::new(VoteboxError::new(ErrorKind::FileError {
                path: resolved,
                source: e,
            }))
        })?;
        Ok(Box::new(file))
    }

    #[instrument(skip(self, service))]
    fn start_http_server(
        &self,
        service: Box<dyn HttpService>,
        config: HttpServerConfig,
    ) -> VoteboxResult<HttpServerHandle> {
        let address = config.address();
        let server = tiny_http::Server::http(&address)
            .map_err(|e| crate::err!("Failed to bind HTTP server to {}: {}", address, e))?;
        let port = server
            .server_addr()
            .to_ip()
            .map(|addr| addr.port())
            .ok_or_else(|| crate::err!("HTTP server on {} has no IP address", address))?;
        debug!(port, "HTTP server bound");

        let shutdown = Arc::new(AtomicBool::new(false));
        let thread_shutdown = shutdown.clone();
        let server_name = config.server_name.clone();
        let thread = std::thread::Builder::new()
            .name(format!("http-{}", port))
            .spawn(move || {
                while !thread_shutdown.load(Ordering::SeqCst) {
                    match server.recv_timeout(ACCEPT_POLL_INTERVAL) {
                        Ok(Some(request)) => serve_request(&*service, &server_name, request),
                        Ok(None) => {}
                        Err(e) => {
                            error!(error = %e, "HTTP server stopped accepting requests");
                            break;
                        }
                    }
                }
                debug!(port, "HTTP server thread exiting");
            })
            .map_err(|e| crate::err!("Failed to spawn HTTP server thread: {}", e))?;

        Ok(HttpServerHandle::with_thread(port, shutdown, thread))
    }
}

fn serve_request(service: &dyn HttpService, server_name: &str, mut request: tiny_http::Request) {
    let response = match convert_request(&mut request) {
        Ok(http_request) => match service.handle_request(http_request) {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, url = %request.url(), "request handler failed");
                internal_error_response(&e)
            }
        },
        Err(response) => response,
    };
    if let Err(e) = request.respond(convert_response(response, server_name)) {
        warn!(error = %e, "failed to send HTTP response");
    }
}

fn convert_request(request: &mut tiny_http::Request) -> Result<HttpRequest, HttpResponse> {
    let method_name = request.method().to_string();
    let Some(method) = HttpMethod::parse(&method_name) else {
        debug!(method = %method_name, "unsupported HTTP method");
        return Err(HttpResponse::text("method_not_allowed\n")
            .with_status(HttpStatusCode::MethodNotAllowed));
    };
    let mut http_request = HttpRequest::new(method, request.url());
    for header in request.headers() {
        http_request
            .headers_mut()
            .append(header.field.to_string(), header.value.to_string());
    }
    let mut body = Vec::new();
    if let Err(e) = request.as_reader().read_to_end(&mut body) {
        debug!(error = %e, "failed to read request body");
        return Err(HttpResponse::text("could not read request body\n")
            .with_status(HttpStatusCode::BadRequest));
    }
    Ok(http_request.with_body(body))
}

fn convert_response(
    response: HttpResponse,
    server_name: &str,
) -> tiny_http::Response<std::io::Cursor<Vec<u8>>> {
    let status = response.status().as_u16();
    let mut headers: Vec<(String, String)> = response
        .headers()
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    headers.push(("server".to_string(), server_name.to_string()));
    let mut out =
        tiny_http::Response::from_data(response.into_body().into_bytes())
            .with_status_code(tiny_http::StatusCode(status));
    for (name, value) in headers {
        match tiny_http::Header::from_bytes(name.as_bytes(), value.as_bytes()) {
            Ok(header) => out = out.with_header(header),
            Err(()) => warn!(header = %name, "dropping header with invalid value"),
        }
    }
    out
}
