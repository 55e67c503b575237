/* 📖 # Why have votebox_base as a core library?
votebox_base holds what every other crate needs: the error type, tracing setup
and the platform abstraction layer. The engine never touches sockets or the
file system directly, which keeps it testable with MockPal.
*/

pub mod error;
mod error_tests;
pub mod pal;
pub mod tracing;

// Re-export commonly used types for convenience
pub use error::{ErrorKind, ResultExt, VoteboxError, VoteboxResult};
pub use pal::{
    FilePath, HttpBody, HttpHeaders, HttpMethod, HttpRequest, HttpResponse, HttpServerConfig,
    HttpServerHandle, HttpService, HttpStatusCode, MockPal, Pal, PalHandle, RealPal,
};
