/* 📖 # What is the Platform Abstraction Layer?

Everything the poll engine needs from the outside world goes through the Pal
trait: reading the config and data files, and serving HTTP. RealPal backs it
with std::fs and tiny_http. MockPal keeps files in memory and dispatches
requests straight into the registered service, so API tests need no sockets.
*/

mod file_path;
pub mod http;
pub mod mock;
pub mod real_pal;
mod traits;

pub use file_path::FilePath;
pub use http::{
    HttpBody, HttpHeaders, HttpMethod, HttpRequest, HttpResponse, HttpServerConfig,
    HttpServerHandle, HttpService, HttpStatusCode,
};
pub use mock::MockPal;
pub use real_pal::RealPal;
pub use traits::{Pal, PalHandle};
