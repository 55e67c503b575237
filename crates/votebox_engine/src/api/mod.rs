/* 📖 # Why an API module in votebox_engine?

The api module exposes the poll engine over HTTP. ApiService implements the
HttpService trait from votebox_base, so the same service runs under RealPal in
production and under MockPal in tests.
*/

mod service;

pub use service::{ApiOptions, ApiService};
