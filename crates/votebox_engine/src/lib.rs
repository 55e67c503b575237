/* 📖 # What lives in votebox_engine?

Everything about polls that is not platform plumbing: the entity model, the
store, the choose/unchoose rules, parsing of request bodies and votes,
authentication and sessions, the JSON projections and the HTTP API that ties
them together. Configuration and question data are read through the Pal from
votebox_base.
*/

pub mod api;
pub mod auth;
pub mod choice;
pub mod config;
pub mod model;
pub mod populate;
pub mod query;
pub mod request;
pub mod store;
pub mod vote;

pub use api::{ApiOptions, ApiService};
pub use choice::{ChooseResult, choose, unchoose};
pub use config::{Config, UserConfig, load_config};
pub use populate::{QuestionRecord, load_questions, populate, seed_users};
pub use store::{InMemoryStore, PollStore, StoreHandle};
pub use vote::{VoteError, VoteRequest};
