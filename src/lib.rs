//! `requester` is a convenience layer over an async HTTP client.
//!
//! A [`Client`] produces [`Request`]s. Requests are configured with an
//! ordered list of [`RequestOption`] steps, sent through a retry loop with
//! linear or exponential backoff, and the resulting [`Response`] is checked
//! and decoded with [`ResponseOption`] steps:
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use requester::{request_option as req, response_option as res, BackoffPolicy, Client, Context};
//! use serde::Deserialize;
//!
//! #[derive(Default, Deserialize)]
//! struct Repo {
//!     name: String,
//! }
//!
//! # async fn run() -> Result<(), requester::ErrorList> {
//! let client = Client::new().with_base_url("https://api.github.com");
//! let mut repo = Repo::default();
//!
//! client
//!     .get(&Context::background(), &["repos", "rust-lang", "rust"])
//!     .send(vec![
//!         req::with_header("User-Agent", "requester"),
//!         req::with_retry_policy(
//!             3,
//!             Duration::from_millis(200),
//!             BackoffPolicy::Exponential,
//!             [502, 503],
//!         ),
//!     ])
//!     .await
//!     .handle(vec![
//!         res::with_status_code_assertion([200]),
//!         res::with_unmarshal_json(&mut repo, [200]),
//!     ])?;
//! # Ok(())
//! # }
//! ```
//!
//! Errors never stop a phase early. Every step runs and every failure is
//! collected into an [`ErrorList`]; an error left by one phase makes the
//! next phase report it instead of running.

mod client;
mod context;
mod error;
mod options;
mod request;
mod response;
mod retry;

pub mod codec;
pub mod request_option;
pub mod response_option;
pub mod transport;

pub use client::Client;
pub use codec::{Decoder, Json, Xml};
pub use context::Context;
pub use error::{BoxError, Error, ErrorList, SharedError};
pub use options::ClientOptions;
pub use request::Request;
pub use request_option::RequestOption;
pub use response::Response;
pub use response_option::ResponseOption;
pub use retry::{BackoffPolicy, RetryPolicy, MAX_RETRIES};
pub use transport::{PreparedRequest, Transport, TransportResponse};

pub type Result<T> = std::result::Result<T, Error>;
