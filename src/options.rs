use std::time::Duration;

use crate::RetryPolicy;

/// Defaults seeded into every request a [`Client`](crate::Client) creates.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ClientOptions {
    /// URL that routes are appended to. Without one, routes must join into
    /// an absolute URL.
    pub base_url: Option<String>,
    /// Per-attempt timeout. `None` leaves it to the transport.
    pub timeout: Option<Duration>,
    /// Retry policy a request starts with; `with_retry_policy` overrides it.
    pub retry_policy: RetryPolicy,
}
