use std::{fmt, sync::Arc, time::Duration};

use reqwest::{Method, Url};

use crate::{transport::Transport, ClientOptions, Context, Error, Request};

/// Produces [`Request`]s that share one transport and one set of defaults.
///
/// Cloning is cheap: the transport sits behind an `Arc`, so clones can be
/// handed to independent tasks.
#[derive(Clone)]
pub struct Client {
    transport: Arc<dyn Transport>,
    options: ClientOptions,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("transport", &"<dyn Transport>")
            .field("options", &self.options)
            .finish()
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl Client {
    /// Creates a client backed by a default `reqwest::Client`.
    pub fn new() -> Self {
        Self::with_http_client(reqwest::Client::new())
    }

    /// Creates a client backed by a preconfigured `reqwest::Client`.
    pub fn with_http_client(http: reqwest::Client) -> Self {
        Self {
            transport: Arc::new(http),
            options: ClientOptions::default(),
        }
    }

    /// Creates a client from environment variables.
    ///
    /// Reads:
    /// - `REQUESTER_BASE_URL`: URL every route is appended to
    /// - `REQUESTER_TIMEOUT_MS`: optional per-attempt timeout in milliseconds
    ///
    /// Returns an error if the base URL is missing or empty, or if the
    /// timeout is not a whole number.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use requester::Client;
    ///
    /// let client = Client::from_env().expect("missing REQUESTER_* env vars");
    /// ```
    pub fn from_env() -> std::result::Result<Self, String> {
        let base_url = std::env::var("REQUESTER_BASE_URL")
            .map_err(|_| "missing REQUESTER_BASE_URL environment variable".to_owned())?;
        if base_url.trim().is_empty() {
            return Err("REQUESTER_BASE_URL is set but empty".to_owned());
        }

        let timeout = match std::env::var("REQUESTER_TIMEOUT_MS") {
            Ok(raw) if !raw.trim().is_empty() => {
                let millis = raw
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| format!("REQUESTER_TIMEOUT_MS is not a number: '{raw}'"))?;
                Some(Duration::from_millis(millis))
            }
            _ => None,
        };

        Ok(Self::new().with_options(ClientOptions {
            base_url: Some(base_url.trim().to_owned()),
            timeout,
            ..ClientOptions::default()
        }))
    }

    /// Replaces every default at once.
    pub fn with_options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.options.base_url = Some(base_url.into());
        self
    }

    /// Swaps the transport, e.g. for a recording or scripted one in tests.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn base_url(&self) -> Option<&str> {
        self.options.base_url.as_deref()
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    pub fn get(&self, ctx: &Context, routes: &[&str]) -> Request {
        self.request_with_method(ctx, Method::GET, routes)
    }

    pub fn post(&self, ctx: &Context, routes: &[&str]) -> Request {
        self.request_with_method(ctx, Method::POST, routes)
    }

    pub fn put(&self, ctx: &Context, routes: &[&str]) -> Request {
        self.request_with_method(ctx, Method::PUT, routes)
    }

    pub fn patch(&self, ctx: &Context, routes: &[&str]) -> Request {
        self.request_with_method(ctx, Method::PATCH, routes)
    }

    pub fn delete(&self, ctx: &Context, routes: &[&str]) -> Request {
        self.request_with_method(ctx, Method::DELETE, routes)
    }

    /// Creates a request with a method given by name.
    ///
    /// Fails only when `method` is not a valid HTTP token. A URL that does
    /// not parse still yields a request; the failure is carried on it and
    /// reported by [`Request::dry`] or [`Request::send`].
    pub fn request(&self, ctx: &Context, method: &str, routes: &[&str]) -> Result<Request, Error> {
        let method = Method::from_bytes(method.as_bytes())
            .map_err(|_| Error::InvalidMethod(method.to_owned()))?;
        Ok(self.request_with_method(ctx, method, routes))
    }

    pub fn request_with_method(&self, ctx: &Context, method: Method, routes: &[&str]) -> Request {
        let url = build_url(self.options.base_url.as_deref(), routes);

        #[cfg(feature = "tracing")]
        {
            if let Err(err) = &url {
                tracing::debug!(%method, error = %err, "request created without a URL");
            }
        }

        let mut request = Request::new(ctx.clone(), method, url, Arc::clone(&self.transport));
        request.set_retry_policy(self.options.retry_policy.clone());
        request.set_timeout(self.options.timeout);
        request
    }
}

fn build_url(base_url: Option<&str>, routes: &[&str]) -> Result<Url, Error> {
    let Some(base_url) = base_url else {
        let raw = routes.join("/");
        return Url::parse(&raw).map_err(|err| Error::InvalidUrl {
            url: raw,
            reason: err.to_string(),
        });
    };

    let mut url = Url::parse(base_url).map_err(|err| Error::InvalidUrl {
        url: base_url.to_owned(),
        reason: err.to_string(),
    })?;

    if routes.is_empty() {
        return Ok(url);
    }

    let trailing_slash = routes.last().is_some_and(|route| route.ends_with('/'));
    {
        let mut segments = url.path_segments_mut().map_err(|()| Error::InvalidUrl {
            url: base_url.to_owned(),
            reason: "URL cannot be a base".to_owned(),
        })?;
        segments.pop_if_empty();
        segments.extend(
            routes
                .iter()
                .flat_map(|route| route.split('/'))
                .filter(|segment| !segment.is_empty()),
        );
        if trailing_slash {
            segments.push("");
        }
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use reqwest::{Method, StatusCode};

    use super::build_url;
    use crate::{
        transport::mock::{MockTransport, Reply},
        BackoffPolicy, Client, ClientOptions, Context, Error, RetryPolicy,
    };

    #[test]
    fn routes_without_base_join_with_slash() {
        let url = build_url(None, &["https://test.com", "api", "v1"]).expect("valid url");
        assert_eq!(url.as_str(), "https://test.com/api/v1");
    }

    #[test]
    fn routes_are_appended_to_base_path() {
        let url =
            build_url(Some("https://test.com/api/"), &["users", "42/repos"]).expect("valid url");
        assert_eq!(url.as_str(), "https://test.com/api/users/42/repos");
    }

    #[test]
    fn route_segments_are_escaped() {
        let url = build_url(Some("https://test.com"), &["a b"]).expect("valid url");
        assert_eq!(url.as_str(), "https://test.com/a%20b");
    }

    #[test]
    fn trailing_slash_of_last_route_is_kept() {
        let url = build_url(Some("https://test.com"), &["items/"]).expect("valid url");
        assert_eq!(url.as_str(), "https://test.com/items/");
    }

    #[test]
    fn bad_url_yields_request_with_error() {
        let request = Client::new().get(&Context::background(), &["#"]);

        assert!(request.url().is_none());
        assert_eq!(request.scheme(), "");
        assert!(matches!(
            request.error().and_then(|err| err.first()),
            Some(Error::InvalidUrl { .. })
        ));
    }

    #[test]
    fn bad_base_url_yields_request_with_error() {
        let request = Client::new()
            .with_base_url("not a url")
            .get(&Context::background(), &["items"]);

        assert!(request.url().is_none());
        assert!(request.error().is_some());
    }

    #[test]
    fn invalid_method_yields_no_request() {
        let err = Client::new()
            .request(&Context::background(), "GE T", &["https://test.com"])
            .expect_err("must reject method");

        assert!(matches!(err, Error::InvalidMethod(ref method) if method == "GE T"));
    }

    #[test]
    fn custom_method_is_accepted() {
        let request = Client::new()
            .request(&Context::background(), "PURGE", &["https://test.com"])
            .expect("valid method");

        assert_eq!(request.method().as_str(), "PURGE");
    }

    #[test]
    fn factories_set_method() {
        let client = Client::new().with_base_url("https://test.com");
        let ctx = Context::background();

        assert_eq!(client.get(&ctx, &[]).method(), &Method::GET);
        assert_eq!(client.post(&ctx, &[]).method(), &Method::POST);
        assert_eq!(client.put(&ctx, &[]).method(), &Method::PUT);
        assert_eq!(client.patch(&ctx, &[]).method(), &Method::PATCH);
        assert_eq!(client.delete(&ctx, &[]).method(), &Method::DELETE);
    }

    #[test]
    fn options_seed_each_request() {
        let policy =
            RetryPolicy::new(2, Duration::from_millis(5), BackoffPolicy::Exponential, [503]);
        let client = Client::new().with_options(ClientOptions {
            base_url: Some("https://test.com".to_owned()),
            timeout: Some(Duration::from_secs(3)),
            retry_policy: policy.clone(),
        });

        let request = client.get(&Context::background(), &["items"]);
        assert_eq!(request.retry_policy(), &policy);
        assert_eq!(request.timeout(), Some(Duration::from_secs(3)));
    }

    #[tokio::test]
    async fn client_default_policy_drives_retries() {
        let transport = MockTransport::new(vec![
            Reply::Status(StatusCode::SERVICE_UNAVAILABLE, ""),
            Reply::Status(StatusCode::OK, "done"),
        ]);
        let client = Client::new()
            .with_options(ClientOptions {
                base_url: Some("https://test.com".to_owned()),
                retry_policy: RetryPolicy::new(3, Duration::ZERO, BackoffPolicy::Linear, [503]),
                ..ClientOptions::default()
            })
            .with_transport(Arc::new(transport.clone()));

        let response = client.get(&Context::background(), &["items"]).send(vec![]).await;

        assert_eq!(transport.hits(), 2);
        assert_eq!(response.status_code(), 200);
        assert_eq!(response.error().map(|err| err.len()), Some(1));
    }

    #[test]
    fn debug_hides_transport() {
        let client = Client::new().with_base_url("https://test.com");
        let debug = format!("{client:?}");
        assert!(debug.contains("<dyn Transport>"));
        assert!(debug.contains("https://test.com"));
    }
}
