use std::{fmt, sync::Arc, time::Duration};

use bytes::Bytes;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION},
    Method, Url,
};

use crate::{
    request_option::RequestOption,
    retry::{self, RetryPolicy},
    transport::{PreparedRequest, Transport},
    Context, Error, ErrorList, Response,
};

/// One outbound call, configured by [`RequestOption`] steps and consumed by
/// [`Request::send`].
///
/// A request that failed to build (for example because its URL did not
/// parse) keeps that error. Later `dry` and `send` calls report it without
/// running any step or touching the network.
pub struct Request {
    method: Method,
    url: Option<Url>,
    headers: HeaderMap,
    body: Bytes,
    err: Option<ErrorList>,
    retry_policy: RetryPolicy,
    timeout: Option<Duration>,
    context: Context,
    transport: Arc<dyn Transport>,
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut headers = self.headers.clone();
        if headers.contains_key(AUTHORIZATION) {
            headers.insert(AUTHORIZATION, HeaderValue::from_static("<redacted>"));
        }

        f.debug_struct("Request")
            .field("method", &self.method)
            .field("url", &self.url.as_ref().map(Url::as_str))
            .field("headers", &headers)
            .field("body_len", &self.body.len())
            .field("err", &self.err)
            .field("retry_policy", &self.retry_policy)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Request {
    pub(crate) fn new(
        context: Context,
        method: Method,
        url: Result<Url, Error>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let (url, err) = match url {
            Ok(url) => (Some(url), None),
            Err(err) => (None, Some(ErrorList::from(err))),
        };

        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            err,
            retry_policy: RetryPolicy::default(),
            timeout: None,
            context,
            transport,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    /// URL scheme, or an empty string when the request has no URL.
    pub fn scheme(&self) -> &str {
        self.url.as_ref().map_or("", Url::scheme)
    }

    pub fn set_url(&mut self, url: Url) {
        self.url = Some(url);
    }

    pub(crate) fn url_mut(&mut self) -> Result<&mut Url, Error> {
        self.url.as_mut().ok_or(Error::MissingUrl)
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn set_body(&mut self, body: impl Into<Bytes>) {
        self.body = body.into();
    }

    /// Length of the buffered body in bytes.
    pub fn content_length(&self) -> u64 {
        self.body.len() as u64
    }

    /// Construction error carried by this request, if any.
    pub fn error(&self) -> Option<&ErrorList> {
        self.err.as_ref()
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    pub fn set_retry_policy(&mut self, policy: RetryPolicy) {
        self.retry_policy = policy;
    }

    /// Per-attempt timeout handed to the transport.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Applies `options` without sending.
    ///
    /// Every step runs even when an earlier one fails; all failures are
    /// returned together and remembered, so a later `send` does not go out.
    pub async fn dry<'a, I>(&mut self, options: I) -> Result<(), ErrorList>
    where
        I: IntoIterator<Item = Box<dyn RequestOption + 'a>>,
    {
        if let Some(err) = &self.err {
            return Err(err.clone());
        }

        let errors = self.apply_options(options).await;
        if errors.is_empty() {
            return Ok(());
        }

        self.err = Some(errors.clone());
        Err(errors)
    }

    /// Applies `options`, then sends the request through the retry loop.
    ///
    /// A [`Response`] is always returned. When the request could not be
    /// built it is an empty placeholder carrying the construction errors;
    /// otherwise it carries every per-attempt error in order alongside the
    /// last response received.
    pub async fn send<'a, I>(mut self, options: I) -> Response
    where
        I: IntoIterator<Item = Box<dyn RequestOption + 'a>>,
    {
        if let Some(err) = self.err.take() {
            return Response::placeholder(err);
        }

        let errors = self.apply_options(options).await;
        if !errors.is_empty() {
            return Response::placeholder(errors);
        }

        let Some(url) = self.url.take() else {
            return Response::placeholder(Error::MissingUrl.into());
        };

        let prepared = PreparedRequest {
            method: self.method,
            url,
            headers: self.headers,
            body: self.body,
            timeout: self.timeout,
        };

        let outcome = retry::execute(
            self.transport.as_ref(),
            &prepared,
            &self.retry_policy,
            &self.context,
        )
        .await;

        Response::from_send(outcome.response, outcome.errors)
    }

    pub(crate) async fn apply_options<'a, I>(&mut self, options: I) -> ErrorList
    where
        I: IntoIterator<Item = Box<dyn RequestOption + 'a>>,
    {
        let mut errors = ErrorList::new();
        for option in options {
            if let Err(err) = option.apply(self).await {
                #[cfg(feature = "tracing")]
                tracing::trace!(error = %err, "request option failed");

                errors.extend(err);
            }
        }
        errors
    }
}
