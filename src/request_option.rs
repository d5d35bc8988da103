//! Configuration steps applied to a [`Request`].
//!
//! Each constructor returns a boxed [`RequestOption`]. Steps are handed to
//! [`Request::dry`] or [`Request::send`] as an ordered list and applied in
//! that order; every failure is collected, none stops the others.

use std::{fmt, future::Future, io::Read, path::PathBuf, sync::Arc, time::Duration};

use base64::{engine::general_purpose::STANDARD, Engine};
use futures_util::future::{self, BoxFuture};
use reqwest::header::{HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Url;
use serde::Serialize;

use crate::{
    codec::{self, CONTENT_TYPE_FORM_URLENCODED, CONTENT_TYPE_JSON, CONTENT_TYPE_XML},
    retry::{BackoffPolicy, RetryPolicy},
    BoxError, Context, Error, ErrorList, Request,
};

/// A single configuration step.
pub trait RequestOption: Send {
    /// Applies the step, returning every error it produced.
    fn apply<'r>(self: Box<Self>, request: &'r mut Request) -> BoxFuture<'r, Result<(), ErrorList>>
    where
        Self: 'r;
}

/// Boxed step as accepted by [`Request::dry`] and [`Request::send`].
pub type BoxRequestOption<'a> = Box<dyn RequestOption + 'a>;

/// Transformation applied to file content before it is form encoded.
pub type ContentTransform<'a> = Box<dyn FnOnce(Vec<u8>) -> Vec<u8> + Send + 'a>;

type TokenFuture<'a> = BoxFuture<'a, Result<String, BoxError>>;

struct FnOption<F>(F);

impl<F> RequestOption for FnOption<F>
where
    F: FnOnce(&mut Request) -> Result<(), Error> + Send,
{
    fn apply<'r>(self: Box<Self>, request: &'r mut Request) -> BoxFuture<'r, Result<(), ErrorList>>
    where
        Self: 'r,
    {
        let FnOption(f) = *self;
        Box::pin(future::ready(f(request).map_err(ErrorList::from)))
    }
}

/// Turns a synchronous closure into a step.
pub fn from_fn<'a, F>(f: F) -> BoxRequestOption<'a>
where
    F: FnOnce(&mut Request) -> Result<(), Error> + Send + 'a,
{
    Box::new(FnOption(f))
}

/// Replaces the request URL with `raw`, which must be absolute.
pub fn with_url<'a>(raw: impl Into<String>) -> BoxRequestOption<'a> {
    let raw = raw.into();
    from_fn(move |request| {
        let url = Url::parse(&raw).map_err(|err| Error::InvalidUrl {
            url: raw.clone(),
            reason: err.to_string(),
        })?;
        request.set_url(url);
        Ok(())
    })
}

/// Appends query parameters after any already present.
///
/// Repeated keys are kept, never replaced.
pub fn with_url_query<'a, I, K, V>(pairs: I) -> BoxRequestOption<'a>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: fmt::Display,
{
    let pairs: Vec<(String, String)> = pairs
        .into_iter()
        .map(|(key, value)| (key.into(), value.to_string()))
        .collect();

    from_fn(move |request| {
        let url = request.url_mut()?;
        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(pairs);
        }
        Ok(())
    })
}

/// Drains `reader` into memory and uses it as the body.
pub fn with_body<'a, R>(mut reader: R) -> BoxRequestOption<'a>
where
    R: Read + Send + 'a,
{
    from_fn(move |request| {
        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer).map_err(Error::io)?;
        request.set_body(buffer);
        Ok(())
    })
}

pub fn with_body_json<'a, T>(value: T) -> BoxRequestOption<'a>
where
    T: Serialize + Send + 'a,
{
    from_fn(move |request| {
        let body = codec::encode_json(&value)?;
        request.set_body(body);
        set_content_type(request, CONTENT_TYPE_JSON)
    })
}

pub fn with_body_xml<'a, T>(value: T) -> BoxRequestOption<'a>
where
    T: Serialize + Send + 'a,
{
    from_fn(move |request| {
        let body = codec::encode_xml(&value)?;
        request.set_body(body);
        set_content_type(request, CONTENT_TYPE_XML)
    })
}

pub fn with_body_form_urlencoded<'a, I, K, V>(pairs: I) -> BoxRequestOption<'a>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    let pairs: Vec<(String, String)> = pairs
        .into_iter()
        .map(|(key, value)| (key.into(), value.into()))
        .collect();

    from_fn(move |request| {
        request.set_body(codec::encode_form_urlencoded(pairs));
        set_content_type(request, CONTENT_TYPE_FORM_URLENCODED)
    })
}

/// Encodes `fields` as `multipart/form-data` under a fresh random boundary.
pub fn with_body_form_data<'a, I, K, V>(fields: I) -> BoxRequestOption<'a>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Vec<u8>>,
{
    let fields: Vec<(String, Vec<u8>)> = fields
        .into_iter()
        .map(|(key, value)| (key.into(), value.into()))
        .collect();

    from_fn(move |request| set_form_data(request, fields))
}

struct FormDataFile<'a> {
    path: PathBuf,
    field: String,
    transforms: Vec<ContentTransform<'a>>,
}

impl<'a> RequestOption for FormDataFile<'a> {
    fn apply<'r>(self: Box<Self>, request: &'r mut Request) -> BoxFuture<'r, Result<(), ErrorList>>
    where
        Self: 'r,
    {
        Box::pin(async move {
            let FormDataFile {
                path,
                field,
                transforms,
            } = *self;

            let mut content = tokio::fs::read(&path).await.map_err(Error::io)?;
            for transform in transforms {
                content = transform(content);
            }

            set_form_data(request, vec![(field, content)])?;
            Ok(())
        })
    }
}

/// Reads the file at `path`, passes its content through `transforms` in
/// order, and sends it as the single form-data field `field`.
pub fn with_body_form_data_file<'a>(
    path: impl Into<PathBuf>,
    field: impl Into<String>,
    transforms: Vec<ContentTransform<'a>>,
) -> BoxRequestOption<'a> {
    Box::new(FormDataFile {
        path: path.into(),
        field: field.into(),
        transforms,
    })
}

pub fn with_authorization_basic<'a>(
    username: impl AsRef<str>,
    password: impl AsRef<str>,
) -> BoxRequestOption<'a> {
    let credentials = STANDARD.encode(format!("{}:{}", username.as_ref(), password.as_ref()));
    from_fn(move |request| set_authorization(request, format!("Basic {credentials}")))
}

struct BearerAuth<'a> {
    provider: Box<dyn FnOnce(Context) -> TokenFuture<'a> + Send + 'a>,
}

impl<'a> RequestOption for BearerAuth<'a> {
    fn apply<'r>(self: Box<Self>, request: &'r mut Request) -> BoxFuture<'r, Result<(), ErrorList>>
    where
        Self: 'r,
    {
        Box::pin(async move {
            let ctx = request.context().clone();
            let token = tokio::select! {
                biased;
                reason = ctx.done() => return Err(reason.into()),
                token = (self.provider)(ctx.clone()) => token,
            };

            let token = token.map_err(|err| Error::TokenProvider(Arc::from(err)))?;
            set_authorization(request, format!("Bearer {token}"))?;
            Ok(())
        })
    }
}

/// Fetches a token from `provider` and sends it as a bearer credential.
///
/// The provider receives the request's [`Context`]; if that context
/// finishes first, its error is reported instead.
pub fn with_authorization_bearer<'a, F, Fut, E>(provider: F) -> BoxRequestOption<'a>
where
    F: FnOnce(Context) -> Fut + Send + 'a,
    Fut: Future<Output = Result<String, E>> + Send + 'a,
    E: Into<BoxError> + 'a,
{
    Box::new(BearerAuth {
        provider: Box::new(move |ctx: Context| {
            Box::pin(async move { provider(ctx).await.map_err(Into::into) }) as TokenFuture<'a>
        }),
    })
}

/// Appends a header; existing values for `name` are kept.
pub fn with_header<'a>(name: impl Into<String>, value: impl fmt::Display) -> BoxRequestOption<'a> {
    let name = name.into();
    let value = value.to_string();
    from_fn(move |request| {
        let header_name =
            HeaderName::from_bytes(name.as_bytes()).map_err(|err| Error::InvalidHeader {
                name: name.clone(),
                reason: err.to_string(),
            })?;
        let header_value = header_value(&name, &value)?;
        request.headers_mut().append(header_name, header_value);
        Ok(())
    })
}

/// Sets the retry budget, backoff and retryable statuses.
///
/// `retries` above [`crate::MAX_RETRIES`] is clamped.
pub fn with_retry_policy<'a, I>(
    retries: u32,
    base_delay: Duration,
    backoff: BackoffPolicy,
    status_codes: I,
) -> BoxRequestOption<'a>
where
    I: IntoIterator<Item = u16>,
{
    let policy = RetryPolicy::new(retries, base_delay, backoff, status_codes);
    from_fn(move |request| {
        request.set_retry_policy(policy);
        Ok(())
    })
}

/// Limits how long each attempt may take.
pub fn with_timeout<'a>(timeout: Duration) -> BoxRequestOption<'a> {
    from_fn(move |request| {
        request.set_timeout(Some(timeout));
        Ok(())
    })
}

struct Group<'a>(Vec<BoxRequestOption<'a>>);

impl<'a> RequestOption for Group<'a> {
    fn apply<'r>(self: Box<Self>, request: &'r mut Request) -> BoxFuture<'r, Result<(), ErrorList>>
    where
        Self: 'r,
    {
        Box::pin(async move { request.apply_options(self.0).await.into_result() })
    }
}

/// Bundles several steps into one, e.g. to share a preset between calls.
pub fn with_request_options(options: Vec<BoxRequestOption<'_>>) -> BoxRequestOption<'_> {
    Box::new(Group(options))
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue, Error> {
    HeaderValue::from_str(value).map_err(|err| Error::InvalidHeader {
        name: name.to_owned(),
        reason: err.to_string(),
    })
}

fn set_content_type(request: &mut Request, content_type: &str) -> Result<(), Error> {
    let value = header_value(CONTENT_TYPE.as_str(), content_type)?;
    request.headers_mut().insert(CONTENT_TYPE, value);
    Ok(())
}

fn set_authorization(request: &mut Request, credentials: String) -> Result<(), Error> {
    let mut value = header_value(AUTHORIZATION.as_str(), &credentials)?;
    value.set_sensitive(true);
    request.headers_mut().insert(AUTHORIZATION, value);
    Ok(())
}

fn set_form_data(request: &mut Request, fields: Vec<(String, Vec<u8>)>) -> Result<(), Error> {
    let form = codec::encode_form_data(fields);
    let content_type = form.content_type();
    request.set_body(form.body);
    set_content_type(request, &content_type)
}
