use std::borrow::Cow;

use bytes::Bytes;
use reqwest::{header::HeaderMap, StatusCode};

use crate::{response_option::ResponseOption, transport::TransportResponse, ErrorList};

/// Outcome of a send, possibly retried.
///
/// The body is held in memory and can be read any number of times, so
/// several handler steps can inspect it in turn.
#[derive(Clone, Debug, Default)]
pub struct Response {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: Bytes,
    err: Option<ErrorList>,
}

impl Response {
    /// Builds a received response with no send error.
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status: Some(status),
            headers,
            body: body.into(),
            err: None,
        }
    }

    /// Empty response standing in for one that was never received.
    pub(crate) fn placeholder(err: ErrorList) -> Self {
        Self {
            err: Some(err),
            ..Self::default()
        }
    }

    pub(crate) fn from_send(response: Option<TransportResponse>, errors: ErrorList) -> Self {
        let err = (!errors.is_empty()).then_some(errors);
        match response {
            Some(TransportResponse {
                status,
                headers,
                body,
            }) => Self {
                status: Some(status),
                headers,
                body,
                err,
            },
            None => Self {
                err,
                ..Self::default()
            },
        }
    }

    /// Status code, or `None` when nothing was received.
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Numeric status code; `0` when nothing was received.
    pub fn status_code(&self) -> u16 {
        self.status.map_or(0, |status| status.as_u16())
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Body decoded as UTF-8, with invalid sequences replaced.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Replaces the body, so a step can rewrite it for the steps after it.
    pub fn set_body(&mut self, body: impl Into<Bytes>) {
        self.body = body.into();
    }

    /// Errors left by building or sending the request.
    ///
    /// A successful send that needed retries still lists the failed
    /// attempts here.
    pub fn error(&self) -> Option<&ErrorList> {
        self.err.as_ref()
    }

    /// Runs `options` against this response.
    ///
    /// When the send phase left an error it is returned as-is and no step
    /// runs. Otherwise every step runs in order and all of their errors
    /// are returned together.
    pub fn handle<'a, I>(&mut self, options: I) -> Result<(), ErrorList>
    where
        I: IntoIterator<Item = Box<dyn ResponseOption + 'a>>,
    {
        if let Some(err) = &self.err {
            return Err(err.clone());
        }

        let mut errors = ErrorList::new();
        for option in options {
            if let Err(err) = option.apply(self) {
                errors.push(err);
            }
        }
        errors.into_result()
    }
}
