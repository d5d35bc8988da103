//! Assertion and deserialization steps run by [`Response::handle`].

use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
};

use serde::de::DeserializeOwned;

use crate::{
    codec::{Decoder, Json, Xml},
    Error, Response,
};

/// A single response handling step.
///
/// Any `FnOnce(&mut Response) -> Result<(), Error>` closure is a step.
pub trait ResponseOption {
    fn apply(self: Box<Self>, response: &mut Response) -> Result<(), Error>;
}

impl<F> ResponseOption for F
where
    F: FnOnce(&mut Response) -> Result<(), Error>,
{
    fn apply(self: Box<Self>, response: &mut Response) -> Result<(), Error> {
        (*self)(response)
    }
}

/// Boxed step as accepted by [`Response::handle`].
pub type BoxResponseOption<'a> = Box<dyn ResponseOption + 'a>;

/// Fails unless the status is one of `codes`.
///
/// A non-empty body is taken as the server's own error message and
/// becomes the error text. Otherwise the message names the expected codes
/// and the one received.
pub fn with_status_code_assertion<'a, I>(codes: I) -> BoxResponseOption<'a>
where
    I: IntoIterator<Item = u16>,
{
    let codes: Vec<u16> = codes.into_iter().collect();
    Box::new(move |response: &mut Response| {
        let status = response.status_code();
        if codes.contains(&status) {
            return Ok(());
        }

        if !response.body().is_empty() {
            return Err(Error::Assertion(response.text().into_owned()));
        }

        Err(Error::Assertion(format!(
            "expected status code(s) '{}', received '{status}'",
            format_codes(&codes)
        )))
    })
}

/// Decodes the body into `target` with `decoder` when the status is one of
/// `codes`, or always when `codes` is empty.
///
/// A panic inside the decoder is reported as
/// [`Error::Deserialization`].
pub fn with_body_unmarshal<'a, T, D, I>(
    target: &'a mut T,
    decoder: D,
    codes: I,
) -> BoxResponseOption<'a>
where
    T: 'a,
    D: Decoder<T> + 'a,
    I: IntoIterator<Item = u16>,
{
    let codes: Vec<u16> = codes.into_iter().collect();
    Box::new(move |response: &mut Response| {
        if !codes.is_empty() && !codes.contains(&response.status_code()) {
            return Ok(());
        }

        let body = response.body().clone();
        match panic::catch_unwind(AssertUnwindSafe(|| decoder.decode(&body, target))) {
            Ok(result) => result.map_err(|err| Error::Deserialization(err.to_string())),
            Err(payload) => Err(Error::Deserialization(panic_message(payload.as_ref()))),
        }
    })
}

pub fn with_unmarshal_json<'a, T, I>(target: &'a mut T, codes: I) -> BoxResponseOption<'a>
where
    T: DeserializeOwned + 'a,
    I: IntoIterator<Item = u16>,
{
    with_body_unmarshal(target, Json, codes)
}

pub fn with_unmarshal_xml<'a, T, I>(target: &'a mut T, codes: I) -> BoxResponseOption<'a>
where
    T: DeserializeOwned + 'a,
    I: IntoIterator<Item = u16>,
{
    with_body_unmarshal(target, Xml, codes)
}

/// Copies the body into `target` regardless of status.
pub fn with_body_text(target: &mut String) -> BoxResponseOption<'_> {
    Box::new(move |response: &mut Response| {
        *target = response.text().into_owned();
        Ok(())
    })
}

fn format_codes(codes: &[u16]) -> String {
    let joined = codes
        .iter()
        .map(u16::to_string)
        .collect::<Vec<_>>()
        .join(" ");
    format!("[{joined}]")
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "decoder panicked".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use reqwest::{header::HeaderMap, StatusCode};
    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::{BoxError, Error, Response};

    const NO_CODES: [u16; 0] = [];

    fn response(status: StatusCode, body: &'static str) -> Response {
        Response::new(status, HeaderMap::new(), body)
    }

    #[test]
    fn matching_status_passes() {
        let mut response = response(StatusCode::OK, "");
        assert!(response.handle(vec![with_status_code_assertion([200])]).is_ok());
    }

    #[test]
    fn mismatch_without_body_names_expectation() {
        let mut response = response(StatusCode::OK, "");
        let err = response
            .handle(vec![with_status_code_assertion([201])])
            .expect_err("must fail");

        assert_eq!(err.to_string(), "expected status code(s) '[201]', received '200'");
    }

    #[test]
    fn mismatch_lists_every_expected_code() {
        let mut response = response(StatusCode::NOT_FOUND, "");
        let err = response
            .handle(vec![with_status_code_assertion([200, 201])])
            .expect_err("must fail");

        assert_eq!(
            err.to_string(),
            "expected status code(s) '[200 201]', received '404'"
        );
    }

    #[test]
    fn mismatch_with_body_uses_body_text() {
        let mut response = response(StatusCode::OK, "this is an error");
        let err = response
            .handle(vec![with_status_code_assertion([201])])
            .expect_err("must fail");

        assert_eq!(err.to_string(), "this is an error");
    }

    #[test]
    fn assertion_leaves_body_readable() {
        let mut response = response(StatusCode::BAD_REQUEST, "bad input");
        let first = response
            .handle(vec![with_status_code_assertion([200])])
            .expect_err("must fail");
        let second = response
            .handle(vec![with_status_code_assertion([200])])
            .expect_err("must fail");

        assert_eq!(first.to_string(), second.to_string());
        assert_eq!(response.text(), "bad input");
    }

    #[derive(Debug, Default, Deserialize, Serialize)]
    struct Outcome {
        status: String,
    }

    #[test]
    fn unmarshal_only_fires_for_its_statuses() {
        let mut response = response(StatusCode::OK, r#"{"status":"ok"}"#);
        let mut success = Outcome::default();
        let mut failure = Outcome::default();

        response
            .handle(vec![
                with_unmarshal_json(&mut success, [200]),
                with_unmarshal_json(&mut failure, [500]),
            ])
            .expect("must decode");

        assert_eq!(success.status, "ok");
        assert_eq!(failure.status, "");
    }

    #[test]
    fn unmarshal_without_codes_always_fires() {
        let mut response = response(StatusCode::IM_A_TEAPOT, r#"{"status":"short and stout"}"#);
        let mut outcome = Outcome::default();

        response
            .handle(vec![with_unmarshal_json(&mut outcome, NO_CODES)])
            .expect("must decode");

        assert_eq!(outcome.status, "short and stout");
    }

    #[test]
    fn assertion_and_unmarshal_share_body() {
        let mut response = response(StatusCode::UNPROCESSABLE_ENTITY, r#"{"status":"invalid"}"#);
        let mut outcome = Outcome::default();

        let err = response
            .handle(vec![
                with_status_code_assertion([200]),
                with_unmarshal_json(&mut outcome, [422]),
            ])
            .expect_err("assertion must fail");

        assert_eq!(err.len(), 1);
        assert_eq!(err.to_string(), r#"{"status":"invalid"}"#);
        assert_eq!(outcome.status, "invalid");
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(rename = "test")]
    struct Repo {
        #[serde(rename = "@id")]
        id: u32,
        name: String,
    }

    #[test]
    fn unmarshal_xml() {
        let mut response = response(StatusCode::OK, r#"<test id="2"><name>github</name></test>"#);
        let mut repo = Repo::default();

        response
            .handle(vec![with_unmarshal_xml(&mut repo, [200])])
            .expect("must decode");

        assert_eq!(repo.id, 2);
        assert_eq!(repo.name, "github");
    }

    #[test]
    fn malformed_body_is_deserialization_error() {
        let mut response = response(StatusCode::OK, "{not json");
        let mut outcome = Outcome::default();

        let err = response
            .handle(vec![with_unmarshal_json(&mut outcome, [200])])
            .expect_err("must fail");

        assert!(matches!(err.first(), Some(Error::Deserialization(_))));
    }

    #[test]
    fn decoder_panic_becomes_error() {
        let mut response = response(StatusCode::OK, "anything");
        let mut target = 0u32;
        let exploding = |_: &[u8], _: &mut u32| -> Result<(), BoxError> {
            panic!("decoder exploded");
        };

        let err = response
            .handle(vec![with_body_unmarshal(&mut target, exploding, [200])])
            .expect_err("must fail");

        assert_eq!(
            err.to_string(),
            "deserialization error: decoder exploded"
        );
    }

    #[test]
    fn earlier_step_can_rewrite_body_for_decoding() {
        let mut response = response(StatusCode::OK, ")]}'\n{\"status\":\"guarded\"}");
        let mut outcome = Outcome::default();

        response
            .handle(vec![
                Box::new(|response: &mut Response| -> Result<(), Error> {
                    let stripped = response.body().slice(5..);
                    response.set_body(stripped);
                    Ok(())
                }) as BoxResponseOption<'_>,
                with_unmarshal_json(&mut outcome, [200]),
            ])
            .expect("must decode");

        assert_eq!(outcome.status, "guarded");
        assert_eq!(response.text(), r#"{"status":"guarded"}"#);
    }

    #[test]
    fn body_text_is_copied() {
        let mut response = response(StatusCode::BAD_GATEWAY, "upstream down");
        let mut text = String::new();

        response
            .handle(vec![with_body_text(&mut text)])
            .expect("must copy");

        assert_eq!(text, "upstream down");
    }
}
