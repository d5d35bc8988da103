use rand::Rng;
use serde::{de::DeserializeOwned, Serialize};

use crate::{BoxError, Error};

pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_XML: &str = "application/xml";
pub const CONTENT_TYPE_FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// Decodes a response body into an existing target.
///
/// Closures of the shape `Fn(&[u8], &mut T) -> Result<(), BoxError>` are
/// decoders too, so new formats plug in without touching the response
/// handler.
pub trait Decoder<T: ?Sized> {
    fn decode(&self, data: &[u8], target: &mut T) -> Result<(), BoxError>;
}

impl<T, F> Decoder<T> for F
where
    T: ?Sized,
    F: Fn(&[u8], &mut T) -> Result<(), BoxError>,
{
    fn decode(&self, data: &[u8], target: &mut T) -> Result<(), BoxError> {
        self(data, target)
    }
}

/// JSON decoder backed by `serde_json`.
#[derive(Clone, Copy, Debug, Default)]
pub struct Json;

impl<T: DeserializeOwned> Decoder<T> for Json {
    fn decode(&self, data: &[u8], target: &mut T) -> Result<(), BoxError> {
        *target = serde_json::from_slice(data)?;
        Ok(())
    }
}

/// XML decoder backed by `quick-xml`.
#[derive(Clone, Copy, Debug, Default)]
pub struct Xml;

impl<T: DeserializeOwned> Decoder<T> for Xml {
    fn decode(&self, data: &[u8], target: &mut T) -> Result<(), BoxError> {
        *target = quick_xml::de::from_reader(data)?;
        Ok(())
    }
}

pub(crate) fn encode_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, Error> {
    serde_json::to_vec(value).map_err(|err| Error::Serialization(err.to_string()))
}

pub(crate) fn encode_xml<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, Error> {
    quick_xml::se::to_string(value)
        .map(String::into_bytes)
        .map_err(|err| Error::Serialization(err.to_string()))
}

pub(crate) fn encode_form_urlencoded<I, K, V>(pairs: I) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish()
}

/// `multipart/form-data` body with the boundary it was written with.
#[derive(Clone, Debug)]
pub(crate) struct FormData {
    pub(crate) boundary: String,
    pub(crate) body: Vec<u8>,
}

impl FormData {
    pub(crate) fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }
}

pub(crate) fn encode_form_data<I, K, V>(fields: I) -> FormData
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<[u8]>,
{
    let boundary = random_boundary();
    let mut body = Vec::new();

    for (name, value) in fields {
        body.extend_from_slice(b"--");
        body.extend_from_slice(boundary.as_bytes());
        body.extend_from_slice(b"\r\nContent-Disposition: form-data; name=\"");
        body.extend_from_slice(escape_quotes(name.as_ref()).as_bytes());
        body.extend_from_slice(b"\"\r\n\r\n");
        body.extend_from_slice(value.as_ref());
        body.extend_from_slice(b"\r\n");
    }

    body.extend_from_slice(b"--");
    body.extend_from_slice(boundary.as_bytes());
    body.extend_from_slice(b"--\r\n");

    FormData { boundary, body }
}

fn random_boundary() -> String {
    let mut bytes = [0u8; 30];
    rand::thread_rng().fill(&mut bytes[..]);
    bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}

fn escape_quotes(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
