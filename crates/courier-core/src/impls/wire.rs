//! DefaultWireRequestBuilder - descriptor を WireRequest に変換する最小実装
//!
//! Query parameters are percent-encoded onto the URL, text and byte fragments
//! are concatenated in order, form fields are `application/x-www-form-urlencoded`.
//! Multipart bodies need a multipart-aware builder and are rejected here.

use bytes::{BufMut, BytesMut};
use url::Url;
use url::form_urlencoded;

use crate::domain::{BodyPart, EngineError, HeaderList, RequestDescriptor};
use crate::ports::{WireRequest, WireRequestBuilder};

const CONTENT_TYPE: &str = "Content-Type";
const CONTENT_ENCODING: &str = "Content-Encoding";
const USER_AGENT: &str = "User-Agent";
const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultWireRequestBuilder;

impl DefaultWireRequestBuilder {
    fn url(descriptor: &RequestDescriptor) -> Result<Url, EngineError> {
        let mut url = Url::parse(descriptor.url())
            .map_err(|e| EngineError::InvalidRequest(format!("url {:?}: {e}", descriptor.url())))?;
        if !descriptor.query().is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in descriptor.query() {
                pairs.append_pair(name, value);
            }
        }
        Ok(url)
    }

    fn headers(descriptor: &RequestDescriptor, form_body: bool) -> HeaderList {
        let mut headers = HeaderList::new();
        // content headers come from the descriptor's dedicated fields
        for (name, value) in descriptor.headers().iter() {
            if name.eq_ignore_ascii_case(CONTENT_TYPE) || name.eq_ignore_ascii_case(CONTENT_ENCODING) {
                continue;
            }
            headers.add(name, value);
        }
        let content_type = descriptor
            .content_type()
            .or_else(|| descriptor.headers().get(CONTENT_TYPE))
            .or(form_body.then_some(FORM_URLENCODED));
        if let Some(content_type) = content_type
            && !content_type.starts_with("multipart/form-data")
        {
            match descriptor.charset() {
                Some(charset) if !content_type.contains("charset=") => {
                    headers.add(CONTENT_TYPE, format!("{content_type}; charset={charset}"))
                }
                _ => headers.add(CONTENT_TYPE, content_type),
            }
        }
        if let Some(encoding) = descriptor
            .content_encoding()
            .or_else(|| descriptor.headers().get(CONTENT_ENCODING))
        {
            headers.add(CONTENT_ENCODING, encoding);
        }
        if let Some(agent) = descriptor.user_agent()
            && headers.get(USER_AGENT).is_none()
        {
            headers.add(USER_AGENT, agent);
        }
        headers
    }

    fn body(descriptor: &RequestDescriptor) -> Result<Option<BytesMut>, EngineError> {
        if descriptor.body().is_empty() {
            return Ok(None);
        }
        let mut buf = BytesMut::new();
        let mut previous_was_field = false;
        for part in descriptor.body() {
            match part {
                BodyPart::Text(text) => {
                    buf.put_slice(text.as_bytes());
                    previous_was_field = false;
                }
                BodyPart::Bytes(bytes) => {
                    buf.put_slice(bytes);
                    previous_was_field = false;
                }
                BodyPart::Field { name, value } => {
                    if previous_was_field {
                        buf.put_u8(b'&');
                    }
                    let encoded = form_urlencoded::Serializer::new(String::new())
                        .append_pair(name, value)
                        .finish();
                    buf.put_slice(encoded.as_bytes());
                    previous_was_field = true;
                }
                BodyPart::Part(part) => {
                    return Err(EngineError::InvalidRequest(format!(
                        "multipart part {:?} needs a multipart-aware wire builder",
                        part.name
                    )));
                }
            }
        }
        Ok(Some(buf))
    }
}

impl WireRequestBuilder for DefaultWireRequestBuilder {
    fn build(&self, descriptor: &RequestDescriptor) -> Result<WireRequest, EngineError> {
        let url = Self::url(descriptor)?;
        let body = Self::body(descriptor)?;
        let form_body = descriptor
            .body()
            .iter()
            .all(|p| matches!(p, BodyPart::Field { .. }))
            && body.is_some();
        Ok(WireRequest {
            method: descriptor.method().clone(),
            url,
            headers: Self::headers(descriptor, form_body),
            body: body.map(BytesMut::freeze),
            timeout: descriptor.timeout(),
        })
    }
}
