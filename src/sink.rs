//! Response emission as ordered events.
//!
//! The dispatcher never writes to a socket. A finished [`Response`] is
//! replayed to a caller-supplied callback as a fixed sequence of events,
//! which a transport maps onto its own API:
//!
//! ```text
//! SetCookie*  ClearCookie*  SetHeader*  SetStatus  WriteChunk*  End
//! ```
//!
//! In-memory and JSON bodies are written as one chunk with a
//! `content-length`; streamed bodies are read and forwarded chunk by chunk.

use bytes::{Bytes, BytesMut};
use http::header::{CONTENT_LENGTH, CONTENT_TYPE, HeaderName};
use http::{HeaderMap, HeaderValue, StatusCode};
use tokio::io::AsyncReadExt;
use tracing::debug;

use crate::cookie::{Cookie, request_has_cookie};
use crate::error::Result;
use crate::response::{Body, Response};

const CHUNK_SIZE: usize = 16 * 1024;

/// One state transition of an outgoing response.
#[derive(Clone, Debug, PartialEq)]
pub enum ResponseEvent {
    SetCookie(Cookie),
    /// Expire a cookie the request carried.
    ClearCookie(String),
    SetHeader(HeaderName, HeaderValue),
    SetStatus(StatusCode),
    WriteChunk(Bytes),
    End,
}

/// Replays `response` into `on_event`.
///
/// `request_headers` are the headers of the request being answered; cookie
/// clears are only emitted for cookies the request actually sent.
pub async fn emit<F>(response: Response, request_headers: &HeaderMap, mut on_event: F) -> Result<()>
where
    F: FnMut(ResponseEvent),
{
    let (status, mut headers, cookies, cleared, body) = response.into_parts();

    for cookie in cookies {
        on_event(ResponseEvent::SetCookie(cookie));
    }
    for name in cleared {
        if request_has_cookie(request_headers, &name) {
            on_event(ResponseEvent::ClearCookie(name));
        } else {
            debug!(cookie = %name, "skipping clear of cookie the request did not send");
        }
    }

    let payload = match body {
        Body::Empty => None,
        Body::Bytes(bytes) => Some(bytes),
        Body::Json(value) => {
            headers.entry(CONTENT_TYPE).or_insert(HeaderValue::from_static("application/json"));
            Some(Bytes::from(serde_json::to_vec(&value)?))
        }
        Body::Stream(mut reader) => {
            emit_head(status, headers, &mut on_event);

            let mut buf = BytesMut::with_capacity(CHUNK_SIZE);
            while reader.read_buf(&mut buf).await? > 0 {
                on_event(ResponseEvent::WriteChunk(buf.split().freeze()));
                buf.reserve(CHUNK_SIZE);
            }
            on_event(ResponseEvent::End);
            return Ok(());
        }
    };

    if let Some(bytes) = &payload {
        headers.entry(CONTENT_LENGTH).or_insert(HeaderValue::from(bytes.len()));
    }
    emit_head(status, headers, &mut on_event);

    if let Some(bytes) = payload.filter(|b| !b.is_empty()) {
        on_event(ResponseEvent::WriteChunk(bytes));
    }
    on_event(ResponseEvent::End);
    Ok(())
}

fn emit_head<F>(status: StatusCode, headers: HeaderMap, emit: &mut F)
where
    F: FnMut(ResponseEvent),
{
    // `HeaderMap::into_iter` yields the name only on a header's first value.
    let mut current: Option<HeaderName> = None;
    for (name, value) in headers {
        if let Some(name) = name {
            current = Some(name);
        }
        if let Some(name) = &current {
            emit(ResponseEvent::SetHeader(name.clone(), value));
        }
    }
    emit(ResponseEvent::SetStatus(status));
}
