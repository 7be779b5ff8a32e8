// SPDX-License-Identifier: MIT

//! Per-connection request loop (§4.7).
//!
//! Each connection is handled independently: read one frame, dispatch
//! it through the router, write the response, repeat until the client
//! disconnects or sends an oversized frame. While a dispatch is
//! in-flight the connection concurrently watches for client disconnect —
//! if the client hangs up first, the dispatch keeps running to
//! completion in the background (its result just goes nowhere) rather
//! than being forcibly aborted, matching the "handlers currently
//! executing are allowed to finish" rule; a handler that wants to bail
//! out early must opt in by watching `ctx.cancel`.

use crate::frame::{read_frame, FrameError};
use evr_core::{Clock, ClientId, EmitContext};
use evr_router::router::Router;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Drive one client connection to completion.
///
/// `max_frame_bytes` bounds a single frame per the transport's
/// `KSI_MAX_FRAME_BYTES` setting.
pub async fn handle_connection<C, R, W>(mut reader: R, mut writer: W, router: Arc<Router<C>>, max_frame_bytes: usize)
where
    C: Clock + 'static,
    R: AsyncBufRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin,
{
    let client_id = ClientId::new();
    let mut seq: u64 = 0;

    loop {
        let frame = match read_frame(&mut reader, max_frame_bytes).await {
            Ok(None) => {
                tracing::debug!(client = %client_id, "client disconnected");
                return;
            }
            Ok(Some(line)) => line,
            Err(FrameError::TooLarge(max)) => {
                tracing::warn!(client = %client_id, max, "frame too large, closing connection");
                let _ = write_line(&mut writer, &json!({"error": "frame_too_large"})).await;
                return;
            }
            Err(err) => {
                tracing::debug!(client = %client_id, error = %err, "connection read error");
                return;
            }
        };

        seq += 1;
        let response = process_one_frame(&router, &mut reader, &frame, client_id, seq).await;
        match response {
            Some(response) => {
                if write_line(&mut writer, &response).await.is_err() {
                    tracing::debug!(client = %client_id, "write failed, closing connection");
                    return;
                }
            }
            None => {
                tracing::debug!(client = %client_id, "client disconnected mid-request, response discarded");
                return;
            }
        }
    }
}

/// Parse and dispatch one frame, racing the dispatch against disconnect
/// detection on `reader`. Returns `None` if the client disconnected
/// before the dispatch finished (the caller should close the
/// connection without writing a response, per §4.7's connection
/// lifecycle rule).
async fn process_one_frame<C, R>(router: &Arc<Router<C>>, reader: &mut R, frame: &str, client_id: ClientId, seq: u64) -> Option<Value>
where
    C: Clock + 'static,
    R: AsyncBufRead + Unpin,
{
    let parsed: Value = match serde_json::from_str(frame) {
        Ok(v) => v,
        Err(e) => return Some(json!({"error": "parse_error", "detail": e.to_string()})),
    };

    let event = match parsed.get("event").and_then(Value::as_str) {
        Some(event) => event.to_string(),
        None => return Some(json!({"error": "missing_event"})),
    };
    let data = parsed.get("data").cloned().unwrap_or_else(|| json!({}));
    let correlation_id = parsed.get("correlation_id").and_then(Value::as_str).map(str::to_string);
    let originator_id = parsed.get("originator_id").and_then(Value::as_str).map(str::to_string);
    let construct_id = parsed.get("construct_id").and_then(Value::as_str).map(str::to_string);

    let ctx = EmitContext::from_request(Some(client_id), seq, correlation_id.as_deref(), originator_id, construct_id);
    let cancel = ctx.cancel.clone();

    let router = router.clone();
    let mut task = tokio::spawn(async move { router.emit(event, data, Some(ctx)).await });

    let results = tokio::select! {
        biased;
        joined = &mut task => joined.ok(),
        _ = detect_client_disconnect(reader) => {
            cancel.cancel();
            None
        }
    };

    results.map(|results| serialize_response(results, correlation_id))
}

/// Watch `reader` for an early client disconnect while a dispatch is
/// in-flight. In this request-response protocol the client does not
/// send another frame until it has read a response, so any bytes
/// readable here mean EOF (or, rarely, a misbehaving client) — either
/// way `select!`'s winning branch treats it as "stop waiting on this
/// client."
async fn detect_client_disconnect<R: AsyncBufRead + Unpin>(reader: &mut R) {
    let mut probe = [0u8; 1];
    let _ = reader.read(&mut probe).await;
}

/// Build the §4.7 step-4 response: a bare object if exactly one
/// handler/transformer fired and returned one, otherwise a `results`
/// envelope; the request's `correlation_id` is always echoed back when
/// supplied.
fn serialize_response(results: Vec<Value>, correlation_id: Option<String>) -> Value {
    let mut response = if results.len() == 1 && results[0].is_object() {
        results.into_iter().next().unwrap_or(Value::Null)
    } else {
        json!({"results": results})
    };
    if let Some(cid) = correlation_id {
        if let Value::Object(map) = &mut response {
            map.insert("correlation_id".to_string(), Value::String(cid));
        } else {
            let mut wrapped = Map::new();
            wrapped.insert("result".to_string(), response);
            wrapped.insert("correlation_id".to_string(), Value::String(cid));
            response = Value::Object(wrapped);
        }
    }
    response
}

async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, value: &Value) -> std::io::Result<()> {
    let mut line = serde_json::to_vec(value).unwrap_or_else(|_| b"{}".to_vec());
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await
}

#[cfg(test)]
#[path = "connection_tests.rs"]
mod tests;
