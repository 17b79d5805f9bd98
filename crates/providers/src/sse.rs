//! Server-sent events plumbing shared by the streaming transports.
//!
//! Both services answer with `data: {json}` lines. The line buffer carries
//! partial lines across network chunk boundaries; the pump task turns each
//! payload into fragments and forwards them to the fragment channel.

use baso_core::error::TransportError;
use baso_core::transport::{FragmentReceiver, fragment_channel};
use futures::StreamExt;
use serde::Deserialize;
use tracing::{debug, trace, warn};

/// What a transport made of one `data:` payload.
#[derive(Debug, PartialEq, Eq)]
pub enum SseStep {
    /// Zero or more text fragments, in order
    Fragments(Vec<String>),
    /// The service signalled the end of the stream
    Done,
}

/// An `error` object a service reports inside an otherwise successful stream.
///
/// Gemini sends a numeric `code`; OpenAI-style servers may send a string or
/// nothing, which maps to 500.
#[derive(Debug, Deserialize)]
pub struct StreamError {
    #[serde(default)]
    code: Option<serde_json::Value>,
    #[serde(default)]
    message: String,
}

impl From<StreamError> for TransportError {
    fn from(e: StreamError) -> Self {
        let status_code = e
            .code
            .as_ref()
            .and_then(serde_json::Value::as_u64)
            .and_then(|c| u16::try_from(c).ok())
            .unwrap_or(500);
        TransportError::Api {
            status_code,
            message: e.message,
        }
    }
}

/// Incremental line splitter over raw response bytes.
///
/// Bytes are held until a full line arrives, so a multibyte character split
/// across network chunks is decoded intact.
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    buffer: Vec<u8>,
}

impl SseLineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes and return the `data:` payloads of every complete line.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut payloads = Vec::new();
        while let Some(line_end) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=line_end).collect();
            if let Some(data) = data_payload(&line[..line_end]) {
                payloads.push(data);
            }
        }
        payloads
    }

    /// A trailing payload the service sent without a final newline.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        data_payload(&rest)
    }
}

/// The trimmed `data:` value of one line, if it has a non-empty one.
///
/// Blank separators, comments and other fields yield nothing.
fn data_payload(line: &[u8]) -> Option<String> {
    let line = String::from_utf8_lossy(line);
    line.trim()
        .strip_prefix("data:")
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
}

/// Spawn the task that reads `response` and forwards fragments.
///
/// Empty fragments are never forwarded. A payload `parse` rejects (an
/// undecodable chunk or an error reported mid-stream) is forwarded as the
/// last item. The task exits early when the receiver is dropped, which is
/// how an abandoned request is stopped.
pub fn spawn_pump<F>(
    transport: &'static str,
    response: reqwest::Response,
    buffer: usize,
    parse: F,
) -> FragmentReceiver
where
    F: Fn(&str) -> Result<SseStep, TransportError> + Send + 'static,
{
    let (tx, rx) = fragment_channel(buffer);

    tokio::spawn(async move {
        let mut byte_stream = response.bytes_stream();
        let mut lines = SseLineBuffer::new();
        let mut forwarded = 0usize;

        while let Some(chunk_result) = byte_stream.next().await {
            let bytes = match chunk_result {
                Ok(b) => b,
                Err(e) => {
                    warn!(transport, error = %e, "Stream interrupted");
                    let _ = tx
                        .send(Err(TransportError::StreamInterrupted(e.to_string())))
                        .await;
                    return;
                }
            };

            for payload in lines.feed(&bytes) {
                match parse(&payload) {
                    Ok(SseStep::Done) => {
                        debug!(transport, forwarded, "Stream finished");
                        return;
                    }
                    Ok(SseStep::Fragments(fragments)) => {
                        for fragment in fragments.into_iter().filter(|f| !f.is_empty()) {
                            trace!(transport, len = fragment.len(), "Fragment");
                            if tx.send(Ok(fragment)).await.is_err() {
                                debug!(transport, "Receiver dropped, stopping stream");
                                return;
                            }
                            forwarded += 1;
                        }
                    }
                    Err(e) => {
                        warn!(transport, error = %e, payload = %payload, "Stream failed");
                        let _ = tx.send(Err(e)).await;
                        return;
                    }
                }
            }
        }

        if let Some(payload) = lines.finish() {
            match parse(&payload) {
                Ok(SseStep::Fragments(fragments)) => {
                    for fragment in fragments.into_iter().filter(|f| !f.is_empty()) {
                        if tx.send(Ok(fragment)).await.is_err() {
                            return;
                        }
                    }
                }
                Ok(SseStep::Done) => {}
                Err(e) => {
                    warn!(transport, error = %e, payload = %payload, "Stream failed");
                    let _ = tx.send(Err(e)).await;
                    return;
                }
            }
        }

        debug!(transport, forwarded, "Stream closed by server");
    });

    rx
}

/// Map a non-success HTTP status to a transport error.
pub async fn check_status(
    transport: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response, TransportError> {
    let status = response.status().as_u16();

    if status == 429 {
        let retry_after_secs = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(5);
        return Err(TransportError::QuotaExceeded { retry_after_secs });
    }

    if status == 401 || status == 403 {
        return Err(TransportError::AuthenticationFailed(
            "Invalid API key or insufficient permissions".into(),
        ));
    }

    if !(200..300).contains(&status) {
        let error_body = response.text().await.unwrap_or_default();
        warn!(transport, status, body = %error_body, "Service returned an error");
        return Err(TransportError::Api {
            status_code: status,
            message: error_body,
        });
    }

    Ok(response)
}

/// Map a payload that is not the JSON the transport expects.
pub fn decode_error(e: serde_json::Error) -> TransportError {
    TransportError::Decode(e.to_string())
}

/// Map a send failure from `reqwest`.
pub fn send_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout(e.to_string())
    } else {
        TransportError::Network(e.to_string())
    }
}

/// Build the HTTP client every transport shares.
pub fn build_client(timeout: std::time::Duration) -> Result<reqwest::Client, TransportError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| TransportError::NotConfigured(format!("HTTP client: {e}")))
}
