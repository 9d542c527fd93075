//! Request forwarding with cross-endpoint failover.
//!
//! One logical client request becomes a sequence of `select → attempt`
//! cycles: up to [`MAX_ENDPOINT_ATTEMPTS`] distinct endpoints, each tried up
//! to [`ENDPOINT_RETRIES`] times with exponential backoff. Errors are
//! classified into the closed [`ForwardError`] set; retryable ones stay on
//! the endpoint, terminal 4xx surface verbatim without failover.
//!
//! The streaming path runs the whole retry loop inside a single writer task
//! feeding a frame channel, so heartbeats never race data frames. The caller
//! receives the stream at *commit time* — the earlier of the first 2xx
//! upstream response or the first heartbeat falling due. Failures that
//! resolve before commit come back as plain errors (the HTTP layer can still
//! answer 502); afterwards, failover continues behind heartbeats until the
//! first forwarded body byte, past which the only option left is an in-band
//! error event.

use crate::core::pool::{PoolManager, SelectedEndpoint};
use crate::core::sse::{error_event, SseRewriter, HEARTBEAT_FRAME};
use crate::telemetry::Telemetry;
use crate::types::{ApiFormat, ForwardError, GatewayError, NewRequestLog, PoolKind};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde_json::Value;
use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

/// Distinct endpoints to try for one logical request.
pub const MAX_ENDPOINT_ATTEMPTS: usize = 10;
/// Tries per chosen endpoint.
pub const ENDPOINT_RETRIES: usize = 3;
/// Exponential backoff base between same-endpoint retries.
const BACKOFF_BASE: f64 = 1.5;
/// Backoff ceiling.
const BACKOFF_MAX: Duration = Duration::from_secs(30);
/// SSE heartbeat cadence while the upstream is quiet.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
/// Backstop while waiting for the upstream's first response.
const FIRST_CHUNK_TIMEOUT: Duration = Duration::from_secs(120);
/// Upstream error bodies are truncated to this many characters.
const ERROR_BODY_LIMIT: usize = 200;
/// Status codes retried on the same endpoint.
const RETRYABLE_STATUS: [u16; 5] = [429, 500, 502, 503, 504];

/// Downstream SSE frames, produced by the streaming writer task.
pub type FrameStream = Pin<Box<dyn Stream<Item = std::result::Result<Bytes, Infallible>> + Send>>;

/// Successful outcome of [`Forwarder::forward`]: exactly one of a decoded
/// JSON body or a frame stream.
pub enum ForwardReply {
    Json(Value),
    Stream(FrameStream),
}

pub struct Forwarder {
    pool_mgr: Arc<PoolManager>,
    telemetry: Arc<Telemetry>,
    client: reqwest::Client,
}

impl Forwarder {
    pub fn new(
        pool_mgr: Arc<PoolManager>,
        telemetry: Arc<Telemetry>,
    ) -> crate::types::Result<Self> {
        // No total timeout on the shared client: streams outlive any fixed
        // budget. Per-attempt deadlines are applied at the call sites.
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| GatewayError::Internal(format!("http client init: {}", e)))?;
        Ok(Self {
            pool_mgr,
            telemetry,
            client,
        })
    }

    /// Forward one logical request to `pool`.
    ///
    /// With `stream` set, the reply is an SSE frame stream and the upstream
    /// request is forced to stream regardless of what the client asked for.
    pub async fn forward(
        &self,
        pool: PoolKind,
        body: Value,
        stream: bool,
    ) -> std::result::Result<ForwardReply, ForwardError> {
        if !body.is_object() {
            return Err(ForwardError::Unexpected(
                "request body must be a JSON object".into(),
            ));
        }
        let requested_model = body
            .get("model")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();

        if stream {
            self.forward_streaming(pool, body, requested_model).await
        } else {
            self.forward_json(pool, body, requested_model).await
        }
    }

    // ============= Non-streaming path =============

    async fn forward_json(
        &self,
        pool: PoolKind,
        body: Value,
        requested_model: String,
    ) -> std::result::Result<ForwardReply, ForwardError> {
        let mut last_error = ForwardError::NoEndpoint(pool);

        for _ in 0..MAX_ENDPOINT_ATTEMPTS {
            let selected = match self.pool_mgr.select(pool).await {
                Ok(Some(s)) => s,
                Ok(None) => {
                    last_error = ForwardError::NoEndpoint(pool);
                    break;
                }
                Err(e) => {
                    last_error = ForwardError::Unexpected(e.to_string());
                    break;
                }
            };

            let started = Instant::now();
            let mut upstream_body = body.clone();
            upstream_body["model"] = Value::String(selected.model_id.clone());

            let mut retry = 0;
            loop {
                if retry > 0 {
                    let delay = backoff_delay(retry);
                    tracing::warn!(
                        provider = %selected.provider_name,
                        model = %selected.model_id,
                        retry,
                        delay_ms = delay.as_millis() as u64,
                        "retrying endpoint after backoff"
                    );
                    tokio::time::sleep(delay).await;
                }

                match self
                    .attempt_json(&selected, &upstream_body, &requested_model)
                    .await
                {
                    Ok(data) => {
                        let latency = started.elapsed().as_millis() as i64;
                        let (input_tokens, output_tokens) = extract_usage(&data);
                        if let Err(e) =
                            self.pool_mgr.mark_success(selected.endpoint_id, latency).await
                        {
                            tracing::error!(error = %e, "failed to record success");
                        }
                        self.telemetry
                            .record(NewRequestLog {
                                pool,
                                requested_model: requested_model.clone(),
                                actual_model: selected.model_id.clone(),
                                provider_name: selected.provider_name.clone(),
                                success: true,
                                status_code: Some(200),
                                error_message: None,
                                latency_ms: latency,
                                input_tokens,
                                output_tokens,
                            })
                            .await;
                        return Ok(ForwardReply::Json(data));
                    }
                    Err(err) => {
                        tracing::error!(
                            provider = %selected.provider_name,
                            model = %selected.model_id,
                            retry,
                            error = %err,
                            "upstream attempt failed"
                        );

                        if err.is_retryable() && retry + 1 < ENDPOINT_RETRIES {
                            retry += 1;
                            continue;
                        }

                        let latency = started.elapsed().as_millis() as i64;
                        record_endpoint_failure(
                            &self.pool_mgr,
                            &self.telemetry,
                            pool,
                            &requested_model,
                            &selected,
                            &err,
                            latency,
                        )
                        .await;

                        // Client errors must not be masked by failover.
                        if matches!(err, ForwardError::UpstreamTerminal { .. }) {
                            return Err(err);
                        }
                        last_error = err;
                        break;
                    }
                }
            }
        }

        tracing::error!(pool = %pool, error = %last_error, "all retries exhausted");
        Err(last_error)
    }

    async fn attempt_json(
        &self,
        endpoint: &SelectedEndpoint,
        body: &Value,
        requested_model: &str,
    ) -> std::result::Result<Value, ForwardError> {
        let response = build_upstream_request(&self.client, endpoint, body)
            .timeout(endpoint.timeout)
            .send()
            .await
            .map_err(|e| ForwardError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status(
                status,
                truncate_chars(&text, ERROR_BODY_LIMIT),
            ));
        }

        // A 2xx with an undecodable body is not worth retrying on the same
        // endpoint.
        let mut data: Value = response
            .json()
            .await
            .map_err(|e| ForwardError::Unexpected(format!("undecodable upstream body: {}", e)))?;
        rewrite_response_model(&mut data, requested_model);
        Ok(data)
    }

    // ============= Streaming path =============

    async fn forward_streaming(
        &self,
        pool: PoolKind,
        mut body: Value,
        requested_model: String,
    ) -> std::result::Result<ForwardReply, ForwardError> {
        // Streaming gives the gateway a liveness signal and room to
        // heartbeat, so it is forced on upstream.
        body["stream"] = Value::Bool(true);

        let (tx, mut rx) = mpsc::channel::<Bytes>(32);
        let (verdict_tx, verdict_rx) = oneshot::channel();

        let job = StreamJob {
            pool_mgr: Arc::clone(&self.pool_mgr),
            telemetry: Arc::clone(&self.telemetry),
            client: self.client.clone(),
            pool,
            body,
            requested_model,
            tx,
            verdict: Some(verdict_tx),
            data_sent: false,
        };
        tokio::spawn(job.run());

        match verdict_rx.await {
            Ok(Ok(())) => {
                let stream = async_stream::stream! {
                    while let Some(frame) = rx.recv().await {
                        yield Ok::<Bytes, Infallible>(frame);
                    }
                };
                Ok(ForwardReply::Stream(Box::pin(stream)))
            }
            Ok(Err(err)) => Err(err),
            Err(_) => Err(ForwardError::Unexpected(
                "streaming task exited before reporting".into(),
            )),
        }
    }
}

/// Downstream went away; the writer task must wind down.
struct Disconnected;

/// Result of one streaming attempt against one endpoint.
enum Attempt {
    /// Stream ran to EOF; success already recorded.
    Completed,
    /// Nothing was forwarded yet; the retry loop decides what happens next.
    Failed(ForwardError),
    /// Data already reached the client; only an in-band error remains.
    MidFlight(ForwardError),
    DownstreamClosed,
}

/// Single writer for one streaming request. Owns the frame channel, so
/// heartbeats and data frames are serialized by construction.
struct StreamJob {
    pool_mgr: Arc<PoolManager>,
    telemetry: Arc<Telemetry>,
    client: reqwest::Client,
    pool: PoolKind,
    body: Value,
    requested_model: String,
    tx: mpsc::Sender<Bytes>,
    verdict: Option<oneshot::Sender<std::result::Result<(), ForwardError>>>,
    data_sent: bool,
}

impl StreamJob {
    async fn run(mut self) {
        let mut last_error = ForwardError::NoEndpoint(self.pool);

        for _ in 0..MAX_ENDPOINT_ATTEMPTS {
            let selected = match self.pool_mgr.select(self.pool).await {
                Ok(Some(s)) => s,
                Ok(None) => {
                    last_error = ForwardError::NoEndpoint(self.pool);
                    break;
                }
                Err(e) => {
                    last_error = ForwardError::Unexpected(e.to_string());
                    break;
                }
            };

            let started = Instant::now();
            let mut upstream_body = self.body.clone();
            upstream_body["model"] = Value::String(selected.model_id.clone());

            let mut retry = 0;
            loop {
                if retry > 0 {
                    let delay = backoff_delay(retry);
                    tracing::warn!(
                        provider = %selected.provider_name,
                        model = %selected.model_id,
                        retry,
                        delay_ms = delay.as_millis() as u64,
                        "retrying endpoint after backoff"
                    );
                    if self.sleep_heartbeating(delay).await.is_err() {
                        self.abort_disconnected(&selected, started).await;
                        return;
                    }
                }

                match self.attempt(&selected, &upstream_body).await {
                    Attempt::Completed => {
                        let latency = started.elapsed().as_millis() as i64;
                        if let Err(e) =
                            self.pool_mgr.mark_success(selected.endpoint_id, latency).await
                        {
                            tracing::error!(error = %e, "failed to record stream success");
                        }
                        self.telemetry
                            .record(NewRequestLog {
                                pool: self.pool,
                                requested_model: self.requested_model.clone(),
                                actual_model: selected.model_id.clone(),
                                provider_name: selected.provider_name.clone(),
                                success: true,
                                status_code: Some(200),
                                error_message: None,
                                latency_ms: latency,
                                input_tokens: None,
                                output_tokens: None,
                            })
                            .await;
                        return;
                    }
                    Attempt::DownstreamClosed => {
                        self.abort_disconnected(&selected, started).await;
                        return;
                    }
                    Attempt::MidFlight(err) => {
                        tracing::error!(
                            provider = %selected.provider_name,
                            model = %selected.model_id,
                            error = %err,
                            "stream interrupted mid-flight"
                        );
                        let _ = self.emit(error_event(&err.to_string())).await;
                        let latency = started.elapsed().as_millis() as i64;
                        if let Err(e) = self
                            .pool_mgr
                            .mark_failure(selected.endpoint_id, &err.to_string())
                            .await
                        {
                            tracing::error!(error = %e, "failed to record stream failure");
                        }
                        self.telemetry
                            .record(NewRequestLog {
                                pool: self.pool,
                                requested_model: self.requested_model.clone(),
                                actual_model: selected.model_id.clone(),
                                provider_name: selected.provider_name.clone(),
                                success: false,
                                status_code: err.status_code(),
                                error_message: Some(err.to_string()),
                                latency_ms: latency,
                                input_tokens: None,
                                output_tokens: None,
                            })
                            .await;
                        return;
                    }
                    Attempt::Failed(err) => {
                        tracing::error!(
                            provider = %selected.provider_name,
                            model = %selected.model_id,
                            retry,
                            error = %err,
                            "upstream attempt failed"
                        );

                        if err.is_retryable() && retry + 1 < ENDPOINT_RETRIES {
                            retry += 1;
                            continue;
                        }

                        let latency = started.elapsed().as_millis() as i64;
                        record_endpoint_failure(
                            &self.pool_mgr,
                            &self.telemetry,
                            self.pool,
                            &self.requested_model,
                            &selected,
                            &err,
                            latency,
                        )
                        .await;

                        if matches!(err, ForwardError::UpstreamTerminal { .. }) {
                            self.finish_with_error(err).await;
                            return;
                        }
                        last_error = err;
                        break;
                    }
                }
            }
        }

        tracing::error!(pool = %self.pool, error = %last_error, "all retries exhausted");
        self.finish_with_error(last_error).await;
    }

    /// One connection attempt. On 2xx the stream is committed and body bytes
    /// are rewritten and forwarded until EOF, heartbeating through gaps.
    async fn attempt(&mut self, endpoint: &SelectedEndpoint, body: &Value) -> Attempt {
        let send_fut = build_upstream_request(&self.client, endpoint, body).send();
        // The per-attempt pool timeout governs the wait for response headers,
        // with the first-chunk backstop as a hard ceiling.
        let headers_deadline = endpoint.timeout.min(FIRST_CHUNK_TIMEOUT);

        let response = match self.heartbeat_while(send_fut, headers_deadline).await {
            Err(Disconnected) => return Attempt::DownstreamClosed,
            Ok(None) => {
                return Attempt::Failed(ForwardError::Transport(
                    "timed out waiting for upstream response".into(),
                ))
            }
            Ok(Some(Err(e))) => return Attempt::Failed(ForwardError::Transport(e.to_string())),
            Ok(Some(Ok(response))) => response,
        };

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            // Drain a short error body and classify; dropping the response
            // closes the upstream side.
            let text = response.text().await.unwrap_or_default();
            return Attempt::Failed(classify_status(
                status,
                truncate_chars(&text, ERROR_BODY_LIMIT),
            ));
        }

        // Upstream accepted: hand the stream to the caller. Failover is
        // still possible until the first body byte goes out.
        self.commit();

        let mut rewriter = SseRewriter::new(self.requested_model.clone());
        let mut upstream = response.bytes_stream();

        loop {
            match self.heartbeat_while(upstream.next(), endpoint.timeout).await {
                Err(Disconnected) => return Attempt::DownstreamClosed,
                Ok(None) => {
                    return if self.data_sent {
                        Attempt::MidFlight(ForwardError::StreamMidFlight(
                            "timed out waiting for upstream data".into(),
                        ))
                    } else {
                        Attempt::Failed(ForwardError::Transport(
                            "timed out waiting for upstream data".into(),
                        ))
                    };
                }
                Ok(Some(None)) => {
                    if let Some(tail) = rewriter.finish() {
                        if self.emit(tail).await.is_err() {
                            return Attempt::DownstreamClosed;
                        }
                        self.data_sent = true;
                    }
                    return Attempt::Completed;
                }
                Ok(Some(Some(Ok(chunk)))) => {
                    let out = rewriter.feed(&chunk);
                    if !out.is_empty() {
                        if self.emit(out).await.is_err() {
                            return Attempt::DownstreamClosed;
                        }
                        self.data_sent = true;
                    }
                }
                Ok(Some(Some(Err(e)))) => {
                    return if self.data_sent {
                        Attempt::MidFlight(ForwardError::StreamMidFlight(e.to_string()))
                    } else {
                        Attempt::Failed(ForwardError::Transport(format!(
                            "upstream read error: {}",
                            e
                        )))
                    };
                }
            }
        }
    }

    /// Hand the stream to the waiting caller, once.
    fn commit(&mut self) {
        if let Some(verdict) = self.verdict.take() {
            let _ = verdict.send(Ok(()));
        }
    }

    async fn emit(&mut self, frame: Bytes) -> std::result::Result<(), Disconnected> {
        self.tx.send(frame).await.map_err(|_| Disconnected)
    }

    /// Drive `fut` while emitting heartbeats every [`HEARTBEAT_INTERVAL`].
    /// The first heartbeat commits the stream. Returns `Ok(None)` once
    /// `deadline` has elapsed (checked at heartbeat granularity).
    async fn heartbeat_while<F, T>(
        &mut self,
        fut: F,
        deadline: Duration,
    ) -> std::result::Result<Option<T>, Disconnected>
    where
        F: Future<Output = T>,
    {
        tokio::pin!(fut);
        let started = Instant::now();
        loop {
            tokio::select! {
                out = &mut fut => return Ok(Some(out)),
                _ = tokio::time::sleep(HEARTBEAT_INTERVAL) => {
                    if started.elapsed() >= deadline {
                        return Ok(None);
                    }
                    self.commit();
                    self.emit(Bytes::from_static(HEARTBEAT_FRAME)).await?;
                }
            }
        }
    }

    async fn sleep_heartbeating(
        &mut self,
        duration: Duration,
    ) -> std::result::Result<(), Disconnected> {
        self.heartbeat_while(tokio::time::sleep(duration), Duration::MAX)
            .await
            .map(|_| ())
    }

    /// Downstream hung up: close the upstream (by returning), record the
    /// failure, and stop without trying further endpoints.
    async fn abort_disconnected(&mut self, selected: &SelectedEndpoint, started: Instant) {
        let message = "client disconnected before stream completed";
        tracing::warn!(
            provider = %selected.provider_name,
            model = %selected.model_id,
            message
        );
        if let Err(e) = self.pool_mgr.mark_failure(selected.endpoint_id, message).await {
            tracing::error!(error = %e, "failed to record disconnect");
        }
        self.telemetry
            .record(NewRequestLog {
                pool: self.pool,
                requested_model: self.requested_model.clone(),
                actual_model: selected.model_id.clone(),
                provider_name: selected.provider_name.clone(),
                success: false,
                status_code: None,
                error_message: Some(message.to_string()),
                latency_ms: started.elapsed().as_millis() as i64,
                input_tokens: None,
                output_tokens: None,
            })
            .await;
    }

    /// Report a pre-commit failure to the waiting caller, or — when the
    /// stream is already committed — emit the in-band error envelope.
    async fn finish_with_error(&mut self, err: ForwardError) {
        match self.verdict.take() {
            Some(verdict) => {
                let _ = verdict.send(Err(err));
            }
            None => {
                let _ = self.emit(error_event(&err.to_string())).await;
            }
        }
    }
}

// ============= Shared helpers =============

/// Build the upstream POST for an endpoint: URL suffix and auth headers are
/// dictated by the provider's wire format; the body is forwarded as-is.
fn build_upstream_request(
    client: &reqwest::Client,
    endpoint: &SelectedEndpoint,
    body: &Value,
) -> reqwest::RequestBuilder {
    match endpoint.api_format {
        ApiFormat::OpenAI => client
            .post(format!("{}/chat/completions", endpoint.base_url))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Bearer {}", endpoint.api_key),
            )
            .json(body),
        ApiFormat::Anthropic => client
            .post(format!("{}/messages", endpoint.base_url))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header("x-api-key", endpoint.api_key.clone())
            .header("anthropic-version", "2023-06-01")
            .json(body),
    }
}

fn classify_status(status: u16, body: String) -> ForwardError {
    if RETRYABLE_STATUS.contains(&status) {
        ForwardError::UpstreamRetryable { status, body }
    } else {
        ForwardError::UpstreamTerminal { status, body }
    }
}

fn backoff_delay(retry: usize) -> Duration {
    Duration::from_secs_f64(BACKOFF_BASE.powi(retry as i32)).min(BACKOFF_MAX)
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Replace the concrete upstream model with the requested virtual name, in
/// whichever position the wire format carries it.
fn rewrite_response_model(data: &mut Value, requested_model: &str) {
    if let Some(model) = data.get_mut("model") {
        if model.is_string() {
            *model = Value::String(requested_model.to_string());
        }
    }
    if let Some(model) = data.get_mut("message").and_then(|m| m.get_mut("model")) {
        if model.is_string() {
            *model = Value::String(requested_model.to_string());
        }
    }
}

/// Token usage from either wire format, when present.
fn extract_usage(data: &Value) -> (Option<i64>, Option<i64>) {
    let Some(usage) = data.get("usage") else {
        return (None, None);
    };
    if usage.get("input_tokens").is_some() {
        (
            usage.get("input_tokens").and_then(Value::as_i64),
            usage.get("output_tokens").and_then(Value::as_i64),
        )
    } else {
        (
            usage.get("prompt_tokens").and_then(Value::as_i64),
            usage.get("completion_tokens").and_then(Value::as_i64),
        )
    }
}

/// Terminal per-endpoint failure: counters, parking per the pool's cooldown,
/// and one request-log record.
async fn record_endpoint_failure(
    pool_mgr: &PoolManager,
    telemetry: &Telemetry,
    pool: PoolKind,
    requested_model: &str,
    selected: &SelectedEndpoint,
    err: &ForwardError,
    latency_ms: i64,
) {
    if let Err(e) = pool_mgr
        .mark_failure(selected.endpoint_id, &err.to_string())
        .await
    {
        tracing::error!(error = %e, "failed to record failure");
    }

    // A zero cooldown keeps failover fluid for transient errors.
    if !selected.cooldown.is_zero() {
        pool_mgr
            .cooldown_tracker()
            .park(selected.endpoint_id, selected.cooldown, &err.to_string());
    }

    telemetry
        .record(NewRequestLog {
            pool,
            requested_model: requested_model.to_string(),
            actual_model: selected.model_id.clone(),
            provider_name: selected.provider_name.clone(),
            success: false,
            status_code: err.status_code(),
            error_message: Some(err.to_string()),
            latency_ms,
            input_tokens: None,
            output_tokens: None,
        })
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_delays() {
        assert_eq!(backoff_delay(1), Duration::from_secs_f64(1.5));
        assert_eq!(backoff_delay(2), Duration::from_secs_f64(2.25));
        // Deep retries are capped.
        assert_eq!(backoff_delay(20), Duration::from_secs(30));
    }

    #[test]
    fn test_status_classification() {
        for status in RETRYABLE_STATUS {
            assert!(matches!(
                classify_status(status, String::new()),
                ForwardError::UpstreamRetryable { .. }
            ));
        }
        for status in [400, 401, 403, 404, 422] {
            assert!(matches!(
                classify_status(status, String::new()),
                ForwardError::UpstreamTerminal { .. }
            ));
        }
    }

    #[test]
    fn test_rewrite_response_model_both_formats() {
        let mut openai = serde_json::json!({"model": "gpt-4o-2024", "choices": []});
        rewrite_response_model(&mut openai, "sonnet");
        assert_eq!(openai["model"], "sonnet");

        let mut anthropic = serde_json::json!({
            "type": "message",
            "model": "claude-3-5-haiku",
            "message": {"model": "claude-3-5-haiku"}
        });
        rewrite_response_model(&mut anthropic, "haiku");
        assert_eq!(anthropic["model"], "haiku");
        assert_eq!(anthropic["message"]["model"], "haiku");
    }

    #[test]
    fn test_extract_usage_anthropic_and_openai() {
        let anthropic = serde_json::json!({"usage": {"input_tokens": 10, "output_tokens": 20}});
        assert_eq!(extract_usage(&anthropic), (Some(10), Some(20)));

        let openai = serde_json::json!({"usage": {"prompt_tokens": 7, "completion_tokens": 3}});
        assert_eq!(extract_usage(&openai), (Some(7), Some(3)));

        assert_eq!(extract_usage(&serde_json::json!({})), (None, None));
    }

    #[test]
    fn test_truncate_chars_is_utf8_safe() {
        assert_eq!(truncate_chars("abcdef", 3), "abc");
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("ok", 200), "ok");
    }
}
