use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use modelmux_provider::{
    ContentPart, Context, Error, GenerateResponse, Message, Model, ProviderAdapter, StreamChunk,
    StreamMetadata, Usage,
};
use modelmux_provider_utils::framing::Framer;
use modelmux_provider_utils::JsonFragmentAccumulator;
use serde_json::Value;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

/// Buffer between the coordinator task and the consumer. Small so slow
/// consumers exert backpressure on the transport.
const CHANNEL_CAPACITY: usize = 32;

/// Gap allowed between transport chunks when the caller sets no
/// `receive_timeout`.
const DEFAULT_RECEIVE_TIMEOUT_MS: u64 = 300_000;

/// A live streaming generation.
///
/// Yields [`StreamChunk`]s as they arrive (it implements
/// [`futures_util::Stream`]); terminal usage, finish reason, and cost
/// resolve through [`metadata`](Self::metadata) once the stream ends.
/// Dropping the response cancels the transport and the coordinator task.
pub struct StreamResponse {
    pub provider: String,
    pub model: Model,
    pub warnings: Vec<String>,
    base_context: Context,
    chunks: mpsc::Receiver<Result<StreamChunk, Error>>,
    metadata_rx: Option<oneshot::Receiver<StreamMetadata>>,
    resolved: Option<StreamMetadata>,
    cancel: CancellationToken,
}

impl StreamResponse {
    /// Next chunk, or `None` once the stream is exhausted. Mid-stream
    /// failures surface as the final `Err` item.
    pub async fn next_chunk(&mut self) -> Option<Result<StreamChunk, Error>> {
        self.chunks.recv().await
    }

    /// Terminal metadata. Blocks until the stream finishes, errors, or
    /// is cancelled; consuming the chunk sequence to exhaustion
    /// guarantees this resolves promptly.
    pub async fn metadata(&mut self) -> StreamMetadata {
        if let Some(resolved) = &self.resolved {
            return resolved.clone();
        }

        let metadata = match self.metadata_rx.take() {
            Some(rx) => rx.await.unwrap_or(StreamMetadata {
                cancelled: true,
                ..Default::default()
            }),
            None => StreamMetadata {
                cancelled: true,
                ..Default::default()
            },
        };

        self.resolved = Some(metadata.clone());
        metadata
    }

    /// Cancel the stream: closes the transport, stops the coordinator,
    /// and resolves metadata with whatever usage had accumulated.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Exhaust the stream and assemble a [`GenerateResponse`].
    ///
    /// Content text concatenates into a single text part; reasoning text,
    /// when present, becomes a part preceding it. Tool-call fragments
    /// assemble per call. Meta usage merges into the final usage.
    pub async fn join(mut self) -> Result<GenerateResponse, Error> {
        let mut content = String::new();
        let mut reasoning = String::new();
        let mut fragments = JsonFragmentAccumulator::new();

        while let Some(item) = self.next_chunk().await {
            let chunk = item?;
            match chunk {
                StreamChunk::Content { text, .. } => content.push_str(&text),
                StreamChunk::Reasoning { text, .. } => reasoning.push_str(&text),
                StreamChunk::ToolCall { id, name, arguments, metadata } => {
                    let key = fragment_key(&id, &metadata);
                    let id = if id.is_empty() { None } else { Some(id) };
                    fragments.feed(&key, id.as_deref(), name.as_deref(), &arguments);
                }
                StreamChunk::Meta { .. } => {}
            }
        }

        let metadata = self.metadata().await;

        let mut parts = Vec::new();
        if !reasoning.is_empty() {
            parts.push(ContentPart::reasoning(reasoning));
        }
        if !content.is_empty() {
            parts.push(ContentPart::text(content));
        }

        let tool_calls: Vec<ContentPart> = fragments
            .finish()
            .into_iter()
            .map(|call| ContentPart::tool_call(call.id, call.name, call.arguments))
            .collect();

        let mut message = Message::assistant(parts);
        if !tool_calls.is_empty() {
            message = message.with_tool_calls(tool_calls);
        }

        let mut context = self.base_context.clone();
        context.push(message.clone());

        Ok(GenerateResponse {
            id: format!("gen_{}", uuid::Uuid::new_v4()),
            model: self.model.model.clone(),
            context,
            message,
            usage: metadata.usage,
            finish_reason: metadata.finish_reason,
            provider_meta: Default::default(),
            warnings: self.warnings.clone(),
        })
    }
}

/// Key for accumulating tool-call fragments: providers that only send
/// the call id on the first fragment key follow-ups by delta index.
fn fragment_key(id: &str, metadata: &serde_json::Map<String, Value>) -> String {
    match metadata.get("index").and_then(Value::as_u64) {
        Some(index) => format!("index:{index}"),
        None => id.to_string(),
    }
}

impl Stream for StreamResponse {
    type Item = Result<StreamChunk, Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<Self::Item>> {
        self.chunks.poll_recv(cx)
    }
}

impl Drop for StreamResponse {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Everything the coordinator needs to run one stream.
pub(crate) struct StreamJob {
    pub adapter: Arc<dyn ProviderAdapter>,
    pub model: Model,
    pub context: Context,
    pub warnings: Vec<String>,
    pub receive_timeout_ms: Option<u64>,
}

/// Spawn the coordinator task over a connected transport byte stream.
pub(crate) fn spawn<S>(job: StreamJob, byte_stream: S) -> StreamResponse
where
    S: Stream<Item = Result<Bytes, reqwest::Error>> + Send + Unpin + 'static,
{
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (metadata_tx, metadata_rx) = oneshot::channel();
    let cancel = CancellationToken::new();

    let worker = Coordinator {
        adapter: job.adapter.clone(),
        model: job.model.clone(),
        tx,
        cancel: cancel.clone(),
        receive_timeout: Duration::from_millis(
            job.receive_timeout_ms.unwrap_or(DEFAULT_RECEIVE_TIMEOUT_MS),
        ),
        usage: Usage::default(),
        finish_reason: None,
        cancelled: false,
    };
    tokio::spawn(worker.run(byte_stream, metadata_tx));

    StreamResponse {
        provider: job.adapter.provider_id().to_string(),
        model: job.model,
        warnings: job.warnings,
        base_context: job.context,
        chunks: rx,
        metadata_rx: Some(metadata_rx),
        resolved: None,
        cancel,
    }
}

struct Coordinator {
    adapter: Arc<dyn ProviderAdapter>,
    model: Model,
    tx: mpsc::Sender<Result<StreamChunk, Error>>,
    cancel: CancellationToken,
    receive_timeout: Duration,
    usage: Usage,
    finish_reason: Option<modelmux_provider::FinishReason>,
    cancelled: bool,
}

impl Coordinator {
    async fn run<S>(mut self, mut byte_stream: S, metadata_tx: oneshot::Sender<StreamMetadata>)
    where
        S: Stream<Item = Result<Bytes, reqwest::Error>> + Send + Unpin + 'static,
    {
        let mut framer = Framer::new(self.adapter.framing());

        'transport: loop {
            let next = tokio::select! {
                _ = self.cancel.cancelled() => {
                    self.cancelled = true;
                    break 'transport;
                }
                next = tokio::time::timeout(self.receive_timeout, byte_stream.next()) => next,
            };

            match next {
                Err(_elapsed) => {
                    self.emit(Err(Error::stream(format!(
                        "no data for {:?} while streaming",
                        self.receive_timeout
                    ))))
                    .await;
                    break 'transport;
                }
                Ok(None) => break 'transport,
                Ok(Some(Err(err))) => {
                    self.emit(Err(Error::stream(err.to_string()))).await;
                    break 'transport;
                }
                Ok(Some(Ok(bytes))) => {
                    for event in framer.feed(&bytes) {
                        if event.is_done_sentinel() {
                            break 'transport;
                        }
                        for chunk in self.adapter.decode_stream_event(&event, &self.model) {
                            if let StreamChunk::Meta { usage, finish_reason, .. } = &chunk {
                                self.usage.merge(usage);
                                if finish_reason.is_some() {
                                    self.finish_reason = finish_reason.clone();
                                }
                            }
                            if !self.emit(Ok(chunk)).await {
                                // Consumer went away; stop pulling bytes.
                                self.cancelled = true;
                                break 'transport;
                            }
                        }
                    }
                }
            }
        }

        let cost = self
            .model
            .cost
            .as_ref()
            .map(|cost| self.usage.cost(cost))
            .filter(|c| *c > 0.0);

        let _ = metadata_tx.send(StreamMetadata {
            usage: self.usage,
            finish_reason: self.finish_reason.clone(),
            cost,
            cancelled: self.cancelled,
        });
    }

    /// Forward one item to the consumer; false when the consumer is gone.
    async fn emit(&self, item: Result<StreamChunk, Error>) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            sent = self.tx.send(item) => sent.is_ok(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use modelmux_openai_compatible::OpenAiCompatibleAdapter;
    use modelmux_provider::FinishReason;

    fn sse_job() -> StreamJob {
        StreamJob {
            adapter: Arc::new(OpenAiCompatibleAdapter::openai()),
            model: Model::new("openai", "gpt-4o"),
            context: Context::new().with_user("hi"),
            warnings: Vec::new(),
            receive_timeout_ms: Some(5_000),
        }
    }

    fn body_stream(
        chunks: Vec<&'static [u8]>,
    ) -> impl Stream<Item = Result<Bytes, reqwest::Error>> + Send + Unpin + 'static {
        stream::iter(chunks.into_iter().map(|c| Ok(Bytes::from_static(c))))
    }

    #[tokio::test]
    async fn reasoning_then_content_preserves_order() {
        let body: Vec<&'static [u8]> = vec![
            b"data: {\"choices\":[{\"delta\":{\"reasoning\":\"I should\"}}]}\n\n",
            b"data: {\"choices\":[{\"delta\":{\"content\":\"Hello\"}}]}\n\n",
            b"data: [DONE]\n\n",
        ];
        let mut response = spawn(sse_job(), body_stream(body));

        let mut chunks = Vec::new();
        while let Some(item) = response.next_chunk().await {
            chunks.push(item.unwrap());
        }
        assert_eq!(
            chunks,
            vec![
                StreamChunk::reasoning("I should"),
                StreamChunk::content("Hello"),
            ]
        );

        let metadata = response.metadata().await;
        assert!(!metadata.cancelled);
    }

    #[tokio::test]
    async fn split_frames_reassemble_across_transport_chunks() {
        let body: Vec<&'static [u8]> = vec![
            b"data: {\"choices\":[{\"del",
            b"ta\":{\"content\":\"Hi\"}}]}\n\n",
            b"data: [DONE]\n\n",
        ];
        let mut response = spawn(sse_job(), body_stream(body));

        let mut chunks = Vec::new();
        while let Some(item) = response.next_chunk().await {
            chunks.push(item.unwrap());
        }
        assert_eq!(chunks, vec![StreamChunk::content("Hi")]);
    }

    #[tokio::test]
    async fn join_renders_reasoning_before_content() {
        let body: Vec<&'static [u8]> = vec![
            b"data: {\"choices\":[{\"delta\":{\"reasoning\":\"I should\"}}]}\n\n",
            b"data: {\"choices\":[{\"delta\":{\"content\":\"Hello\"}}]}\n\n",
            b"data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}],\"usage\":{\"prompt_tokens\":4,\"completion_tokens\":2,\"total_tokens\":6}}\n\n",
            b"data: [DONE]\n\n",
        ];
        let response = spawn(sse_job(), body_stream(body));
        let joined = response.join().await.unwrap();

        let parts = joined.message.content.as_parts();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].as_reasoning(), Some("I should"));
        assert_eq!(parts[1].as_text(), Some("Hello"));

        assert_eq!(joined.finish_reason, Some(FinishReason::Stop));
        assert_eq!(joined.usage.total(), 6);
        // The assistant message lands appended to the original context.
        assert_eq!(joined.context.len(), 2);
    }

    #[tokio::test]
    async fn join_assembles_tool_call_fragments() {
        let body: Vec<&'static [u8]> = vec![
            b"data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"id\":\"call_1\",\"function\":{\"name\":\"get_weather\",\"arguments\":\"{\\\"ci\"}}]}}]}\n\n",
            b"data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"function\":{\"arguments\":\"ty\\\":\\\"Paris\\\"}\"}}]}}]}\n\n",
            b"data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"tool_calls\"}]}\n\n",
            b"data: [DONE]\n\n",
        ];
        let response = spawn(sse_job(), body_stream(body));
        let joined = response.join().await.unwrap();

        let calls = joined.tool_calls();
        assert_eq!(calls.len(), 1);
        match calls[0] {
            ContentPart::ToolCall { id, name, arguments, .. } => {
                assert_eq!(id, "call_1");
                assert_eq!(name, "get_weather");
                assert_eq!(arguments, &serde_json::json!({"city": "Paris"}));
            }
            other => panic!("unexpected part: {other:?}"),
        }
        assert_eq!(joined.finish_reason, Some(FinishReason::ToolCalls));
    }

    #[tokio::test]
    async fn meta_chunks_resolve_metadata_with_cost() {
        let mut job = sse_job();
        job.model.cost = Some(modelmux_provider::ModelCost {
            input: 1e-6,
            output: 2e-6,
        });
        let body: Vec<&'static [u8]> = vec![
            b"data: {\"choices\":[{\"delta\":{\"content\":\"x\"}}]}\n\n",
            b"data: {\"choices\":[],\"usage\":{\"prompt_tokens\":1000,\"completion_tokens\":500,\"total_tokens\":1500}}\n\n",
            b"data: [DONE]\n\n",
        ];
        let mut response = spawn(job, body_stream(body));
        while response.next_chunk().await.is_some() {}

        let metadata = response.metadata().await;
        assert_eq!(metadata.usage.total(), 1500);
        let cost = metadata.cost.unwrap();
        assert!((cost - 0.002).abs() < 1e-9);
    }

    #[tokio::test]
    async fn cancellation_resolves_metadata_promptly() {
        // A transport that never produces a byte.
        let body = stream::pending::<Result<Bytes, reqwest::Error>>();
        let mut response = spawn(sse_job(), body);

        response.cancel();
        let metadata = tokio::time::timeout(Duration::from_secs(1), response.metadata())
            .await
            .expect("metadata must resolve after cancel");
        assert!(metadata.cancelled);

        // No further chunks after cancellation.
        let next = tokio::time::timeout(Duration::from_secs(1), response.next_chunk())
            .await
            .expect("chunk channel must close after cancel");
        assert!(next.is_none());
    }

    #[tokio::test]
    async fn receive_timeout_surfaces_stream_error() {
        let mut job = sse_job();
        job.receive_timeout_ms = Some(50);
        let body = stream::pending::<Result<Bytes, reqwest::Error>>();
        let mut response = spawn(job, body);

        let item = tokio::time::timeout(Duration::from_secs(2), response.next_chunk())
            .await
            .expect("timeout error must arrive")
            .expect("stream must yield the error marker");
        assert!(matches!(item, Err(Error::Stream { .. })));

        let metadata = response.metadata().await;
        assert!(!metadata.cancelled);
    }

    #[tokio::test]
    async fn stream_impl_yields_items() {
        let body: Vec<&'static [u8]> = vec![
            b"data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n\n",
            b"data: [DONE]\n\n",
        ];
        let mut response = spawn(sse_job(), body_stream(body));
        let first = response.next().await.unwrap().unwrap();
        assert_eq!(first, StreamChunk::content("a"));
    }
}
