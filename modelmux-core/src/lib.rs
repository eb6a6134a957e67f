//! modelmux — one client API across heterogeneous LLM providers.
//!
//! A single set of operations ([`generate_text`], [`stream_text`],
//! [`generate_object`], [`stream_object`], [`embed`]) multiplexes over
//! provider adapters (Anthropic, OpenAI-compatible, Google, Bedrock):
//! switch providers by changing the `"provider:model"` spec string.
//!
//! The runtime owns everything around the adapters: the provider
//! registry and model catalog, credential resolution, the shared HTTP
//! client with retries, the streaming coordinator, and the
//! structured-output engine.
//!
//! ```no_run
//! use futures_util::StreamExt;
//! use modelmux_core as modelmux;
//! use modelmux_provider::CallOptions;
//!
//! # async fn run() -> Result<(), modelmux_provider::Error> {
//! // Non-streaming.
//! let response = modelmux::generate_text(
//!     "anthropic:claude-3-haiku-20240307",
//!     "Write a haiku about rivers.",
//!     CallOptions::new().with_temperature(0.7),
//! )
//! .await?;
//! println!("{}", response.text());
//!
//! // Streaming.
//! let mut stream = modelmux::stream_text(
//!     "openai:gpt-4o",
//!     "Tell me a story.",
//!     CallOptions::new(),
//! )
//! .await?;
//! while let Some(chunk) = stream.next().await {
//!     if let Some(text) = chunk?.as_content() {
//!         print!("{text}");
//!     }
//! }
//! let metadata = stream.metadata().await;
//! println!("used {} tokens", metadata.usage.total());
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod config;
pub mod credentials;
mod embed;
mod generate_object;
mod generate_text;
mod http;
pub mod object;
mod prepare;
pub mod prompt;
pub mod registry;
mod stream;
mod stream_object;
mod stream_text;

pub use embed::{cosine_similarity, embed};
pub use generate_object::generate_object;
pub use generate_text::generate_text;
pub use object::{ObjectResponse, ObjectStream, ObjectStrategy};
pub use prompt::{ModelSpec, Prompt};
pub use registry::{ProviderEntry, Registry};
pub use stream::StreamResponse;
pub use stream_object::stream_object;
pub use stream_text::stream_text;

// The canonical data model, re-exported for callers.
pub use modelmux_provider::{
    CallOptions, Capabilities, ContentPart, Context, EmbedInput, EmbedResponse, Error,
    FinishReason, GenerateResponse, Message, MessageContent, Modalities, Model, ModelCost,
    ModelLimit, Role, StreamChunk, StreamMetadata, Tool, ToolChoice, Usage,
};
