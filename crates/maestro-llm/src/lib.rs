//! Maestro LLM - provider abstraction and fallback resolution
//!
//! This crate provides the completion backends for Maestro:
//! - Provider: the `LlmProvider` trait and completion types
//! - Catalog: static model+mode compatibility table and keyword inference
//! - Registry: constructs concrete providers by name
//! - Fallback: three-tier resolution (native sampling, API keys, guided)
//! - Providers: Anthropic, OpenAI, Google, xAI, Moonshot, and the
//!   zero-config Cursor provider

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod catalog;
pub mod error;
pub mod fallback;
pub mod provider;
pub mod providers;
pub mod registry;

pub use catalog::{Mode, ModelSpec, ModelSuggestion, CURSOR, CURSOR_GUIDED, FALLBACK_PRIORITY};
pub use error::{Error, Result};
pub use fallback::{
    FallbackReason, ProviderFallbackService, ProviderResolution, ProviderResolutionContext,
    ResolutionPath,
};
pub use provider::{
    CompletionRequest, CompletionResponse, LlmProvider, Message, MessageRole, ProviderConfig,
    ProviderConfigSource, TokenUsage,
};
pub use providers::{
    AnthropicProvider, CursorProvider, GoogleProvider, MoonshotProvider, NativeSampling,
    OpenAiProvider, XaiProvider,
};
pub use registry::ProviderRegistry;
