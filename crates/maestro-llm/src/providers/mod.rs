//! Concrete provider implementations

/// Anthropic provider
pub mod anthropic;
/// Cursor zero-config provider (native sampling / guided mode)
pub mod cursor;
/// Google Gemini provider
pub mod google;
/// Moonshot provider
pub mod moonshot;
/// OpenAI provider
pub mod openai;
/// xAI provider
pub mod xai;

pub use anthropic::AnthropicProvider;
pub use cursor::{CursorProvider, NativeSampling};
pub use google::GoogleProvider;
pub use moonshot::MoonshotProvider;
pub use openai::OpenAiProvider;
pub use xai::XaiProvider;
