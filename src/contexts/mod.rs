mod code_generator;
mod llm_client;
mod maven_runner;
mod prompt_analyzer;
mod request;

pub use code_generator::{CodeGenerator, GeneratedBatch, GenerationError};
pub use llm_client::{LlmClient, OpenAiChatClient, UpstreamError};
pub use maven_runner::{BuildMode, BuildReport, MavenRunner};
pub use prompt_analyzer::{PluginMetadata, PromptAnalyzer};
pub use request::{prompt_fingerprint, GenerationOutcome, GenerationRequest, RequestError};
