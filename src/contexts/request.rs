use crate::contexts::{
    CodeGenerator, GenerationError, LlmClient, PromptAnalyzer, UpstreamError,
};
use crate::data::SanitizationPolicy;
use crate::pipeline::DecodeWarning;
use crate::storage::{self, WriteError, WrittenFile};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::PathBuf;

/// Request-level failures, mapped one-to-one onto the error payload of the
/// service boundary.
#[derive(Debug)]
pub enum RequestError {
    Metadata(UpstreamError),
    Generation(GenerationError),
    Write(WriteError),
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RequestError::Metadata(e) => write!(f, "metadata extraction failed: {}", e),
            RequestError::Generation(e) => write!(f, "{}", e),
            RequestError::Write(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for RequestError {}

/// The success payload of one generation request.
#[derive(Debug)]
pub struct GenerationOutcome {
    /// Ordered human-readable descriptions of the processing steps.
    pub steps: Vec<String>,
    pub files: Vec<WrittenFile>,
    pub decode_warnings: Vec<DecodeWarning>,
    pub stubbed_paths: Vec<String>,
}

/// One generation request: analyze the prompt, generate the batch, persist
/// it. Owns everything it needs so the whole run can be handed to a
/// blocking task.
pub struct GenerationRequest<C: LlmClient> {
    prompt: String,
    out_root: PathBuf,
    policy: SanitizationPolicy,
    client: C,
}

impl<C: LlmClient> GenerationRequest<C> {
    pub fn new(prompt: String, out_root: PathBuf, policy: SanitizationPolicy, client: C) -> Self {
        Self {
            prompt,
            out_root,
            policy,
            client,
        }
    }

    /// Runs the sequential pipeline. Each failure point aborts the request;
    /// files already written stay on disk.
    pub fn run(&self) -> Result<GenerationOutcome, RequestError> {
        let mut steps = Vec::new();
        push_step(&mut steps, "Prompt received");

        let analyzer = PromptAnalyzer::new(&self.client);
        let metadata = analyzer
            .analyze(&self.prompt)
            .map_err(RequestError::Metadata)?;
        push_step(&mut steps, "Metadata extracted");

        let generator = CodeGenerator::new(&self.client, &self.policy);
        let batch = generator
            .generate_batch(&self.prompt, &metadata)
            .map_err(RequestError::Generation)?;
        push_step(&mut steps, format!("{} files generated", batch.records.len()));

        let files =
            storage::write_batch(&self.out_root, &batch.records).map_err(RequestError::Write)?;
        push_step(&mut steps, "Files written to disk");

        Ok(GenerationOutcome {
            steps,
            files,
            decode_warnings: batch.decode_warnings,
            stubbed_paths: batch.stubbed_paths,
        })
    }
}

fn push_step(steps: &mut Vec<String>, description: impl Into<String>) {
    let number = steps.len() + 1;
    steps.push(format!("{}) {}", number, description.into()));
}

/// Short prompt digest for correlating log lines of one request.
pub fn prompt_fingerprint(prompt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prompt.as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..12].to_string()
}
