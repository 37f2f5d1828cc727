use crate::contexts::{LlmClient, PluginMetadata, UpstreamError};
use crate::data::{FileRecord, SanitizationPolicy};
use crate::pipeline::{
    decode_binary_records, extract_array, parse_batch, sanitize_java_records, strip_code_fence,
    DecodeWarning, ExtractError, FormatError,
};
use std::fmt;

/// Failures while turning a prompt into a validated batch. Extraction and
/// format failures are reported as a single "generation failed" error with
/// the underlying message preserved for diagnostics.
#[derive(Debug)]
pub enum GenerationError {
    Upstream(UpstreamError),
    Extraction(ExtractError),
    Format(FormatError),
}

impl fmt::Display for GenerationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            GenerationError::Upstream(e) => write!(f, "file generation failed: {}", e),
            GenerationError::Extraction(e) => write!(f, "file generation failed: {}", e),
            GenerationError::Format(e) => write!(f, "file generation failed: {}", e),
        }
    }
}

impl std::error::Error for GenerationError {}

impl From<UpstreamError> for GenerationError {
    fn from(e: UpstreamError) -> Self {
        GenerationError::Upstream(e)
    }
}

impl From<ExtractError> for GenerationError {
    fn from(e: ExtractError) -> Self {
        GenerationError::Extraction(e)
    }
}

impl From<FormatError> for GenerationError {
    fn from(e: FormatError) -> Self {
        GenerationError::Format(e)
    }
}

/// A validated, decoded and sanitized batch, ready for persistence.
#[derive(Debug)]
pub struct GeneratedBatch {
    pub records: Vec<FileRecord>,
    /// Per-record base64 failures; non-fatal.
    pub decode_warnings: Vec<DecodeWarning>,
    /// Paths of records replaced by a stub class.
    pub stubbed_paths: Vec<String>,
}

/// Turns a prompt plus inferred metadata into a batch of plugin files.
pub struct CodeGenerator<'a, C: LlmClient> {
    client: &'a C,
    policy: &'a SanitizationPolicy,
}

impl<'a, C: LlmClient> CodeGenerator<'a, C> {
    pub fn new(client: &'a C, policy: &'a SanitizationPolicy) -> Self {
        Self { client, policy }
    }

    /// Runs the full response pipeline: fence-strip, array extraction,
    /// validation, binary decoding and (for DICOM builds) sanitization.
    pub fn generate_batch(
        &self,
        prompt: &str,
        metadata: &PluginMetadata,
    ) -> Result<GeneratedBatch, GenerationError> {
        let instruction = build_generation_prompt(prompt, metadata);
        let raw = self.client.generate(&instruction)?;

        let text = strip_code_fence(&raw);
        let array = extract_array(text)?;
        let mut records = parse_batch(array, self.policy)?;

        let decode_warnings = decode_binary_records(&mut records, self.policy);
        let stubbed_paths = if metadata.dicom_enabled {
            sanitize_java_records(&mut records, self.policy)
        } else {
            Vec::new()
        };

        Ok(GeneratedBatch {
            records,
            decode_warnings,
            stubbed_paths,
        })
    }
}

fn build_generation_prompt(prompt: &str, metadata: &PluginMetadata) -> String {
    let package_path = metadata.package.replace('.', "/");
    let dependencies = metadata.provided_dependencies.join(", ");

    let mut instruction = format!(
        "You are a senior Java/Maven developer. Your job is to generate a complete, \
         working Mirth Connect {version} plugin, strictly using the official Maven \
         plugin structure:\n\
         - All files must be under 'GENERATED_PLUGIN/'.\n\
         - 'pom.xml' with all required dependencies ({dependencies}), using \
         <scope>provided</scope> for Mirth JARs from ${{env.MIRTH_HOME}}/server/lib/.\n\
         - 'src/main/resources/plugin.xml' with correct metadata \
         (plugin id '{plugin_id}', type '{plugin_type}').\n\
         - Main Java class in 'src/main/java/{package_path}/{main_class}.java', with all \
         logic, GUIs, and features as described in the prompt.\n\
         - All additional classes in the correct subfolders, if needed.\n\
         - (Optional) 'src/main/resources/icons/' for icons if the prompt requires one.\n\
         - (Optional) 'src/test/java/{package_path}/' for test classes.\n\
         - (Optional) 'README.md' with usage notes.\n\
         {assembly}\
         DO NOT omit any features described in the user prompt! Implement everything fully. \
         Respond **only** with a JSON array (no markdown, no explanations), e.g. \
         [{{\"path\": \"GENERATED_PLUGIN/...\", \"content\": \"...\"}}, ...].\n\n\
         User Prompt:\n{prompt}\n",
        version = metadata.mirth_version,
        dependencies = dependencies,
        plugin_id = metadata.plugin_id,
        plugin_type = metadata.plugin_type,
        package_path = package_path,
        main_class = metadata.main_class_name,
        assembly = if metadata.use_assembly {
            "- Include a maven-assembly-plugin configuration producing the distributable zip.\n"
        } else {
            ""
        },
        prompt = prompt,
    );

    if metadata.dicom_enabled {
        instruction.push_str(
            "Include dcm4che-core:5.23.0 and dcm4che-net:5.23.0 dependencies and a Java \
             code example for C-FIND.\n",
        );
        if let (Some(host), Some(server_ae), Some(client_ae)) = (
            metadata.dicom_host.as_deref(),
            metadata.dicom_server_ae.as_deref(),
            metadata.dicom_client_ae.as_deref(),
        ) {
            instruction.push_str(&format!(
                "Target PACS: {} (server AE '{}', client AE '{}').\n",
                host, server_ae, client_ae
            ));
        }
    }

    instruction
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CannedLlm {
        response: String,
    }

    impl LlmClient for CannedLlm {
        fn generate(&self, _prompt: &str) -> Result<String, UpstreamError> {
            Ok(self.response.clone())
        }
    }

    struct FailingLlm;

    impl LlmClient for FailingLlm {
        fn generate(&self, _prompt: &str) -> Result<String, UpstreamError> {
            Err(UpstreamError::Request("connection refused".to_string()))
        }
    }

    fn metadata() -> PluginMetadata {
        let client = CannedLlm {
            response: "not json".to_string(),
        };
        // Defaults are good enough for prompt-building tests.
        crate::contexts::PromptAnalyzer::new(&client)
            .analyze("create plugin Echo")
            .unwrap()
    }

    #[test]
    fn fenced_prose_response_becomes_a_batch() {
        let client = CannedLlm {
            response: "Here you go:\n```json\n[{\"path\":\"GENERATED_PLUGIN/a/b.txt\",\"content\":\"hi\"}]\n```"
                .to_string(),
        };
        let policy = SanitizationPolicy::default();
        let generator = CodeGenerator::new(&client, &policy);

        let batch = generator.generate_batch("a plugin", &metadata()).unwrap();

        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.records[0].path, "GENERATED_PLUGIN/a/b.txt");
        assert_eq!(batch.records[0].content.as_deref(), Some("hi"));
        assert_eq!(batch.records[0].content_binary, None);
        assert!(batch.decode_warnings.is_empty());
        assert!(batch.stubbed_paths.is_empty());
    }

    #[test]
    fn upstream_failure_is_wrapped() {
        let policy = SanitizationPolicy::default();
        let generator = CodeGenerator::new(&FailingLlm, &policy);

        let error = generator
            .generate_batch("a plugin", &metadata())
            .unwrap_err();

        assert!(matches!(error, GenerationError::Upstream(_)));
        assert!(error.to_string().starts_with("file generation failed:"));
        assert!(error.to_string().contains("connection refused"));
    }

    #[test]
    fn missing_array_is_an_extraction_error() {
        let client = CannedLlm {
            response: "I generated the files for you.".to_string(),
        };
        let policy = SanitizationPolicy::default();
        let generator = CodeGenerator::new(&client, &policy);

        let error = generator
            .generate_batch("a plugin", &metadata())
            .unwrap_err();

        assert!(matches!(error, GenerationError::Extraction(_)));
    }

    #[test]
    fn invalid_records_are_a_format_error() {
        let client = CannedLlm {
            response: "[{\"path\":\"a.txt\"}]".to_string(),
        };
        let policy = SanitizationPolicy::default();
        let generator = CodeGenerator::new(&client, &policy);

        let error = generator
            .generate_batch("a plugin", &metadata())
            .unwrap_err();

        assert!(matches!(error, GenerationError::Format(_)));
        assert!(error.to_string().contains("no 'content' field"));
    }

    #[test]
    fn sanitizer_runs_only_for_dicom_builds() {
        let java = "package com.example;\\npublic class Echo {\\n    int dcm4che = 1;\\n}\\n";
        let response = format!(
            "[{{\"path\":\"GENERATED_PLUGIN/src/main/java/com/example/Echo.java\",\"content\":\"{}\"}}]",
            java
        );
        let policy = SanitizationPolicy::default();

        let client = CannedLlm {
            response: response.clone(),
        };
        let generator = CodeGenerator::new(&client, &policy);

        let mut plain = metadata();
        plain.dicom_enabled = false;
        let batch = generator.generate_batch("a plugin", &plain).unwrap();
        assert!(batch.records[0]
            .content
            .as_deref()
            .unwrap()
            .contains("dcm4che"));

        let mut dicom = metadata();
        dicom.dicom_enabled = true;
        let batch = generator.generate_batch("a plugin", &dicom).unwrap();
        let content = batch.records[0].content.as_deref().unwrap();
        assert!(!content.contains("dcm4che"));
    }

    #[test]
    fn generation_prompt_reflects_the_metadata() {
        let mut meta = metadata();
        meta.package = "org.acme.mirth".to_string();
        meta.main_class_name = "EchoPlugin".to_string();
        meta.dicom_enabled = false;

        let instruction = build_generation_prompt("an echo plugin", &meta);

        assert!(instruction.contains("src/main/java/org/acme/mirth/EchoPlugin.java"));
        assert!(instruction.contains("mirth-server-api"));
        assert!(instruction.contains("User Prompt:\nan echo plugin"));
        assert!(!instruction.contains("dcm4che"));
    }
}
