/// End-to-end test of the generation request pipeline with a canned model
/// client: fence-strip, array extraction, validation, binary decoding,
/// sanitization and persistence, without any live network dependency.
use plugforge::contexts::{GenerationRequest, LlmClient, RequestError, UpstreamError};
use plugforge::data::SanitizationPolicy;
use std::fs;
use std::path::PathBuf;

/// Answers the metadata prompt and the file-generation prompt with canned
/// responses, telling them apart by their instruction text.
struct ScriptedLlm {
    metadata: String,
    files: String,
}

impl LlmClient for ScriptedLlm {
    fn generate(&self, prompt: &str) -> Result<String, UpstreamError> {
        if prompt.contains("extracts metadata") {
            Ok(self.metadata.clone())
        } else {
            Ok(self.files.clone())
        }
    }
}

fn test_root(name: &str) -> PathBuf {
    let root = std::env::temp_dir().join(format!(
        "plugforge_e2e_{}_{}",
        name,
        std::process::id()
    ));
    let _ = fs::remove_dir_all(&root);
    root
}

#[test]
fn prose_wrapped_response_ends_up_on_disk() {
    let root = test_root("prose");
    let client = ScriptedLlm {
        metadata: "{\"plugin_name\": \"Echo\", \"main_class_name\": \"Echo\"}".to_string(),
        files: "Here you go:\n```json\n[{\"path\":\"a/b.txt\",\"content\":\"hi\"}]\n```".to_string(),
    };

    let request = GenerationRequest::new(
        "create plugin Echo".to_string(),
        root.clone(),
        SanitizationPolicy::default(),
        client,
    );
    let outcome = request.run().expect("generation should succeed");

    assert_eq!(outcome.files.len(), 1);
    assert_eq!(outcome.files[0].path, "a/b.txt");
    assert_eq!(outcome.files[0].size_bytes, 2);
    assert_eq!(fs::read_to_string(root.join("a/b.txt")).unwrap(), "hi");
    assert_eq!(outcome.steps.len(), 4);
    assert!(outcome.steps[2].contains("1 files generated"));

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn binary_records_are_decoded_before_writing() {
    let root = test_root("binary");
    // "AAECAw==" is the base64 encoding of the bytes [0, 1, 2, 3].
    let client = ScriptedLlm {
        metadata: "{}".to_string(),
        files: "[{\"path\":\"GENERATED_PLUGIN/src/main/resources/icons/icon.png\",\
                 \"content\":\"AAECAw==\"},\
                {\"path\":\"GENERATED_PLUGIN/README.md\",\"content\":\"# Plugin\"}]"
            .to_string(),
    };

    let request = GenerationRequest::new(
        "an icon plugin".to_string(),
        root.clone(),
        SanitizationPolicy::default(),
        client,
    );
    let outcome = request.run().expect("generation should succeed");

    assert!(outcome.decode_warnings.is_empty());
    let icon = fs::read(root.join("GENERATED_PLUGIN/src/main/resources/icons/icon.png")).unwrap();
    assert_eq!(icon, vec![0, 1, 2, 3]);
    assert_eq!(
        fs::read_to_string(root.join("GENERATED_PLUGIN/README.md")).unwrap(),
        "# Plugin"
    );
    // The written size is the decoded size, not the base64 text length.
    assert_eq!(outcome.files[0].size_bytes, 4);

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn malformed_base64_keeps_the_batch_alive() {
    let root = test_root("badbase64");
    let client = ScriptedLlm {
        metadata: "{}".to_string(),
        files: "[{\"path\":\"icon.png\",\"content\":\"certainly not base64!\"}]".to_string(),
    };

    let request = GenerationRequest::new(
        "an icon plugin".to_string(),
        root.clone(),
        SanitizationPolicy::default(),
        client,
    );
    let outcome = request.run().expect("decode failures are non-fatal");

    assert_eq!(outcome.decode_warnings.len(), 1);
    assert_eq!(outcome.decode_warnings[0].path, "icon.png");
    // The record degrades to its text payload.
    assert_eq!(
        fs::read_to_string(root.join("icon.png")).unwrap(),
        "certainly not base64!"
    );

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn dicom_requests_sanitize_generated_java() {
    let root = test_root("dicom");
    let java = "package com.example;\\n\
                import org.dcm4che3.net.Connection;\\n\
                public class DicomAnalyzerPlugin {\\n\
                    private final org.dcm4che3.net.Connection connection = new org.dcm4che3.net.Connection();\\n\
                }\\n";
    let client = ScriptedLlm {
        metadata: "{\"dicom_enabled\": true}".to_string(),
        files: format!(
            "[{{\"path\":\"GENERATED_PLUGIN/src/main/java/com/example/DicomAnalyzerPlugin.java\",\
              \"content\":\"{}\"}}]",
            java
        ),
    };

    let request = GenerationRequest::new(
        "a DICOM C-FIND plugin".to_string(),
        root.clone(),
        SanitizationPolicy::default(),
        client,
    );
    let outcome = request.run().expect("generation should succeed");

    // Both the import and the field referenced forbidden tokens, so the
    // class collapsed to an empty body and was replaced by the stub.
    assert_eq!(
        outcome.stubbed_paths,
        vec!["GENERATED_PLUGIN/src/main/java/com/example/DicomAnalyzerPlugin.java".to_string()]
    );
    let written = fs::read_to_string(
        root.join("GENERATED_PLUGIN/src/main/java/com/example/DicomAnalyzerPlugin.java"),
    )
    .unwrap();
    assert!(written.starts_with("package com.example;"));
    assert!(written.contains("public class DicomAnalyzerPlugin {"));
    assert!(!written.contains("dcm4che"));

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn degenerate_generation_fails_the_request() {
    let root = test_root("degenerate");
    let content = "// ...\\n".repeat(6);
    let client = ScriptedLlm {
        metadata: "{}".to_string(),
        files: format!("[{{\"path\":\"a.java\",\"content\":\"{}\"}}]", content),
    };

    let request = GenerationRequest::new(
        "a plugin".to_string(),
        root.clone(),
        SanitizationPolicy::default(),
        client,
    );
    let error = request.run().unwrap_err();

    assert!(matches!(error, RequestError::Generation(_)));
    assert!(error.to_string().contains("runaway generation"));
    assert!(!root.exists());
}

#[test]
fn metadata_transport_failure_aborts_the_request() {
    struct DownLlm;

    impl LlmClient for DownLlm {
        fn generate(&self, _prompt: &str) -> Result<String, UpstreamError> {
            Err(UpstreamError::Request("connection refused".to_string()))
        }
    }

    let request = GenerationRequest::new(
        "a plugin".to_string(),
        test_root("down"),
        SanitizationPolicy::default(),
        DownLlm,
    );
    let error = request.run().unwrap_err();

    assert!(matches!(error, RequestError::Metadata(_)));
    assert!(error
        .to_string()
        .starts_with("metadata extraction failed:"));
}
