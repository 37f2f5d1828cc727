use crate::contexts::{LlmClient, UpstreamError};
use crate::pipeline::strip_code_fence;
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

const DEFAULT_PLUGIN_NAME: &str = "MyMirthPlugin";
const DEFAULT_PACKAGE: &str = "com.example";
const DEFAULT_MIRTH_VERSION: &str = "4.5.2";
const DEFAULT_PLUGIN_TYPE: &str = "server_plugin";
const DEFAULT_DICOM_HOST: &str = "localhost:104";
const DEFAULT_DICOM_PORT: u16 = 104;
const DEFAULT_SERVER_AE: &str = "PACSSERVER";
const DEFAULT_CLIENT_AE: &str = "MIRTHCLIENT";

static DICOM_HINT: OnceLock<Regex> = OnceLock::new();
static PLUGIN_NAME: OnceLock<Regex> = OnceLock::new();
static HOST_PORT: OnceLock<Regex> = OnceLock::new();
static PORT_SUFFIX: OnceLock<Regex> = OnceLock::new();
static SERVER_AE: OnceLock<Regex> = OnceLock::new();
static CLIENT_AE: OnceLock<Regex> = OnceLock::new();

fn dicom_hint() -> &'static Regex {
    DICOM_HINT.get_or_init(|| {
        Regex::new(r"(?i)\b(dicom|c[- ]find)\b").expect("dicom hint pattern is valid")
    })
}

fn plugin_name_pattern() -> &'static Regex {
    PLUGIN_NAME.get_or_init(|| {
        Regex::new(r"(?i)plugin\s+([A-Za-z0-9]+)").expect("plugin name pattern is valid")
    })
}

fn host_port_pattern() -> &'static Regex {
    HOST_PORT.get_or_init(|| {
        Regex::new(r"([A-Za-z0-9.-]+:[0-9]{2,5})").expect("host pattern is valid")
    })
}

fn port_suffix_pattern() -> &'static Regex {
    PORT_SUFFIX.get_or_init(|| Regex::new(r":([0-9]{2,5})").expect("port pattern is valid"))
}

fn server_ae_pattern() -> &'static Regex {
    SERVER_AE.get_or_init(|| {
        Regex::new(r"(?i)AE[- ]Title(?: of the server)?\s*[:=]\s*([A-Za-z0-9_-]+)")
            .expect("server AE pattern is valid")
    })
}

fn client_ae_pattern() -> &'static Regex {
    CLIENT_AE.get_or_init(|| {
        Regex::new(r"(?i)AE[- ]Title(?: of the plugin)?\s*[:=]\s*([A-Za-z0-9_-]+)")
            .expect("client AE pattern is valid")
    })
}

/// Structured plugin metadata inferred from the user prompt.
///
/// Every field has a deterministic default so an unparsable model answer
/// never fails the request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PluginMetadata {
    pub plugin_name: String,
    pub plugin_description: String,
    pub main_class_name: String,
    pub package: String,
    pub plugin_id: String,
    pub mirth_version: String,
    pub plugin_type: String,
    pub use_assembly: bool,
    pub provided_dependencies: Vec<String>,
    pub dicom_enabled: bool,
    pub dicom_host: Option<String>,
    pub dicom_port: Option<u16>,
    pub dicom_server_ae: Option<String>,
    pub dicom_client_ae: Option<String>,
}

/// Infers plugin metadata from a prompt via the model service.
pub struct PromptAnalyzer<'a, C: LlmClient> {
    client: &'a C,
}

impl<'a, C: LlmClient> PromptAnalyzer<'a, C> {
    pub fn new(client: &'a C) -> Self {
        Self { client }
    }

    /// Asks the model for a pure-JSON metadata object and parses it.
    ///
    /// A transport failure is fatal; an unparsable or incomplete answer
    /// falls back to defaults field by field.
    pub fn analyze(&self, prompt: &str) -> Result<PluginMetadata, UpstreamError> {
        let instruction = build_analysis_prompt(prompt);
        let raw = self.client.generate(&instruction)?;
        let text = strip_code_fence(&raw);
        Ok(parse_metadata(text, prompt))
    }
}

fn build_analysis_prompt(prompt: &str) -> String {
    format!(
        "You are an assistant that extracts metadata for a Mirth Connect plugin \
         from a single user prompt. Respond ONLY with a valid JSON dictionary. \
         NO markdown, NO comments, NO explanation. Use double quotes for all keys \
         and string values.\n\n\
         Example output:\n\
         {{\n\
         \x20 \"plugin_name\": \"DicomAnalyzerPlugin\",\n\
         \x20 \"plugin_description\": \"build a dicom plugin\",\n\
         \x20 \"main_class_name\": \"DicomAnalyzerPlugin\",\n\
         \x20 \"package\": \"com.example\",\n\
         \x20 \"plugin_id\": \"dicom-analyzer-plugin\",\n\
         \x20 \"mirth_version\": \"4.5.2\",\n\
         \x20 \"plugin_type\": \"server_plugin\",\n\
         \x20 \"use_assembly\": true,\n\
         \x20 \"provided_dependencies\": [\"mirth-server-api\", \"mirth-client-core\"],\n\
         \x20 \"dicom_enabled\": true,\n\
         \x20 \"dicom_host\": \"localhost:104\",\n\
         \x20 \"dicom_port\": 104,\n\
         \x20 \"dicom_server_ae\": \"PACSSERVER\",\n\
         \x20 \"dicom_client_ae\": \"MIRTHCLIENT\"\n\
         }}\n\n\
         Prompt:\n{}\n\
         Return ONLY valid JSON as above.",
        prompt
    )
}

/// Parses the model's answer, falling back to the full default mapping when
/// it is not a JSON object, and merging field by field otherwise.
fn parse_metadata(text: &str, prompt: &str) -> PluginMetadata {
    let dicom_flag = dicom_hint().is_match(prompt);

    let parsed: Option<serde_json::Value> = serde_json::from_str(text).ok();
    let object = match parsed.as_ref().and_then(|v| v.as_object()) {
        Some(object) => object.clone(),
        None => return default_metadata(prompt, dicom_flag),
    };

    merge_with_defaults(&object, prompt, dicom_flag)
}

/// Fallback metadata derived from the prompt alone.
fn default_metadata(prompt: &str, dicom_flag: bool) -> PluginMetadata {
    let base_name = plugin_name_pattern()
        .captures(prompt)
        .map(|caps| capitalize(&caps[1]))
        .unwrap_or_else(|| DEFAULT_PLUGIN_NAME.to_string());

    let (plugin_name, main_class_name, plugin_id) = if dicom_flag {
        (
            "DicomAnalyzerPlugin".to_string(),
            "DicomAnalyzerPlugin".to_string(),
            "dicom-analyzer-plugin".to_string(),
        )
    } else {
        let id = base_name.to_lowercase().replace(' ', "-");
        (base_name.clone(), base_name, id)
    };

    let mut metadata = PluginMetadata {
        plugin_name,
        plugin_description: truncate_description(prompt),
        main_class_name,
        package: DEFAULT_PACKAGE.to_string(),
        plugin_id,
        mirth_version: DEFAULT_MIRTH_VERSION.to_string(),
        plugin_type: DEFAULT_PLUGIN_TYPE.to_string(),
        use_assembly: true,
        provided_dependencies: vec![
            "mirth-server-api".to_string(),
            "mirth-client-core".to_string(),
        ],
        dicom_enabled: dicom_flag,
        dicom_host: None,
        dicom_port: None,
        dicom_server_ae: None,
        dicom_client_ae: None,
    };

    if dicom_flag {
        fill_dicom_defaults(&mut metadata, prompt);
    }

    metadata
}

fn merge_with_defaults(
    object: &serde_json::Map<String, serde_json::Value>,
    prompt: &str,
    dicom_flag: bool,
) -> PluginMetadata {
    let defaults = default_metadata(prompt, dicom_flag);

    let string_or = |key: &str, fallback: &str| -> String {
        object
            .get(key)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .unwrap_or_else(|| fallback.to_string())
    };

    let mut metadata = PluginMetadata {
        plugin_name: string_or("plugin_name", &defaults.plugin_name),
        plugin_description: string_or("plugin_description", &defaults.plugin_description),
        main_class_name: string_or("main_class_name", &defaults.main_class_name),
        package: string_or("package", &defaults.package),
        plugin_id: string_or("plugin_id", &defaults.plugin_id),
        mirth_version: string_or("mirth_version", &defaults.mirth_version),
        plugin_type: string_or("plugin_type", &defaults.plugin_type),
        use_assembly: object
            .get("use_assembly")
            .and_then(|v| v.as_bool())
            .unwrap_or(defaults.use_assembly),
        provided_dependencies: object
            .get("provided_dependencies")
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.as_str())
                    .map(|s| s.to_string())
                    .collect()
            })
            .filter(|deps: &Vec<String>| !deps.is_empty())
            .unwrap_or(defaults.provided_dependencies),
        dicom_enabled: false,
        dicom_host: None,
        dicom_port: None,
        dicom_server_ae: None,
        dicom_client_ae: None,
    };

    let answered_dicom = object
        .get("dicom_enabled")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    if dicom_flag || answered_dicom {
        metadata.dicom_enabled = true;
        fill_dicom_defaults(&mut metadata, prompt);

        if let Some(host) = object.get("dicom_host").and_then(|v| v.as_str()) {
            metadata.dicom_host = Some(host.to_string());
            metadata.dicom_port = Some(port_from_host(host).unwrap_or(DEFAULT_DICOM_PORT));
        }
        if let Some(port) = object
            .get("dicom_port")
            .and_then(|v| v.as_u64())
            .and_then(|p| u16::try_from(p).ok())
        {
            metadata.dicom_port = Some(port);
        }
        if let Some(ae) = object.get("dicom_server_ae").and_then(|v| v.as_str()) {
            metadata.dicom_server_ae = Some(ae.to_string());
        }
        if let Some(ae) = object.get("dicom_client_ae").and_then(|v| v.as_str()) {
            metadata.dicom_client_ae = Some(ae.to_string());
        }
    }

    metadata
}

fn fill_dicom_defaults(metadata: &mut PluginMetadata, prompt: &str) {
    let host = extract_host_port(prompt).unwrap_or_else(|| DEFAULT_DICOM_HOST.to_string());
    metadata.dicom_port = Some(port_from_host(&host).unwrap_or(DEFAULT_DICOM_PORT));
    metadata.dicom_host = Some(host);
    metadata.dicom_server_ae = Some(
        extract_ae_title(server_ae_pattern(), prompt)
            .unwrap_or_else(|| DEFAULT_SERVER_AE.to_string()),
    );
    metadata.dicom_client_ae = Some(
        extract_ae_title(client_ae_pattern(), prompt)
            .unwrap_or_else(|| DEFAULT_CLIENT_AE.to_string()),
    );
}

fn extract_host_port(prompt: &str) -> Option<String> {
    host_port_pattern()
        .captures(prompt)
        .map(|caps| caps[1].to_string())
}

fn port_from_host(host: &str) -> Option<u16> {
    port_suffix_pattern()
        .captures(host)
        .and_then(|caps| caps[1].parse().ok())
}

fn extract_ae_title(pattern: &Regex, prompt: &str) -> Option<String> {
    pattern.captures(prompt).map(|caps| caps[1].to_string())
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn truncate_description(prompt: &str) -> String {
    const LIMIT: usize = 50;
    if prompt.chars().count() > LIMIT {
        let head: String = prompt.chars().take(LIMIT).collect();
        format!("{}...", head)
    } else {
        prompt.to_string()
    }
}
