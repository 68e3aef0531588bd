use std::io::Write;
use std::sync::{Arc, Mutex};

use serial_test::serial;
use tracing_subscriber::fmt::MakeWriter;

use super::*;

const ENV_KEYS: [&str; 25] = [
    "MEDASSIST_ASSISTANT_NAME",
    "MEDASSIST_HOSPITAL_NAME",
    "MEDASSIST_LLM_PROVIDER",
    "MEDASSIST_GEMINI_MODEL",
    "MEDASSIST_GEMINI_EMBEDDING_MODEL",
    "MEDASSIST_OPENAI_BASE_URL",
    "MEDASSIST_OPENAI_MODEL",
    "MEDASSIST_INDEX_PROVIDER",
    "MEDASSIST_INDEX_NAMESPACE",
    "MEDASSIST_PINECONE_HOST",
    "MEDASSIST_QDRANT_URL",
    "MEDASSIST_TOP_K",
    "MEDASSIST_MAX_TOP_K",
    "MEDASSIST_MAX_SUB_QUERIES",
    "MEDASSIST_TIMEOUT_CLASSIFY",
    "MEDASSIST_TIMEOUT_SEARCH",
    "MEDASSIST_TIMEOUT_GENERATE",
    "MEDASSIST_GATEWAY_BIND",
    "MEDASSIST_GATEWAY_PORT",
    "MEDASSIST_GATEWAY_TOKEN",
    "MEDASSIST_GATEWAY_RATE_LIMIT",
    "MEDASSIST_GEMINI_API_KEY",
    "MEDASSIST_OPENAI_API_KEY",
    "MEDASSIST_PINECONE_API_KEY",
    "MEDASSIST_QDRANT_API_KEY",
];

#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn clear_env() {
    for key in ENV_KEYS {
        unsafe { std::env::remove_var(key) };
    }
}

#[test]
fn defaults_when_file_missing() {
    let config = Config::default();
    assert_eq!(config.assistant.name, "MedAssist");
    assert_eq!(config.llm.provider, ProviderKind::Gemini);
    assert_eq!(config.llm.gemini.model, "gemini-2.0-flash");
    assert!(config.llm.fallback.is_empty());
    assert_eq!(config.index.provider, IndexKind::Pinecone);
    assert_eq!(config.index.namespace, "hospital-docs");
    assert_eq!(config.index.qdrant.url, "http://localhost:6334");
    assert_eq!(config.pipeline.top_k, 5);
    assert_eq!(config.pipeline.max_top_k, 50);
    assert_eq!(config.pipeline.context_multiplier, 2);
    assert_eq!(config.pipeline.max_sub_queries, 5);
    assert_eq!(config.pipeline.max_suggestions, 6);
    assert_eq!(config.gateway.port, 8090);
    assert!(config.gateway.auth_token.is_none());
}

#[test]
fn default_timeouts() {
    let pipeline = PipelineConfig::default();
    assert_eq!(pipeline.classify_timeout().as_secs(), 8);
    assert_eq!(pipeline.search_timeout().as_secs(), 10);
    assert_eq!(pipeline.generate_timeout().as_secs(), 15);
}

#[test]
#[serial]
fn load_missing_file_uses_defaults() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let config = Config::load(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(config.pipeline.top_k, 5);
}

#[test]
#[serial]
fn parse_valid_toml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test.toml");
    let mut f = std::fs::File::create(&path).unwrap();
    write!(
        f,
        r#"
[assistant]
name = "Asha"
hospital_name = "City General Hospital"

[llm]
provider = "openai"
fallback = ["gemini"]

[llm.openai]
base_url = "http://localhost:8080/v1"
model = "local-model"

[index]
provider = "qdrant"
namespace = "city-general"

[index.qdrant]
url = "http://qdrant:6334"
collection_prefix = "kb_"

[pipeline]
top_k = 8
search_timeout_secs = 4

[gateway]
port = 9000
"#
    )
    .unwrap();

    clear_env();

    let config = Config::load(&path).unwrap();
    assert_eq!(config.assistant.hospital_name, "City General Hospital");
    assert_eq!(config.llm.provider, ProviderKind::OpenAi);
    assert_eq!(config.llm.fallback, vec![ProviderKind::Gemini]);
    assert_eq!(config.llm.openai.model, "local-model");
    assert_eq!(config.index.provider, IndexKind::Qdrant);
    assert_eq!(config.index.qdrant.collection_prefix, "kb_");
    assert_eq!(config.pipeline.top_k, 8);
    assert_eq!(config.pipeline.search_timeout_secs, 4);
    assert_eq!(config.pipeline.generate_timeout_secs, 15);
    assert_eq!(config.gateway.port, 9000);
    assert_eq!(config.gateway.bind, "127.0.0.1");
}

#[test]
#[serial]
fn invalid_toml_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    std::fs::write(&path, "[pipeline\ntop_k = ").unwrap();
    assert!(Config::load(&path).is_err());
}

#[test]
#[serial]
fn env_overrides() {
    clear_env();
    let mut config = Config::default();

    unsafe {
        std::env::set_var("MEDASSIST_GEMINI_MODEL", "gemini-2.5-pro");
        std::env::set_var("MEDASSIST_INDEX_NAMESPACE", "cardiology");
        std::env::set_var("MEDASSIST_HOSPITAL_NAME", "St. Mary");
    };
    config.apply_env_overrides();
    clear_env();

    assert_eq!(config.llm.gemini.model, "gemini-2.5-pro");
    assert_eq!(config.index.namespace, "cardiology");
    assert_eq!(config.assistant.hospital_name, "St. Mary");
}

#[test]
#[serial]
fn env_override_provider_kinds() {
    clear_env();
    let mut config = Config::default();

    unsafe {
        std::env::set_var("MEDASSIST_LLM_PROVIDER", "openai");
        std::env::set_var("MEDASSIST_INDEX_PROVIDER", "qdrant");
    };
    config.apply_env_overrides();
    clear_env();

    assert_eq!(config.llm.provider, ProviderKind::OpenAi);
    assert_eq!(config.index.provider, IndexKind::Qdrant);
}

#[test]
#[serial]
fn env_override_invalid_provider_ignored() {
    clear_env();
    let mut config = Config::default();

    unsafe { std::env::set_var("MEDASSIST_LLM_PROVIDER", "claude") };
    config.apply_env_overrides();
    clear_env();

    assert_eq!(config.llm.provider, ProviderKind::Gemini);
}

#[test]
#[serial]
fn env_override_timeouts() {
    clear_env();
    let mut config = Config::default();

    unsafe {
        std::env::set_var("MEDASSIST_TIMEOUT_CLASSIFY", "3");
        std::env::set_var("MEDASSIST_TIMEOUT_SEARCH", "4");
        std::env::set_var("MEDASSIST_TIMEOUT_GENERATE", "30");
    };
    config.apply_env_overrides();
    clear_env();

    assert_eq!(config.pipeline.classify_timeout_secs, 3);
    assert_eq!(config.pipeline.search_timeout_secs, 4);
    assert_eq!(config.pipeline.generate_timeout_secs, 30);
}

#[test]
#[serial]
fn env_override_numeric_invalid_ignored() {
    clear_env();
    let mut config = Config::default();

    unsafe {
        std::env::set_var("MEDASSIST_TOP_K", "many");
        std::env::set_var("MEDASSIST_GATEWAY_PORT", "99999");
    };
    config.apply_env_overrides();
    clear_env();

    assert_eq!(config.pipeline.top_k, 5);
    assert_eq!(config.gateway.port, 8090);
}

#[test]
#[serial]
fn env_override_numeric_invalid_is_logged() {
    clear_env();
    let mut config = Config::default();
    let logs = LogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_ansi(false)
        .finish();

    unsafe {
        std::env::set_var("MEDASSIST_TIMEOUT_SEARCH", "ten");
        std::env::set_var("MEDASSIST_GATEWAY_RATE_LIMIT", "-1");
        std::env::set_var("MEDASSIST_MAX_SUB_QUERIES", "3");
    };
    tracing::subscriber::with_default(subscriber, || config.apply_env_overrides());
    clear_env();

    assert_eq!(config.pipeline.search_timeout_secs, 10);
    assert_eq!(config.gateway.rate_limit, GatewayConfig::default().rate_limit);
    assert_eq!(config.pipeline.max_sub_queries, 3);

    let out = logs.contents();
    assert!(out.contains("MEDASSIST_TIMEOUT_SEARCH"), "{out}");
    assert!(out.contains("ten"), "{out}");
    assert!(out.contains("MEDASSIST_GATEWAY_RATE_LIMIT"), "{out}");
    assert!(!out.contains("MEDASSIST_MAX_SUB_QUERIES"), "{out}");
}

#[test]
#[serial]
fn env_override_max_top_k() {
    clear_env();
    let mut config = Config::default();

    unsafe { std::env::set_var("MEDASSIST_MAX_TOP_K", "20") };
    config.apply_env_overrides();
    clear_env();

    assert_eq!(config.pipeline.max_top_k, 20);
}

#[test]
#[serial]
fn env_override_gateway() {
    clear_env();
    let mut config = Config::default();

    unsafe {
        std::env::set_var("MEDASSIST_GATEWAY_BIND", "0.0.0.0");
        std::env::set_var("MEDASSIST_GATEWAY_PORT", "8443");
        std::env::set_var("MEDASSIST_GATEWAY_TOKEN", "s3cret");
        std::env::set_var("MEDASSIST_GATEWAY_RATE_LIMIT", "10");
    };
    config.apply_env_overrides();
    clear_env();

    assert_eq!(config.gateway.bind, "0.0.0.0");
    assert_eq!(config.gateway.port, 8443);
    assert_eq!(config.gateway.auth_token.as_deref(), Some("s3cret"));
    assert_eq!(config.gateway.rate_limit, 10);
}

#[test]
#[serial]
fn resolve_secrets_reads_env() {
    clear_env();
    let mut config = Config::default();

    unsafe {
        std::env::set_var("MEDASSIST_GEMINI_API_KEY", "gem-key");
        std::env::set_var("MEDASSIST_PINECONE_API_KEY", "pc-key");
        std::env::set_var("MEDASSIST_OPENAI_API_KEY", "   ");
    };
    config.resolve_secrets();
    clear_env();

    assert_eq!(
        config.secrets.gemini_api_key.as_ref().map(Secret::expose),
        Some("gem-key")
    );
    assert_eq!(
        config.secrets.pinecone_api_key.as_ref().map(Secret::expose),
        Some("pc-key")
    );
    assert!(config.secrets.openai_api_key.is_none());
    assert!(config.secrets.qdrant_api_key.is_none());
}

#[test]
fn serialized_config_omits_secrets() {
    let mut config = Config::default();
    config.gateway.auth_token = Some("s3cret".into());
    config.secrets.gemini_api_key = Some(Secret::new("gem-key"));
    let rendered = toml::to_string_pretty(&config).unwrap();
    assert!(!rendered.contains("s3cret"));
    assert!(!rendered.contains("gem-key"));
    assert!(rendered.contains("[pipeline]"));
}
