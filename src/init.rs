use std::sync::Arc;

use anyhow::{Context, bail};
use medassist_core::RagOrchestrator;
use medassist_core::config::{Config, IndexKind, ProviderKind};
use medassist_index::{PineconeIndex, QdrantIndex, VectorIndex};
use medassist_llm::LlmProvider;
use medassist_llm::any::AnyProvider;
use medassist_llm::gemini::GeminiProvider;
use medassist_llm::openai::OpenAiProvider;
use medassist_llm::router::RouterProvider;

pub(crate) fn init_subscriber() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

/// Build the model chain: the configured provider first, then each fallback once.
pub(crate) fn create_provider(config: &Config) -> anyhow::Result<RouterProvider> {
    let mut kinds = vec![config.llm.provider];
    for kind in &config.llm.fallback {
        if !kinds.contains(kind) {
            kinds.push(*kind);
        }
    }

    let providers = kinds
        .into_iter()
        .map(|kind| create_named_provider(kind, config))
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(RouterProvider::new(providers))
}

fn create_named_provider(kind: ProviderKind, config: &Config) -> anyhow::Result<AnyProvider> {
    match kind {
        ProviderKind::Gemini => {
            let cfg = &config.llm.gemini;
            let api_key = config
                .secrets
                .gemini_api_key
                .as_ref()
                .context("MEDASSIST_GEMINI_API_KEY not set")?
                .expose()
                .to_owned();
            let mut provider =
                GeminiProvider::new(api_key, cfg.model.clone(), config.llm.max_output_tokens)
                    .with_temperature(cfg.temperature);
            if let Some(ref url) = cfg.base_url {
                provider = provider.with_base_url(url.clone());
            }
            if let Some(ref model) = cfg.embedding_model {
                provider = provider.with_embedding_model(model.clone());
            }
            Ok(AnyProvider::Gemini(provider))
        }
        ProviderKind::OpenAi => {
            let cfg = &config.llm.openai;
            let api_key = config
                .secrets
                .openai_api_key
                .as_ref()
                .context("MEDASSIST_OPENAI_API_KEY not set")?
                .expose()
                .to_owned();
            Ok(AnyProvider::OpenAi(OpenAiProvider::new(
                api_key,
                cfg.base_url.clone(),
                cfg.model.clone(),
                config.llm.max_output_tokens,
                cfg.embedding_model.clone(),
            )))
        }
    }
}

pub(crate) fn create_index(
    config: &Config,
    provider: &RouterProvider,
) -> anyhow::Result<Arc<dyn VectorIndex>> {
    match config.index.provider {
        IndexKind::Pinecone => {
            let cfg = &config.index.pinecone;
            if cfg.host.trim().is_empty() {
                bail!("index.pinecone.host is required for the pinecone index");
            }
            let api_key = config
                .secrets
                .pinecone_api_key
                .as_ref()
                .context("MEDASSIST_PINECONE_API_KEY not set")?
                .expose()
                .to_owned();
            let mut index = PineconeIndex::new(&cfg.host, api_key);
            if cfg.text_field.is_some() || cfg.page_field.is_some() {
                index = index.with_fields(
                    cfg.text_field.as_deref().unwrap_or("text"),
                    cfg.page_field.as_deref().unwrap_or("page"),
                );
            }
            if let Some(ref version) = cfg.api_version {
                index = index.with_api_version(version.clone());
            }
            Ok(Arc::new(index))
        }
        IndexKind::Qdrant => {
            let embedder = provider
                .providers()
                .iter()
                .find(|p| p.supports_embeddings())
                .context(
                    "the qdrant index needs an embedding model: set llm.gemini.embedding_model \
                     or llm.openai.embedding_model",
                )?;
            let api_key = config
                .secrets
                .qdrant_api_key
                .as_ref()
                .map(|s| s.expose().to_owned());
            let index = QdrantIndex::new(&config.index.qdrant.url, api_key, embedder.embed_fn())
                .context("failed to create qdrant client")?
                .with_collection_prefix(config.index.qdrant.collection_prefix.clone());
            Ok(Arc::new(index))
        }
    }
}

pub(crate) fn build_orchestrator(
    config: &Config,
) -> anyhow::Result<Arc<RagOrchestrator<RouterProvider>>> {
    let provider = create_provider(config)?;
    let index = create_index(config, &provider)?;
    tracing::info!(
        models = ?provider.providers().iter().map(LlmProvider::name).collect::<Vec<_>>(),
        index = index.name(),
        namespace = %config.index.namespace,
        "pipeline ready"
    );
    Ok(Arc::new(RagOrchestrator::from_config(
        Arc::new(provider),
        index,
        config,
    )))
}

#[cfg(test)]
mod tests {
    use medassist_core::secret::Secret;

    use super::*;

    fn config_with_keys() -> Config {
        let mut config = Config::default();
        config.secrets.gemini_api_key = Some(Secret::new("gem"));
        config.secrets.openai_api_key = Some(Secret::new("oai"));
        config.secrets.pinecone_api_key = Some(Secret::new("pc"));
        config
    }

    #[test]
    fn create_provider_gemini() {
        let provider = create_provider(&config_with_keys()).unwrap();
        assert_eq!(provider.providers().len(), 1);
        assert!(matches!(provider.providers()[0], AnyProvider::Gemini(_)));
    }

    #[test]
    fn create_provider_with_fallback_chain() {
        let mut config = config_with_keys();
        config.llm.fallback = vec![ProviderKind::OpenAi, ProviderKind::Gemini];
        let provider = create_provider(&config).unwrap();
        let names: Vec<_> = provider.providers().iter().map(LlmProvider::name).collect();
        assert_eq!(names, ["gemini", "openai"]);
    }

    #[test]
    fn create_provider_without_key_errors() {
        let result = create_provider(&Config::default());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("MEDASSIST_GEMINI_API_KEY")
        );
    }

    #[test]
    fn pinecone_requires_host() {
        let config = config_with_keys();
        let provider = create_provider(&config).unwrap();
        let result = create_index(&config, &provider);
        assert!(result.err().unwrap().to_string().contains("index.pinecone.host"));
    }

    #[test]
    fn pinecone_index_from_config() {
        let mut config = config_with_keys();
        config.index.pinecone.host = "docs-abc.svc.pinecone.io".into();
        let provider = create_provider(&config).unwrap();
        let index = create_index(&config, &provider).unwrap();
        assert_eq!(index.name(), "pinecone");
    }

    #[test]
    fn qdrant_requires_embedding_model() {
        let mut config = config_with_keys();
        config.index.provider = IndexKind::Qdrant;
        let provider = create_provider(&config).unwrap();
        let result = create_index(&config, &provider);
        assert!(result.err().unwrap().to_string().contains("embedding model"));
    }
}
