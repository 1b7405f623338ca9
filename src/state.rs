//! Application state: wires the quiz pipeline from configuration.
//!
//! This module owns:
//!   - the quiz repository, seeded with the TOML bank and built-in fallbacks
//!   - the cache pool and its background refill worker
//!   - the reference-content context
//!   - the generator and the quiz service on top of it
//!
//! Collaborators are passed in explicitly; `from_config` builds the real
//! completion and docs clients, `assemble` accepts any implementations.

use std::{collections::BTreeMap, sync::Arc};
use tracing::{error, info, instrument, warn};

use crate::cache::{spawn_refill_worker, CachePool, MemoryStore, PoolSettings, QuizProducer};
use crate::completion::{CompletionClient, VllmClient};
use crate::config::QuizConfig;
use crate::domain::{Difficulty, QuizSource};
use crate::error::CompletionError;
use crate::generator::{GeneratorSettings, QuizGenerator};
use crate::logic::QuizService;
use crate::metrics::GenerationMetrics;
use crate::reference::{DocsProvider, HttpDocsProvider, ReferenceContext};
use crate::repository::{MemoryQuizRepository, QuizRepository};
use crate::seeds::seed_quizzes;
use crate::validator::QuizValidator;

pub struct AppState {
    pub config: QuizConfig,
    pub model: String,
    pub completion: Arc<dyn CompletionClient>,
    pub service: Arc<QuizService>,
    pub generator: Arc<QuizGenerator>,
    pub cache: Arc<CachePool>,
    pub reference: Arc<ReferenceContext>,
    pub repository: Arc<dyn QuizRepository>,
}

impl AppState {
    /// Build state with the vLLM client and, if configured, the docs service.
    #[instrument(level = "info", skip_all)]
    pub async fn from_config(config: QuizConfig) -> Result<Self, CompletionError> {
        let client = VllmClient::new(&config.llm)?;
        info!(target: "infraquiz", endpoint = %client.endpoint(), model = %config.llm.model, enabled = config.pipeline.enabled, "Completion client ready");

        let docs: Option<Arc<dyn DocsProvider>> = match config.docs_endpoint.as_deref() {
            Some(url) => match HttpDocsProvider::new(url) {
                Ok(p) => {
                    info!(target: "infraquiz", %url, "Reference docs service enabled");
                    Some(Arc::new(p) as Arc<dyn DocsProvider>)
                }
                Err(e) => {
                    error!(target: "infraquiz", %url, error = %e, "Could not build docs client; using static references");
                    None
                }
            },
            None => {
                info!(target: "infraquiz", "No DOCS_ENDPOINT; using static references");
                None
            }
        };

        Ok(Self::assemble(config, Arc::new(client), docs).await)
    }

    /// Wire every component around the given completion client and docs provider.
    pub async fn assemble(
        config: QuizConfig,
        client: Arc<dyn CompletionClient>,
        docs: Option<Arc<dyn DocsProvider>>,
    ) -> Self {
        let model = client.model_name().to_string();
        let repository = Arc::new(MemoryQuizRepository::new());
        seed_repository(repository.as_ref(), &config).await;

        let store = Arc::new(MemoryStore::new());
        let pool_settings = PoolSettings::from(&config.pipeline);
        let (cache, refill_rx) = if config.pipeline.enabled {
            let (pool, rx) = CachePool::with_refill(store, pool_settings);
            (Arc::new(pool), Some(rx))
        } else {
            (Arc::new(CachePool::new(store, pool_settings)), None)
        };

        let reference = Arc::new(ReferenceContext::new(docs));
        let generator = Arc::new(
            QuizGenerator::new(
                client.clone(),
                repository.clone(),
                config.prompts.clone(),
                GeneratorSettings::from(&config.pipeline),
            )
            .with_cache(cache.clone())
            .with_reference(reference.clone())
            .with_metrics(Arc::new(GenerationMetrics::new())),
        );

        if let Some(rx) = refill_rx {
            let producer: Arc<dyn QuizProducer> = generator.clone();
            spawn_refill_worker(&cache, &producer, rx);
            if config.pipeline.warm_cache {
                cache.warm().await;
            }
        }

        let service = Arc::new(QuizService::new(
            generator.clone(),
            repository.clone(),
            Some(cache.clone()),
        ));

        Self {
            config,
            model,
            completion: client,
            service,
            generator,
            cache,
            reference,
            repository,
        }
    }
}

/// Load the TOML bank (validated, invalid entries skipped) and the built-in
/// fallbacks into the repository.
async fn seed_repository(repo: &dyn QuizRepository, config: &QuizConfig) {
    let validator = QuizValidator::new();
    let bank = config.quizzes.iter().cloned().map(|q| q.into_quiz());
    let mut inventory: BTreeMap<Difficulty, (usize, usize)> = BTreeMap::new();

    for (origin, quiz) in bank
        .map(|q| ("toml_bank", q))
        .chain(seed_quizzes().into_iter().map(|q| ("builtin", q)))
    {
        let result = validator.validate(&quiz);
        if !result.is_valid {
            warn!(target: "infraquiz", %origin, quiz_id = %quiz.id, errors = ?result.errors, "Skipping invalid bank quiz");
            continue;
        }
        let counts = inventory.entry(quiz.difficulty).or_insert((0, 0));
        if quiz.source == QuizSource::Fallback {
            counts.0 += 1;
        } else {
            counts.1 += 1;
        }
        if let Err(e) = repo.save(quiz).await {
            error!(target: "infraquiz", %origin, error = %e, "Failed to store bank quiz");
        }
    }

    for (difficulty, (fallback, other)) in inventory {
        info!(target: "infraquiz", %difficulty, fallback, other, "Startup quiz inventory");
    }
}
