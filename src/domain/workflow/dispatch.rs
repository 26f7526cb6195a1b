//! Step dispatch: param resolution and capability invocation

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::domain::embedder::EmbeddingOutput;
use crate::domain::importer::ImportedDocs;
use crate::domain::resolver::ProviderResolver;
use crate::domain::value::Multivar;
use crate::domain::workflow::context::VarStore;
use crate::domain::workflow::entity::{Step, StepKind};
use crate::domain::EngineError;

/// Separator used by `resolve.refs` when the step does not set one
const DEFAULT_SEPARATOR: &str = " ";

/// Executes individual steps against resolved providers
#[derive(Debug, Clone)]
pub struct StepExecutor {
    providers: Arc<dyn ProviderResolver>,
}

impl StepExecutor {
    pub fn new(providers: Arc<dyn ProviderResolver>) -> Self {
        Self { providers }
    }

    /// Execute one step, returning the variable name to bind and the value
    ///
    /// Only `storage`'s `cleanup` action produces no value.
    pub async fn execute(
        &self,
        step: &Step,
        vars: &VarStore,
    ) -> Result<(String, Option<Multivar>), EngineError> {
        debug!(
            kind = %step.kind,
            action = %step.action,
            provider = %step.provider,
            "executing step"
        );

        let value = match step.kind {
            StepKind::Embedder => Some(self.run_embedder(step, vars).await?),
            StepKind::Storage => self.run_storage(step, vars).await?,
            StepKind::Service => Some(self.run_service(step, vars).await?),
            StepKind::Importer => Some(self.run_importer(step, vars).await?),
        };

        Ok((step.output_var().to_string(), value))
    }

    /// Execute steps in order, binding each produced value into `vars`
    ///
    /// The first failing step aborts; values bound by earlier steps stay
    /// bound and committed side effects are not rolled back.
    pub async fn execute_all(
        &self,
        steps: &[Step],
        vars: &mut VarStore,
    ) -> Result<(), EngineError> {
        for step in steps {
            let (var, value) = self.execute(step, vars).await?;
            if let Some(value) = value {
                vars.bind(var, value);
            }
        }

        Ok(())
    }

    async fn run_embedder(&self, step: &Step, vars: &VarStore) -> Result<Multivar, EngineError> {
        let embedder = self.providers.embedder(&step.provider)?;

        match step.action.as_str() {
            "generate" => {
                let input = text_param("input", &step.params, vars)?;
                let output = embedder.generate(&input).await?;
                Ok(Multivar::Embedding(output))
            }
            _ => Err(EngineError::unsupported_action("embedder", &step.action)),
        }
    }

    async fn run_storage(
        &self,
        step: &Step,
        vars: &VarStore,
    ) -> Result<Option<Multivar>, EngineError> {
        let storage = self.providers.storage(&step.provider)?;

        match step.action.as_str() {
            "lookup.cosine" => {
                let embedding = embedding_param("embedding", &step.params, vars)?;
                let collection = text_param("collection", &step.params, vars)?;
                let limit = int_param("limit", &step.params, vars)?;
                let threshold = float_param("threshold", &step.params, vars)?;

                let output = storage
                    .lookup_cosine(&collection, &embedding.vector, limit, threshold)
                    .await?;

                Ok(Some(Multivar::Lookup(output)))
            }
            "insert.embedding" => {
                let embedding = embedding_param("embedding", &step.params, vars)?;
                let collection = text_param("collection", &step.params, vars)?;
                let reference = text_param("ref", &step.params, vars)?;
                let batch = text_param("batch", &step.params, vars)?;

                let output = storage
                    .insert_embedding(&collection, &reference, &embedding.vector, &batch)
                    .await?;

                Ok(Some(Multivar::Lookup(output)))
            }
            "cleanup" => {
                let batch = text_param("batch", &step.params, vars)?;
                let collection = text_param("collection", &step.params, vars)?;

                storage.cleanup(&collection, &batch).await?;

                Ok(None)
            }
            _ => Err(EngineError::unsupported_action("storage", &step.action)),
        }
    }

    async fn run_service(&self, step: &Step, vars: &VarStore) -> Result<Multivar, EngineError> {
        let service = self.providers.completion(&step.provider)?;

        match step.action.as_str() {
            "completion" => {
                let template = text_param("prompt", &step.params, vars)?;
                let prompt = vars.render_prompt(&template);

                let output = service.complete(&prompt).await?;
                Ok(Multivar::Completion(output))
            }
            _ => Err(EngineError::unsupported_action("service", &step.action)),
        }
    }

    async fn run_importer(&self, step: &Step, vars: &VarStore) -> Result<Multivar, EngineError> {
        let importer = self.providers.importer(&step.provider)?;

        match step.action.as_str() {
            "resolve.refs" => {
                let refs_value = vars.resolve_param("refs", &step.params)?;
                let refs = refs_value.expect_lookup()?;

                let separator = step
                    .params
                    .get("separator")
                    .map(String::as_str)
                    .unwrap_or(DEFAULT_SEPARATOR);

                let documents = importer.resolve_refs(refs).await?;
                Ok(Multivar::Imported(ImportedDocs::new(documents, separator)))
            }
            _ => Err(EngineError::unsupported_action("importer", &step.action)),
        }
    }
}

fn text_param(
    key: &str,
    params: &HashMap<String, String>,
    vars: &VarStore,
) -> Result<String, EngineError> {
    let value = vars.resolve_param(key, params)?;

    match value.as_text_like() {
        Some(text) => Ok(text.into_owned()),
        None => Err(EngineError::param_type(
            key,
            format!("expected a text value, found {}", value.kind()),
        )),
    }
}

fn embedding_param(
    key: &str,
    params: &HashMap<String, String>,
    vars: &VarStore,
) -> Result<EmbeddingOutput, EngineError> {
    let value = vars.resolve_param(key, params)?;
    Ok(value.expect_embedding()?.clone())
}

fn int_param(
    key: &str,
    params: &HashMap<String, String>,
    vars: &VarStore,
) -> Result<usize, EngineError> {
    let text = text_param(key, params, vars)?;
    text.parse()
        .map_err(|_| EngineError::param_type(key, "must be an integer"))
}

fn float_param(
    key: &str,
    params: &HashMap<String, String>,
    vars: &VarStore,
) -> Result<f32, EngineError> {
    let text = text_param(key, params, vars)?;
    text.parse()
        .map_err(|_| EngineError::param_type(key, "must be a decimal"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    use crate::domain::completion::{CompletionOutput, CompletionService};
    use crate::domain::embedder::Embedder;
    use crate::domain::importer::{ImportedDocument, Importer};
    use crate::domain::storage::{LookupOutput, ScoredRef, VectorStorage};
    use crate::domain::workflow::context::INPUT_VAR;

    #[derive(Debug)]
    struct FakeEmbedder;

    #[async_trait]
    impl Embedder for FakeEmbedder {
        async fn generate(&self, input: &str) -> Result<EmbeddingOutput, EngineError> {
            Ok(EmbeddingOutput::new(vec![input.len() as f32, 1.0]))
        }
    }

    #[derive(Debug, Default)]
    struct RecordingStorage {
        inserts: Mutex<Vec<(String, String, String)>>,
        cleanups: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl VectorStorage for RecordingStorage {
        async fn insert_embedding(
            &self,
            collection: &str,
            reference: &str,
            _embedding: &[f32],
            batch: &str,
        ) -> Result<LookupOutput, EngineError> {
            self.inserts.lock().unwrap().push((
                collection.to_string(),
                reference.to_string(),
                batch.to_string(),
            ));
            Ok(LookupOutput::default())
        }

        async fn lookup_cosine(
            &self,
            _collection: &str,
            _embedding: &[f32],
            limit: usize,
            _threshold: f32,
        ) -> Result<LookupOutput, EngineError> {
            let refs = vec![
                ScoredRef::new("a.txt", 0.9),
                ScoredRef::new("b.txt", 0.5),
            ];
            Ok(LookupOutput::new(refs.into_iter().take(limit).collect()))
        }

        async fn cleanup(&self, collection: &str, batch: &str) -> Result<(), EngineError> {
            self.cleanups
                .lock()
                .unwrap()
                .push((collection.to_string(), batch.to_string()));
            Ok(())
        }
    }

    #[derive(Debug)]
    struct UpperService;

    #[async_trait]
    impl CompletionService for UpperService {
        async fn complete(&self, prompt: &str) -> Result<CompletionOutput, EngineError> {
            Ok(CompletionOutput::new(prompt.to_uppercase()))
        }
    }

    #[derive(Debug)]
    struct FakeImporter;

    #[async_trait]
    impl Importer for FakeImporter {
        async fn run(
            &self,
            _batch: &str,
            _sink: mpsc::Sender<ImportedDocument>,
        ) -> Result<(), EngineError> {
            Ok(())
        }

        async fn resolve_refs(&self, refs: &LookupOutput) -> Result<Vec<String>, EngineError> {
            Ok(refs
                .references()
                .map(|r| format!("doc:{}", r))
                .collect())
        }
    }

    #[derive(Debug)]
    struct FakeProviders {
        storage: Arc<RecordingStorage>,
    }

    impl FakeProviders {
        fn new() -> Self {
            Self {
                storage: Arc::new(RecordingStorage::default()),
            }
        }
    }

    impl ProviderResolver for FakeProviders {
        fn embedder(&self, name: &str) -> Result<Box<dyn Embedder>, EngineError> {
            match name {
                "emb" => Ok(Box::new(FakeEmbedder)),
                _ => Err(EngineError::not_found("embedder", name)),
            }
        }

        fn completion(&self, name: &str) -> Result<Box<dyn CompletionService>, EngineError> {
            match name {
                "llm" => Ok(Box::new(UpperService)),
                _ => Err(EngineError::not_found("service", name)),
            }
        }

        fn storage(&self, name: &str) -> Result<Arc<dyn VectorStorage>, EngineError> {
            match name {
                "vec" => Ok(self.storage.clone()),
                _ => Err(EngineError::not_found("storage", name)),
            }
        }

        fn importer(&self, name: &str) -> Result<Box<dyn Importer>, EngineError> {
            match name {
                "files" => Ok(Box::new(FakeImporter)),
                _ => Err(EngineError::not_found("importer", name)),
            }
        }
    }

    fn executor() -> (StepExecutor, Arc<RecordingStorage>) {
        let providers = FakeProviders::new();
        let storage = providers.storage.clone();
        (StepExecutor::new(Arc::new(providers)), storage)
    }

    fn step(kind: StepKind, action: &str, provider: &str, params: &[(&str, &str)]) -> Step {
        Step {
            kind,
            action: action.into(),
            provider: provider.into(),
            params: params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            var: None,
        }
    }

    #[tokio::test]
    async fn test_embedder_generate_binds_default_var() {
        let (executor, _) = executor();
        let mut vars = VarStore::new();
        vars.bind(INPUT_VAR, Multivar::text("hello"));

        let step = step(StepKind::Embedder, "generate", "emb", &[("input", "$_input")]);
        let (var, value) = executor.execute(&step, &vars).await.unwrap();

        assert_eq!(var, "embedder");
        let embedding = value.unwrap();
        assert_eq!(
            embedding.as_embedding().unwrap(),
            &EmbeddingOutput::new(vec![5.0, 1.0])
        );
    }

    #[tokio::test]
    async fn test_unknown_provider_is_not_found() {
        let (executor, _) = executor();
        let vars = VarStore::new();

        let step = step(StepKind::Embedder, "generate", "nope", &[("input", "x")]);
        let err = executor.execute(&step, &vars).await.unwrap_err();

        assert!(matches!(err, EngineError::CapabilityNotFound { ref name, .. } if name == "nope"));
    }

    #[tokio::test]
    async fn test_unsupported_action() {
        let (executor, _) = executor();
        let vars = VarStore::new();

        let step = step(StepKind::Embedder, "tokenize", "emb", &[]);
        let err = executor.execute(&step, &vars).await.unwrap_err();

        assert!(
            matches!(err, EngineError::UnsupportedAction { ref action, .. } if action == "tokenize")
        );
    }

    #[tokio::test]
    async fn test_lookup_requires_integer_limit() {
        let (executor, _) = executor();
        let mut vars = VarStore::new();
        vars.bind("e", Multivar::Embedding(EmbeddingOutput::new(vec![1.0])));

        let step = step(
            StepKind::Storage,
            "lookup.cosine",
            "vec",
            &[
                ("embedding", "$e"),
                ("collection", "docs"),
                ("limit", "many"),
                ("threshold", "0.5"),
            ],
        );
        let err = executor.execute(&step, &vars).await.unwrap_err();

        assert!(matches!(err, EngineError::ParamTypeInvalid { ref param, .. } if param == "limit"));
    }

    #[tokio::test]
    async fn test_lookup_missing_threshold() {
        let (executor, _) = executor();
        let mut vars = VarStore::new();
        vars.bind("e", Multivar::Embedding(EmbeddingOutput::new(vec![1.0])));

        let step = step(
            StepKind::Storage,
            "lookup.cosine",
            "vec",
            &[("embedding", "$e"), ("collection", "docs"), ("limit", "2")],
        );
        let err = executor.execute(&step, &vars).await.unwrap_err();

        assert!(matches!(err, EngineError::ParamMissing { ref param } if param == "threshold"));
    }

    #[tokio::test]
    async fn test_lookup_rejects_non_embedding_param() {
        let (executor, _) = executor();
        let mut vars = VarStore::new();
        vars.bind("e", Multivar::text("not an embedding"));

        let step = step(
            StepKind::Storage,
            "lookup.cosine",
            "vec",
            &[
                ("embedding", "$e"),
                ("collection", "docs"),
                ("limit", "2"),
                ("threshold", "0.5"),
            ],
        );
        let err = executor.execute(&step, &vars).await.unwrap_err();

        assert!(matches!(err, EngineError::ParamTypeInvalid { .. }));
    }

    #[tokio::test]
    async fn test_lookup_binds_custom_var() {
        let (executor, _) = executor();
        let mut vars = VarStore::new();
        vars.bind("e", Multivar::Embedding(EmbeddingOutput::new(vec![1.0])));

        let mut lookup = step(
            StepKind::Storage,
            "lookup.cosine",
            "vec",
            &[
                ("embedding", "$e"),
                ("collection", "docs"),
                ("limit", "1"),
                ("threshold", "0.1"),
            ],
        );
        lookup.var = Some("matches".into());

        let (var, value) = executor.execute(&lookup, &vars).await.unwrap();

        assert_eq!(var, "matches");
        let refs = value.unwrap();
        assert_eq!(refs.as_lookup().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_insert_records_row_and_returns_empty_lookup() {
        let (executor, storage) = executor();
        let mut vars = VarStore::new();
        vars.bind("e", Multivar::Embedding(EmbeddingOutput::new(vec![1.0])));
        vars.bind("_ref", Multivar::text("a.txt"));
        vars.bind("_batch", Multivar::text("b-1"));

        let step = step(
            StepKind::Storage,
            "insert.embedding",
            "vec",
            &[
                ("embedding", "$e"),
                ("collection", "docs"),
                ("ref", "$_ref"),
                ("batch", "$_batch"),
            ],
        );
        let (_, value) = executor.execute(&step, &vars).await.unwrap();

        assert!(value.unwrap().as_lookup().unwrap().is_empty());
        assert_eq!(
            storage.inserts.lock().unwrap().as_slice(),
            &[("docs".to_string(), "a.txt".to_string(), "b-1".to_string())]
        );
    }

    #[tokio::test]
    async fn test_cleanup_produces_no_value() {
        let (executor, storage) = executor();
        let mut vars = VarStore::new();
        vars.bind("_batch", Multivar::text("b-2"));

        let step = step(
            StepKind::Storage,
            "cleanup",
            "vec",
            &[("collection", "docs"), ("batch", "$_batch")],
        );
        let (var, value) = executor.execute(&step, &vars).await.unwrap();

        assert_eq!(var, "storage");
        assert!(value.is_none());
        assert_eq!(
            storage.cleanups.lock().unwrap().as_slice(),
            &[("docs".to_string(), "b-2".to_string())]
        );
    }

    #[tokio::test]
    async fn test_completion_renders_prompt_before_calling() {
        let (executor, _) = executor();
        let mut vars = VarStore::new();
        vars.bind("q", Multivar::text("hi"));

        let step = step(
            StepKind::Service,
            "completion",
            "llm",
            &[("prompt", "say $q twice: $q")],
        );
        let (var, value) = executor.execute(&step, &vars).await.unwrap();

        assert_eq!(var, "service");
        assert_eq!(
            value.unwrap().as_completion().unwrap().text,
            "SAY HI TWICE: HI"
        );
    }

    #[tokio::test]
    async fn test_resolve_refs_joins_documents() {
        let (executor, _) = executor();
        let mut vars = VarStore::new();
        vars.bind(
            "hits",
            Multivar::Lookup(LookupOutput::new(vec![
                ScoredRef::new("a.txt", 0.9),
                ScoredRef::new("b.txt", 0.5),
            ])),
        );

        let step = step(
            StepKind::Importer,
            "resolve.refs",
            "files",
            &[("refs", "$hits")],
        );
        let (var, value) = executor.execute(&step, &vars).await.unwrap();

        assert_eq!(var, "importer");
        let imported = value.unwrap();
        let docs = imported.as_imported().unwrap();
        assert_eq!(docs.documents, vec!["doc:a.txt", "doc:b.txt"]);
        assert_eq!(docs.combined, "doc:a.txt doc:b.txt");
    }

    #[tokio::test]
    async fn test_resolve_refs_custom_separator() {
        let (executor, _) = executor();
        let mut vars = VarStore::new();
        vars.bind(
            "hits",
            Multivar::Lookup(LookupOutput::new(vec![
                ScoredRef::new("a.txt", 0.9),
                ScoredRef::new("b.txt", 0.5),
            ])),
        );

        let step = step(
            StepKind::Importer,
            "resolve.refs",
            "files",
            &[("refs", "$hits"), ("separator", "\n---\n")],
        );
        let (_, value) = executor.execute(&step, &vars).await.unwrap();

        assert_eq!(
            value.unwrap().as_imported().unwrap().combined,
            "doc:a.txt\n---\ndoc:b.txt"
        );
    }

    #[tokio::test]
    async fn test_resolve_refs_rejects_non_lookup() {
        let (executor, _) = executor();
        let mut vars = VarStore::new();
        vars.bind("hits", Multivar::text("a.txt b.txt"));

        let step = step(
            StepKind::Importer,
            "resolve.refs",
            "files",
            &[("refs", "$hits")],
        );
        let err = executor.execute(&step, &vars).await.unwrap_err();

        assert!(matches!(err, EngineError::ParamTypeInvalid { ref param, .. } if param == "refs"));
    }
}
