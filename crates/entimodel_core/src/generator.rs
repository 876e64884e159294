//! Generator orchestration: load, build, merge, validate, emit, save.

use crate::config::GeneratorConfig;
use crate::draft::EntityDraft;
use crate::error::ModelResult;
use crate::file::ModelFile;
use crate::finalize::build_current_model;
use crate::merge::{merge, MergeReport};
use crate::model::Model;
use crate::uid::UidGenerator;
use crate::view::MergedModel;
use tracing::{debug, info};

/// A back-end that renders bindings from the merged model.
///
/// Emitters run after validation and before the model file is written; an
/// error aborts the run and leaves the file untouched.
pub trait BindingEmitter {
    /// Emits bindings for the merged model.
    fn emit(&mut self, model: &MergedModel<'_>) -> ModelResult<()>;
}

/// Emitter that produces nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEmitter;

impl BindingEmitter for NoopEmitter {
    fn emit(&mut self, _model: &MergedModel<'_>) -> ModelResult<()> {
        Ok(())
    }
}

/// Result of a successful run.
#[derive(Debug)]
pub struct Outcome {
    /// The merged model as written to the file.
    pub model: Model,
    /// Changes made by the merge.
    pub report: MergeReport,
    /// Whether the run started a new model.
    pub created: bool,
}

/// Drives one generator run against a model file.
#[derive(Debug, Clone, Default)]
pub struct Generator {
    config: GeneratorConfig,
}

impl Generator {
    /// Creates a generator.
    #[must_use]
    pub fn new(config: GeneratorConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Builds the current model from the schema without touching the file.
    pub fn build_model(&self, drafts: &[EntityDraft]) -> ModelResult<Model> {
        build_current_model(drafts, &self.config.id_types)
    }

    /// Runs the generator without an emitter.
    pub fn run(&self, drafts: &[EntityDraft]) -> ModelResult<Outcome> {
        self.run_with(drafts, &mut NoopEmitter)
    }

    /// Runs the generator and hands the merged model to `emitter`.
    ///
    /// The model file stays locked for the whole run and is written only if
    /// every step succeeds.
    pub fn run_with(
        &self,
        drafts: &[EntityDraft],
        emitter: &mut dyn BindingEmitter,
    ) -> ModelResult<Outcome> {
        let mut file = ModelFile::open(&self.config.model_path, self.config.create_if_missing)?;
        let uids = UidGenerator::from_optional_seed(self.config.seed);

        let (mut stored, created) = match file.load()? {
            Some(mut model) => {
                model.set_uid_generator(uids);
                (model, false)
            }
            None => {
                debug!(path = %file.path().display(), "starting a new model");
                (Model::new(uids), true)
            }
        };

        let current = self.build_model(drafts)?;
        let report = merge(&current, &mut stored)?;
        if let Some(version) = self.config.version {
            stored.version = u64::from(version);
        }
        stored.validate()?;

        emitter.emit(&MergedModel::new(&stored))?;
        file.save(&stored)?;

        info!(
            path = %file.path().display(),
            entities = stored.entities.len(),
            changes = report.notices.len(),
            "model synchronized"
        );
        Ok(Outcome {
            model: stored,
            report,
            created,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::FieldDraft;
    use crate::error::ModelError;
    use crate::model::PropertyType;
    use tempfile::tempdir;

    struct Recorder(Vec<String>);

    impl BindingEmitter for Recorder {
        fn emit(&mut self, model: &MergedModel<'_>) -> ModelResult<()> {
            self.0 = model.entities().iter().map(|e| e.name.clone()).collect();
            Ok(())
        }
    }

    struct Failing;

    impl BindingEmitter for Failing {
        fn emit(&mut self, _model: &MergedModel<'_>) -> ModelResult<()> {
            Err(ModelError::Emitter {
                message: "disk full".into(),
            })
        }
    }

    fn schema() -> Vec<EntityDraft> {
        vec![EntityDraft::new("Task")
            .field(FieldDraft::new("id", PropertyType::Long).unsigned())
            .field(FieldDraft::new("text", PropertyType::String))]
    }

    #[test]
    fn emitter_sees_merged_model() {
        let temp = tempdir().unwrap();
        let config = GeneratorConfig::new()
            .model_path(temp.path().join("model.json"))
            .seed(1);
        let mut recorder = Recorder(Vec::new());
        let outcome = Generator::new(config).run_with(&schema(), &mut recorder).unwrap();
        assert!(outcome.created);
        assert_eq!(recorder.0, ["Task"]);
    }

    #[test]
    fn emitter_failure_writes_nothing() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("model.json");
        let config = GeneratorConfig::new().model_path(&path).seed(1);
        let err = Generator::new(config).run_with(&schema(), &mut Failing).unwrap_err();
        assert!(matches!(err, ModelError::Emitter { .. }));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn version_is_stamped() {
        let temp = tempdir().unwrap();
        let config = GeneratorConfig::new()
            .model_path(temp.path().join("model.json"))
            .seed(1)
            .version(7);
        let outcome = Generator::new(config).run(&schema()).unwrap();
        assert_eq!(outcome.model.version, 7);
    }

    #[test]
    fn second_run_loads_the_file() {
        let temp = tempdir().unwrap();
        let config = GeneratorConfig::new()
            .model_path(temp.path().join("model.json"))
            .seed(1);
        let generator = Generator::new(config);
        let first = generator.run(&schema()).unwrap();
        let second = generator.run(&schema()).unwrap();
        assert!(!second.created);
        assert!(second.report.is_empty());
        assert_eq!(first.model.entities[0].id, second.model.entities[0].id);
    }
}
