//! Filesystem-backed workflow repository.
//!
//! Definitions live as `.yaml`/`.yml`/`.json` files under one directory
//! (searched recursively). Each lookup rescans the directory, so edits are
//! picked up without a restart.

use std::path::{Path, PathBuf};

use flowline_core::capability::repository::WorkflowRepository;
use flowline_core::capability::CapabilityError;
use flowline_core::workflow::definition::discover_workflows;
use flowline_types::workflow::WorkflowDefinition;

#[derive(Debug, Clone)]
pub struct FsWorkflowRepository {
    dir: PathBuf,
}

impl FsWorkflowRepository {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

fn matches(path: &Path, def: &WorkflowDefinition, id_or_slug: &str) -> bool {
    def.id.as_deref() == Some(id_or_slug)
        || def.name.as_deref() == Some(id_or_slug)
        || path.file_stem().is_some_and(|stem| stem == id_or_slug)
}

impl WorkflowRepository for FsWorkflowRepository {
    async fn find_definition(
        &self,
        id_or_slug: &str,
    ) -> Result<Option<WorkflowDefinition>, CapabilityError> {
        let dir = self.dir.clone();
        let found = tokio::task::spawn_blocking(move || discover_workflows(&dir))
            .await
            .map_err(|e| CapabilityError::Repository(e.to_string()))?
            .map_err(|e| CapabilityError::Repository(e.to_string()))?;

        let definition = found
            .into_iter()
            .find(|(path, def)| matches(path, def, id_or_slug))
            .map(|(path, def)| {
                tracing::debug!(workflow = id_or_slug, ?path, "resolved workflow from disk");
                def
            });
        Ok(definition)
    }
}
