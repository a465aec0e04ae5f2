//! Workflow repository: where `workflow` steps find nested definitions.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use flowline_types::workflow::WorkflowDefinition;

use super::{BoxFuture, CapabilityError};

/// Looks up stored workflow definitions.
pub trait WorkflowRepository: Send + Sync + 'static {
    /// Find a definition by id or slug. `Ok(None)` when nothing matches.
    fn find_definition(
        &self,
        id_or_slug: &str,
    ) -> impl Future<Output = Result<Option<WorkflowDefinition>, CapabilityError>> + Send;
}

pub trait WorkflowRepositoryDyn: Send + Sync {
    fn find_definition_boxed<'a>(
        &'a self,
        id_or_slug: &'a str,
    ) -> BoxFuture<'a, Result<Option<WorkflowDefinition>, CapabilityError>>;
}

impl<T: WorkflowRepository> WorkflowRepositoryDyn for T {
    fn find_definition_boxed<'a>(
        &'a self,
        id_or_slug: &'a str,
    ) -> BoxFuture<'a, Result<Option<WorkflowDefinition>, CapabilityError>> {
        Box::pin(self.find_definition(id_or_slug))
    }
}

pub type SharedWorkflowRepository = Arc<dyn WorkflowRepositoryDyn>;

/// Repository backed by a map. Definitions are reachable by their key and
/// by their `id` and `name` fields.
#[derive(Debug, Default, Clone)]
pub struct InMemoryWorkflowRepository {
    definitions: HashMap<String, WorkflowDefinition>,
}

impl InMemoryWorkflowRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, definition: WorkflowDefinition) {
        self.definitions.insert(key.into(), definition);
    }

    pub fn with(mut self, key: impl Into<String>, definition: WorkflowDefinition) -> Self {
        self.insert(key, definition);
        self
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

impl WorkflowRepository for InMemoryWorkflowRepository {
    async fn find_definition(
        &self,
        id_or_slug: &str,
    ) -> Result<Option<WorkflowDefinition>, CapabilityError> {
        if let Some(def) = self.definitions.get(id_or_slug) {
            return Ok(Some(def.clone()));
        }
        Ok(self
            .definitions
            .values()
            .find(|def| {
                def.id.as_deref() == Some(id_or_slug) || def.name.as_deref() == Some(id_or_slug)
            })
            .cloned())
    }
}
