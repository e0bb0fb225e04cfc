//! # Orchestration System
//!
//! Wires the orchestration services to one repository, one dispatcher and the
//! loaded recipe catalog. Construction fails if the catalog cannot back a
//! resolver, so a process never serves traffic with a bad configuration.

use crate::config::ConfigManager;
use crate::database::{DatabaseConnection, DatabaseMigrations};
use crate::error::Result;
use crate::messaging::{BroadcastWorkDispatcher, WorkDispatcher};
use crate::orchestration::administration::AdministrationService;
use crate::orchestration::hierarchy_builder::HierarchyBuilder;
use crate::orchestration::identifiers::{IdGenerator, TimeOrderedIdGenerator};
use crate::orchestration::recipe_resolver::RecipeResolver;
use crate::orchestration::reconciliation::EnhancementReconciler;
use crate::orchestration::request_processor::RequestProcessor;
use crate::orchestration::result_processor::ResultProcessor;
use crate::orchestration::retry_engine::RetryEngine;
use crate::repository::{InMemoryStatusRepository, PgStatusRepository, StatusRepository};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone)]
pub struct OrchestrationSystem {
    config_manager: Arc<ConfigManager>,
    resolver: Arc<RecipeResolver>,
    repository: Arc<dyn StatusRepository>,
    dispatcher: Arc<dyn WorkDispatcher>,
    request_processor: RequestProcessor,
    result_processor: ResultProcessor,
    administration: AdministrationService,
}

impl OrchestrationSystem {
    pub fn new(
        config_manager: Arc<ConfigManager>,
        repository: Arc<dyn StatusRepository>,
        dispatcher: Arc<dyn WorkDispatcher>,
        ids: Arc<dyn IdGenerator>,
    ) -> Result<Self> {
        let resolver = Arc::new(RecipeResolver::from_catalog(config_manager.recipes())?);
        let builder = HierarchyBuilder::new(resolver.clone(), ids.clone());
        let retry_engine = RetryEngine::new(repository.clone(), dispatcher.clone());
        let reconciler = EnhancementReconciler::new(repository.clone(), ids);

        info!(
            environment = %config_manager.config().environment,
            target_types = ?resolver.target_types(),
            "Orchestration system assembled"
        );

        Ok(Self {
            request_processor: RequestProcessor::new(builder, repository.clone(), dispatcher.clone()),
            result_processor: ResultProcessor::new(repository.clone(), dispatcher.clone()),
            administration: AdministrationService::new(repository.clone(), retry_engine, reconciler),
            config_manager,
            resolver,
            repository,
            dispatcher,
        })
    }

    /// In-process store and broadcast transport, for tests and local runs
    pub fn in_memory(
        config_manager: Arc<ConfigManager>,
        dispatcher: Arc<BroadcastWorkDispatcher>,
    ) -> Result<Self> {
        Self::new(
            config_manager,
            Arc::new(InMemoryStatusRepository::new()),
            dispatcher,
            Arc::new(TimeOrderedIdGenerator),
        )
    }

    /// Connect to PostgreSQL, apply pending migrations and assemble
    pub async fn connect(
        config_manager: Arc<ConfigManager>,
        dispatcher: Arc<dyn WorkDispatcher>,
    ) -> Result<Self> {
        let connection = DatabaseConnection::connect(&config_manager.config().database).await?;
        DatabaseMigrations::run_all(connection.pool()).await?;
        let repository = Arc::new(PgStatusRepository::new(connection.pool().clone()));
        Self::new(
            config_manager,
            repository,
            dispatcher,
            Arc::new(TimeOrderedIdGenerator),
        )
    }

    pub fn config_manager(&self) -> &Arc<ConfigManager> {
        &self.config_manager
    }

    pub fn resolver(&self) -> &RecipeResolver {
        &self.resolver
    }

    pub fn repository(&self) -> &Arc<dyn StatusRepository> {
        &self.repository
    }

    pub fn dispatcher(&self) -> &Arc<dyn WorkDispatcher> {
        &self.dispatcher
    }

    pub fn requests(&self) -> &RequestProcessor {
        &self.request_processor
    }

    pub fn results(&self) -> &ResultProcessor {
        &self.result_processor
    }

    pub fn administration(&self) -> &AdministrationService {
        &self.administration
    }
}
