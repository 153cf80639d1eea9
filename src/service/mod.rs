pub mod account_service;
pub mod audit_service;
pub mod branch_service;
pub mod bulk;
pub mod cluster_service;
pub mod family_service;
pub mod import_service;
pub mod person_service;
pub mod report_service;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
    auth::AuthService,
    config::Settings,
    domain::Actor,
    error::Result,
    export::Exportable,
    repository::*,
};

pub use account_service::{AccountService, LoginOutcome};
pub use audit_service::AuditService;
pub use branch_service::BranchService;
pub use cluster_service::ClusterService;
pub use family_service::FamilyService;
pub use import_service::ImportService;
pub use person_service::PersonService;
pub use report_service::ReportService;

/// The list/create/read/update/delete surface every managed collection shares.
#[async_trait]
pub trait CrudService: Send + Sync + 'static {
    type Item: Exportable + Clone + Serialize + Send + Sync + 'static;
    type Create: DeserializeOwned + Send + 'static;
    type Update: DeserializeOwned + Send + 'static;

    /// Entity name used in audit entries and error messages.
    const ENTITY: &'static str;

    fn from_context(context: &ServiceContext) -> &Self
    where
        Self: Sized;

    async fn list_all(&self) -> Result<Vec<Self::Item>>;
    async fn get(&self, id: Uuid) -> Result<Self::Item>;
    async fn create(&self, actor: &Actor, request: Self::Create) -> Result<Self::Item>;
    async fn update(&self, actor: &Actor, id: Uuid, request: Self::Update) -> Result<Self::Item>;
    async fn delete(&self, actor: &Actor, id: Uuid) -> Result<()>;
}

pub struct ServiceContext {
    pub person_repo: Arc<dyn PersonRepository>,
    pub family_repo: Arc<dyn FamilyRepository>,
    pub cluster_repo: Arc<dyn ClusterRepository>,
    pub report_repo: Arc<dyn ReportRepository>,
    pub branch_repo: Arc<dyn BranchRepository>,
    pub auth_service: Arc<AuthService>,
    pub audit_service: Arc<AuditService>,
    pub person_service: PersonService,
    pub family_service: FamilyService,
    pub cluster_service: ClusterService,
    pub report_service: ReportService,
    pub branch_service: BranchService,
    pub account_service: AccountService,
    pub import_service: ImportService,
    pub db_pool: SqlitePool,
}

impl ServiceContext {
    pub fn new(db_pool: SqlitePool, settings: &Settings) -> Self {
        let person_repo: Arc<dyn PersonRepository> =
            Arc::new(SqlitePersonRepository::new(db_pool.clone()));
        let family_repo: Arc<dyn FamilyRepository> =
            Arc::new(SqliteFamilyRepository::new(db_pool.clone()));
        let cluster_repo: Arc<dyn ClusterRepository> =
            Arc::new(SqliteClusterRepository::new(db_pool.clone()));
        let report_repo: Arc<dyn ReportRepository> =
            Arc::new(SqliteReportRepository::new(db_pool.clone()));
        let branch_repo: Arc<dyn BranchRepository> =
            Arc::new(SqliteBranchRepository::new(db_pool.clone()));
        let reset_repo: Arc<dyn PasswordResetRepository> =
            Arc::new(SqlitePasswordResetRepository::new(db_pool.clone()));
        let lock_repo: Arc<dyn LockedAccountRepository> =
            Arc::new(SqliteLockedAccountRepository::new(db_pool.clone()));
        let audit_repo: Arc<dyn AuditRepository> =
            Arc::new(SqliteAuditRepository::new(db_pool.clone()));

        let auth_service = Arc::new(AuthService::new(db_pool.clone()));
        let audit_service = Arc::new(AuditService::new(audit_repo));

        let person_service = PersonService::new(
            person_repo.clone(),
            branch_repo.clone(),
            audit_service.clone(),
        );
        let family_service = FamilyService::new(
            family_repo.clone(),
            person_repo.clone(),
            audit_service.clone(),
        );
        let cluster_service = ClusterService::new(
            cluster_repo.clone(),
            person_repo.clone(),
            family_repo.clone(),
            branch_repo.clone(),
            audit_service.clone(),
        );
        let report_service = ReportService::new(
            report_repo.clone(),
            cluster_repo.clone(),
            person_repo.clone(),
            audit_service.clone(),
        );
        let branch_service = BranchService::new(branch_repo.clone(), audit_service.clone());
        let account_service = AccountService::new(
            person_repo.clone(),
            reset_repo,
            lock_repo,
            auth_service.clone(),
            audit_service.clone(),
            settings.auth.clone(),
        );
        let import_service = ImportService::new(
            person_service.clone(),
            audit_service.clone(),
            settings.import.clone(),
        );

        Self {
            person_repo,
            family_repo,
            cluster_repo,
            report_repo,
            branch_repo,
            auth_service,
            audit_service,
            person_service,
            family_service,
            cluster_service,
            report_service,
            branch_service,
            account_service,
            import_service,
            db_pool,
        }
    }
}
