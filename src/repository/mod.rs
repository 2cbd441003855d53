// ==========================================
// 毛利级联定价引擎 - 数据仓储层
// ==========================================
// 红线: Repository 不做业务逻辑，只做数据映射与参数化查询
// ==========================================

pub mod audit_log_repo;
pub mod error;
pub mod predicate;
pub mod product_repo;
pub mod rule_repo;

pub use audit_log_repo::AuditLogRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use predicate::{ProductField, ProductPredicate};
pub use product_repo::{PreviewAggregates, ProductRepository};
pub use rule_repo::MarginRuleRepository;
