// ==========================================
// 商品毛利级联定价引擎 - 核心库
// ==========================================
// 技术栈: Rust + SQLite (rusqlite)
// 系统定位: 分层规则的级联定价，预览/审计/回滚纪律
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{AuditAction, RuleStatus, RuleType};

// 领域实体
pub use domain::{AuditLogEntry, MarginRule, Product, RuleDraft, RuleMatchers, RulePatch};

// 仓储
pub use repository::{
    AuditLogRepository, MarginRuleRepository, ProductField, ProductPredicate, ProductRepository,
};

// 引擎
pub use engine::{
    AuditRecorder, CascadeApplier, CascadeCancelToken, CascadeError, CascadeReport,
    PreviewEstimator, RuleLifecycleGuard, RuleMatcher, RulePreview,
};

// API
pub use api::{ApiError, ApplyOutcome, AuditStatus, PricingApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "商品毛利级联定价引擎";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
