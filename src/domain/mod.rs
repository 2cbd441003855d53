// ==========================================
// 毛利级联定价引擎 - 领域层
// ==========================================
// 职责: 领域实体与封闭枚举，不依赖存储与引擎
// ==========================================

pub mod audit_log;
pub mod product;
pub mod rule;
pub mod types;

pub use audit_log::AuditLogEntry;
pub use product::Product;
pub use rule::{MarginRule, RuleDraft, RuleMatchers, RulePatch};
pub use types::{AuditAction, RuleStatus, RuleType};
