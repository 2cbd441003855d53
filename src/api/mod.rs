// ==========================================
// 毛利级联定价引擎 - API 层
// ==========================================
// 职责: 业务编排入口与对外错误分类
// ==========================================

pub mod error;
pub mod pricing_api;

pub use error::{ApiError, ApiResult};
pub use pricing_api::{ApplyOutcome, AuditStatus, PricingApi};
