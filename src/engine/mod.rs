// ==========================================
// 毛利级联定价引擎 - 引擎层
// ==========================================
// 职责: 实现业务规则引擎，不拼 SQL（谓词交由仓储编译）
// 红线: 级联与预览共用 RuleMatcher 谓词；所有变更必过审计
// ==========================================

pub mod audit;
pub mod cascade;
pub mod events;
pub mod lifecycle;
pub mod preview;
pub mod pricing;
pub mod rule_matcher;

// 重导出核心引擎
pub use audit::AuditRecorder;
pub use cascade::{
    CascadeApplier, CascadeCancelToken, CascadeError, CascadeReport, RuleApplication,
};
pub use events::{
    CascadeEvent, CascadeEventPublisher, CascadeEventType, NoOpEventPublisher,
    OptionalEventPublisher,
};
pub use lifecycle::{LifecycleError, RuleLifecycleGuard};
pub use preview::{PreviewConfig, PreviewEstimator, PreviewSampleItem, PriceStats, RulePreview};
pub use rule_matcher::RuleMatcher;
