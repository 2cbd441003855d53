// ==========================================
// 毛利级联定价引擎 - 审计记录器
// ==========================================
// 红线: 每个变更动作恰好一条不可变审计条目
// 说明: 更新/删除写入完整的前置状态快照（rollback_json），
//       单凭快照即可重建旧状态；BulkApply 只记总量不记
//       每规则明细（既定取舍）
// ==========================================

use crate::domain::audit_log::AuditLogEntry;
use crate::domain::rule::MarginRule;
use crate::domain::types::AuditAction;
use crate::repository::{AuditLogRepository, RepositoryError, RepositoryResult};
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use uuid::Uuid;

/// 快照转 JSON，失败按字段值错误上抛（不静默丢快照）
fn to_snapshot_json<T: Serialize>(field: &str, value: &T) -> RepositoryResult<JsonValue> {
    serde_json::to_value(value).map_err(|e| RepositoryError::FieldValueError {
        field: field.to_string(),
        message: format!("快照序列化失败: {}", e),
    })
}

// ==========================================
// AuditRecorder - 审计记录器
// ==========================================
pub struct AuditRecorder {
    audit_repo: Arc<AuditLogRepository>,
}

impl AuditRecorder {
    /// 创建新的审计记录器
    pub fn new(audit_repo: Arc<AuditLogRepository>) -> Self {
        Self { audit_repo }
    }

    /// 记录规则创建
    pub fn record_rule_created(
        &self,
        rule: &MarginRule,
        performed_by: &str,
    ) -> RepositoryResult<String> {
        let entry = AuditLogEntry::new(
            Uuid::new_v4().to_string(),
            AuditAction::RuleCreated,
            performed_by.to_string(),
        )
        .with_rule_id(rule.rule_id.clone())
        .with_snapshot(to_snapshot_json("rule_snapshot_json", rule)?);
        self.audit_repo.append(&entry)
    }

    /// 记录规则更新（前置状态完整入回滚快照）
    pub fn record_rule_updated(
        &self,
        before: &MarginRule,
        after: &MarginRule,
        performed_by: &str,
    ) -> RepositoryResult<String> {
        let entry = AuditLogEntry::new(
            Uuid::new_v4().to_string(),
            AuditAction::RuleUpdated,
            performed_by.to_string(),
        )
        .with_rule_id(after.rule_id.clone())
        .with_snapshot(to_snapshot_json("rule_snapshot_json", after)?)
        .with_rollback(to_snapshot_json("rollback_json", before)?);
        self.audit_repo.append(&entry)
    }

    /// 记录规则删除（软删；前置状态完整入回滚快照）
    pub fn record_rule_deleted(
        &self,
        before: &MarginRule,
        performed_by: &str,
    ) -> RepositoryResult<String> {
        let entry = AuditLogEntry::new(
            Uuid::new_v4().to_string(),
            AuditAction::RuleDeleted,
            performed_by.to_string(),
        )
        .with_rule_id(before.rule_id.clone())
        .with_rollback(to_snapshot_json("rollback_json", before)?);
        self.audit_repo.append(&entry)
    }

    /// 记录批量级联应用（只记总量）
    pub fn record_bulk_apply(
        &self,
        affected_product_count: i64,
        applied_rule_count: i64,
        performed_by: &str,
    ) -> RepositoryResult<String> {
        let entry = AuditLogEntry::new(
            Uuid::new_v4().to_string(),
            AuditAction::BulkApply,
            performed_by.to_string(),
        )
        .with_bulk_counts(affected_product_count, applied_rule_count);
        self.audit_repo.append(&entry)
    }
}
