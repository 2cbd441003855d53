// ==========================================
// 毛利级联定价引擎 - 审计日志领域模型
// ==========================================
// 红线: 所有定价相关写入必须记录；日志一经写入不可变
// 说明: 更新/删除携带完整的前置状态快照 (rollback_json)，
//       单凭该快照即可重建旧状态，不依赖其他事实来源
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::domain::types::AuditAction;

// ==========================================
// AuditLogEntry - 审计日志条目
// ==========================================
// 对齐: audit_log 表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    // ===== 主键与动作 =====
    pub audit_id: String,          // 日志ID (UUID v4)
    pub action: AuditAction,       // 动作类型
    pub rule_id: Option<String>,   // 关联规则 (BulkApply 为 None)
    pub performed_by: String,      // 操作人
    pub performed_at: NaiveDateTime, // 操作时间

    // ===== 快照负载 =====
    pub rule_snapshot_json: Option<JsonValue>, // 变更后规则快照
    pub rollback_json: Option<JsonValue>,      // 变更前回滚快照 (更新/删除)

    // ===== BulkApply 汇总 =====
    // 取舍: 只记总量不记每规则明细（既定的信息损失权衡，非缺陷）
    pub affected_product_count: Option<i64>, // 受影响商品数
    pub applied_rule_count: Option<i64>,     // 参与级联的规则数

    pub detail: Option<String>, // 补充描述
}

impl AuditLogEntry {
    /// 创建新的审计条目
    pub fn new(audit_id: String, action: AuditAction, performed_by: String) -> Self {
        Self {
            audit_id,
            action,
            rule_id: None,
            performed_by,
            performed_at: chrono::Utc::now().naive_utc(),
            rule_snapshot_json: None,
            rollback_json: None,
            affected_product_count: None,
            applied_rule_count: None,
            detail: None,
        }
    }

    /// 关联规则ID
    pub fn with_rule_id(mut self, rule_id: String) -> Self {
        self.rule_id = Some(rule_id);
        self
    }

    /// 设置变更后快照
    ///
    /// JSON 转换由调用方完成并显式处理失败，这里只接收成品值
    pub fn with_snapshot(mut self, snapshot: JsonValue) -> Self {
        self.rule_snapshot_json = Some(snapshot);
        self
    }

    /// 设置变更前回滚快照
    pub fn with_rollback(mut self, prior: JsonValue) -> Self {
        self.rollback_json = Some(prior);
        self
    }

    /// 设置批量应用汇总
    pub fn with_bulk_counts(mut self, affected_products: i64, applied_rules: i64) -> Self {
        self.affected_product_count = Some(affected_products);
        self.applied_rule_count = Some(applied_rules);
        self
    }

    /// 设置补充描述
    pub fn with_detail(mut self, detail: String) -> Self {
        self.detail = Some(detail);
        self
    }
}
