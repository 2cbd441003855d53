// ==========================================
// 毛利级联定价引擎 - 定价 API（业务编排入口）
// ==========================================
// 职责:
// 1) 规则创建/更新/删除（全部过生命周期守卫 + 审计）
// 2) 全量级联应用（先改价后审计；审计失败以"已应用未审计"上抛）
// 3) 规则预览（只读试算）
// 4) 按审计条目回滚规则更新
// 说明: actor 为上游鉴权组件给出的主体ID，取主体是上游职责
// ==========================================

use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult};
use crate::domain::audit_log::AuditLogEntry;
use crate::domain::rule::{MarginRule, RuleDraft, RuleMatchers, RulePatch};
use crate::domain::types::{AuditAction, RuleStatus, RuleType};
use crate::engine::audit::AuditRecorder;
use crate::engine::cascade::{CascadeApplier, CascadeCancelToken, CascadeReport};
use crate::engine::events::{CascadeEventPublisher, OptionalEventPublisher};
use crate::engine::lifecycle::RuleLifecycleGuard;
use crate::engine::preview::{PreviewConfig, PreviewEstimator, RulePreview};
use crate::repository::{AuditLogRepository, MarginRuleRepository, ProductRepository};

// ==========================================
// 批量应用结果
// ==========================================

/// 级联后的审计落账状态
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AuditStatus {
    /// 审计已落账
    Recorded { audit_id: String },
    /// 价格变更已生效，但审计写入失败——调用方必须感知缺口，
    /// 引擎绝不回滚价格来"修复"审计
    Failed { reason: String },
}

/// 批量级联应用结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyOutcome {
    pub report: CascadeReport,
    pub audit: AuditStatus,
}

// ==========================================
// PricingApi
// ==========================================
pub struct PricingApi {
    rule_repo: Arc<MarginRuleRepository>,
    audit_repo: Arc<AuditLogRepository>,
    guard: RuleLifecycleGuard,
    cascade: CascadeApplier,
    estimator: PreviewEstimator,
    recorder: AuditRecorder,
}

impl PricingApi {
    /// 由仓储集合构建 API
    pub fn new(
        rule_repo: Arc<MarginRuleRepository>,
        product_repo: Arc<ProductRepository>,
        audit_repo: Arc<AuditLogRepository>,
        event_publisher: Option<Arc<dyn CascadeEventPublisher>>,
    ) -> Self {
        let event_publisher = match event_publisher {
            Some(p) => OptionalEventPublisher::with_publisher(p),
            None => OptionalEventPublisher::none(),
        };
        Self {
            guard: RuleLifecycleGuard::new(rule_repo.clone()),
            cascade: CascadeApplier::new(
                rule_repo.clone(),
                product_repo.clone(),
                event_publisher,
            ),
            estimator: PreviewEstimator::new(product_repo, PreviewConfig::default()),
            recorder: AuditRecorder::new(audit_repo.clone()),
            rule_repo,
            audit_repo,
        }
    }

    /// 从共享连接快速构建（所有仓储走同一连接）
    pub fn from_connection(
        conn: Arc<Mutex<Connection>>,
        event_publisher: Option<Arc<dyn CascadeEventPublisher>>,
    ) -> Self {
        Self::new(
            Arc::new(MarginRuleRepository::from_connection(conn.clone())),
            Arc::new(ProductRepository::from_connection(conn.clone())),
            Arc::new(AuditLogRepository::from_connection(conn)),
            event_publisher,
        )
    }

    // ==========================================
    // 规则生命周期
    // ==========================================

    /// 创建规则
    ///
    /// priority 由 rule_type 派生落库；创建动作写一条 RuleCreated 审计
    pub fn create_rule(&self, draft: RuleDraft, actor: &str) -> ApiResult<MarginRule> {
        self.guard.validate_create(&draft)?;

        let rule = MarginRule::from_draft(Uuid::new_v4().to_string(), draft, actor.to_string());
        self.rule_repo.insert(&rule)?;
        tracing::info!(
            "规则创建: rule_id={}, type={}, margin={}%",
            rule.rule_id,
            rule.rule_type.as_str(),
            rule.margin_percentage
        );

        self.recorder
            .record_rule_created(&rule, actor)
            .map_err(|e| ApiError::AuditWriteFailed(e.to_string()))?;
        Ok(rule)
    }

    /// 更新规则（rule_type 不可变；更新动作写 RuleUpdated 审计 + 回滚快照）
    pub fn update_rule(
        &self,
        rule_id: &str,
        patch: RulePatch,
        actor: &str,
    ) -> ApiResult<MarginRule> {
        if patch.is_empty() {
            return Err(ApiError::ValidationError(
                "更新补丁为空，至少变更一个字段".to_string(),
            ));
        }

        let before = self.rule_repo.find_by_id(rule_id)?;
        let updated = patch.apply_to(&before);
        self.guard.validate_update(&updated)?;

        self.rule_repo.update(&updated)?;
        tracing::info!("规则更新: rule_id={}", rule_id);

        self.recorder
            .record_rule_updated(&before, &updated, actor)
            .map_err(|e| ApiError::AuditWriteFailed(e.to_string()))?;
        Ok(updated)
    }

    /// 删除规则（软删: 单向 ACTIVE → INACTIVE；默认规则受保护）
    pub fn delete_rule(&self, rule_id: &str, actor: &str) -> ApiResult<()> {
        let rule = self.rule_repo.find_by_id(rule_id)?;
        self.guard.validate_delete(&rule)?;

        self.rule_repo.deactivate(rule_id)?;
        tracing::info!("规则停用（软删）: rule_id={}", rule_id);

        self.recorder
            .record_rule_deleted(&rule, actor)
            .map_err(|e| ApiError::AuditWriteFailed(e.to_string()))?;
        Ok(())
    }

    /// 按ID查询规则
    pub fn rule_by_id(&self, rule_id: &str) -> ApiResult<MarginRule> {
        Ok(self.rule_repo.find_by_id(rule_id)?)
    }

    // ==========================================
    // 级联应用
    // ==========================================

    /// 全量级联应用激活规则集
    ///
    /// 改价成功后写恰好一条 BulkApply 审计；审计写入失败时返回
    /// 成功结果 + AuditStatus::Failed（"已应用未审计"），绝不回滚价格
    pub fn apply_rules(
        &self,
        actor: &str,
        cancel: Option<&CascadeCancelToken>,
    ) -> ApiResult<ApplyOutcome> {
        let report = self.cascade.apply_all(cancel)?;

        let audit = match self.recorder.record_bulk_apply(
            report.reassigned_count,
            report.applied.len() as i64,
            actor,
        ) {
            Ok(audit_id) => AuditStatus::Recorded { audit_id },
            Err(e) => {
                tracing::warn!(
                    "级联已应用但审计写入失败: affected={}, rules={}, err={}",
                    report.reassigned_count,
                    report.applied.len(),
                    e
                );
                AuditStatus::Failed {
                    reason: e.to_string(),
                }
            }
        };

        Ok(ApplyOutcome { report, audit })
    }

    // ==========================================
    // 预览与回滚
    // ==========================================

    /// 只读试算假想规则形态（未持久化也可）
    pub fn preview_rule(
        &self,
        rule_type: RuleType,
        matchers: &RuleMatchers,
        margin_percentage: f64,
    ) -> ApiResult<RulePreview> {
        Ok(self
            .estimator
            .preview(rule_type, matchers, margin_percentage)?)
    }

    /// 按 RuleUpdated 审计条目回滚规则更新
    ///
    /// 仅接受 RuleUpdated 条目（回滚快照语义限定于更新）；
    /// 回滚本身也是一次更新，照常落 RuleUpdated 审计
    pub fn rollback_rule_update(&self, audit_id: &str, actor: &str) -> ApiResult<MarginRule> {
        let entry = self.audit_repo.find_by_id(audit_id)?;
        if entry.action != AuditAction::RuleUpdated {
            return Err(ApiError::ValidationError(format!(
                "审计条目 {} 不是规则更新（action={}），不可回滚",
                audit_id,
                entry.action.as_str()
            )));
        }
        let rollback_json = entry.rollback_json.ok_or_else(|| {
            ApiError::ValidationError(format!("审计条目 {} 缺少回滚快照", audit_id))
        })?;
        let prior: MarginRule = serde_json::from_value(rollback_json).map_err(|e| {
            ApiError::ValidationError(format!("回滚快照解析失败: {}", e))
        })?;

        let current = self.rule_repo.find_by_id(&prior.rule_id)?;

        // 单向状态红线: 更新之后被软删的规则不因回滚复活——
        // 回滚快照里的 status 是 ACTIVE，整行落库会绕过 ACTIVE → INACTIVE
        if current.status == RuleStatus::Inactive {
            return Err(ApiError::InvalidStateTransition {
                from: RuleStatus::Inactive.as_str().to_string(),
                to: RuleStatus::Active.as_str().to_string(),
            });
        }

        let mut restored = prior;
        restored.updated_at = chrono::Utc::now().naive_utc();
        self.guard.validate_update(&restored)?;

        self.rule_repo.update(&restored)?;
        tracing::info!(
            "规则回滚: rule_id={}, 依据审计条目 {}",
            restored.rule_id,
            audit_id
        );

        self.recorder
            .record_rule_updated(&current, &restored, actor)
            .map_err(|e| ApiError::AuditWriteFailed(e.to_string()))?;
        Ok(restored)
    }

    /// 最近审计条目（倒序）
    pub fn recent_audit_entries(&self, limit: usize) -> ApiResult<Vec<AuditLogEntry>> {
        Ok(self.audit_repo.list_recent(limit)?)
    }
}
