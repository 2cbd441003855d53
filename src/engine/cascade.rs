// ==========================================
// 毛利级联定价引擎 - 级联应用器
// ==========================================
// 算法: 激活规则按 (priority ASC, rule_id ASC) 逐条认领商品；
//       强者先行，弱规则只能认领尚无更强归属的商品 → 整体幂等:
//       - 输入不变重跑 = 零行变更
//       - 新增更强规则重跑 = 恰好改写其命中集，其余不动
//       - 引擎从不解除已有认领
// 失败语义: 每条规则一步原子批量 UPDATE；某步失败即中止后续，
//       已完成的强规则认领保持完好，错误携带进度上下文，
//       重启永远安全（幂等）
// ==========================================

use crate::domain::rule::MarginRule;
use crate::engine::events::{CascadeEvent, CascadeEventType, OptionalEventPublisher};
use crate::engine::rule_matcher::RuleMatcher;
use crate::repository::error::RepositoryError;
use crate::repository::{MarginRuleRepository, ProductRepository};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

// ==========================================
// CascadeCancelToken - 级联取消令牌
// ==========================================
// 说明: 批量应用无内建超时，调用方持令牌在规则步之间取消
#[derive(Debug, Clone, Default)]
pub struct CascadeCancelToken {
    flag: Arc<AtomicBool>,
}

impl CascadeCancelToken {
    /// 创建新令牌
    pub fn new() -> Self {
        Self::default()
    }

    /// 请求取消（在下一个规则步边界生效）
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// 是否已请求取消
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

// ==========================================
// 级联结果类型
// ==========================================

/// 单条规则的应用记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleApplication {
    pub rule_id: String,
    pub rule_name: String,
    pub priority: i32,
    /// 本步认领/刷新的商品数
    pub affected_count: i64,
}

/// 级联应用报告
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CascadeReport {
    /// 参与级联的激活规则总数
    pub rules_total: usize,
    /// 实际完成的规则步数（未取消时等于 rules_total）
    pub rules_completed: usize,
    /// 每条规则的认领记录（引擎内可见；审计只记总量）
    pub applied: Vec<RuleApplication>,
    /// 本次运行认领/刷新的商品总数
    pub reassigned_count: i64,
    /// 运行结束后 calculated_price 非空的商品总数
    pub priced_product_count: i64,
}

/// 级联错误（携带部分进度上下文，重启永远安全）
#[derive(Error, Debug)]
pub enum CascadeError {
    #[error("级联在第 {rules_completed}/{rules_total} 步后被取消")]
    Cancelled {
        rules_completed: usize,
        rules_total: usize,
    },

    #[error(
        "规则 {rule_id} 批量更新失败（已完成 {rules_completed}/{rules_total} 步）: {source}"
    )]
    RuleStepFailed {
        rule_id: String,
        rules_completed: usize,
        rules_total: usize,
        #[source]
        source: RepositoryError,
    },

    #[error("加载激活规则失败: {0}")]
    LoadRulesFailed(#[source] RepositoryError),

    #[error("级联报告统计失败: {0}")]
    ReportFailed(#[source] RepositoryError),
}

// ==========================================
// CascadeApplier - 级联应用器
// ==========================================
pub struct CascadeApplier {
    rule_repo: Arc<MarginRuleRepository>,
    product_repo: Arc<ProductRepository>,
    event_publisher: OptionalEventPublisher,
}

impl CascadeApplier {
    /// 创建新的级联应用器
    pub fn new(
        rule_repo: Arc<MarginRuleRepository>,
        product_repo: Arc<ProductRepository>,
        event_publisher: OptionalEventPublisher,
    ) -> Self {
        Self {
            rule_repo,
            product_repo,
            event_publisher,
        }
    }

    /// 应用全量激活规则集
    ///
    /// # 参数
    /// - `cancel`: 取消令牌（None 表示不可取消）
    ///
    /// # 返回
    /// - `Ok(CascadeReport)`: 全部规则步完成
    /// - `Err(CascadeError)`: 取消或某步失败，携带已完成步数
    pub fn apply_all(
        &self,
        cancel: Option<&CascadeCancelToken>,
    ) -> Result<CascadeReport, CascadeError> {
        let rules = self
            .rule_repo
            .ordered_active()
            .map_err(CascadeError::LoadRulesFailed)?;
        let rules_total = rules.len();

        tracing::info!("级联开始: {} 条激活规则", rules_total);

        let mut applied: Vec<RuleApplication> = Vec::with_capacity(rules_total);
        let mut reassigned_count: i64 = 0;

        for (index, rule) in rules.iter().enumerate() {
            if let Some(token) = cancel {
                if token.is_cancelled() {
                    tracing::warn!("级联取消: 已完成 {}/{} 步", index, rules_total);
                    self.event_publisher.publish(CascadeEvent::summary(
                        CascadeEventType::CascadeCancelled,
                        index,
                        rules_total,
                        reassigned_count,
                    ));
                    return Err(CascadeError::Cancelled {
                        rules_completed: index,
                        rules_total,
                    });
                }
            }

            let affected = self.apply_rule_step(rule).map_err(|source| {
                tracing::error!(
                    "级联中止: 规则 {} 失败于第 {}/{} 步: {}",
                    rule.rule_id,
                    index + 1,
                    rules_total,
                    source
                );
                CascadeError::RuleStepFailed {
                    rule_id: rule.rule_id.clone(),
                    rules_completed: index,
                    rules_total,
                    source,
                }
            })?;

            reassigned_count += affected;
            tracing::debug!(
                "级联步 {}/{}: 规则 {} ({}) 认领 {} 个商品",
                index + 1,
                rules_total,
                rule.rule_id,
                rule.rule_name,
                affected
            );
            self.event_publisher.publish(CascadeEvent::step(
                rule.rule_id.clone(),
                index + 1,
                rules_total,
                affected,
            ));
            applied.push(RuleApplication {
                rule_id: rule.rule_id.clone(),
                rule_name: rule.rule_name.clone(),
                priority: rule.priority,
                affected_count: affected,
            });
        }

        let priced_product_count = self
            .product_repo
            .count_priced()
            .map_err(CascadeError::ReportFailed)?;

        tracing::info!(
            "级联完成: {} 步，认领 {} 个商品，已定价商品总数 {}",
            rules_total,
            reassigned_count,
            priced_product_count
        );
        self.event_publisher.publish(CascadeEvent::summary(
            CascadeEventType::CascadeCompleted,
            rules_total,
            rules_total,
            reassigned_count,
        ));

        Ok(CascadeReport {
            rules_total,
            rules_completed: rules_total,
            applied,
            reassigned_count,
            priced_product_count,
        })
    }

    /// 单条规则步: 一次原子条件批量 UPDATE
    fn apply_rule_step(&self, rule: &MarginRule) -> Result<i64, RepositoryError> {
        let predicate = RuleMatcher::predicate(rule.rule_type, &rule.matchers);
        let affected = self.product_repo.claim_for_rule(rule, &predicate)?;
        Ok(affected as i64)
    }
}
