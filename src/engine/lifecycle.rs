// ==========================================
// 毛利级联定价引擎 - 规则生命周期守卫
// ==========================================
// 职责: 创建/更新/删除的不变量校验
// 不变量:
// 1. 默认规则永不允许删除（软删也不行），只能保持激活兜底
// 2. 同一时刻至多一条激活默认规则（写入时强制）
// 3. 状态只有单向 ACTIVE → INACTIVE，行永不物理删除
// 4. 必填匹配字段随 rule_type 强制（空白视为缺失）
// ==========================================

use crate::domain::rule::{MarginRule, RuleDraft, RuleMatchers};
use crate::domain::types::{RuleStatus, RuleType};
use crate::repository::{MarginRuleRepository, RepositoryError};
use std::sync::Arc;
use thiserror::Error;

// ==========================================
// LifecycleError - 生命周期校验错误
// ==========================================
#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("数据验证失败: {0}")]
    Validation(String),

    /// 默认规则删除保护（对任何调用方角色都成立，不可重试）
    #[error("默认规则受保护，禁止删除: rule_id={0}，只能停用非默认规则")]
    DefaultRuleProtected(String),

    #[error("已存在激活的默认规则: rule_id={0}，同一时刻至多一条")]
    DuplicateActiveDefault(String),

    #[error("无效的状态转换: from={from} to={to}")]
    InvalidStateTransition { from: String, to: String },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

// ==========================================
// RuleLifecycleGuard - 规则生命周期守卫
// ==========================================
pub struct RuleLifecycleGuard {
    rule_repo: Arc<MarginRuleRepository>,
}

impl RuleLifecycleGuard {
    /// 创建新的生命周期守卫
    pub fn new(rule_repo: Arc<MarginRuleRepository>) -> Self {
        Self { rule_repo }
    }

    /// 校验规则草稿（创建入口）
    pub fn validate_create(&self, draft: &RuleDraft) -> Result<(), LifecycleError> {
        validate_name(&draft.rule_name)?;
        validate_margin(draft.margin_percentage)?;
        validate_matchers(draft.rule_type, &draft.matchers)?;

        if draft.rule_type == RuleType::Default {
            if let Some(existing) = self.rule_repo.find_active_default(None)? {
                return Err(LifecycleError::DuplicateActiveDefault(existing.rule_id));
            }
        }
        Ok(())
    }

    /// 校验更新后的完整规则状态（补丁合并之后）
    pub fn validate_update(&self, updated: &MarginRule) -> Result<(), LifecycleError> {
        validate_name(&updated.rule_name)?;
        validate_margin(updated.margin_percentage)?;
        validate_matchers(updated.rule_type, &updated.matchers)?;

        if updated.rule_type == RuleType::Default && updated.status == RuleStatus::Active {
            if let Some(existing) = self
                .rule_repo
                .find_active_default(Some(&updated.rule_id))?
            {
                return Err(LifecycleError::DuplicateActiveDefault(existing.rule_id));
            }
        }
        Ok(())
    }

    /// 校验删除（软删）动作
    pub fn validate_delete(&self, rule: &MarginRule) -> Result<(), LifecycleError> {
        if rule.is_default() {
            return Err(LifecycleError::DefaultRuleProtected(rule.rule_id.clone()));
        }
        if rule.status == RuleStatus::Inactive {
            return Err(LifecycleError::InvalidStateTransition {
                from: "INACTIVE".to_string(),
                to: "INACTIVE".to_string(),
            });
        }
        Ok(())
    }
}

// ==========================================
// 字段级校验
// ==========================================

fn validate_name(name: &str) -> Result<(), LifecycleError> {
    if name.trim().is_empty() {
        return Err(LifecycleError::Validation(
            "规则名称不能为空".to_string(),
        ));
    }
    Ok(())
}

fn validate_margin(margin: f64) -> Result<(), LifecycleError> {
    // 负毛利率（降价）是一等公民，只拒绝非有限值
    if !margin.is_finite() {
        return Err(LifecycleError::Validation(format!(
            "毛利率必须是有限数值: {}",
            margin
        )));
    }
    Ok(())
}

fn validate_matchers(rule_type: RuleType, matchers: &RuleMatchers) -> Result<(), LifecycleError> {
    let missing = |field: &str| {
        Err(LifecycleError::Validation(format!(
            "规则类型 {} 缺少必填匹配字段: {}",
            rule_type.as_str(),
            field
        )))
    };
    match rule_type {
        RuleType::ProductOverride => {
            if RuleMatchers::normalized(&matchers.sku_code).is_none() {
                return missing("sku_code");
            }
        }
        RuleType::ProductTypeCategory => {
            if RuleMatchers::normalized(&matchers.product_type).is_none() {
                return missing("product_type");
            }
            if RuleMatchers::normalized(&matchers.category).is_none() {
                return missing("category");
            }
        }
        RuleType::ProductType => {
            if RuleMatchers::normalized(&matchers.product_type).is_none() {
                return missing("product_type");
            }
        }
        RuleType::Brand => {
            if RuleMatchers::normalized(&matchers.brand).is_none() {
                return missing("brand");
            }
        }
        RuleType::Category => {
            if RuleMatchers::normalized(&matchers.category).is_none() {
                return missing("category");
            }
        }
        RuleType::Default => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_name_rejected() {
        assert!(matches!(
            validate_name("  "),
            Err(LifecycleError::Validation(_))
        ));
        assert!(validate_name("默认加成").is_ok());
    }

    #[test]
    fn test_non_finite_margin_rejected_negative_allowed() {
        assert!(validate_margin(-15.0).is_ok());
        assert!(matches!(
            validate_margin(f64::NAN),
            Err(LifecycleError::Validation(_))
        ));
        assert!(matches!(
            validate_margin(f64::INFINITY),
            Err(LifecycleError::Validation(_))
        ));
    }

    #[test]
    fn test_required_matchers_per_rule_type() {
        let empty = RuleMatchers::default();
        assert!(validate_matchers(RuleType::ProductOverride, &empty).is_err());
        assert!(validate_matchers(RuleType::ProductTypeCategory, &empty).is_err());
        assert!(validate_matchers(RuleType::ProductType, &empty).is_err());
        assert!(validate_matchers(RuleType::Brand, &empty).is_err());
        assert!(validate_matchers(RuleType::Category, &empty).is_err());
        // 默认规则无必填匹配字段
        assert!(validate_matchers(RuleType::Default, &empty).is_ok());

        // 组合类型缺一不可
        let only_type = RuleMatchers {
            product_type: Some("Apparel".to_string()),
            ..Default::default()
        };
        assert!(validate_matchers(RuleType::ProductTypeCategory, &only_type).is_err());
    }
}
