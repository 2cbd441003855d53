// ==========================================
// 毛利级联定价引擎 - 毛利规则领域模型
// ==========================================
// 红线: priority 由 rule_type 派生，写入时落库（级联认领谓词需要
//       在存储侧比较优先级），不允许调用方自由指定
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::types::{RuleStatus, RuleType};

// ==========================================
// RuleMatchers - 规则匹配字段
// ==========================================
// 说明: 仅与 rule_type 相关的字段会被填充，其余保持 None；
//       必填字段为空白时规则"什么都不匹配"，绝不退化为全匹配
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleMatchers {
    pub product_type: Option<String>, // 品类 (精确匹配)
    pub category: Option<String>,     // 分类 (大小写不敏感子串)
    pub brand: Option<String>,        // 品牌 (精确匹配)
    pub sku_code: Option<String>,     // SKU (精确匹配)
}

impl RuleMatchers {
    /// 取字段的规整值：去首尾空白，空白视为缺失
    pub fn normalized(value: &Option<String>) -> Option<&str> {
        value
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

// ==========================================
// MarginRule - 毛利规则
// ==========================================
// 对齐: margin_rule 表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarginRule {
    pub rule_id: String,           // 规则ID (UUID v4)
    pub rule_name: String,         // 规则名称
    pub rule_type: RuleType,       // 规则类型
    pub priority: i32,             // 优先级 (由 rule_type 派生, 1=最强)
    pub matchers: RuleMatchers,    // 匹配字段
    pub margin_percentage: f64,    // 毛利率 (15 = 15%, 允许负值做降价)
    pub status: RuleStatus,        // 状态 (ACTIVE/INACTIVE 单向)
    pub created_by: String,        // 创建人
    pub created_at: NaiveDateTime, // 创建时间
    pub updated_at: NaiveDateTime, // 更新时间
}

impl MarginRule {
    /// 由草稿构建新规则（派生 priority，初始 Active）
    pub fn from_draft(rule_id: String, draft: RuleDraft, created_by: String) -> Self {
        let now = chrono::Utc::now().naive_utc();
        Self {
            rule_id,
            rule_name: draft.rule_name,
            rule_type: draft.rule_type,
            priority: draft.rule_type.priority(),
            matchers: draft.matchers,
            margin_percentage: draft.margin_percentage,
            status: RuleStatus::Active,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }

    /// 是否为兜底默认规则
    pub fn is_default(&self) -> bool {
        self.rule_type == RuleType::Default
    }
}

// ==========================================
// RuleDraft - 规则草稿 (创建/预览共用的未持久化形态)
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleDraft {
    pub rule_name: String,
    pub rule_type: RuleType,
    pub matchers: RuleMatchers,
    pub margin_percentage: f64,
}

// ==========================================
// RulePatch - 规则更新补丁
// ==========================================
// 说明: rule_type 创建后不可变（priority 由其派生）；
//       状态流转只走 delete_rule，不经补丁
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RulePatch {
    pub rule_name: Option<String>,
    pub matchers: Option<RuleMatchers>,
    pub margin_percentage: Option<f64>,
}

impl RulePatch {
    /// 补丁是否为空（无任何字段变更）
    pub fn is_empty(&self) -> bool {
        self.rule_name.is_none() && self.matchers.is_none() && self.margin_percentage.is_none()
    }

    /// 应用补丁，返回更新后的规则（updated_at 置为当前时间）
    pub fn apply_to(&self, rule: &MarginRule) -> MarginRule {
        let mut updated = rule.clone();
        if let Some(name) = &self.rule_name {
            updated.rule_name = name.clone();
        }
        if let Some(matchers) = &self.matchers {
            updated.matchers = matchers.clone();
        }
        if let Some(margin) = self.margin_percentage {
            updated.margin_percentage = margin;
        }
        updated.updated_at = chrono::Utc::now().naive_utc();
        updated
    }
}
