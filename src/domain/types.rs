// ==========================================
// 毛利级联定价引擎 - 领域枚举类型
// ==========================================
// 职责: 规则类型/规则状态/审计动作的封闭枚举
// 红线: 优先级映射由 RuleType 自身持有（穷尽 match），
//       禁止游离的字典表（漏项会静默失配）
// ==========================================

use serde::{Deserialize, Serialize};

// ==========================================
// RuleType - 规则类型
// ==========================================
// 优先级: 数值越小越强，1 为最强
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    ProductOverride,     // 单品覆盖 (按 SKU)
    ProductTypeCategory, // 品类+分类组合
    ProductType,         // 品类
    Brand,               // 品牌
    Category,            // 分类 (大小写不敏感子串匹配)
    Default,             // 兜底默认规则
}

impl RuleType {
    /// 规则类型 → 优先级（派生值，1 = 最强）
    ///
    /// 穷尽 match：新增规则类型时编译器强制补全此表
    pub fn priority(&self) -> i32 {
        match self {
            RuleType::ProductOverride => 1,
            RuleType::ProductTypeCategory => 2,
            RuleType::ProductType => 3,
            RuleType::Brand => 4,
            RuleType::Category => 5,
            RuleType::Default => 6,
        }
    }

    /// 转换为字符串 (用于数据库存储)
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleType::ProductOverride => "product_override",
            RuleType::ProductTypeCategory => "product_type_category",
            RuleType::ProductType => "product_type",
            RuleType::Brand => "brand",
            RuleType::Category => "category",
            RuleType::Default => "default",
        }
    }

    /// 从字符串解析
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "product_override" => Some(RuleType::ProductOverride),
            "product_type_category" => Some(RuleType::ProductTypeCategory),
            "product_type" => Some(RuleType::ProductType),
            "brand" => Some(RuleType::Brand),
            "category" => Some(RuleType::Category),
            "default" => Some(RuleType::Default),
            _ => None,
        }
    }

    /// 全部规则类型（按优先级从强到弱）
    pub fn all() -> [RuleType; 6] {
        [
            RuleType::ProductOverride,
            RuleType::ProductTypeCategory,
            RuleType::ProductType,
            RuleType::Brand,
            RuleType::Category,
            RuleType::Default,
        ]
    }
}

// ==========================================
// RuleStatus - 规则状态
// ==========================================
// 红线: 软删除 = Active → Inactive 单向流转，永不删行，
//       保证历史回滚快照永远可重建
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RuleStatus {
    Active,
    Inactive,
}

impl RuleStatus {
    /// 转换为字符串 (用于数据库存储)
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleStatus::Active => "ACTIVE",
            RuleStatus::Inactive => "INACTIVE",
        }
    }

    /// 从字符串解析
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "ACTIVE" => Some(RuleStatus::Active),
            "INACTIVE" => Some(RuleStatus::Inactive),
            _ => None,
        }
    }
}

// ==========================================
// AuditAction - 审计动作类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditAction {
    RuleCreated, // 规则创建
    RuleUpdated, // 规则更新 (含回滚快照)
    RuleDeleted, // 规则删除 (软删，含回滚快照)
    BulkApply,   // 批量级联应用
}

impl AuditAction {
    /// 转换为字符串 (用于数据库存储)
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::RuleCreated => "RuleCreated",
            AuditAction::RuleUpdated => "RuleUpdated",
            AuditAction::RuleDeleted => "RuleDeleted",
            AuditAction::BulkApply => "BulkApply",
        }
    }

    /// 从字符串解析
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "RuleCreated" => Some(AuditAction::RuleCreated),
            "RuleUpdated" => Some(AuditAction::RuleUpdated),
            "RuleDeleted" => Some(AuditAction::RuleDeleted),
            "BulkApply" => Some(AuditAction::BulkApply),
            _ => None,
        }
    }
}
