// ==========================================
// 毛利级联定价引擎 - 规则匹配器
// ==========================================
// 职责: "规则 R 是否匹配商品 P" 的唯一事实来源，两种形态:
//   - matches():   内存纯谓词
//   - predicate(): 编译为存储侧 ProductPredicate
// 级联与预览都从这里取谓词，两边命中集恒等
// 红线: 必填匹配字段为空 → MatchNone，绝不静默全匹配
// ==========================================

use crate::domain::product::Product;
use crate::domain::rule::RuleMatchers;
use crate::domain::types::RuleType;
use crate::repository::predicate::{ProductField, ProductPredicate};

/// RuleMatcher - 规则匹配器（无状态）
pub struct RuleMatcher;

impl RuleMatcher {
    /// 内存纯谓词: 规则是否匹配商品
    pub fn matches(rule_type: RuleType, matchers: &RuleMatchers, product: &Product) -> bool {
        match rule_type {
            RuleType::ProductOverride => match RuleMatchers::normalized(&matchers.sku_code) {
                Some(sku) => product.sku_code == sku,
                None => false,
            },
            RuleType::ProductTypeCategory => {
                let product_type = RuleMatchers::normalized(&matchers.product_type);
                let category = RuleMatchers::normalized(&matchers.category);
                match (product_type, category) {
                    (Some(pt), Some(cat)) => {
                        product.product_type == pt && contains_ci(&product.categorisation, cat)
                    }
                    _ => false,
                }
            }
            RuleType::ProductType => match RuleMatchers::normalized(&matchers.product_type) {
                Some(pt) => product.product_type == pt,
                None => false,
            },
            RuleType::Brand => match RuleMatchers::normalized(&matchers.brand) {
                Some(brand) => product.brand == brand,
                None => false,
            },
            RuleType::Category => match RuleMatchers::normalized(&matchers.category) {
                Some(cat) => contains_ci(&product.categorisation, cat),
                None => false,
            },
            RuleType::Default => true,
        }
    }

    /// 编译为存储侧谓词（级联认领与预览聚合共用）
    pub fn predicate(rule_type: RuleType, matchers: &RuleMatchers) -> ProductPredicate {
        match rule_type {
            RuleType::ProductOverride => match RuleMatchers::normalized(&matchers.sku_code) {
                Some(sku) => ProductPredicate::Equals(ProductField::SkuCode, sku.to_string()),
                None => ProductPredicate::MatchNone,
            },
            RuleType::ProductTypeCategory => {
                let product_type = RuleMatchers::normalized(&matchers.product_type);
                let category = RuleMatchers::normalized(&matchers.category);
                match (product_type, category) {
                    (Some(pt), Some(cat)) => ProductPredicate::And(vec![
                        ProductPredicate::Equals(ProductField::ProductType, pt.to_string()),
                        ProductPredicate::ContainsCi(
                            ProductField::Categorisation,
                            cat.to_string(),
                        ),
                    ]),
                    _ => ProductPredicate::MatchNone,
                }
            }
            RuleType::ProductType => match RuleMatchers::normalized(&matchers.product_type) {
                Some(pt) => ProductPredicate::Equals(ProductField::ProductType, pt.to_string()),
                None => ProductPredicate::MatchNone,
            },
            RuleType::Brand => match RuleMatchers::normalized(&matchers.brand) {
                Some(brand) => ProductPredicate::Equals(ProductField::Brand, brand.to_string()),
                None => ProductPredicate::MatchNone,
            },
            RuleType::Category => match RuleMatchers::normalized(&matchers.category) {
                Some(cat) => {
                    ProductPredicate::ContainsCi(ProductField::Categorisation, cat.to_string())
                }
                None => ProductPredicate::MatchNone,
            },
            RuleType::Default => ProductPredicate::MatchAll,
        }
    }
}

/// 大小写不敏感子串（ASCII 折叠，与 SQLite lower() 同口径）
fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack
        .to_ascii_lowercase()
        .contains(&needle.to_ascii_lowercase())
}
