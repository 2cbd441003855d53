// ==========================================
// 毛利级联定价引擎 - 预览估算器
// ==========================================
// 职责: 对"假想规则形态"（可未持久化）做只读试算:
//       命中数 / 基准价与投影价的 avg-min-max / 有界随机抽样
// 红线: 必须复用 RuleMatcher 的谓词——预览命中集恒等于
//       同形规则持久化后级联的命中集；零命中返回零值聚合，不报错
// ==========================================

use crate::domain::rule::RuleMatchers;
use crate::domain::types::RuleType;
use crate::engine::pricing::{margin_price, offer_final_price, round_money};
use crate::engine::rule_matcher::RuleMatcher;
use crate::repository::{ProductRepository, RepositoryResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// ==========================================
// 预览配置
// ==========================================
#[derive(Debug, Clone)]
pub struct PreviewConfig {
    /// 随机抽样条数上限
    pub sample_size: usize,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self { sample_size: 10 }
    }
}

// ==========================================
// 预览结果类型
// ==========================================

/// 价格统计（输出一律 2 位小数）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceStats {
    pub avg: f64,
    pub min: f64,
    pub max: f64,
}

/// 抽样条目（附投影价；特价商品再附折后投影价）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewSampleItem {
    pub sku_code: String,
    pub product_type: String,
    pub brand: String,
    pub base_price: f64,
    pub projected_price: f64,
    /// 投影最终售价: 特价商品为折后价，其余等于投影价
    pub projected_final_price: f64,
}

/// 规则预览结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulePreview {
    pub matched_count: i64,
    pub base_price: PriceStats,
    pub projected_price: PriceStats,
    pub sample: Vec<PreviewSampleItem>,
}

// ==========================================
// PreviewEstimator - 预览估算器
// ==========================================
pub struct PreviewEstimator {
    product_repo: Arc<ProductRepository>,
    config: PreviewConfig,
}

impl PreviewEstimator {
    /// 创建新的预览估算器
    pub fn new(product_repo: Arc<ProductRepository>, config: PreviewConfig) -> Self {
        Self {
            product_repo,
            config,
        }
    }

    /// 带默认配置创建
    pub fn with_default_config(product_repo: Arc<ProductRepository>) -> Self {
        Self::new(product_repo, PreviewConfig::default())
    }

    /// 试算假想规则形态（只读，不需要与级联协调）
    pub fn preview(
        &self,
        rule_type: RuleType,
        matchers: &RuleMatchers,
        margin_percentage: f64,
    ) -> RepositoryResult<RulePreview> {
        let predicate = RuleMatcher::predicate(rule_type, matchers);

        let aggregates = self
            .product_repo
            .preview_aggregates(&predicate, margin_percentage)?;

        // 零命中 → 零值聚合，绝不报错
        let sample = if aggregates.matched_count == 0 {
            vec![]
        } else {
            self.product_repo
                .sample(&predicate, self.config.sample_size)?
                .into_iter()
                .map(|p| {
                    let projected = margin_price(p.base_price, margin_percentage);
                    PreviewSampleItem {
                        projected_price: projected,
                        projected_final_price: offer_final_price(
                            projected,
                            p.is_special_offer,
                            p.offer_discount_percentage,
                        ),
                        sku_code: p.sku_code,
                        product_type: p.product_type,
                        brand: p.brand,
                        base_price: round_money(p.base_price),
                    }
                })
                .collect()
        };

        Ok(RulePreview {
            matched_count: aggregates.matched_count,
            base_price: PriceStats {
                avg: round_money(aggregates.base_avg),
                min: round_money(aggregates.base_min),
                max: round_money(aggregates.base_max),
            },
            projected_price: PriceStats {
                avg: round_money(aggregates.projected_avg),
                min: round_money(aggregates.projected_min),
                max: round_money(aggregates.projected_max),
            },
            sample,
        })
    }
}
