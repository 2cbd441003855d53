// ==========================================
// 毛利级联定价引擎 - 商品领域模型
// ==========================================
// 说明: 商品是外部主数据，引擎只改定价相关字段
//       (applied_rule_id / calculated_price / final_price)
// ==========================================

use serde::{Deserialize, Serialize};

// ==========================================
// Product - 商品
// ==========================================
// 对齐: product 表
// 红线: applied_rule_id 是弱回引（无外键所有权），规则停用后
//       引用仍然保留——引擎从不主动解除认领
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub sku_code: String,                      // SKU (主键)
    pub product_type: String,                  // 品类
    pub categorisation: String,                // 分类自由文本 (子串匹配)
    pub brand: String,                         // 品牌
    pub base_price: f64,                       // 基准价
    pub applied_rule_id: Option<String>,       // 当前生效规则 (弱引用)
    pub calculated_price: Option<f64>,         // 加成后价格
    pub is_special_offer: bool,                // 是否特价
    pub offer_discount_percentage: Option<f64>, // 特价折扣率 (25 = 25%)
    pub final_price: Option<f64>,              // 最终售价
}

impl Product {
    /// 构建未定价的新商品（导入/测试用）
    pub fn new(
        sku_code: impl Into<String>,
        product_type: impl Into<String>,
        categorisation: impl Into<String>,
        brand: impl Into<String>,
        base_price: f64,
    ) -> Self {
        Self {
            sku_code: sku_code.into(),
            product_type: product_type.into(),
            categorisation: categorisation.into(),
            brand: brand.into(),
            base_price,
            applied_rule_id: None,
            calculated_price: None,
            is_special_offer: false,
            offer_discount_percentage: None,
            final_price: None,
        }
    }

    /// 设置特价信息
    pub fn with_special_offer(mut self, discount_percentage: f64) -> Self {
        self.is_special_offer = true;
        self.offer_discount_percentage = Some(discount_percentage);
        self
    }
}
