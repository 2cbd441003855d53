// ==========================================
// 毛利级联定价引擎 - 定价计算
// ==========================================
// 舍入口径: 半数远离零，保留 2 位（与 SQLite ROUND(x, 2) 一致）
// 红线: Rust 侧与仓储 SQL 表达式必须同口径——预览价 = 落库价
// ==========================================

/// 金额舍入到 2 位小数（半数远离零）
pub fn round_money(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// 加成价: base × (1 + margin/100)，舍入 2 位
///
/// 毛利率是纯数字（15 = 15%），允许负值（降价），不做特判
pub fn margin_price(base_price: f64, margin_percentage: f64) -> f64 {
    round_money(base_price * (1.0 + margin_percentage / 100.0))
}

/// 最终售价: 特价折扣作用在"加成后"的价格上（先加成再打折）
pub fn offer_final_price(
    calculated_price: f64,
    is_special_offer: bool,
    offer_discount_percentage: Option<f64>,
) -> f64 {
    match offer_discount_percentage {
        Some(discount) if is_special_offer => {
            round_money(calculated_price * (1.0 - discount / 100.0))
        }
        _ => calculated_price,
    }
}
