// ==========================================
// 集成测试夹具 - 内存库 + 仓储 + API
// ==========================================
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use margin_cascade::api::PricingApi;
use margin_cascade::db::{init_schema, open_in_memory_connection};
use margin_cascade::domain::product::Product;
use margin_cascade::domain::rule::{RuleDraft, RuleMatchers};
use margin_cascade::domain::types::RuleType;
use margin_cascade::repository::{
    AuditLogRepository, MarginRuleRepository, ProductRepository,
};
use rusqlite::Connection;

/// 测试上下文：共享同一条内存库连接
pub struct TestContext {
    pub conn: Arc<Mutex<Connection>>,
    pub rule_repo: Arc<MarginRuleRepository>,
    pub product_repo: Arc<ProductRepository>,
    pub audit_repo: Arc<AuditLogRepository>,
    pub api: PricingApi,
}

/// 搭建内存库测试环境
pub fn setup() -> TestContext {
    margin_cascade::logging::init_test();
    let conn = open_in_memory_connection().expect("打开内存库失败");
    init_schema(&conn).expect("建表失败");
    let conn = Arc::new(Mutex::new(conn));

    let rule_repo = Arc::new(MarginRuleRepository::from_connection(conn.clone()));
    let product_repo = Arc::new(ProductRepository::from_connection(conn.clone()));
    let audit_repo = Arc::new(AuditLogRepository::from_connection(conn.clone()));
    let api = PricingApi::new(
        rule_repo.clone(),
        product_repo.clone(),
        audit_repo.clone(),
        None,
    );

    TestContext {
        conn,
        rule_repo,
        product_repo,
        audit_repo,
        api,
    }
}

/// 插入商品（未定价）
pub fn insert_product(
    ctx: &TestContext,
    sku: &str,
    product_type: &str,
    categorisation: &str,
    brand: &str,
    base_price: f64,
) {
    ctx.product_repo
        .insert(&Product::new(sku, product_type, categorisation, brand, base_price))
        .expect("插入商品失败");
}

/// 插入特价商品
pub fn insert_offer_product(
    ctx: &TestContext,
    sku: &str,
    product_type: &str,
    categorisation: &str,
    brand: &str,
    base_price: f64,
    discount_percentage: f64,
) {
    ctx.product_repo
        .insert(
            &Product::new(sku, product_type, categorisation, brand, base_price)
                .with_special_offer(discount_percentage),
        )
        .expect("插入特价商品失败");
}

/// 组装匹配字段
pub fn matchers(
    product_type: Option<&str>,
    category: Option<&str>,
    brand: Option<&str>,
    sku_code: Option<&str>,
) -> RuleMatchers {
    RuleMatchers {
        product_type: product_type.map(String::from),
        category: category.map(String::from),
        brand: brand.map(String::from),
        sku_code: sku_code.map(String::from),
    }
}

/// 组装规则草稿
pub fn draft(
    name: &str,
    rule_type: RuleType,
    matchers: RuleMatchers,
    margin_percentage: f64,
) -> RuleDraft {
    RuleDraft {
        rule_name: name.to_string(),
        rule_type,
        matchers,
        margin_percentage,
    }
}

/// 默认规则草稿快捷方式
pub fn default_draft(name: &str, margin_percentage: f64) -> RuleDraft {
    draft(name, RuleType::Default, RuleMatchers::default(), margin_percentage)
}
