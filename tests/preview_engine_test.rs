// ==========================================
// PreviewEstimator 集成测试
// ==========================================
// 覆盖: 聚合口径 / 零命中零值 / 抽样有界 / 预览-应用命中等价 /
//       空匹配字段不退化为全匹配
// ==========================================

mod helpers;

use helpers::{draft, insert_offer_product, insert_product, matchers, setup};
use margin_cascade::domain::types::RuleType;

#[test]
fn test_preview_aggregates_for_category_shape() {
    let ctx = setup();
    insert_product(&ctx, "SKU-1", "Apparel", "Hoodies", "BrandX", 10.0);
    insert_product(&ctx, "SKU-2", "Apparel", "Hoodies Winter", "BrandY", 20.0);
    insert_product(&ctx, "SKU-3", "Apparel", "hoodies premium", "BrandZ", 30.0);
    insert_product(&ctx, "SKU-4", "Homeware", "Mugs", "BrandX", 99.0);

    // 未持久化的假想规则形态
    let preview = ctx
        .api
        .preview_rule(RuleType::Category, &matchers(None, Some("Hoodies"), None, None), 10.0)
        .unwrap();

    assert_eq!(preview.matched_count, 3);
    assert_eq!(preview.base_price.min, 10.0);
    assert_eq!(preview.base_price.max, 30.0);
    assert_eq!(preview.base_price.avg, 20.0);
    assert_eq!(preview.projected_price.min, 11.0);
    assert_eq!(preview.projected_price.max, 33.0);
    assert_eq!(preview.projected_price.avg, 22.0);
    assert_eq!(preview.sample.len(), 3);
    for item in &preview.sample {
        assert!(item.projected_price > item.base_price);
        // 非特价商品: 投影最终售价 = 投影价
        assert_eq!(item.projected_final_price, item.projected_price);
    }
}

#[test]
fn test_sample_projects_offer_final_price() {
    let ctx = setup();
    // 50 → 加成 20% → 60 → 特价 25% → 45.00
    insert_offer_product(&ctx, "SKU-OFFER", "Apparel", "Hoodies", "BrandX", 50.0, 25.0);

    let preview = ctx
        .api
        .preview_rule(RuleType::Category, &matchers(None, Some("Hoodies"), None, None), 20.0)
        .unwrap();

    assert_eq!(preview.sample.len(), 1);
    let item = &preview.sample[0];
    assert_eq!(item.projected_price, 60.0);
    assert_eq!(item.projected_final_price, 45.0);
}

#[test]
fn test_zero_matches_yields_zero_aggregates_not_error() {
    let ctx = setup();
    insert_product(&ctx, "SKU-1", "Apparel", "Hoodies", "BrandX", 10.0);

    let preview = ctx
        .api
        .preview_rule(RuleType::Brand, &matchers(None, None, Some("NoSuchBrand"), None), 15.0)
        .unwrap();

    assert_eq!(preview.matched_count, 0);
    assert_eq!(preview.base_price.avg, 0.0);
    assert_eq!(preview.base_price.min, 0.0);
    assert_eq!(preview.base_price.max, 0.0);
    assert_eq!(preview.projected_price.avg, 0.0);
    assert!(preview.sample.is_empty());
}

#[test]
fn test_sample_is_bounded_to_configured_size() {
    let ctx = setup();
    for i in 0..15 {
        insert_product(
            &ctx,
            &format!("SKU-{i:02}"),
            "Apparel",
            "Hoodies",
            "BrandX",
            10.0 + i as f64,
        );
    }

    let preview = ctx
        .api
        .preview_rule(RuleType::Category, &matchers(None, Some("Hoodies"), None, None), 10.0)
        .unwrap();

    assert_eq!(preview.matched_count, 15);
    // 默认抽样上限 10
    assert_eq!(preview.sample.len(), 10);
}

#[test]
fn test_preview_count_equals_cascade_claims_for_same_shape() {
    let ctx = setup();
    insert_product(&ctx, "SKU-1", "Apparel", "Hoodies", "BrandX", 10.0);
    insert_product(&ctx, "SKU-2", "Apparel", "Hoodies", "BrandY", 20.0);
    insert_product(&ctx, "SKU-3", "Homeware", "Mugs", "BrandX", 30.0);

    let shape = matchers(None, Some("Hoodies"), None, None);
    let preview = ctx
        .api
        .preview_rule(RuleType::Category, &shape, 20.0)
        .unwrap();

    // 同形规则持久化后（无更强规则介入），级联认领数 = 预览命中数
    let rule = ctx
        .api
        .create_rule(draft("Hoodies", RuleType::Category, shape, 20.0), "admin")
        .unwrap();
    let outcome = ctx.api.apply_rules("admin", None).unwrap();

    assert_eq!(outcome.report.reassigned_count, preview.matched_count);
    let claimed = outcome
        .report
        .applied
        .iter()
        .find(|a| a.rule_id == rule.rule_id)
        .unwrap();
    assert_eq!(claimed.affected_count, preview.matched_count);
}

#[test]
fn test_blank_matcher_field_previews_as_empty_set() {
    let ctx = setup();
    insert_product(&ctx, "SKU-1", "Apparel", "Hoodies", "BrandX", 10.0);

    // 必填字段为空白 → 空集，绝不全匹配
    let preview = ctx
        .api
        .preview_rule(RuleType::Category, &matchers(None, Some("   "), None, None), 10.0)
        .unwrap();
    assert_eq!(preview.matched_count, 0);

    let preview = ctx
        .api
        .preview_rule(RuleType::ProductOverride, &matchers(None, None, None, None), 10.0)
        .unwrap();
    assert_eq!(preview.matched_count, 0);
}

#[test]
fn test_preview_is_read_only() {
    let ctx = setup();
    insert_product(&ctx, "SKU-1", "Apparel", "Hoodies", "BrandX", 10.0);

    ctx.api
        .preview_rule(RuleType::Category, &matchers(None, Some("Hoodies"), None, None), 50.0)
        .unwrap();

    let p = ctx.product_repo.find_by_sku("SKU-1").unwrap();
    assert!(p.applied_rule_id.is_none());
    assert!(p.calculated_price.is_none());
    assert!(p.final_price.is_none());
    // 预览也不落审计
    assert!(ctx.api.recent_audit_entries(10).unwrap().is_empty());
}
