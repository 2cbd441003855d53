// ==========================================
// PricingApi 集成测试
// ==========================================
// 覆盖: 规则生命周期 + 审计落账 / 默认规则保护 /
//       按审计条目回滚 / 批量应用审计 / 审计缺口上报 / 磁盘库持久化
// ==========================================

mod helpers;

use std::sync::Arc;

use helpers::{default_draft, draft, insert_product, matchers, setup};
use margin_cascade::api::{ApiError, AuditStatus, PricingApi};
use margin_cascade::db::{init_schema, open_sqlite_connection};
use margin_cascade::domain::rule::RulePatch;
use margin_cascade::domain::types::{AuditAction, RuleStatus, RuleType};
use margin_cascade::repository::{
    AuditLogRepository, MarginRuleRepository, ProductRepository,
};

// ==========================================
// 创建 / 更新 / 审计
// ==========================================

#[test]
fn test_create_rule_writes_audit_with_snapshot() {
    let ctx = setup();
    let rule = ctx
        .api
        .create_rule(
            draft("帽衫加成", RuleType::Category, matchers(None, Some("Hoodies"), None, None), 20.0),
            "admin",
        )
        .unwrap();

    assert_eq!(rule.priority, 5);
    assert_eq!(rule.status, RuleStatus::Active);
    assert_eq!(rule.created_by, "admin");

    let entries = ctx.api.recent_audit_entries(10).unwrap();
    assert_eq!(entries.len(), 1);
    let entry = &entries[0];
    assert_eq!(entry.action, AuditAction::RuleCreated);
    assert_eq!(entry.rule_id.as_deref(), Some(rule.rule_id.as_str()));
    assert_eq!(entry.performed_by, "admin");
    // 快照可独立重建规则
    let snapshot = entry.rule_snapshot_json.as_ref().unwrap();
    assert_eq!(snapshot["margin_percentage"], 20.0);
    assert!(entry.rollback_json.is_none());
}

#[test]
fn test_update_rule_writes_rollback_snapshot() {
    let ctx = setup();
    let rule = ctx
        .api
        .create_rule(
            draft("品牌加成", RuleType::Brand, matchers(None, None, Some("Acme"), None), 10.0),
            "admin",
        )
        .unwrap();

    let updated = ctx
        .api
        .update_rule(
            &rule.rule_id,
            RulePatch {
                margin_percentage: Some(25.0),
                ..Default::default()
            },
            "manager",
        )
        .unwrap();
    assert_eq!(updated.margin_percentage, 25.0);
    assert_eq!(updated.rule_type, RuleType::Brand);

    let entries = ctx.api.recent_audit_entries(10).unwrap();
    let update_entry = entries
        .iter()
        .find(|e| e.action == AuditAction::RuleUpdated)
        .unwrap();
    let rollback = update_entry.rollback_json.as_ref().unwrap();
    assert_eq!(rollback["margin_percentage"], 10.0);
    let snapshot = update_entry.rule_snapshot_json.as_ref().unwrap();
    assert_eq!(snapshot["margin_percentage"], 25.0);
}

#[test]
fn test_empty_patch_is_rejected() {
    let ctx = setup();
    let rule = ctx
        .api
        .create_rule(default_draft("默认", 10.0), "admin")
        .unwrap();

    let err = ctx
        .api
        .update_rule(&rule.rule_id, RulePatch::default(), "admin")
        .unwrap_err();
    assert!(matches!(err, ApiError::ValidationError(_)));
}

#[test]
fn test_update_unknown_rule_is_not_found() {
    let ctx = setup();
    let err = ctx
        .api
        .update_rule(
            "no-such-rule",
            RulePatch {
                margin_percentage: Some(5.0),
                ..Default::default()
            },
            "admin",
        )
        .unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
}

#[test]
fn test_create_rule_missing_required_matcher_is_rejected() {
    let ctx = setup();
    let err = ctx
        .api
        .create_rule(
            draft("无品牌", RuleType::Brand, matchers(None, None, None, None), 10.0),
            "admin",
        )
        .unwrap_err();
    assert!(matches!(err, ApiError::ValidationError(_)));
    // 校验失败不落审计
    assert!(ctx.api.recent_audit_entries(10).unwrap().is_empty());
}

#[test]
fn test_second_active_default_is_rejected() {
    let ctx = setup();
    ctx.api
        .create_rule(default_draft("默认A", 10.0), "admin")
        .unwrap();

    let err = ctx
        .api
        .create_rule(default_draft("默认B", 12.0), "admin")
        .unwrap_err();
    assert!(matches!(err, ApiError::ValidationError(_)));
}

// ==========================================
// 删除与默认规则保护
// ==========================================

#[test]
fn test_default_rule_delete_is_protected() {
    let ctx = setup();
    let default = ctx
        .api
        .create_rule(default_draft("兜底", 10.0), "admin")
        .unwrap();

    let err = ctx.api.delete_rule(&default.rule_id, "admin").unwrap_err();
    assert!(matches!(err, ApiError::DefaultRuleProtected(id) if id == default.rule_id));

    // 保护失败不留痕，规则仍激活
    let still = ctx.api.rule_by_id(&default.rule_id).unwrap();
    assert_eq!(still.status, RuleStatus::Active);
    let entries = ctx.api.recent_audit_entries(10).unwrap();
    assert!(entries.iter().all(|e| e.action != AuditAction::RuleDeleted));
}

#[test]
fn test_delete_custom_rule_soft_deletes_and_audits() {
    let ctx = setup();
    let rule = ctx
        .api
        .create_rule(
            draft("帽衫", RuleType::Category, matchers(None, Some("Hoodies"), None, None), 20.0),
            "admin",
        )
        .unwrap();

    ctx.api.delete_rule(&rule.rule_id, "manager").unwrap();

    // 软删: 行保留，状态置 INACTIVE
    let after = ctx.api.rule_by_id(&rule.rule_id).unwrap();
    assert_eq!(after.status, RuleStatus::Inactive);

    let entries = ctx.api.recent_audit_entries(10).unwrap();
    let delete_entry = entries
        .iter()
        .find(|e| e.action == AuditAction::RuleDeleted)
        .unwrap();
    assert_eq!(delete_entry.performed_by, "manager");
    let rollback = delete_entry.rollback_json.as_ref().unwrap();
    assert_eq!(rollback["status"], "ACTIVE");

    // 状态单向: 再删是无效转换
    let err = ctx.api.delete_rule(&rule.rule_id, "manager").unwrap_err();
    assert!(matches!(err, ApiError::InvalidStateTransition { .. }));
}

// ==========================================
// 按审计条目回滚
// ==========================================

#[test]
fn test_rollback_rule_update_restores_prior_state() {
    let ctx = setup();
    let rule = ctx
        .api
        .create_rule(
            draft("帽衫", RuleType::Category, matchers(None, Some("Hoodies"), None, None), 20.0),
            "admin",
        )
        .unwrap();
    ctx.api
        .update_rule(
            &rule.rule_id,
            RulePatch {
                margin_percentage: Some(35.0),
                rule_name: Some("帽衫高加成".to_string()),
                ..Default::default()
            },
            "manager",
        )
        .unwrap();

    let entries = ctx.api.recent_audit_entries(10).unwrap();
    let update_entry = entries
        .iter()
        .find(|e| e.action == AuditAction::RuleUpdated)
        .unwrap();

    let restored = ctx
        .api
        .rollback_rule_update(&update_entry.audit_id, "admin")
        .unwrap();
    assert_eq!(restored.margin_percentage, 20.0);
    assert_eq!(restored.rule_name, "帽衫");

    let after = ctx.api.rule_by_id(&rule.rule_id).unwrap();
    assert_eq!(after.margin_percentage, 20.0);

    // 回滚本身也是一次更新，照常落审计
    let updated_count = ctx
        .api
        .recent_audit_entries(10)
        .unwrap()
        .iter()
        .filter(|e| e.action == AuditAction::RuleUpdated)
        .count();
    assert_eq!(updated_count, 2);
}

#[test]
fn test_rollback_rejects_non_update_entries() {
    let ctx = setup();
    ctx.api
        .create_rule(default_draft("默认", 10.0), "admin")
        .unwrap();

    let entries = ctx.api.recent_audit_entries(10).unwrap();
    let created_entry = entries
        .iter()
        .find(|e| e.action == AuditAction::RuleCreated)
        .unwrap();

    let err = ctx
        .api
        .rollback_rule_update(&created_entry.audit_id, "admin")
        .unwrap_err();
    assert!(matches!(err, ApiError::ValidationError(_)));
}

#[test]
fn test_rollback_cannot_resurrect_soft_deleted_rule() {
    let ctx = setup();
    let rule = ctx
        .api
        .create_rule(
            draft("帽衫", RuleType::Category, matchers(None, Some("Hoodies"), None, None), 20.0),
            "admin",
        )
        .unwrap();
    ctx.api
        .update_rule(
            &rule.rule_id,
            RulePatch {
                margin_percentage: Some(35.0),
                ..Default::default()
            },
            "manager",
        )
        .unwrap();
    ctx.api.delete_rule(&rule.rule_id, "admin").unwrap();

    let entries = ctx.api.recent_audit_entries(10).unwrap();
    let update_entry = entries
        .iter()
        .find(|e| e.action == AuditAction::RuleUpdated)
        .unwrap();

    // 更新快照里的 status 是 ACTIVE——整行回滚会让软删规则复活，
    // 必须按单向状态转换拒绝
    let err = ctx
        .api
        .rollback_rule_update(&update_entry.audit_id, "admin")
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidStateTransition { .. }));

    let after = ctx.api.rule_by_id(&rule.rule_id).unwrap();
    assert_eq!(after.status, RuleStatus::Inactive);
    assert_eq!(after.margin_percentage, 35.0);
}

#[test]
fn test_rollback_unknown_audit_entry_is_not_found() {
    let ctx = setup();
    let err = ctx
        .api
        .rollback_rule_update("no-such-audit", "admin")
        .unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
}

// ==========================================
// 批量应用审计
// ==========================================

#[test]
fn test_bulk_apply_writes_exactly_one_audit_entry() {
    let ctx = setup();
    insert_product(&ctx, "SKU-1", "Apparel", "Hoodies", "BrandX", 10.0);
    insert_product(&ctx, "SKU-2", "Homeware", "Mugs", "BrandY", 20.0);
    ctx.api
        .create_rule(
            draft("帽衫", RuleType::Category, matchers(None, Some("Hoodies"), None, None), 20.0),
            "admin",
        )
        .unwrap();
    ctx.api
        .create_rule(default_draft("默认", 10.0), "admin")
        .unwrap();

    let outcome = ctx.api.apply_rules("batch-runner", None).unwrap();
    assert!(matches!(outcome.audit, AuditStatus::Recorded { .. }));
    assert_eq!(outcome.report.reassigned_count, 2);

    let entries = ctx.api.recent_audit_entries(20).unwrap();
    let bulk: Vec<_> = entries
        .iter()
        .filter(|e| e.action == AuditAction::BulkApply)
        .collect();
    assert_eq!(bulk.len(), 1);
    let entry = bulk[0];
    assert_eq!(entry.affected_product_count, Some(2));
    assert_eq!(entry.applied_rule_count, Some(2));
    assert_eq!(entry.performed_by, "batch-runner");
    assert!(entry.rule_id.is_none());

    // 幂等重跑也各落一条 BulkApply（零行变更照记）
    let outcome = ctx.api.apply_rules("batch-runner", None).unwrap();
    assert_eq!(outcome.report.reassigned_count, 0);
    let entries = ctx.api.recent_audit_entries(20).unwrap();
    let bulk_count = entries
        .iter()
        .filter(|e| e.action == AuditAction::BulkApply)
        .count();
    assert_eq!(bulk_count, 2);
}

#[test]
fn test_apply_reports_audit_gap_without_rolling_back_prices() {
    let ctx = setup();
    insert_product(&ctx, "SKU-1", "Apparel", "Hoodies", "BrandX", 10.0);
    ctx.api
        .create_rule(default_draft("默认", 10.0), "admin")
        .unwrap();

    // 制造审计写入失败: 级联改价成功后审计必然落不了账
    {
        let conn = ctx.conn.lock().unwrap();
        conn.execute_batch("DROP TABLE audit_log").unwrap();
    }

    // "已应用未审计": 结果仍是成功，价格不回滚，缺口显式上报
    let outcome = ctx.api.apply_rules("admin", None).unwrap();
    assert_eq!(outcome.report.reassigned_count, 1);
    assert!(matches!(outcome.audit, AuditStatus::Failed { .. }));

    let p = ctx.product_repo.find_by_sku("SKU-1").unwrap();
    assert_eq!(p.calculated_price, Some(11.0));
}

#[test]
fn test_rule_create_surfaces_audit_write_failure() {
    let ctx = setup();
    {
        let conn = ctx.conn.lock().unwrap();
        conn.execute_batch("DROP TABLE audit_log").unwrap();
    }

    // 规则已落库但审计链出现缺口: 上抛专属错误，不回滚规则
    let err = ctx
        .api
        .create_rule(default_draft("默认", 10.0), "admin")
        .unwrap_err();
    assert!(matches!(err, ApiError::AuditWriteFailed(_)));
    assert!(ctx.rule_repo.find_active_default(None).unwrap().is_some());
}

// ==========================================
// 磁盘库持久化
// ==========================================

#[test]
fn test_on_disk_database_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("margin.db");
    let db_path = db_path.to_str().unwrap();

    // 建库建表
    let conn = open_sqlite_connection(db_path).unwrap();
    init_schema(&conn).unwrap();
    drop(conn);

    let rule_id = {
        let api = PricingApi::new(
            Arc::new(MarginRuleRepository::new(db_path).unwrap()),
            Arc::new(ProductRepository::new(db_path).unwrap()),
            Arc::new(AuditLogRepository::new(db_path).unwrap()),
            None,
        );
        api.create_rule(default_draft("默认", 10.0), "admin")
            .unwrap()
            .rule_id
    };

    // 重新打开，规则与审计均已持久化
    let api = PricingApi::new(
        Arc::new(MarginRuleRepository::new(db_path).unwrap()),
        Arc::new(ProductRepository::new(db_path).unwrap()),
        Arc::new(AuditLogRepository::new(db_path).unwrap()),
        None,
    );
    let rule = api.rule_by_id(&rule_id).unwrap();
    assert_eq!(rule.margin_percentage, 10.0);
    assert_eq!(api.recent_audit_entries(10).unwrap().len(), 1);
}
