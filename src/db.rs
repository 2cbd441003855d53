// ==========================================
// 毛利级联定价引擎 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// - 提供建表引导（margin_rule / product / audit_log）
// ==========================================

use rusqlite::Connection;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 打开内存库连接（测试用）
pub fn open_in_memory_connection() -> rusqlite::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 初始化建表
///
/// 说明：
/// - product.applied_rule_id 不加外键：它是弱回引，规则停用后引用保留
/// - audit_log 只追加，不建更新路径
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS margin_rule (
            rule_id            TEXT PRIMARY KEY,
            rule_name          TEXT NOT NULL,
            rule_type          TEXT NOT NULL,
            priority           INTEGER NOT NULL,
            match_product_type TEXT,
            match_category     TEXT,
            match_brand        TEXT,
            match_sku_code     TEXT,
            margin_percentage  REAL NOT NULL,
            status             TEXT NOT NULL DEFAULT 'ACTIVE',
            created_by         TEXT NOT NULL,
            created_at         TEXT NOT NULL,
            updated_at         TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_margin_rule_cascade
            ON margin_rule (status, priority, rule_id);

        CREATE TABLE IF NOT EXISTS product (
            sku_code                  TEXT PRIMARY KEY,
            product_type              TEXT NOT NULL,
            categorisation            TEXT NOT NULL DEFAULT '',
            brand                     TEXT NOT NULL DEFAULT '',
            base_price                REAL NOT NULL,
            applied_rule_id           TEXT,
            calculated_price          REAL,
            is_special_offer          INTEGER NOT NULL DEFAULT 0,
            offer_discount_percentage REAL,
            final_price               REAL
        );
        CREATE INDEX IF NOT EXISTS idx_product_applied_rule
            ON product (applied_rule_id);

        CREATE TABLE IF NOT EXISTS audit_log (
            audit_id               TEXT PRIMARY KEY,
            action_type            TEXT NOT NULL,
            rule_id                TEXT,
            rule_snapshot_json     TEXT,
            rollback_json          TEXT,
            affected_product_count INTEGER,
            applied_rule_count     INTEGER,
            performed_by           TEXT NOT NULL,
            performed_at           TEXT NOT NULL,
            detail                 TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_audit_log_performed_at
            ON audit_log (performed_at);
        "#,
    )?;
    Ok(())
}
