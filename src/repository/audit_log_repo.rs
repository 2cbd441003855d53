// ==========================================
// 毛利级联定价引擎 - 审计日志仓储
// ==========================================
// 红线: 只追加。没有 UPDATE/DELETE 路径，日志一经写入不可变
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::audit_log::AuditLogEntry;
use crate::domain::types::AuditAction;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, Row};
use std::sync::{Arc, Mutex};

/// 时间戳存储格式（对齐 schema TEXT 列）
const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ==========================================
// AuditLogRepository - 审计日志仓储
// ==========================================
pub struct AuditLogRepository {
    conn: Arc<Mutex<Connection>>,
}

impl AuditLogRepository {
    /// 创建新的审计日志仓储
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::ConnectionFailed(e.to_string()))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 写入操作
    // ==========================================

    /// 追加审计条目
    ///
    /// # 返回
    /// - `Ok(audit_id)`: 成功写入
    pub fn append(&self, entry: &AuditLogEntry) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO audit_log (
                audit_id, action_type, rule_id,
                rule_snapshot_json, rollback_json,
                affected_product_count, applied_rule_count,
                performed_by, performed_at, detail
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                entry.audit_id,
                entry.action.as_str(),
                entry.rule_id,
                entry.rule_snapshot_json.as_ref().map(|v| v.to_string()),
                entry.rollback_json.as_ref().map(|v| v.to_string()),
                entry.affected_product_count,
                entry.applied_rule_count,
                entry.performed_by,
                entry.performed_at.format(TS_FORMAT).to_string(),
                entry.detail,
            ],
        )?;
        Ok(entry.audit_id.clone())
    }

    // ==========================================
    // 查询操作
    // ==========================================

    /// 按ID查询审计条目（回滚入口）
    pub fn find_by_id(&self, audit_id: &str) -> RepositoryResult<AuditLogEntry> {
        let conn = self.get_conn()?;
        let raw = conn
            .query_row(
                &format!(
                    "SELECT {} FROM audit_log WHERE audit_id = ?1",
                    Self::SELECT_COLUMNS
                ),
                params![audit_id],
                Self::map_row,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => RepositoryError::NotFound {
                    entity: "AuditLogEntry".to_string(),
                    id: audit_id.to_string(),
                },
                other => other.into(),
            })?;
        raw.into_entry()
    }

    /// 最近的审计条目（倒序）
    pub fn list_recent(&self, limit: usize) -> RepositoryResult<Vec<AuditLogEntry>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM audit_log ORDER BY performed_at DESC, audit_id DESC LIMIT ?1",
            Self::SELECT_COLUMNS
        ))?;
        let raws = stmt
            .query_map(params![limit as i64], Self::map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        raws.into_iter().map(RawAuditRow::into_entry).collect()
    }

    const SELECT_COLUMNS: &'static str = "audit_id, action_type, rule_id, \
         rule_snapshot_json, rollback_json, affected_product_count, \
         applied_rule_count, performed_by, performed_at, detail";

    fn map_row(row: &Row<'_>) -> rusqlite::Result<RawAuditRow> {
        Ok(RawAuditRow {
            audit_id: row.get(0)?,
            action_type: row.get(1)?,
            rule_id: row.get(2)?,
            rule_snapshot_json: row.get(3)?,
            rollback_json: row.get(4)?,
            affected_product_count: row.get(5)?,
            applied_rule_count: row.get(6)?,
            performed_by: row.get(7)?,
            performed_at: row.get(8)?,
            detail: row.get(9)?,
        })
    }
}

// ==========================================
// RawAuditRow - 行读取中间形态
// ==========================================
struct RawAuditRow {
    audit_id: String,
    action_type: String,
    rule_id: Option<String>,
    rule_snapshot_json: Option<String>,
    rollback_json: Option<String>,
    affected_product_count: Option<i64>,
    applied_rule_count: Option<i64>,
    performed_by: String,
    performed_at: String,
    detail: Option<String>,
}

impl RawAuditRow {
    fn into_entry(self) -> RepositoryResult<AuditLogEntry> {
        let action = AuditAction::from_str(&self.action_type).ok_or_else(|| {
            RepositoryError::FieldValueError {
                field: "action_type".to_string(),
                message: format!("未知审计动作: {}", self.action_type),
            }
        })?;
        let performed_at = NaiveDateTime::parse_from_str(&self.performed_at, TS_FORMAT).map_err(
            |e| RepositoryError::FieldValueError {
                field: "performed_at".to_string(),
                message: format!("时间解析失败 ({}): {}", self.performed_at, e),
            },
        )?;
        Ok(AuditLogEntry {
            audit_id: self.audit_id,
            action,
            rule_id: self.rule_id,
            performed_by: self.performed_by,
            performed_at,
            rule_snapshot_json: parse_json("rule_snapshot_json", self.rule_snapshot_json)?,
            rollback_json: parse_json("rollback_json", self.rollback_json)?,
            affected_product_count: self.affected_product_count,
            applied_rule_count: self.applied_rule_count,
            detail: self.detail,
        })
    }
}

fn parse_json(
    field: &str,
    raw: Option<String>,
) -> RepositoryResult<Option<serde_json::Value>> {
    match raw {
        None => Ok(None),
        Some(text) => serde_json::from_str(&text).map(Some).map_err(|e| {
            RepositoryError::FieldValueError {
                field: field.to_string(),
                message: format!("JSON 解析失败: {}", e),
            }
        }),
    }
}
