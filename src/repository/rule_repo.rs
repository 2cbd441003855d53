// ==========================================
// 毛利级联定价引擎 - 毛利规则仓储
// ==========================================
// 红线: Repository 不做业务逻辑,只做数据映射
// 红线: 规则行永不物理删除，停用走 status 单向流转
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::rule::{MarginRule, RuleMatchers};
use crate::domain::types::{RuleStatus, RuleType};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, Row};
use std::sync::{Arc, Mutex};

/// 时间戳存储格式（对齐 schema TEXT 列）
const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ==========================================
// MarginRuleRepository - 毛利规则仓储
// ==========================================
pub struct MarginRuleRepository {
    conn: Arc<Mutex<Connection>>,
}

impl MarginRuleRepository {
    /// 创建新的规则仓储
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
    // 行映射
    // ==========================================

    fn map_row(row: &Row<'_>) -> rusqlite::Result<RawRuleRow> {
        Ok(RawRuleRow {
            rule_id: row.get(0)?,
            rule_name: row.get(1)?,
            rule_type: row.get(2)?,
            priority: row.get(3)?,
            match_product_type: row.get(4)?,
            match_category: row.get(5)?,
            match_brand: row.get(6)?,
            match_sku_code: row.get(7)?,
            margin_percentage: row.get(8)?,
            status: row.get(9)?,
            created_by: row.get(10)?,
            created_at: row.get(11)?,
            updated_at: row.get(12)?,
        })
    }

    const SELECT_COLUMNS: &'static str = "rule_id, rule_name, rule_type, priority, \
         match_product_type, match_category, match_brand, match_sku_code, \
         margin_percentage, status, created_by, created_at, updated_at";

    // ==========================================
    // 写入操作
    // ==========================================

    /// 插入规则
    pub fn insert(&self, rule: &MarginRule) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO margin_rule (
                rule_id, rule_name, rule_type, priority,
                match_product_type, match_category, match_brand, match_sku_code,
                margin_percentage, status, created_by, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                rule.rule_id,
                rule.rule_name,
                rule.rule_type.as_str(),
                rule.priority,
                rule.matchers.product_type,
                rule.matchers.category,
                rule.matchers.brand,
                rule.matchers.sku_code,
                rule.margin_percentage,
                rule.status.as_str(),
                rule.created_by,
                rule.created_at.format(TS_FORMAT).to_string(),
                rule.updated_at.format(TS_FORMAT).to_string(),
            ],
        )?;
        Ok(rule.rule_id.clone())
    }

    /// 整行更新（按 rule_id）
    ///
    /// # 返回
    /// - `Err(NotFound)`: rule_id 不存在
    pub fn update(&self, rule: &MarginRule) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            r#"
            UPDATE margin_rule SET
                rule_name = ?, rule_type = ?, priority = ?,
                match_product_type = ?, match_category = ?, match_brand = ?, match_sku_code = ?,
                margin_percentage = ?, status = ?, updated_at = ?
            WHERE rule_id = ?
            "#,
            params![
                rule.rule_name,
                rule.rule_type.as_str(),
                rule.priority,
                rule.matchers.product_type,
                rule.matchers.category,
                rule.matchers.brand,
                rule.matchers.sku_code,
                rule.margin_percentage,
                rule.status.as_str(),
                rule.updated_at.format(TS_FORMAT).to_string(),
                rule.rule_id,
            ],
        )?;
        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "MarginRule".to_string(),
                id: rule.rule_id.clone(),
            });
        }
        Ok(())
    }

    /// 停用规则（软删，单向 ACTIVE → INACTIVE）
    ///
    /// # 返回
    /// - `Ok(())`: 状态已翻转
    /// - `Err(NotFound)`: 不存在处于 ACTIVE 的该规则
    pub fn deactivate(&self, rule_id: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let now = chrono::Utc::now().naive_utc().format(TS_FORMAT).to_string();
        let rows = conn.execute(
            "UPDATE margin_rule SET status = 'INACTIVE', updated_at = ?1 \
             WHERE rule_id = ?2 AND status = 'ACTIVE'",
            params![now, rule_id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "ActiveMarginRule".to_string(),
                id: rule_id.to_string(),
            });
        }
        Ok(())
    }

    // ==========================================
    // 查询操作
    // ==========================================

    /// 按ID查询规则
    pub fn find_by_id(&self, rule_id: &str) -> RepositoryResult<MarginRule> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM margin_rule WHERE rule_id = ?1",
            Self::SELECT_COLUMNS
        );
        let raw = conn
            .query_row(&sql, params![rule_id], Self::map_row)
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => RepositoryError::NotFound {
                    entity: "MarginRule".to_string(),
                    id: rule_id.to_string(),
                },
                other => other.into(),
            })?;
        raw.into_rule()
    }

    /// 激活规则全集，级联顺序:
    /// priority 升序（强者先行），同优先级按 rule_id 升序做确定性决胜
    pub fn ordered_active(&self) -> RepositoryResult<Vec<MarginRule>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM margin_rule WHERE status = 'ACTIVE' \
             ORDER BY priority ASC, rule_id ASC",
            Self::SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let raws = stmt
            .query_map([], Self::map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        raws.into_iter().map(RawRuleRow::into_rule).collect()
    }

    /// 查询当前激活的默认规则（用于唯一性校验）
    ///
    /// # 参数
    /// - `exclude_rule_id`: 校验更新/回滚时排除自身
    pub fn find_active_default(
        &self,
        exclude_rule_id: Option<&str>,
    ) -> RepositoryResult<Option<MarginRule>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM margin_rule \
             WHERE status = 'ACTIVE' AND rule_type = 'default' AND rule_id != ?1 \
             ORDER BY rule_id ASC LIMIT 1",
            Self::SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query_map(params![exclude_rule_id.unwrap_or("")], Self::map_row)?;
        match rows.next() {
            Some(raw) => Ok(Some(raw?.into_rule()?)),
            None => Ok(None),
        }
    }
}

// ==========================================
// RawRuleRow - 行读取中间形态
// ==========================================
// 说明: rusqlite 闭包内只取原始列，枚举/时间的解析在闭包外完成，
//       解析失败按字段值错误上抛而不是静默取默认值
struct RawRuleRow {
    rule_id: String,
    rule_name: String,
    rule_type: String,
    priority: i32,
    match_product_type: Option<String>,
    match_category: Option<String>,
    match_brand: Option<String>,
    match_sku_code: Option<String>,
    margin_percentage: f64,
    status: String,
    created_by: String,
    created_at: String,
    updated_at: String,
}

impl RawRuleRow {
    fn into_rule(self) -> RepositoryResult<MarginRule> {
        let rule_type =
            RuleType::from_str(&self.rule_type).ok_or_else(|| RepositoryError::FieldValueError {
                field: "rule_type".to_string(),
                message: format!("未知规则类型: {}", self.rule_type),
            })?;
        let status =
            RuleStatus::from_str(&self.status).ok_or_else(|| RepositoryError::FieldValueError {
                field: "status".to_string(),
                message: format!("未知规则状态: {}", self.status),
            })?;
        Ok(MarginRule {
            rule_id: self.rule_id,
            rule_name: self.rule_name,
            rule_type,
            priority: self.priority,
            matchers: RuleMatchers {
                product_type: self.match_product_type,
                category: self.match_category,
                brand: self.match_brand,
                sku_code: self.match_sku_code,
            },
            margin_percentage: self.margin_percentage,
            status,
            created_by: self.created_by,
            created_at: parse_ts("created_at", &self.created_at)?,
            updated_at: parse_ts("updated_at", &self.updated_at)?,
        })
    }
}

fn parse_ts(field: &str, raw: &str) -> RepositoryResult<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, TS_FORMAT).map_err(|e| RepositoryError::FieldValueError {
        field: field.to_string(),
        message: format!("时间解析失败 ({}): {}", raw, e),
    })
}
