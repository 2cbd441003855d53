// ==========================================
// 毛利级联定价引擎 - 商品仓储
// ==========================================
// 红线: 级联的每一步必须是"单条带条件的批量 UPDATE"，
//       绝不读回内存再写（并发级联下会丢更新）
// 红线: 认领谓词单调——强规则的认领不会被弱规则的竞态削弱，
//       最坏情况只是幂等的重复工作
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::product::Product;
use crate::domain::rule::MarginRule;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::predicate::ProductPredicate;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use std::sync::{Arc, Mutex};

/// 加成价 SQL 表达式（?N 为毛利率参数编号）
///
/// 与 engine::pricing::margin_price 保持同一舍入口径:
/// ROUND 半数远离零，保留 2 位
fn calc_expr(margin_param: usize) -> String {
    format!("ROUND(base_price * (1.0 + ?{} / 100.0), 2)", margin_param)
}

/// 最终售价 SQL 表达式：特价折扣作用在"加成后"的价格上
fn final_expr(margin_param: usize) -> String {
    format!(
        "CASE \
            WHEN is_special_offer = 1 AND offer_discount_percentage IS NOT NULL \
                THEN ROUND({calc} * (1.0 - offer_discount_percentage / 100.0), 2) \
            ELSE {calc} \
         END",
        calc = calc_expr(margin_param)
    )
}

// ==========================================
// PreviewAggregates - 预览聚合结果（仓储侧原始值）
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewAggregates {
    pub matched_count: i64,
    pub base_avg: f64,
    pub base_min: f64,
    pub base_max: f64,
    pub projected_avg: f64,
    pub projected_min: f64,
    pub projected_max: f64,
}

// ==========================================
// ProductRepository - 商品仓储
// ==========================================
pub struct ProductRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ProductRepository {
    /// 创建新的商品仓储
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

    const SELECT_COLUMNS: &'static str = "sku_code, product_type, categorisation, brand, \
         base_price, applied_rule_id, calculated_price, is_special_offer, \
         offer_discount_percentage, final_price";

    fn map_row(row: &Row<'_>) -> rusqlite::Result<Product> {
        Ok(Product {
            sku_code: row.get(0)?,
            product_type: row.get(1)?,
            categorisation: row.get(2)?,
            brand: row.get(3)?,
            base_price: row.get(4)?,
            applied_rule_id: row.get(5)?,
            calculated_price: row.get(6)?,
            is_special_offer: row.get::<_, i64>(7)? != 0,
            offer_discount_percentage: row.get(8)?,
            final_price: row.get(9)?,
        })
    }

    // ==========================================
    // 写入操作
    // ==========================================

    /// 插入商品（导入/测试用）
    pub fn insert(&self, product: &Product) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO product (
                sku_code, product_type, categorisation, brand, base_price,
                applied_rule_id, calculated_price, is_special_offer,
                offer_discount_percentage, final_price
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                product.sku_code,
                product.product_type,
                product.categorisation,
                product.brand,
                product.base_price,
                product.applied_rule_id,
                product.calculated_price,
                product.is_special_offer as i64,
                product.offer_discount_percentage,
                product.final_price,
            ],
        )?;
        Ok(product.sku_code.clone())
    }

    /// 为规则认领商品：单条原子条件批量 UPDATE
    ///
    /// 可认领条件（三选一）:
    /// 1. 尚未被任何规则认领；
    /// 2. 已被本规则认领但价格过期（规则改了毛利率后重跑要刷新价格，
    ///    价格一致时不回写——这让"不变输入重跑"严格零行，幂等可观测）；
    /// 3. 当前归属规则严格更弱（priority 更大，或同 priority 且
    ///    rule_id 更大——与级联顺序同一决胜口径）。
    ///
    /// 归属规则已停用时依然按其 priority 比较：引擎从不解除认领，
    /// 只有更强的激活规则才能改写归属。
    ///
    /// # 返回
    /// - `Ok(affected)`: 本步认领/刷新的商品行数
    pub fn claim_for_rule(
        &self,
        rule: &MarginRule,
        predicate: &ProductPredicate,
    ) -> RepositoryResult<usize> {
        // ?1=rule_id ?2=margin ?3=priority，谓词参数从 ?4 起
        let mut next_param = 4;
        let (pred_sql, pred_params) = predicate.to_sql(&mut next_param);
        let calc = calc_expr(2);
        let fin = final_expr(2);

        let sql = format!(
            r#"
            UPDATE product SET
                applied_rule_id = ?1,
                calculated_price = {calc},
                final_price = {fin}
            WHERE ({pred})
              AND (
                  applied_rule_id IS NULL
                  OR (
                      applied_rule_id = ?1
                      AND (calculated_price IS NOT {calc} OR final_price IS NOT {fin})
                  )
                  OR EXISTS (
                      SELECT 1 FROM margin_rule owner
                      WHERE owner.rule_id = product.applied_rule_id
                        AND (owner.priority > ?3
                             OR (owner.priority = ?3 AND owner.rule_id > ?1))
                  )
              )
            "#,
            calc = calc,
            fin = fin,
            pred = pred_sql,
        );

        let mut bind: Vec<Value> = vec![
            Value::Text(rule.rule_id.clone()),
            Value::Real(rule.margin_percentage),
            Value::Integer(rule.priority as i64),
        ];
        bind.extend(pred_params);

        let conn = self.get_conn()?;
        let affected = conn.execute(&sql, params_from_iter(bind))?;
        Ok(affected)
    }

    // ==========================================
    // 查询操作
    // ==========================================

    /// 按 SKU 查询商品
    pub fn find_by_sku(&self, sku_code: &str) -> RepositoryResult<Product> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM product WHERE sku_code = ?1",
            Self::SELECT_COLUMNS
        );
        conn.query_row(&sql, params![sku_code], Self::map_row)
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => RepositoryError::NotFound {
                    entity: "Product".to_string(),
                    id: sku_code.to_string(),
                },
                other => other.into(),
            })
    }

    /// 统计已有非空 calculated_price 的商品数（级联报告用）
    pub fn count_priced(&self) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM product WHERE calculated_price IS NOT NULL",
            [],
            |row| row.get::<_, i64>(0),
        )?;
        Ok(count)
    }

    /// 随机抽样命中商品（预览用，只读）
    pub fn sample(
        &self,
        predicate: &ProductPredicate,
        limit: usize,
    ) -> RepositoryResult<Vec<Product>> {
        let mut next_param = 1;
        let (pred_sql, mut pred_params) = predicate.to_sql(&mut next_param);
        let sql = format!(
            "SELECT {} FROM product WHERE {} ORDER BY RANDOM() LIMIT ?{}",
            Self::SELECT_COLUMNS,
            pred_sql,
            next_param,
        );
        pred_params.push(Value::Integer(limit as i64));
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let products = stmt
            .query_map(params_from_iter(pred_params), Self::map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(products)
    }

    /// 一次聚合查询取回预览统计
    ///
    /// 投影价使用与 claim_for_rule 完全相同的 ROUND 表达式——
    /// 预览命中集 = 级联命中集（同一谓词），投影价 = 级联落库价
    pub fn preview_aggregates(
        &self,
        predicate: &ProductPredicate,
        margin_percentage: f64,
    ) -> RepositoryResult<PreviewAggregates> {
        // ?1=margin，谓词参数从 ?2 起
        let mut next_param = 2;
        let (pred_sql, pred_params) = predicate.to_sql(&mut next_param);
        let calc = calc_expr(1);
        let sql = format!(
            r#"
            SELECT
                COUNT(*),
                COALESCE(AVG(base_price), 0.0),
                COALESCE(MIN(base_price), 0.0),
                COALESCE(MAX(base_price), 0.0),
                COALESCE(AVG({calc}), 0.0),
                COALESCE(MIN({calc}), 0.0),
                COALESCE(MAX({calc}), 0.0)
            FROM product
            WHERE {pred}
            "#,
            calc = calc,
            pred = pred_sql,
        );

        let mut bind: Vec<Value> = vec![Value::Real(margin_percentage)];
        bind.extend(pred_params);

        let conn = self.get_conn()?;
        let aggregates = conn.query_row(&sql, params_from_iter(bind), |row| {
            Ok(PreviewAggregates {
                matched_count: row.get(0)?,
                base_avg: row.get(1)?,
                base_min: row.get(2)?,
                base_max: row.get(3)?,
                projected_avg: row.get(4)?,
                projected_min: row.get(5)?,
                projected_max: row.get(6)?,
            })
        })?;
        Ok(aggregates)
    }
}
