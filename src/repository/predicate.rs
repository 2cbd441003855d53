// ==========================================
// 毛利级联定价引擎 - 商品筛选谓词
// ==========================================
// 职责: 用带标签的变体类型表达商品筛选条件，由仓储编译为
//       参数化 SQL（?N 占位符）
// 红线: 值永远走绑定参数，SQL 文本中不允许拼接任何用户值
// ==========================================

use rusqlite::types::Value;

// ==========================================
// ProductField - 可筛选的商品字段
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductField {
    SkuCode,
    ProductType,
    Brand,
    Categorisation,
}

impl ProductField {
    /// 对应的 product 表列名
    pub fn column(&self) -> &'static str {
        match self {
            ProductField::SkuCode => "sku_code",
            ProductField::ProductType => "product_type",
            ProductField::Brand => "brand",
            ProductField::Categorisation => "categorisation",
        }
    }
}

// ==========================================
// ProductPredicate - 商品筛选谓词
// ==========================================
// 说明: MatchNone 是必填匹配字段为空时的显式形态——
//       宁可空集也绝不静默退化为全匹配
#[derive(Debug, Clone, PartialEq)]
pub enum ProductPredicate {
    /// 匹配全部商品（默认规则）
    MatchAll,
    /// 什么都不匹配（缺失必填匹配字段的规则）
    MatchNone,
    /// 字段精确相等
    Equals(ProductField, String),
    /// 大小写不敏感子串（ASCII 折叠，对齐 SQLite lower()）
    ContainsCi(ProductField, String),
    /// 逻辑与
    And(Vec<ProductPredicate>),
}

impl ProductPredicate {
    /// 编译为参数化 SQL 片段
    ///
    /// # 参数
    /// - `next_param`: 下一个可用的 ?N 编号（调用方已占用的编号之后），
    ///   编译过程中随消耗递增
    ///
    /// # 返回
    /// - `(sql, params)`: SQL 片段与按编号顺序排列的绑定值
    pub fn to_sql(&self, next_param: &mut usize) -> (String, Vec<Value>) {
        match self {
            ProductPredicate::MatchAll => ("1 = 1".to_string(), vec![]),
            ProductPredicate::MatchNone => ("0 = 1".to_string(), vec![]),
            ProductPredicate::Equals(field, value) => {
                let n = *next_param;
                *next_param += 1;
                (
                    format!("{} = ?{}", field.column(), n),
                    vec![Value::Text(value.clone())],
                )
            }
            ProductPredicate::ContainsCi(field, value) => {
                let n = *next_param;
                *next_param += 1;
                (
                    format!("instr(lower({}), lower(?{})) > 0", field.column(), n),
                    vec![Value::Text(value.clone())],
                )
            }
            ProductPredicate::And(parts) => {
                if parts.is_empty() {
                    return ("1 = 1".to_string(), vec![]);
                }
                let mut clauses = Vec::with_capacity(parts.len());
                let mut params = Vec::new();
                for part in parts {
                    let (sql, mut values) = part.to_sql(next_param);
                    clauses.push(format!("({})", sql));
                    params.append(&mut values);
                }
                (clauses.join(" AND "), params)
            }
        }
    }
}
