// ==========================================
// 毛利级联定价引擎 - API层错误类型
// ==========================================
// 职责: 定义对外错误分类，转换下层错误为用户可解释的消息
// 分类口径:
// - ValidationError / DefaultRuleProtected: 立即返回，永不重试
// - NotFound: 终态
// - CascadeAborted: 携带部分进度，重启永远安全（级联幂等）
// - 引擎内不做自动重试，重试策略归调用方
// ==========================================

use crate::engine::cascade::CascadeError;
use crate::engine::lifecycle::LifecycleError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 校验类错误（不可重试）
    // ==========================================
    #[error("数据验证失败: {0}")]
    ValidationError(String),

    /// 默认规则删除保护（对任何调用方角色都成立）
    #[error("默认规则受保护，禁止删除: {0}")]
    DefaultRuleProtected(String),

    #[error("无效的状态转换: from={from} to={to}")]
    InvalidStateTransition { from: String, to: String },

    // ==========================================
    // 终态错误
    // ==========================================
    #[error("资源未找到: {0}")]
    NotFound(String),

    // ==========================================
    // 级联错误（携带进度上下文）
    // ==========================================
    #[error("级联中断: {0}")]
    CascadeAborted(#[from] CascadeError),

    // ==========================================
    // 审计链错误
    // ==========================================
    /// 变更已落库但审计写入失败——审计链出现缺口，绝不回滚变更来"修复"
    #[error("变更已生效但审计写入失败: {0}")]
    AuditWriteFailed(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::ConnectionFailed(msg) => ApiError::DatabaseConnectionError(msg),
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::QueryFailed(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::ValidationError(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::ValidationError(format!("外键约束违反: {}", msg))
            }
            RepositoryError::FieldValueError { field, message } => {
                ApiError::ValidationError(format!("字段{}错误: {}", field, message))
            }
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

// ==========================================
// 从 LifecycleError 转换
// ==========================================
impl From<LifecycleError> for ApiError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::Validation(msg) => ApiError::ValidationError(msg),
            LifecycleError::DefaultRuleProtected(rule_id) => {
                ApiError::DefaultRuleProtected(rule_id)
            }
            LifecycleError::DuplicateActiveDefault(rule_id) => ApiError::ValidationError(format!(
                "已存在激活的默认规则: rule_id={}，同一时刻至多一条",
                rule_id
            )),
            LifecycleError::InvalidStateTransition { from, to } => {
                ApiError::InvalidStateTransition { from, to }
            }
            LifecycleError::Repository(repo_err) => repo_err.into(),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
