// ==========================================
// 毛利级联定价引擎 - 引擎层事件发布
// ==========================================
// 职责: 定义级联进度事件发布 trait，实现依赖倒置
// 说明: Engine 层定义 trait，外层（UI/监控）实现适配器；
//       批量应用没有内建超时，进度与取消通过这里暴露
// ==========================================

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::sync::Arc;

// ==========================================
// 级联事件类型
// ==========================================

/// 级联进度事件类型
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CascadeEventType {
    /// 单条规则步骤完成
    RuleStepCompleted,
    /// 级联全部完成
    CascadeCompleted,
    /// 级联被取消
    CascadeCancelled,
}

impl CascadeEventType {
    /// 转换为字符串标识
    pub fn as_str(&self) -> &str {
        match self {
            CascadeEventType::RuleStepCompleted => "RuleStepCompleted",
            CascadeEventType::CascadeCompleted => "CascadeCompleted",
            CascadeEventType::CascadeCancelled => "CascadeCancelled",
        }
    }
}

/// 级联进度事件
///
/// rules_completed / rules_total 即调用方需要的进度口径
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CascadeEvent {
    /// 事件类型
    pub event_type: CascadeEventType,
    /// 本步规则ID（完成/取消汇总事件为 None）
    pub rule_id: Option<String>,
    /// 已完成规则步数
    pub rules_completed: usize,
    /// 规则总数
    pub rules_total: usize,
    /// 本步认领/刷新的商品数
    pub affected_count: i64,
}

impl CascadeEvent {
    /// 单步完成事件
    pub fn step(
        rule_id: String,
        rules_completed: usize,
        rules_total: usize,
        affected_count: i64,
    ) -> Self {
        Self {
            event_type: CascadeEventType::RuleStepCompleted,
            rule_id: Some(rule_id),
            rules_completed,
            rules_total,
            affected_count,
        }
    }

    /// 汇总事件（完成/取消）
    pub fn summary(
        event_type: CascadeEventType,
        rules_completed: usize,
        rules_total: usize,
        affected_count: i64,
    ) -> Self {
        Self {
            event_type,
            rule_id: None,
            rules_completed,
            rules_total,
            affected_count,
        }
    }
}

// ==========================================
// 事件发布 Trait
// ==========================================

/// 级联事件发布者 Trait
///
/// Engine 层定义，外层实现，解除 Engine 对展示/监控层的依赖
pub trait CascadeEventPublisher: Send + Sync {
    /// 发布级联事件
    fn publish(&self, event: CascadeEvent) -> Result<(), Box<dyn Error + Send + Sync>>;
}

/// 空操作事件发布者
///
/// 用于不需要进度回报的场景（如单元测试）
#[derive(Debug, Clone, Default)]
pub struct NoOpEventPublisher;

impl CascadeEventPublisher for NoOpEventPublisher {
    fn publish(&self, event: CascadeEvent) -> Result<(), Box<dyn Error + Send + Sync>> {
        tracing::debug!(
            "NoOpEventPublisher: 跳过事件发布 - event_type={}, progress={}/{}",
            event.event_type.as_str(),
            event.rules_completed,
            event.rules_total
        );
        Ok(())
    }
}

/// 可选的事件发布者包装
///
/// 简化 Option<Arc<dyn CascadeEventPublisher>> 的使用
pub struct OptionalEventPublisher {
    inner: Option<Arc<dyn CascadeEventPublisher>>,
}

impl OptionalEventPublisher {
    /// 创建带发布者的实例
    pub fn with_publisher(publisher: Arc<dyn CascadeEventPublisher>) -> Self {
        Self {
            inner: Some(publisher),
        }
    }

    /// 创建空实例（不发布事件）
    pub fn none() -> Self {
        Self { inner: None }
    }

    /// 发布事件（如果有发布者）
    ///
    /// 发布失败只记 warn，不影响级联本身
    pub fn publish(&self, event: CascadeEvent) {
        if let Some(publisher) = &self.inner {
            if let Err(e) = publisher.publish(event) {
                tracing::warn!("级联事件发布失败（忽略）: {}", e);
            }
        }
    }

    /// 检查是否配置了发布者
    pub fn is_configured(&self) -> bool {
        self.inner.is_some()
    }
}

impl Default for OptionalEventPublisher {
    fn default() -> Self {
        Self::none()
    }
}
