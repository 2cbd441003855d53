// ==========================================
// 日志系统初始化
// ==========================================
// 使用 tracing 和 tracing-subscriber，RUST_LOG 控制级别
// ==========================================

use tracing_subscriber::{fmt, EnvFilter};

/// 无 RUST_LOG 时的默认过滤器
const DEFAULT_FILTER: &str = "info,margin_cascade=debug";

/// 初始化日志系统
///
/// # 环境变量
/// - RUST_LOG: 日志级别过滤器，例如 RUST_LOG=margin_cascade=trace
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_line_number(true)
        .init();
}

/// 初始化测试环境的日志系统（可重复调用，输出走测试捕获）
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
