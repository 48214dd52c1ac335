//! 日志初始化
//!
//! 基于 `tracing-subscriber`（`fmt` + `EnvFilter`）。`RUST_LOG` 优先于默认指令；
//! 依赖中通过 `log` 宏输出的记录经 `tracing-log` 转发。

use tracing_subscriber::EnvFilter;

/// 默认过滤指令
pub const DEFAULT_DIRECTIVE: &str = "motiongen=info";

/// 以 [`DEFAULT_DIRECTIVE`] 初始化全局日志
///
/// 重复调用是安全的：已经存在全局 subscriber 时什么也不做。
pub fn init_logger() {
    init_logger_with(DEFAULT_DIRECTIVE);
}

/// 以指定的默认过滤指令初始化全局日志；返回本次是否安装了 subscriber
pub fn init_logger_with(default_directive: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        return false;
    }
    if let Err(e) = tracing_log::LogTracer::init() {
        tracing::debug!("log records not forwarded: {e}");
    }
    true
}
