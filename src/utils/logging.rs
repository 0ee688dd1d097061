/// 日志工具模块
///
/// 提供订阅器初始化和启动信息输出
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::infrastructure::GatewayStatsSnapshot;

/// 初始化日志订阅器
///
/// 优先使用 `RUST_LOG`，否则默认 `info`，`verbose` 时为 `debug`。
/// 重复调用不会报错。
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!(
        "🚀 试卷分析启动 - {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("🖼️  视觉模型: {}", config.vision_model);
    info!("📝 文本模型: {}", config.text_model);
    info!(
        "🔁 最大尝试次数: {}，并发限制退避: {:?}，网络错误退避: {:?}",
        config.max_retries, config.rate_limit_backoff, config.network_backoff
    );
    info!("{}", "=".repeat(60));
}

/// 打印模型调用统计
pub fn log_gateway_stats(stats: &GatewayStatsSnapshot) {
    info!("\n{}", "─".repeat(60));
    info!("📊 模型调用统计");
    info!("✅ 成功: {}/{}", stats.succeeded, stats.admitted);
    info!("🔁 重试: {}", stats.retried);
    info!("❌ 失败: {}", stats.failed);
    info!("{}", "─".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大字符数
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text_counts_chars() {
        assert_eq!(truncate_text("一二三四五", 3), "一二三...");
        assert_eq!(truncate_text("abc", 3), "abc");
    }
}
