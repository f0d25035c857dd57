use anyhow::anyhow;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, FmtSubscriber, Layer, Registry};

use crate::app_config::settings::LogSettings;

// 设置日志
// 非 LOCAL 环境写滚动文件，返回的 guard 需要持有到进程退出，否则缓冲日志会丢失
pub fn setup_logging(settings: &LogSettings) -> anyhow::Result<Vec<WorkerGuard>> {
    let mut guards = Vec::new();

    if settings.app_env == "LOCAL" {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(EnvFilter::new(&settings.level))
            .with_ansi(true)
            .with_target(false)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true)
            .with_level(true)
            .with_writer(std::io::stdout)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let info_file = RollingFileAppender::new(Rotation::DAILY, &settings.dir, "info.log");
        let error_file = RollingFileAppender::new(Rotation::DAILY, &settings.dir, "error.log");

        let (info_non_blocking, info_guard) = tracing_appender::non_blocking(info_file);
        let (error_non_blocking, error_guard) = tracing_appender::non_blocking(error_file);
        guards.push(info_guard);
        guards.push(error_guard);

        let subscriber = Registry::default()
            .with(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_thread_ids(true)
                    .with_thread_names(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_level(true)
                    .with_writer(info_non_blocking)
                    .with_filter(EnvFilter::new(&settings.level)),
            )
            .with(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_thread_ids(true)
                    .with_thread_names(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_level(true)
                    .with_writer(error_non_blocking)
                    .with_filter(EnvFilter::new("error")),
            );

        tracing::subscriber::set_global_default(subscriber)?;
    }

    // rbatis 通过 log crate 输出 sql
    if settings.db_debug {
        fast_log::init(
            fast_log::Config::new()
                .console()
                .level(log::LevelFilter::Debug),
        )
        .map_err(|e| anyhow!("fast_log init error: {}", e))?;
    }
    Ok(guards)
}
