use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info};

use crate::analytics::ClickManager;
use crate::system::signal::wait_for_shutdown_signal;

/// 关闭超时时间（秒）
const SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// 单个任务超时时间（秒）
const TASK_TIMEOUT_SECS: u64 = 10;

/// Wait for Ctrl+C / SIGTERM, then flush buffered counters.
pub async fn listen_for_shutdown(click_manager: Arc<ClickManager>) {
    wait_for_shutdown_signal().await;
    info!("Shutdown signal received, flushing data...");

    let shutdown_result = timeout(
        Duration::from_secs(SHUTDOWN_TIMEOUT_SECS),
        perform_shutdown_tasks(&click_manager),
    )
    .await;

    match shutdown_result {
        Ok(()) => {
            info!("All shutdown tasks completed successfully");
        }
        Err(_) => {
            error!(
                "Shutdown tasks timed out after {} seconds! Forcing exit.",
                SHUTDOWN_TIMEOUT_SECS
            );
            std::process::exit(1);
        }
    }
}

/// 执行所有关闭任务（在超时内调用）
pub async fn perform_shutdown_tasks(click_manager: &ClickManager) {
    let pending = click_manager.buffer_size();
    match timeout(Duration::from_secs(TASK_TIMEOUT_SECS), click_manager.flush()).await {
        Ok(()) => {
            info!("ClickManager flushed successfully ({} pending increments)", pending);
        }
        Err(_) => {
            error!(
                "ClickManager flush timed out after {} seconds",
                TASK_TIMEOUT_SECS
            );
        }
    }
}
