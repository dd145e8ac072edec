// ==========================================
// 考试排期系统 - 命令行主入口
// ==========================================
// 初始化日志, 打开默认数据库, 输出统计汇总 (JSON)
// ==========================================

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use exam_timetable::api::CallerContext;
use exam_timetable::app::{commands, get_default_db_path, AppState};
use exam_timetable::logging;

const LOG_FORMAT_ENV: &str = "EXAM_TIMETABLE_LOG_FORMAT";

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志系统 (EXAM_TIMETABLE_LOG_FORMAT=json 输出 JSON 行)
    match std::env::var(LOG_FORMAT_ENV).as_deref() {
        Ok("json") => logging::init_json(),
        _ => logging::init(),
    }

    tracing::info!("==================================================");
    tracing::info!("{}", exam_timetable::APP_NAME);
    tracing::info!("系统版本: {}", exam_timetable::VERSION);
    tracing::info!("==================================================");

    // 获取数据库路径 (命令行参数优先)
    let db_path = std::env::args()
        .nth(1)
        .unwrap_or_else(get_default_db_path);
    tracing::info!("使用数据库: {}", db_path);

    let state = AppState::new(db_path)
        .map_err(|e| anyhow!(e))
        .context("无法初始化AppState")?;
    let state = Arc::new(state);

    let ctx = CallerContext::admin("cli");
    let summary = commands::get_statistics(state, ctx)
        .await
        .map_err(|e| anyhow!(e))
        .context("统计汇总失败")?;

    let pretty: serde_json::Value = serde_json::from_str(&summary)?;
    println!("{}", serde_json::to_string_pretty(&pretty)?);

    Ok(())
}
