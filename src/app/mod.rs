// ==========================================
// 考试排期系统 - 应用层
// ==========================================
// 职责: 组装共享状态, 提供 JSON 进出的命令入口
// ==========================================

pub mod commands;
pub mod state;

// 重导出
pub use commands::ErrorResponse;
pub use state::{get_default_db_path, AppState};
