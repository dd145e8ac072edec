// ==========================================
// 考试排期系统 - API 层
// ==========================================
// 职责: 提供业务 API 接口, 供应用层命令调用
// 红线: 每个请求显式携带 CallerContext
// ==========================================

pub mod approval_api;
pub mod context;
pub mod dto;
pub mod error;
pub mod timetable_api;

// 重导出核心类型
pub use approval_api::ApprovalApi;
pub use context::CallerContext;
pub use dto::{ExamView, GenerationResponse};
pub use error::{ApiError, ApiResult};
pub use timetable_api::TimetableApi;
