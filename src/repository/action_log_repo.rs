// ==========================================
// 考试排期系统 - 操作日志数据仓储
// ==========================================
// 表: action_log
// 红线: 所有写入 (排考生成 / 审批决定) 必须记录
// ==========================================

mod core;
mod queries;


pub use core::ActionLogRepository;
