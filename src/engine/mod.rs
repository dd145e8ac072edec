// ==========================================
// 考试排期系统 - 引擎层
// ==========================================
// 职责: 实现排考 / 冲突检测 / 审批 / 统计规则
// 红线: Engine 不拼 SQL, 输入输出均为领域对象
// ==========================================

pub mod approval;
pub mod conflict_detector;
pub mod scheduler;
pub mod statistics;

// 重导出核心引擎
pub use approval::{ApprovalError, ApprovalPair, ApprovalWorkflow, ExamLockRegistry};
pub use conflict_detector::{ConflictCost, ConflictDetector, DetectionContext};
pub use scheduler::{ConstraintScheduler, ScheduleOutcome};
pub use statistics::StatisticsAggregator;
