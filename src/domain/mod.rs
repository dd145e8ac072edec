// ==========================================
// 考试排期系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型
// 红线: 不含数据访问逻辑, 不含引擎逻辑
// ==========================================

pub mod academic;
pub mod action_log;
pub mod conflict;
pub mod exam;
pub mod statistics;
pub mod timetable;
pub mod types;

// 重导出核心类型
pub use academic::{
    AcademicDataset, Building, Department, Enrollment, Formation, Module, Professor, Room, Student,
};
pub use action_log::{ActionLog, ActionType};
pub use conflict::{
    CapacityConflictDetails, Conflict, ProfessorConflictDetails, ScheduleWarning,
    StudentConflictDetails,
};
pub use exam::{DateRange, Exam, ExamFilter, ExamPlacement, GenerationRequest};
pub use statistics::{DepartmentStats, StatisticsSummary};
pub use timetable::{ProfessorRef, ProfessorTimetable, RoomRef, StudentTimetable, TimetableEntry};
pub use types::{ApprovalStage, ApprovalStatus, ExamState, UserRole};
