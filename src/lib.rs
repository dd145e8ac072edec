// ==========================================
// 考试排期系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 约束排考 + 冲突检测 + 两级审批 (人工最终控制权)
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 配置层 - 排考参数
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// 性能观测（SQL 计数/慢查询）
pub mod perf;

// API 层 - 业务接口
pub mod api;

// 应用层 - 共享状态与命令
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{ApprovalStage, ApprovalStatus, ExamState, UserRole};

// 领域实体
pub use domain::{
    AcademicDataset, ActionLog, ActionType, Conflict, DateRange, Exam, ExamFilter, ExamPlacement,
    GenerationRequest, ScheduleWarning, StatisticsSummary,
};

// 引擎
pub use engine::{
    ApprovalWorkflow, ConflictDetector, ConstraintScheduler, ExamLockRegistry, StatisticsAggregator,
};

// API
pub use api::{ApiError, ApiResult, ApprovalApi, CallerContext, TimetableApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "考试排期系统";

// 数据库版本
pub const DB_VERSION: &str = "v0.1";
