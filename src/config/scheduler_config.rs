// ==========================================
// 考试排期系统 - 排考参数
// ==========================================
// 职责: 定义排考引擎所需的参数集合与读取接口
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use serde::{Deserialize, Serialize};
use std::error::Error;

/// 排考参数 (均可在 config_kv 中按 key 覆写)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// 每场考试时长（分钟）
    pub exam_duration_minutes: u32,

    /// 相邻时段开考间隔（分钟）: 2h 考试 + 1h 间隔
    pub slot_step_minutes: u32,

    /// 考试期间单个考场的座位上限
    pub room_exam_capacity_cap: u32,

    /// 每场考试的监考人数
    pub supervisors_per_exam: usize,

    /// 教师每日监考软上限（超出仅告警）
    pub professor_daily_limit: u32,

    /// 学生每日考试数（排考偏好，降级时放宽）
    pub student_daily_exam_limit: u32,

    /// 同一专业每日最多一场考试（排考偏好，降级时放宽）
    pub formation_single_exam_per_day: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            exam_duration_minutes: 120,
            slot_step_minutes: 180,
            room_exam_capacity_cap: 20,
            supervisors_per_exam: 2,
            professor_daily_limit: 3,
            student_daily_exam_limit: 1,
            formation_single_exam_per_day: true,
        }
    }
}

// ==========================================
// SchedulerConfigReader Trait
// ==========================================
// 实现者: ConfigManager（从 config_kv 表读取）
pub trait SchedulerConfigReader: Send + Sync {
    /// 读取排考参数, 缺失项使用默认值
    fn get_scheduler_config(&self) -> Result<SchedulerConfig, Box<dyn Error>>;
}
