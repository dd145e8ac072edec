// ==========================================
// 考试排期系统 - 统计汇总领域模型
// ==========================================
// 只读汇总, 由 StatisticsAggregator 按需重算
// ==========================================

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ==========================================
// StatisticsSummary - 全局统计
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsSummary {
    pub total_students: usize,
    pub total_professors: usize,
    pub total_exams: usize,
    pub conflict_count: usize,
    pub department_stats: Vec<DepartmentStats>,
    pub room_utilization: BTreeMap<i64, usize>, // room_id -> 考试占用次数

    // ===== 审批进度 =====
    pub published_exams: usize,
    pub pending_exams: usize,
    pub rejected_exams: usize,

    /// 涉及至少一条冲突的考试占比 (0.0..=1.0)
    pub conflict_rate: f64,
}

// ==========================================
// DepartmentStats - 院系维度统计
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartmentStats {
    pub department_id: i64,
    pub department: String,
    pub exam_count: usize,
    pub student_count: usize, // 参加该院系考试的去重学生数
}
