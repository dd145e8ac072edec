// ==========================================
// 考试排期系统 - 冲突领域模型
// ==========================================
// 冲突为派生数据, 不落库, 每次查询基于当前考试集合重算
// 序列化格式: {"type": ..., "description": ..., "details": {...}}
// ==========================================

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

// ==========================================
// Conflict - 冲突 (封闭变体)
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Conflict {
    /// 两场时间重叠的考试存在共同学生
    StudentConflict {
        description: String,
        details: StudentConflictDetails,
    },
    /// 两场时间重叠的考试存在共同监考教师
    ProfessorConflict {
        description: String,
        details: ProfessorConflictDetails,
    },
    /// 考场有效容量之和小于选课人数
    CapacityConflict {
        description: String,
        details: CapacityConflictDetails,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentConflictDetails {
    pub exam_ids: [i64; 2],            // 冲突考试 (升序)
    pub module_ids: [i64; 2],          // 对应课程模块
    pub date: NaiveDate,               // 冲突日期
    pub shared_student_ids: Vec<i64>,  // 共同学生 (升序)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfessorConflictDetails {
    pub exam_ids: [i64; 2],            // 冲突考试 (升序)
    pub date: NaiveDate,               // 冲突日期
    pub professor_ids: Vec<i64>,       // 重复监考的教师 (升序)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityConflictDetails {
    pub exam_id: i64,
    pub module_id: i64,
    pub room_ids: Vec<i64>,
    pub students: usize,               // 选课人数
    pub capacity: u32,                 // 有效容量之和
}

impl Conflict {
    /// 冲突类型标签 (与序列化的 type 字段一致)
    pub fn type_tag(&self) -> &'static str {
        match self {
            Conflict::StudentConflict { .. } => "student_conflict",
            Conflict::ProfessorConflict { .. } => "professor_conflict",
            Conflict::CapacityConflict { .. } => "capacity_conflict",
        }
    }

    pub fn description(&self) -> &str {
        match self {
            Conflict::StudentConflict { description, .. }
            | Conflict::ProfessorConflict { description, .. }
            | Conflict::CapacityConflict { description, .. } => description,
        }
    }

    /// 涉及的考试ID
    pub fn exam_ids(&self) -> Vec<i64> {
        match self {
            Conflict::StudentConflict { details, .. } => details.exam_ids.to_vec(),
            Conflict::ProfessorConflict { details, .. } => details.exam_ids.to_vec(),
            Conflict::CapacityConflict { details, .. } => vec![details.exam_id],
        }
    }

    /// 冲突所在日期 (容量冲突无日期信息)
    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            Conflict::StudentConflict { details, .. } => Some(details.date),
            Conflict::ProfessorConflict { details, .. } => Some(details.date),
            Conflict::CapacityConflict { .. } => None,
        }
    }

    pub fn is_capacity(&self) -> bool {
        matches!(self, Conflict::CapacityConflict { .. })
    }
}

// ==========================================
// ScheduleWarning - 排考提示 (非冲突)
// ==========================================
// 软约束: 只提示, 不阻断生成
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScheduleWarning {
    /// 教师单日监考场次超过上限
    ProfessorDailyLoad {
        description: String,
        professor_id: i64,
        date: NaiveDate,
        exam_count: usize,
        limit: u32,
    },
    /// 在严格约束下找不到可行落位, 已降级排入
    DegradedPlacement {
        description: String,
        module_id: i64,
        date: NaiveDate,
        start_time: NaiveTime,
    },
}
