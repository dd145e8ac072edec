// ==========================================
// 考试排期系统 - API 数据传输对象
// ==========================================

use crate::domain::conflict::{Conflict, ScheduleWarning};
use crate::domain::exam::Exam;
use crate::domain::types::ExamState;
use serde::{Deserialize, Serialize};

// ==========================================
// GenerationResponse - 排考生成结果
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResponse {
    pub success: bool,                 // 无冲突时为 true
    pub message: String,
    pub generated_exams: usize,        // 本次写入的考试数
    pub removed_exams: usize,          // 区间内被替换的旧考试数
    pub exams: Vec<ExamView>,          // 本次写入的考试
    pub conflicts: Vec<Conflict>,      // 全量考试重算的冲突
    pub warnings: Vec<ScheduleWarning>,
}

impl GenerationResponse {
    pub fn new(
        removed_exams: usize,
        exams: Vec<Exam>,
        conflicts: Vec<Conflict>,
        warnings: Vec<ScheduleWarning>,
    ) -> Self {
        let generated_exams = exams.len();
        let success = conflicts.is_empty();
        let message = if success {
            format!("Generated {} exams", generated_exams)
        } else {
            format!(
                "Generated {} exams, completed with {} conflicts",
                generated_exams,
                conflicts.len()
            )
        };

        Self {
            success,
            message,
            generated_exams,
            removed_exams,
            exams: exams.into_iter().map(ExamView::from).collect(),
            conflicts,
            warnings,
        }
    }
}

// ==========================================
// ExamView - 考试 + 派生状态
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamView {
    #[serde(flatten)]
    pub exam: Exam,
    pub state: ExamState,
}

impl From<Exam> for ExamView {
    fn from(exam: Exam) -> Self {
        let state = exam.state();
        Self { exam, state }
    }
}
