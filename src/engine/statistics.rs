// ==========================================
// 考试排期系统 - 统计汇总引擎
// ==========================================
// 职责: 基于当前考试集合与冲突列表计算只读汇总
// 红线: 只读, 不修改任何数据
// ==========================================

use crate::domain::academic::AcademicDataset;
use crate::domain::conflict::Conflict;
use crate::domain::exam::Exam;
use crate::domain::statistics::{DepartmentStats, StatisticsSummary};
use crate::domain::types::ExamState;
use std::collections::{BTreeMap, BTreeSet};

// ==========================================
// StatisticsAggregator - 统计汇总引擎
// ==========================================
pub struct StatisticsAggregator {
    // 无状态引擎
}

impl Default for StatisticsAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl StatisticsAggregator {
    pub fn new() -> Self {
        Self {}
    }

    /// 计算统计汇总
    ///
    /// # 口径
    /// - 院系: 考试所属课程模块 -> 专业 -> 院系
    /// - 院系学生数: 该院系有考试的课程模块的去重选课学生
    /// - 考场占用: 每个 (考试, 考场) 记一次
    /// - 冲突率: 涉及至少一条冲突的考试 / 考试总数
    pub fn summarize(
        &self,
        dataset: &AcademicDataset,
        exams: &[Exam],
        conflicts: &[Conflict],
    ) -> StatisticsSummary {
        let mut per_department: BTreeMap<i64, (usize, BTreeSet<i64>)> = BTreeMap::new();
        let mut room_utilization: BTreeMap<i64, usize> = BTreeMap::new();
        let (mut published, mut pending, mut rejected) = (0, 0, 0);

        for exam in exams {
            if let Some(department) = dataset.department_of_module(exam.module_id()) {
                let entry = per_department
                    .entry(department.department_id)
                    .or_insert_with(|| (0, BTreeSet::new()));
                entry.0 += 1;
                entry
                    .1
                    .extend(dataset.enrolled_students(exam.module_id()).iter().copied());
            }

            for room_id in &exam.placement.room_ids {
                *room_utilization.entry(*room_id).or_insert(0) += 1;
            }

            match exam.state() {
                ExamState::Published => published += 1,
                ExamState::Rejected => rejected += 1,
                ExamState::PendingDeptHead | ExamState::PendingViceDean | ExamState::Draft => {
                    pending += 1
                }
            }
        }

        let department_stats = per_department
            .into_iter()
            .map(|(department_id, (exam_count, students))| DepartmentStats {
                department_id,
                department: dataset
                    .departments
                    .get(&department_id)
                    .map(|d| d.name.clone())
                    .unwrap_or_default(),
                exam_count,
                student_count: students.len(),
            })
            .collect();

        let involved: BTreeSet<i64> = conflicts.iter().flat_map(|c| c.exam_ids()).collect();
        let conflict_rate = if exams.is_empty() {
            0.0
        } else {
            involved.len() as f64 / exams.len() as f64
        };

        StatisticsSummary {
            total_students: dataset.students.len(),
            total_professors: dataset.professors.len(),
            total_exams: exams.len(),
            conflict_count: conflicts.len(),
            department_stats,
            room_utilization,
            published_exams: published,
            pending_exams: pending,
            rejected_exams: rejected,
            conflict_rate,
        }
    }
}
