// ==========================================
// 考试排期系统 - 冲突检测引擎
// ==========================================
// 职责: 对一组考试落位做纯函数式冲突检测
// 输入: 考试集合 + 教学基础数据快照
// 输出: 学生冲突 / 监考冲突 / 容量冲突 (稳定顺序)
// 红线: 无副作用, 同一输入多次调用结果一致
// ==========================================

use crate::domain::academic::AcademicDataset;
use crate::domain::conflict::{
    CapacityConflictDetails, Conflict, ProfessorConflictDetails, ScheduleWarning,
    StudentConflictDetails,
};
use crate::domain::exam::{Exam, ExamPlacement};
use std::collections::BTreeMap;

// ==========================================
// DetectionContext - 检测上下文
// ==========================================
#[derive(Debug, Clone, Copy)]
pub struct DetectionContext<'a> {
    pub dataset: &'a AcademicDataset,
    pub capacity_cap: u32, // 单考场考试座位上限
}

impl<'a> DetectionContext<'a> {
    pub fn new(dataset: &'a AcademicDataset, capacity_cap: u32) -> Self {
        Self {
            dataset,
            capacity_cap,
        }
    }

    /// 落位的有效容量之和 (未知考场按 0 计)
    pub fn effective_capacity(&self, placement: &ExamPlacement) -> u32 {
        placement
            .room_ids
            .iter()
            .filter_map(|id| self.dataset.rooms.get(id))
            .map(|room| room.exam_capacity(self.capacity_cap))
            .sum()
    }
}

// ==========================================
// ConflictCost - 候选落位与已接受落位之间的冲突计数
// ==========================================
// 比较顺序: 学生冲突 -> 监考冲突 -> 容量缺口
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct ConflictCost {
    pub student_conflicts: usize,
    pub professor_conflicts: usize,
    pub capacity_shortfall: u32,
}

impl ConflictCost {
    pub fn is_clean(&self) -> bool {
        *self == ConflictCost::default()
    }
}

// ==========================================
// ConflictDetector - 冲突检测引擎
// ==========================================
pub struct ConflictDetector {
    // 无状态引擎
}

impl Default for ConflictDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl ConflictDetector {
    pub fn new() -> Self {
        Self {}
    }

    // ==========================================
    // 核心方法
    // ==========================================

    /// 检测考试集合中的全部冲突
    ///
    /// # 规则
    /// 1) 同日且时间窗相交的两场考试: 共同学生 -> StudentConflict
    /// 2) 同日且时间窗相交的两场考试: 共同监考 -> ProfessorConflict
    /// 3) 单场考试: 有效容量之和 < 选课人数 -> CapacityConflict
    ///
    /// # 输出顺序
    /// 考试按 exam_id 升序; 成对冲突按 (小ID, 大ID) 排列, 同一对先学生后监考;
    /// 容量冲突排在所有成对冲突之后
    pub fn detect(&self, ctx: &DetectionContext, exams: &[Exam]) -> Vec<Conflict> {
        let mut sorted: Vec<&Exam> = exams.iter().collect();
        sorted.sort_by_key(|e| e.exam_id);

        let mut conflicts = Vec::new();

        for (i, a) in sorted.iter().enumerate() {
            for b in sorted.iter().skip(i + 1) {
                if !a.placement.overlaps(&b.placement) {
                    continue;
                }

                let shared = self.shared_students(ctx, &a.placement, &b.placement);
                if !shared.is_empty() {
                    conflicts.push(Conflict::StudentConflict {
                        description: format!(
                            "Exams {} and {} overlap on {} and share {} student(s)",
                            a.exam_id,
                            b.exam_id,
                            a.date(),
                            shared.len()
                        ),
                        details: StudentConflictDetails {
                            exam_ids: [a.exam_id, b.exam_id],
                            module_ids: [a.module_id(), b.module_id()],
                            date: a.date(),
                            shared_student_ids: shared,
                        },
                    });
                }

                let professors = self.shared_supervisors(&a.placement, &b.placement);
                if !professors.is_empty() {
                    conflicts.push(Conflict::ProfessorConflict {
                        description: format!(
                            "Exams {} and {} overlap on {} and share {} supervisor(s)",
                            a.exam_id,
                            b.exam_id,
                            a.date(),
                            professors.len()
                        ),
                        details: ProfessorConflictDetails {
                            exam_ids: [a.exam_id, b.exam_id],
                            date: a.date(),
                            professor_ids: professors,
                        },
                    });
                }
            }
        }

        for exam in &sorted {
            if let Some(conflict) = self.capacity_conflict(ctx, exam) {
                conflicts.push(conflict);
            }
        }

        conflicts
    }

    /// 单场考试的容量冲突 (无缺口返回 None)
    pub fn capacity_conflict(&self, ctx: &DetectionContext, exam: &Exam) -> Option<Conflict> {
        let students = ctx.dataset.enrolled_count(exam.module_id());
        let capacity = ctx.effective_capacity(&exam.placement);
        if (capacity as usize) >= students {
            return None;
        }

        Some(Conflict::CapacityConflict {
            description: format!(
                "Exam {} has {} students but only {} capacity",
                exam.exam_id, students, capacity
            ),
            details: CapacityConflictDetails {
                exam_id: exam.exam_id,
                module_id: exam.module_id(),
                room_ids: exam.placement.room_ids.clone(),
                students,
                capacity,
            },
        })
    }

    /// 候选落位相对已接受落位的冲突计数
    ///
    /// # 说明
    /// - 供排考引擎在接受候选前校验, 与 detect 使用同一套规则
    pub fn cost_against(
        &self,
        ctx: &DetectionContext,
        candidate: &ExamPlacement,
        accepted: &[ExamPlacement],
    ) -> ConflictCost {
        let mut cost = ConflictCost::default();

        for other in accepted.iter().filter(|o| o.overlaps(candidate)) {
            if !self.shared_students(ctx, candidate, other).is_empty() {
                cost.student_conflicts += 1;
            }
            if !self.shared_supervisors(candidate, other).is_empty() {
                cost.professor_conflicts += 1;
            }
        }

        let students = ctx.dataset.enrolled_count(candidate.module_id) as u32;
        cost.capacity_shortfall = students.saturating_sub(ctx.effective_capacity(candidate));
        cost
    }

    /// 教师单日监考场次超限提示
    ///
    /// # 规则
    /// - 同一教师同一日期监考场次 > limit 时输出一条提示
    /// - 按 (日期, 教师ID) 升序输出
    pub fn professor_load_warnings(&self, exams: &[Exam], limit: u32) -> Vec<ScheduleWarning> {
        let mut load: BTreeMap<(chrono::NaiveDate, i64), usize> = BTreeMap::new();
        for exam in exams {
            for professor_id in &exam.placement.professor_ids {
                *load.entry((exam.date(), *professor_id)).or_insert(0) += 1;
            }
        }

        load.into_iter()
            .filter(|(_, count)| *count > limit as usize)
            .map(|((date, professor_id), exam_count)| ScheduleWarning::ProfessorDailyLoad {
                description: format!(
                    "Professor {} has {} exams on {} (limit {})",
                    professor_id, exam_count, date, limit
                ),
                professor_id,
                date,
                exam_count,
                limit,
            })
            .collect()
    }

    // ==========================================
    // 辅助方法
    // ==========================================

    /// 两个落位的共同学生 (升序)
    fn shared_students(
        &self,
        ctx: &DetectionContext,
        a: &ExamPlacement,
        b: &ExamPlacement,
    ) -> Vec<i64> {
        let sa = ctx.dataset.enrolled_students(a.module_id);
        let sb = ctx.dataset.enrolled_students(b.module_id);
        sa.intersection(sb).copied().collect()
    }

    /// 两个落位的共同监考教师 (升序)
    fn shared_supervisors(&self, a: &ExamPlacement, b: &ExamPlacement) -> Vec<i64> {
        let mut shared: Vec<i64> = a
            .professor_ids
            .iter()
            .filter(|p| b.professor_ids.contains(p))
            .copied()
            .collect();
        shared.sort_unstable();
        shared.dedup();
        shared
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::academic::{Department, Enrollment, Formation, Module, Room, Student};
    use crate::domain::types::ApprovalStatus;
    use chrono::{NaiveDate, NaiveTime};

    // 两门课程共享学生 1..=10, 考场 1 容量 30, 考场 2 容量 5
    fn dataset() -> AcademicDataset {
        let students: Vec<Student> = (1..=15)
            .map(|id| Student {
                student_id: id,
                registration_no: format!("S{:03}", id),
                last_name: "L".into(),
                first_name: "F".into(),
                formation_id: 1,
                promo: None,
            })
            .collect();
        let mut enrollments = Vec::new();
        for id in 1..=10 {
            enrollments.push(Enrollment { student_id: id, module_id: 1 });
            enrollments.push(Enrollment { student_id: id, module_id: 2 });
        }
        for id in 11..=15 {
            enrollments.push(Enrollment { student_id: id, module_id: 3 });
        }

        let room = |id: i64, capacity: u32| Room {
            room_id: id,
            name: format!("R{}", id),
            capacity,
            room_type: "td".into(),
            building_id: 1,
            building_name: "A".into(),
        };

        AcademicDataset::new(
            vec![Department { department_id: 1, name: "Info".into() }],
            vec![Formation { formation_id: 1, name: "L3".into(), department_id: 1, level: None }],
            (1..=3)
                .map(|id| Module { module_id: id, name: format!("M{}", id), credits: None, formation_id: 1 })
                .collect(),
            students,
            vec![],
            vec![room(1, 30), room(2, 5)],
            enrollments,
        )
    }

    fn exam(id: i64, module_id: i64, hour: u32, rooms: Vec<i64>, profs: Vec<i64>) -> Exam {
        Exam {
            exam_id: id,
            placement: ExamPlacement {
                module_id,
                date: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
                start_time: NaiveTime::from_hms_opt(hour, 0, 0).unwrap(),
                duration_minutes: 120,
                room_ids: rooms,
                professor_ids: profs,
            },
            dept_head_approval: ApprovalStatus::Pending,
            vice_dean_approval: ApprovalStatus::Pending,
            created_at: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_student_conflict_on_overlap() {
        let ds = dataset();
        let ctx = DetectionContext::new(&ds, 100);
        let detector = ConflictDetector::new();

        let conflicts = detector.detect(&ctx, &[exam(7, 2, 9, vec![1], vec![2]), exam(3, 1, 10, vec![1], vec![1])]);
        assert_eq!(conflicts.len(), 1);
        match &conflicts[0] {
            Conflict::StudentConflict { details, .. } => {
                assert_eq!(details.exam_ids, [3, 7]);
                assert_eq!(details.module_ids, [1, 2]);
                assert_eq!(details.shared_student_ids.len(), 10);
            }
            other => panic!("unexpected conflict: {:?}", other),
        }
    }

    #[test]
    fn test_back_to_back_exams_do_not_conflict() {
        let ds = dataset();
        let ctx = DetectionContext::new(&ds, 100);
        let detector = ConflictDetector::new();

        let exams = [exam(1, 1, 9, vec![1], vec![1]), exam(2, 2, 11, vec![1], vec![1])];
        assert!(detector.detect(&ctx, &exams).is_empty());
    }

    #[test]
    fn test_professor_and_capacity_conflicts_order() {
        let ds = dataset();
        let ctx = DetectionContext::new(&ds, 20);
        let detector = ConflictDetector::new();

        // 课程1与课程3无共同学生, 但共用监考 5; 课程1 仅 5 座
        let exams = [exam(1, 1, 9, vec![2], vec![5, 6]), exam(2, 3, 9, vec![1], vec![5])];
        let conflicts = detector.detect(&ctx, &exams);
        let tags: Vec<&str> = conflicts.iter().map(|c| c.type_tag()).collect();
        assert_eq!(tags, vec!["professor_conflict", "capacity_conflict"]);
        assert_eq!(conflicts[1].exam_ids(), vec![1]);

        // 幂等
        assert_eq!(detector.detect(&ctx, &exams), conflicts);
    }

    #[test]
    fn test_capacity_cap_applies() {
        let ds = dataset();
        let detector = ConflictDetector::new();
        // 考场 1 额定 30, 上限 8 时不足 10 人
        let e = exam(1, 1, 9, vec![1], vec![1]);
        assert!(detector.capacity_conflict(&DetectionContext::new(&ds, 8), &e).is_some());
        assert!(detector.capacity_conflict(&DetectionContext::new(&ds, 20), &e).is_none());
    }

    #[test]
    fn test_cost_against_counts_each_kind() {
        let ds = dataset();
        let ctx = DetectionContext::new(&ds, 20);
        let detector = ConflictDetector::new();

        let accepted = vec![exam(1, 1, 9, vec![1], vec![1]).placement];
        let candidate = exam(2, 2, 10, vec![2], vec![1]).placement;
        let cost = detector.cost_against(&ctx, &candidate, &accepted);
        assert_eq!(cost.student_conflicts, 1);
        assert_eq!(cost.professor_conflicts, 1);
        assert_eq!(cost.capacity_shortfall, 5);
        assert!(!cost.is_clean());
    }

    #[test]
    fn test_professor_load_warning_over_limit() {
        let detector = ConflictDetector::new();
        let exams: Vec<Exam> = (0..4).map(|i| exam(i + 1, 1, 8 + 2 * i as u32, vec![1], vec![9])).collect();

        assert!(detector.professor_load_warnings(&exams[..3], 3).is_empty());
        let warnings = detector.professor_load_warnings(&exams, 3);
        assert_eq!(warnings.len(), 1);
        match &warnings[0] {
            ScheduleWarning::ProfessorDailyLoad { professor_id, exam_count, .. } => {
                assert_eq!(*professor_id, 9);
                assert_eq!(*exam_count, 4);
            }
            other => panic!("unexpected warning: {:?}", other),
        }
    }
}
