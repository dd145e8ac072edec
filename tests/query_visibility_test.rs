// ==========================================
// 查询可见范围测试
// ==========================================
// 职责: 验证按角色过滤的考试列表、个人日程与统计鉴权
// ==========================================


#[cfg(test)]
mod query_visibility_test {
    use exam_timetable::api::{ApiError, CallerContext, ExamView};
    use exam_timetable::app::AppState;
    use exam_timetable::domain::exam::{DateRange, ExamFilter};
    use exam_timetable::domain::types::{ApprovalStage, ExamState};
    use std::sync::Arc;
    use tempfile::NamedTempFile;

    use crate::test_helpers::*;

    /// 5 场考试: 第 1 场已发布, 第 2 场被系主任驳回, 其余待审
    fn setup() -> (NamedTempFile, Arc<AppState>, Campus, Vec<ExamView>) {
        let (tmp, state) = create_test_state();
        let campus = seed_separate_formations(&state.academic_repo, 5, 10, 3, 6).unwrap();
        let response = state
            .timetable_api
            .generate_timetable(&admin(), &three_day_request())
            .unwrap();
        let exams = response.exams;

        let api = &state.approval_api;
        api.approve_exam(&dept_head(), ApprovalStage::DeptHead, exams[0].exam.exam_id, true)
            .unwrap();
        api.approve_exam(&dean(), ApprovalStage::ViceDean, exams[0].exam.exam_id, true)
            .unwrap();
        api.approve_exam(&dept_head(), ApprovalStage::DeptHead, exams[1].exam.exam_id, false)
            .unwrap();

        (tmp, state, campus, exams)
    }

    // ==========================================
    // 考试列表
    // ==========================================

    #[test]
    fn test_list_exams_is_filtered_by_role() {
        let (_tmp, state, campus, exams) = setup();
        let api = &state.timetable_api;
        let all = ExamFilter::default();

        let student = CallerContext::student("etu", campus.students_by_module[0][0]);
        let student_view = api.list_exams(&student, &all).unwrap();
        assert_eq!(student_view.len(), 1);
        assert_eq!(student_view[0].exam.exam_id, exams[0].exam.exam_id);
        assert_eq!(student_view[0].state, ExamState::Published);

        let professor = CallerContext::professor("prof", campus.professor_ids[0]);
        assert_eq!(api.list_exams(&professor, &all).unwrap().len(), 1);

        let dh_default = api.list_exams(&dept_head(), &all).unwrap();
        assert_eq!(dh_default.len(), 4);
        assert!(dh_default.iter().all(|v| v.state != ExamState::Rejected));

        let with_pending = ExamFilter {
            include_pending: true,
            ..ExamFilter::default()
        };
        assert_eq!(api.list_exams(&dept_head(), &with_pending).unwrap().len(), 5);

        assert_eq!(api.list_exams(&admin(), &all).unwrap().len(), 5);
        assert_eq!(api.list_exams(&dean(), &all).unwrap().len(), 5);
    }

    #[test]
    fn test_list_exams_applies_filter_fields() {
        let (_tmp, state, campus, _exams) = setup();
        let api = &state.timetable_api;

        let by_module = ExamFilter {
            module_id: Some(campus.module_ids[3]),
            ..ExamFilter::default()
        };
        let found = api.list_exams(&admin(), &by_module).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].exam.module_id(), campus.module_ids[3]);

        let later = ExamFilter {
            start_date: Some(date(2024, 2, 1)),
            ..ExamFilter::default()
        };
        assert!(api.list_exams(&admin(), &later).unwrap().is_empty());
    }

    #[test]
    fn test_get_exam_hides_unpublished_from_students() {
        let (_tmp, state, _campus, exams) = setup();
        let api = &state.timetable_api;
        let student = CallerContext::student("etu", 1);

        assert!(api.get_exam(&student, exams[0].exam.exam_id).is_ok());
        assert!(matches!(
            api.get_exam(&student, exams[2].exam.exam_id),
            Err(ApiError::NotFound(_))
        ));
        assert!(api.get_exam(&dept_head(), exams[2].exam.exam_id).is_ok());
    }

    // ==========================================
    // 个人日程
    // ==========================================

    #[test]
    fn test_student_timetable_shows_published_exams_only() {
        let (_tmp, state, campus, exams) = setup();
        let api = &state.timetable_api;

        let published_student = campus.students_by_module[0][0];
        let ctx = CallerContext::student("etu", published_student);
        let timetable = api.get_student_timetable(&ctx, published_student).unwrap();
        assert_eq!(timetable.student_id, published_student);
        assert_eq!(timetable.timetable.len(), 1);

        let entry = &timetable.timetable[0];
        assert_eq!(entry.exam_id, exams[0].exam.exam_id);
        assert_eq!(entry.module, "Module 1");
        assert_eq!(entry.rooms.len(), exams[0].exam.placement.room_ids.len());
        assert_eq!(entry.rooms[0].building, "Bâtiment A");
        assert_eq!(entry.professors.len(), 2);

        // 所选课程的考试尚未发布
        let pending_student = campus.students_by_module[2][0];
        let pending = api
            .get_student_timetable(&admin(), pending_student)
            .unwrap();
        assert!(pending.timetable.is_empty());
    }

    #[test]
    fn test_timetable_authorization() {
        let (_tmp, state, campus, _exams) = setup();
        let api = &state.timetable_api;
        let me = campus.students_by_module[0][0];
        let other = campus.students_by_module[0][1];

        let ctx = CallerContext::student("etu", me);
        assert!(matches!(
            api.get_student_timetable(&ctx, other),
            Err(ApiError::Forbidden(_))
        ));

        let professor = CallerContext::professor("prof", campus.professor_ids[0]);
        assert!(matches!(
            api.get_student_timetable(&professor, me),
            Err(ApiError::Forbidden(_))
        ));
        assert!(matches!(
            api.get_professor_timetable(&ctx, campus.professor_ids[0]),
            Err(ApiError::Forbidden(_))
        ));
        assert!(matches!(
            api.get_professor_timetable(&professor, campus.professor_ids[1]),
            Err(ApiError::Forbidden(_))
        ));

        assert!(matches!(
            api.get_student_timetable(&admin(), 99_999),
            Err(ApiError::NotFound(_))
        ));
    }

    #[test]
    fn test_professor_timetable_lists_supervised_published_exams() {
        let (_tmp, state, _campus, exams) = setup();
        let api = &state.timetable_api;

        let supervisor = exams[0].exam.placement.professor_ids[0];
        let ctx = CallerContext::professor("prof", supervisor);
        let timetable = api.get_professor_timetable(&ctx, supervisor).unwrap();

        assert_eq!(timetable.professor_id, supervisor);
        assert_eq!(timetable.timetable.len(), 1);
        assert_eq!(timetable.timetable[0].exam_id, exams[0].exam.exam_id);
        assert!(timetable.timetable[0]
            .professors
            .iter()
            .any(|p| p.professor_id == supervisor));
    }

    // ==========================================
    // 冲突 / 统计
    // ==========================================

    #[test]
    fn test_statistics_track_approval_progress() {
        let (_tmp, state, _campus, _exams) = setup();
        let summary = state.timetable_api.get_statistics(&dean()).unwrap();

        assert_eq!(summary.total_exams, 5);
        assert_eq!(summary.published_exams, 1);
        assert_eq!(summary.rejected_exams, 1);
        assert_eq!(summary.pending_exams, 3);
        assert_eq!(summary.conflict_rate, 0.0);

        let student = CallerContext::student("etu", 1);
        assert!(matches!(
            state.timetable_api.get_statistics(&student),
            Err(ApiError::Forbidden(_))
        ));
    }

    #[test]
    fn test_conflict_listing_validates_range_and_role() {
        let (_tmp, state, _campus, _exams) = setup();
        let api = &state.timetable_api;

        let inverted = DateRange::new(date(2024, 1, 12), date(2024, 1, 10));
        assert!(matches!(
            api.list_conflicts(&admin(), Some(inverted)),
            Err(ApiError::ValidationError(_))
        ));

        let range = DateRange::new(date(2024, 1, 10), date(2024, 1, 12));
        assert!(api.list_conflicts(&dept_head(), Some(range)).unwrap().is_empty());

        let professor = CallerContext::professor("prof", 1);
        assert!(matches!(
            api.list_conflicts(&professor, None),
            Err(ApiError::Forbidden(_))
        ));
    }
}
