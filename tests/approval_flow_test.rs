// ==========================================
// 两级审批流程测试
// ==========================================
// 职责: 验证审批顺序、驳回吸收态、待审队列、审批历史与并发控制
// ==========================================


#[cfg(test)]
mod approval_flow_test {
    use exam_timetable::api::{ApiError, CallerContext};
    use exam_timetable::app::AppState;
    use exam_timetable::domain::types::{ApprovalStage, ApprovalStatus, ExamState, UserRole};
    use std::sync::{Arc, Barrier};
    use std::thread;
    use tempfile::NamedTempFile;

    use crate::test_helpers::*;

    // ==========================================
    // 测试辅助函数
    // ==========================================

    /// 生成 3 场考试, 返回考试ID
    fn setup_exams() -> (NamedTempFile, Arc<AppState>, Vec<i64>) {
        let (tmp, state) = create_test_state();
        seed_separate_formations(&state.academic_repo, 3, 8, 3, 6).unwrap();
        let response = state
            .timetable_api
            .generate_timetable(&admin(), &three_day_request())
            .unwrap();
        let ids = response.exams.iter().map(|v| v.exam.exam_id).collect();
        (tmp, state, ids)
    }

    // ==========================================
    // 场景 C: 审批顺序
    // ==========================================

    #[test]
    fn test_scenario_c_dept_head_then_vice_dean_publishes() {
        let (_tmp, state, ids) = setup_exams();
        let api = &state.approval_api;

        let after_dh = api
            .approve_exam(&dept_head(), ApprovalStage::DeptHead, ids[0], true)
            .unwrap();
        assert_eq!(after_dh.state, ExamState::PendingViceDean);
        assert_eq!(after_dh.exam.dept_head_approval, ApprovalStatus::Approved);

        let after_vd = api
            .approve_exam(&dean(), ApprovalStage::ViceDean, ids[0], true)
            .unwrap();
        assert_eq!(after_vd.state, ExamState::Published);
        assert!(after_vd.exam.is_published());

        let stored = state.timetable_api.get_exam(&admin(), ids[0]).unwrap();
        assert_eq!(stored.state, ExamState::Published);
    }

    #[test]
    fn test_scenario_c_vice_dean_first_is_invalid_transition() {
        let (_tmp, state, ids) = setup_exams();

        let err = state
            .approval_api
            .approve_exam(&dean(), ApprovalStage::ViceDean, ids[1], true)
            .unwrap_err();
        match err {
            ApiError::InvalidTransition { exam_id, reason } => {
                assert_eq!(exam_id, ids[1]);
                assert_eq!(reason, "dept-head approval required first");
            }
            other => panic!("unexpected error: {:?}", other),
        }

        // 状态不变, 也不写日志
        let exam = state.timetable_api.get_exam(&admin(), ids[1]).unwrap();
        assert_eq!(exam.state, ExamState::PendingDeptHead);
        assert_eq!(state.action_log_repo.count_by_exam(ids[1]).unwrap(), 0);
    }

    // ==========================================
    // 驳回为吸收态
    // ==========================================

    #[test]
    fn test_rejection_is_absorbing() {
        let (_tmp, state, ids) = setup_exams();
        let api = &state.approval_api;

        let rejected = api
            .approve_exam(&dept_head(), ApprovalStage::DeptHead, ids[0], false)
            .unwrap();
        assert_eq!(rejected.state, ExamState::Rejected);

        for (ctx, stage) in [
            (dept_head(), ApprovalStage::DeptHead),
            (dean(), ApprovalStage::ViceDean),
        ] {
            for approved in [true, false] {
                assert!(matches!(
                    api.approve_exam(&ctx, stage, ids[0], approved),
                    Err(ApiError::InvalidTransition { .. })
                ));
            }
        }

        // 副院长驳回同样为终态
        api.approve_exam(&dept_head(), ApprovalStage::DeptHead, ids[1], true)
            .unwrap();
        let vd_rejected = api
            .approve_exam(&dean(), ApprovalStage::ViceDean, ids[1], false)
            .unwrap();
        assert_eq!(vd_rejected.state, ExamState::Rejected);
        assert!(matches!(
            api.approve_exam(&dean(), ApprovalStage::ViceDean, ids[1], true),
            Err(ApiError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_unknown_exam_is_not_found() {
        let (_tmp, state, _ids) = setup_exams();
        assert!(matches!(
            state
                .approval_api
                .approve_exam(&admin(), ApprovalStage::DeptHead, 9_999, true),
            Err(ApiError::NotFound(_))
        ));
    }

    // ==========================================
    // 鉴权
    // ==========================================

    #[test]
    fn test_stage_requires_matching_role() {
        let (_tmp, state, ids) = setup_exams();
        let api = &state.approval_api;

        assert!(matches!(
            api.approve_exam(&dean(), ApprovalStage::DeptHead, ids[0], true),
            Err(ApiError::Forbidden(_))
        ));
        assert!(matches!(
            api.approve_exam(&dept_head(), ApprovalStage::ViceDean, ids[0], true),
            Err(ApiError::Forbidden(_))
        ));
        let student = CallerContext::student("etu", 1);
        assert!(matches!(
            api.approve_exam(&student, ApprovalStage::DeptHead, ids[0], true),
            Err(ApiError::Forbidden(_))
        ));

        // 管理员可代行两级审批
        api.approve_exam(&admin(), ApprovalStage::DeptHead, ids[0], true)
            .unwrap();
        let published = api
            .approve_exam(&admin(), ApprovalStage::ViceDean, ids[0], true)
            .unwrap();
        assert_eq!(published.state, ExamState::Published);
    }

    // ==========================================
    // 待审队列 / 审批历史
    // ==========================================

    #[test]
    fn test_pending_queues_follow_approval_state() {
        let (_tmp, state, ids) = setup_exams();
        let api = &state.approval_api;

        assert_eq!(api.list_pending(&dept_head(), ApprovalStage::DeptHead).unwrap().len(), 3);
        assert!(api.list_pending(&dean(), ApprovalStage::ViceDean).unwrap().is_empty());

        api.approve_exam(&dept_head(), ApprovalStage::DeptHead, ids[0], true)
            .unwrap();
        api.approve_exam(&dept_head(), ApprovalStage::DeptHead, ids[1], false)
            .unwrap();

        let dh_queue = api.list_pending(&dept_head(), ApprovalStage::DeptHead).unwrap();
        assert_eq!(dh_queue.len(), 1);
        assert_eq!(dh_queue[0].exam.exam_id, ids[2]);

        let vd_queue = api.list_pending(&dean(), ApprovalStage::ViceDean).unwrap();
        assert_eq!(vd_queue.len(), 1);
        assert_eq!(vd_queue[0].exam.exam_id, ids[0]);
        assert_eq!(vd_queue[0].state, ExamState::PendingViceDean);

        assert!(matches!(
            api.list_pending(&dept_head(), ApprovalStage::ViceDean),
            Err(ApiError::Forbidden(_))
        ));
    }

    #[test]
    fn test_approval_history_records_each_decision() {
        let (_tmp, state, ids) = setup_exams();
        let api = &state.approval_api;

        api.approve_exam(&dept_head(), ApprovalStage::DeptHead, ids[0], true)
            .unwrap();
        api.approve_exam(&dean(), ApprovalStage::ViceDean, ids[0], true)
            .unwrap();

        let history = api.approval_history(&admin(), ids[0]).unwrap();
        let types: Vec<&str> = history.iter().map(|l| l.action_type.as_str()).collect();
        assert_eq!(types, vec!["APPROVE_DEPT_HEAD", "APPROVE_VICE_DEAN"]);
        assert_eq!(history[0].actor, "chef_dept");
        assert_eq!(history[0].actor_role, UserRole::DeptHead.as_str());
        assert_eq!(history[1].actor, "vice_doyen");
        assert_eq!(history[1].exam_id, Some(ids[0]));

        let payload = history[1].payload_json.as_ref().unwrap();
        assert_eq!(payload["stage"], "vice-dean");
        assert_eq!(payload["after"][1], 1);

        assert!(api.approval_history(&admin(), ids[1]).unwrap().is_empty());
        assert!(matches!(
            api.approval_history(&CallerContext::professor("p", 1), ids[0]),
            Err(ApiError::Forbidden(_))
        ));
        assert!(matches!(
            api.approval_history(&admin(), 9_999),
            Err(ApiError::NotFound(_))
        ));
    }

    // ==========================================
    // 并发控制
    // ==========================================

    #[test]
    fn test_concurrent_decisions_on_same_exam_apply_once() {
        let (_tmp, state, ids) = setup_exams();
        let exam_id = ids[0];
        let threads = 8;
        let barrier = Arc::new(Barrier::new(threads));

        let handles: Vec<_> = (0..threads)
            .map(|i| {
                let state = state.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    state.approval_api.approve_exam(
                        &dept_head(),
                        ApprovalStage::DeptHead,
                        exam_id,
                        i % 2 == 0,
                    )
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let successes = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(
                e,
                ApiError::InvalidTransition { .. } | ApiError::ConcurrentModification(_)
            )));

        assert_eq!(state.action_log_repo.count_by_exam(exam_id).unwrap(), 1);
    }

    #[test]
    fn test_decisions_on_different_exams_proceed_independently() {
        let (_tmp, state, ids) = setup_exams();

        let handles: Vec<_> = ids
            .iter()
            .copied()
            .map(|exam_id| {
                let state = state.clone();
                thread::spawn(move || {
                    state
                        .approval_api
                        .approve_exam(&dept_head(), ApprovalStage::DeptHead, exam_id, true)
                })
            })
            .collect();

        for h in handles {
            assert!(h.join().unwrap().is_ok());
        }
        assert_eq!(
            state
                .approval_api
                .list_pending(&dean(), ApprovalStage::ViceDean)
                .unwrap()
                .len(),
            3
        );
        assert_eq!(state.approval_api.tracked_locks(), 0);
    }

    #[test]
    fn test_lock_registry_does_not_grow_on_unknown_or_settled_exams() {
        let (_tmp, state, ids) = setup_exams();
        let api = &state.approval_api;

        for exam_id in 1_000..1_100 {
            assert!(matches!(
                api.approve_exam(&dept_head(), ApprovalStage::DeptHead, exam_id, true),
                Err(ApiError::NotFound(_))
            ));
        }
        assert_eq!(api.tracked_locks(), 0);

        api.approve_exam(&dept_head(), ApprovalStage::DeptHead, ids[0], true)
            .unwrap();
        assert!(api
            .approve_exam(&dept_head(), ApprovalStage::DeptHead, ids[0], true)
            .is_err());
        assert_eq!(api.tracked_locks(), 0);

        // 重排删除旧考试后, 旧ID不再可审批
        state
            .timetable_api
            .generate_timetable(&admin(), &three_day_request())
            .unwrap();
        assert!(matches!(
            api.approve_exam(&dept_head(), ApprovalStage::DeptHead, ids[1], true),
            Err(ApiError::NotFound(_))
        ));
        assert_eq!(api.tracked_locks(), 0);
    }
}
