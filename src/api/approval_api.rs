// ==========================================
// 考试排期系统 - 审批 API
// ==========================================
// 职责: 两级审批决定、待审队列、审批历史
// 红线: 同一考试的审批串行 (按考试加锁 + 数据库CAS)
// 红线: 非法迁移返回 InvalidTransition, 状态不变
// ==========================================

use std::sync::{Arc, Mutex};

use serde_json::json;
use tracing::{info, warn};

use crate::api::context::CallerContext;
use crate::api::dto::ExamView;
use crate::api::error::{ApiError, ApiResult};
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::types::ApprovalStage;
use crate::engine::{ApprovalWorkflow, ExamLockRegistry};
use crate::repository::{ActionLogRepository, ExamRepository};

/// 审批历史单次最多返回的条数
const HISTORY_LIMIT: usize = 200;

// ==========================================
// ApprovalApi - 审批 API
// ==========================================
pub struct ApprovalApi {
    exam_repo: Arc<ExamRepository>,
    action_log_repo: Arc<ActionLogRepository>,
    workflow: ApprovalWorkflow,
    locks: ExamLockRegistry,
}

impl ApprovalApi {
    pub fn new(exam_repo: Arc<ExamRepository>, action_log_repo: Arc<ActionLogRepository>) -> Self {
        Self {
            exam_repo,
            action_log_repo,
            workflow: ApprovalWorkflow::new(),
            locks: ExamLockRegistry::new(),
        }
    }

    /// 记录一次审批决定
    ///
    /// # 参数
    /// - ctx: 调用方上下文 (系主任环节需 DeptHead/Admin, 副院长环节需 Dean/Admin)
    /// - stage: 审批环节
    /// - exam_id: 考试ID
    /// - approved: true=通过, false=驳回
    ///
    /// # 返回
    /// - Ok(ExamView): 更新后的考试
    /// - Err(ApiError::InvalidTransition): 越级审批 / 重复审批 / 终态考试
    /// - Err(ApiError::NotFound): 考试不存在
    pub fn approve_exam(
        &self,
        ctx: &CallerContext,
        stage: ApprovalStage,
        exam_id: i64,
        approved: bool,
    ) -> ApiResult<ExamView> {
        ctx.require_stage(stage)?;

        // 不存在的考试不登记锁
        if self.exam_repo.find_by_id(exam_id)?.is_none() {
            return Err(ApiError::NotFound(format!("Exam(id={})不存在", exam_id)));
        }

        let lock = self.locks.lock_for(exam_id).map_err(ApiError::InternalError)?;
        let result = self.decide_locked(&lock, ctx, stage, exam_id, approved);
        self.locks.release(exam_id, lock);
        result
    }

    /// 持有考试锁执行审批 (重新读取, 期间考试可能已被重排删除)
    fn decide_locked(
        &self,
        lock: &Mutex<()>,
        ctx: &CallerContext,
        stage: ApprovalStage,
        exam_id: i64,
        approved: bool,
    ) -> ApiResult<ExamView> {
        let _guard = lock
            .lock()
            .map_err(|e| ApiError::InternalError(format!("考试锁获取失败: {}", e)))?;

        let mut exam = self
            .exam_repo
            .find_by_id(exam_id)?
            .ok_or_else(|| ApiError::NotFound(format!("Exam(id={})不存在", exam_id)))?;

        let current = (exam.dept_head_approval, exam.vice_dean_approval);
        let next = self
            .workflow
            .transition(current, stage, approved)
            .map_err(|e| ApiError::from_approval(exam_id, e))?;

        self.exam_repo.update_approval(exam_id, current, next)?;
        exam.dept_head_approval = next.0;
        exam.vice_dean_approval = next.1;

        info!(
            exam_id,
            stage = %stage,
            approved,
            actor = %ctx.actor,
            state = %exam.state(),
            "审批决定已记录"
        );

        let mut log = ActionLog::new(ActionType::for_decision(stage, approved), &ctx.actor, ctx.role);
        log.exam_id = Some(exam_id);
        log.payload_json = Some(json!({
            "stage": stage,
            "approved": approved,
            "before": [current.0, current.1],
            "after": [next.0, next.1],
        }));
        log.detail = Some(format!("{} {} -> {}", stage, exam_id, exam.state()));
        if let Err(e) = self.action_log_repo.insert(&log) {
            warn!(error = %e, exam_id, "记录操作日志失败");
        }

        Ok(ExamView::from(exam))
    }

    /// 查询等待某审批环节的考试
    pub fn list_pending(&self, ctx: &CallerContext, stage: ApprovalStage) -> ApiResult<Vec<ExamView>> {
        ctx.require_stage(stage)?;

        let (dept_head, vice_dean) = self.workflow.queue_key(stage);
        Ok(self
            .exam_repo
            .find_by_approval(dept_head, vice_dean)?
            .into_iter()
            .map(ExamView::from)
            .collect())
    }

    /// 查询考试的审批历史 (最近 HISTORY_LIMIT 条, 按时间升序)
    pub fn approval_history(&self, ctx: &CallerContext, exam_id: i64) -> ApiResult<Vec<ActionLog>> {
        if !ctx.is_staff() {
            return Err(ApiError::Forbidden("仅教务人员可查询审批历史".to_string()));
        }

        if self.exam_repo.find_by_id(exam_id)?.is_none() {
            return Err(ApiError::NotFound(format!("Exam(id={})不存在", exam_id)));
        }

        Ok(self
            .action_log_repo
            .find_recent_by_exam_id(exam_id, HISTORY_LIMIT)?)
    }

    /// 已登记的考试锁数量
    pub fn tracked_locks(&self) -> usize {
        self.locks.len()
    }
}
