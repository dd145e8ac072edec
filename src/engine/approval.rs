// ==========================================
// 考试排期系统 - 审批流引擎
// ==========================================
// 状态: PendingDeptHead -> PendingViceDean -> Published
//       任一待审环节驳回 -> Rejected (吸收态)
// 红线: 副院长审批只能在系主任通过之后
// 红线: 同一考试的审批串行 (按考试加锁 + 数据库CAS)
// ==========================================

use crate::domain::types::{ApprovalStage, ApprovalStatus, ExamState};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// 审批状态机拒绝原因
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApprovalError {
    #[error("dept-head approval required first")]
    DeptHeadApprovalRequired,

    #[error("{stage} decision already recorded ({status})")]
    AlreadyDecided {
        stage: ApprovalStage,
        status: ApprovalStatus,
    },

    #[error("exam is in terminal state {0}")]
    Terminal(ExamState),
}

/// 审批字段对 (dept_head, vice_dean)
pub type ApprovalPair = (ApprovalStatus, ApprovalStatus);

// ==========================================
// ApprovalWorkflow - 审批状态机
// ==========================================
pub struct ApprovalWorkflow {
    // 无状态引擎
}

impl Default for ApprovalWorkflow {
    fn default() -> Self {
        Self::new()
    }
}

impl ApprovalWorkflow {
    pub fn new() -> Self {
        Self {}
    }

    /// 计算一次审批决定后的审批字段
    ///
    /// # 参数
    /// - `current`: 当前 (dept_head, vice_dean)
    /// - `stage`: 审批环节
    /// - `approved`: true=通过, false=驳回
    ///
    /// # 返回
    /// - `Ok(next)`: 新的审批字段
    /// - `Err(ApprovalError)`: 非法迁移, 状态不变
    pub fn transition(
        &self,
        current: ApprovalPair,
        stage: ApprovalStage,
        approved: bool,
    ) -> Result<ApprovalPair, ApprovalError> {
        let (dept_head, vice_dean) = current;
        let decision = if approved {
            ApprovalStatus::Approved
        } else {
            ApprovalStatus::Rejected
        };

        match stage {
            ApprovalStage::DeptHead => {
                if dept_head.is_decided() {
                    let state = ExamState::derive(dept_head, vice_dean);
                    if state.is_terminal() {
                        return Err(ApprovalError::Terminal(state));
                    }
                    return Err(ApprovalError::AlreadyDecided {
                        stage,
                        status: dept_head,
                    });
                }
                Ok((decision, vice_dean))
            }
            ApprovalStage::ViceDean => match dept_head {
                ApprovalStatus::Pending => Err(ApprovalError::DeptHeadApprovalRequired),
                ApprovalStatus::Rejected => Err(ApprovalError::Terminal(ExamState::Rejected)),
                ApprovalStatus::Approved => {
                    if vice_dean.is_decided() {
                        return Err(ApprovalError::Terminal(ExamState::derive(
                            dept_head, vice_dean,
                        )));
                    }
                    Ok((dept_head, decision))
                }
            },
        }
    }

    /// 审批队列键: 等待该环节的考试所处的审批字段
    pub fn queue_key(&self, stage: ApprovalStage) -> ApprovalPair {
        match stage {
            ApprovalStage::DeptHead => (ApprovalStatus::Pending, ApprovalStatus::Pending),
            ApprovalStage::ViceDean => (ApprovalStatus::Approved, ApprovalStatus::Pending),
        }
    }

    /// 考试是否在等待该环节
    pub fn awaits(&self, current: ApprovalPair, stage: ApprovalStage) -> bool {
        current == self.queue_key(stage)
    }
}

// ==========================================
// ExamLockRegistry - 按考试加锁
// ==========================================
// 不同考试的审批互不阻塞; 同一考试的审批串行执行
#[derive(Default)]
pub struct ExamLockRegistry {
    locks: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl ExamLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取某场考试的锁句柄 (不存在则创建)
    pub fn lock_for(&self, exam_id: i64) -> Result<Arc<Mutex<()>>, String> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|e| format!("锁注册表获取失败: {}", e))?;
        Ok(locks
            .entry(exam_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone())
    }

    /// 归还锁句柄; 没有其他持有者时移除登记
    pub fn release(&self, exam_id: i64, handle: Arc<Mutex<()>>) {
        let Ok(mut locks) = self.locks.lock() else {
            return;
        };
        // 注册表 + 当前句柄
        let idle = locks
            .get(&exam_id)
            .map(|entry| Arc::ptr_eq(entry, &handle) && Arc::strong_count(&handle) == 2)
            .unwrap_or(false);
        if idle {
            locks.remove(&exam_id);
        }
    }

    /// 已登记的考试锁数量
    pub fn len(&self) -> usize {
        self.locks.lock().map(|l| l.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
