// ==========================================
// 考试排期系统 - 调用方上下文
// ==========================================
// 每个请求显式携带调用方角色与关联身份, 仅用于鉴权
// 红线: 不使用全局/线程局部的身份状态
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::domain::types::{ApprovalStage, UserRole};
use serde::{Deserialize, Serialize};

// ==========================================
// CallerContext - 调用方上下文
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerContext {
    pub actor: String,             // 操作人 (写入操作日志)
    pub role: UserRole,            // 角色
    #[serde(default)]
    pub student_id: Option<i64>,   // 关联学生 (学生角色)
    #[serde(default)]
    pub professor_id: Option<i64>, // 关联教师 (教师角色)
}

impl CallerContext {
    pub fn new(actor: &str, role: UserRole) -> Self {
        Self {
            actor: actor.to_string(),
            role,
            student_id: None,
            professor_id: None,
        }
    }

    pub fn admin(actor: &str) -> Self {
        Self::new(actor, UserRole::Admin)
    }

    pub fn student(actor: &str, student_id: i64) -> Self {
        Self {
            student_id: Some(student_id),
            ..Self::new(actor, UserRole::Student)
        }
    }

    pub fn professor(actor: &str, professor_id: i64) -> Self {
        Self {
            professor_id: Some(professor_id),
            ..Self::new(actor, UserRole::Professor)
        }
    }

    /// 是否为教务人员 (可见未发布考试)
    pub fn is_staff(&self) -> bool {
        matches!(
            self.role,
            UserRole::Admin | UserRole::Dean | UserRole::DeptHead
        )
    }

    /// 要求调用方角色属于 `allowed`
    ///
    /// # 错误
    /// - `ApiError::Forbidden`: 角色不在允许列表内
    pub fn require_any(&self, allowed: &[UserRole], action: &str) -> ApiResult<()> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            Err(ApiError::Forbidden(format!(
                "角色{}不能执行{}",
                self.role, action
            )))
        }
    }

    /// 审批环节鉴权: 系主任环节 -> DeptHead/Admin; 副院长环节 -> Dean/Admin
    pub fn require_stage(&self, stage: ApprovalStage) -> ApiResult<()> {
        let allowed: &[UserRole] = match stage {
            ApprovalStage::DeptHead => &[UserRole::DeptHead, UserRole::Admin],
            ApprovalStage::ViceDean => &[UserRole::Dean, UserRole::Admin],
        };
        self.require_any(allowed, &format!("{} 审批", stage))
    }
}
