// ==========================================
// 考试排期系统 - 领域类型定义
// ==========================================
// 审批三态在内部为封闭枚举, 仅在序列化边界映射为整数
// 对外约定: Pending=0, Approved=1, Rejected=-1
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ==========================================
// 审批状态 (Approval Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i8", try_from = "i8")]
pub enum ApprovalStatus {
    Pending,  // 待审批
    Approved, // 已通过
    Rejected, // 已驳回
}

impl ApprovalStatus {
    /// 转换为对外/数据库存储的整数编码
    pub fn as_code(&self) -> i8 {
        match self {
            ApprovalStatus::Pending => 0,
            ApprovalStatus::Approved => 1,
            ApprovalStatus::Rejected => -1,
        }
    }

    /// 从整数编码解析 (非法编码返回 None)
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(ApprovalStatus::Pending),
            1 => Some(ApprovalStatus::Approved),
            -1 => Some(ApprovalStatus::Rejected),
            _ => None,
        }
    }

    pub fn is_decided(&self) -> bool {
        *self != ApprovalStatus::Pending
    }
}

impl From<ApprovalStatus> for i8 {
    fn from(status: ApprovalStatus) -> Self {
        status.as_code()
    }
}

impl TryFrom<i8> for ApprovalStatus {
    type Error = String;

    fn try_from(code: i8) -> Result<Self, Self::Error> {
        ApprovalStatus::from_code(code as i64).ok_or_else(|| format!("非法审批状态编码: {}", code))
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApprovalStatus::Pending => write!(f, "PENDING"),
            ApprovalStatus::Approved => write!(f, "APPROVED"),
            ApprovalStatus::Rejected => write!(f, "REJECTED"),
        }
    }
}

// ==========================================
// 审批环节 (Approval Stage)
// ==========================================
// 顺序: 系主任 -> 副院长
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApprovalStage {
    DeptHead, // 系主任
    ViceDean, // 副院长
}

impl fmt::Display for ApprovalStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApprovalStage::DeptHead => write!(f, "dept-head"),
            ApprovalStage::ViceDean => write!(f, "vice-dean"),
        }
    }
}

impl FromStr for ApprovalStage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "dept-head" => Ok(ApprovalStage::DeptHead),
            "vice-dean" => Ok(ApprovalStage::ViceDean),
            other => Err(format!("未知审批环节: {}", other)),
        }
    }
}

// ==========================================
// 考试状态 (Exam State)
// ==========================================
// 由两个审批字段派生, 不单独存储
// Draft 仅出现在生成过程中尚未落库的排考方案上
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExamState {
    Draft,           // 草稿
    PendingDeptHead, // 待系主任审批
    PendingViceDean, // 待副院长审批
    Published,       // 已发布
    Rejected,        // 已驳回
}

impl ExamState {
    /// 由审批字段派生状态
    pub fn derive(dept_head: ApprovalStatus, vice_dean: ApprovalStatus) -> Self {
        match (dept_head, vice_dean) {
            (ApprovalStatus::Rejected, _) => ExamState::Rejected,
            (ApprovalStatus::Approved, ApprovalStatus::Rejected) => ExamState::Rejected,
            (ApprovalStatus::Approved, ApprovalStatus::Approved) => ExamState::Published,
            (ApprovalStatus::Approved, ApprovalStatus::Pending) => ExamState::PendingViceDean,
            (ApprovalStatus::Pending, _) => ExamState::PendingDeptHead,
        }
    }

    /// 终态: 已发布 / 已驳回
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExamState::Published | ExamState::Rejected)
    }
}

impl fmt::Display for ExamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExamState::Draft => write!(f, "DRAFT"),
            ExamState::PendingDeptHead => write!(f, "PENDING_DEPT_HEAD"),
            ExamState::PendingViceDean => write!(f, "PENDING_VICE_DEAN"),
            ExamState::Published => write!(f, "PUBLISHED"),
            ExamState::Rejected => write!(f, "REJECTED"),
        }
    }
}

// ==========================================
// 调用方角色 (User Role)
// ==========================================
// 仅用于鉴权, 不参与业务规则
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,     // 管理员
    Dean,      // 副院长
    DeptHead,  // 系主任
    Professor, // 教师
    Student,   // 学生
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Dean => "dean",
            UserRole::DeptHead => "dept_head",
            UserRole::Professor => "professor",
            UserRole::Student => "student",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(UserRole::Admin),
            "dean" => Ok(UserRole::Dean),
            "dept_head" => Ok(UserRole::DeptHead),
            "professor" => Ok(UserRole::Professor),
            "student" => Ok(UserRole::Student),
            other => Err(format!("未知角色: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approval_status_wire_codes() {
        assert_eq!(serde_json::to_string(&ApprovalStatus::Pending).unwrap(), "0");
        assert_eq!(serde_json::to_string(&ApprovalStatus::Approved).unwrap(), "1");
        assert_eq!(serde_json::to_string(&ApprovalStatus::Rejected).unwrap(), "-1");

        let parsed: ApprovalStatus = serde_json::from_str("-1").unwrap();
        assert_eq!(parsed, ApprovalStatus::Rejected);
        assert!(serde_json::from_str::<ApprovalStatus>("2").is_err());
    }

    #[test]
    fn test_exam_state_derivation() {
        use ApprovalStatus::*;
        assert_eq!(ExamState::derive(Pending, Pending), ExamState::PendingDeptHead);
        assert_eq!(ExamState::derive(Approved, Pending), ExamState::PendingViceDean);
        assert_eq!(ExamState::derive(Approved, Approved), ExamState::Published);
        assert_eq!(ExamState::derive(Rejected, Pending), ExamState::Rejected);
        assert_eq!(ExamState::derive(Approved, Rejected), ExamState::Rejected);
        assert!(ExamState::Published.is_terminal());
        assert!(!ExamState::PendingViceDean.is_terminal());
    }

    #[test]
    fn test_stage_and_role_parsing() {
        assert_eq!("vice-dean".parse::<ApprovalStage>().unwrap(), ApprovalStage::ViceDean);
        assert_eq!("dept_head".parse::<ApprovalStage>().unwrap(), ApprovalStage::DeptHead);
        assert!("dean".parse::<ApprovalStage>().is_err());
        assert_eq!("DEPT_HEAD".parse::<UserRole>().unwrap(), UserRole::DeptHead);
        assert_eq!(
            serde_json::to_string(&ApprovalStage::DeptHead).unwrap(),
            "\"dept-head\""
        );
    }
}
