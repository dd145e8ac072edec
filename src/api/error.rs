// ==========================================
// 考试排期系统 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，转换Repository/引擎错误为用户友好的错误消息
// 红线: 所有公开操作要么全部生效, 要么返回错误且状态不变
// ==========================================

use crate::engine::approval::ApprovalError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 请求错误
    // ==========================================
    /// 日期区间倒置 / 考试窗口为空等, 在排考前拒绝
    #[error("请求校验失败: {0}")]
    ValidationError(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("无权执行该操作: {0}")]
    Forbidden(String),

    // ==========================================
    // 审批流错误
    // ==========================================
    #[error("无效的审批操作: exam_id={exam_id}, reason={reason}")]
    InvalidTransition { exam_id: i64, reason: String },

    // ==========================================
    // 并发控制错误
    // ==========================================
    #[error("并发修改冲突: {0}")]
    ConcurrentModification(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    /// 对外错误代码
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::ValidationError(_) => "VALIDATION_ERROR",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::InvalidTransition { .. } => "INVALID_TRANSITION",
            ApiError::ConcurrentModification(_) => "CONCURRENT_MODIFICATION",
            ApiError::DatabaseError(_) => "DATABASE_ERROR",
            ApiError::DatabaseConnectionError(_) => "DATABASE_CONNECTION_ERROR",
            ApiError::DatabaseTransactionError(_) => "DATABASE_TRANSACTION_ERROR",
            ApiError::InternalError(_) => "INTERNAL_ERROR",
            ApiError::Other(_) => "OTHER_ERROR",
        }
    }

    /// 审批引擎错误 -> API错误 (附带考试ID)
    pub fn from_approval(exam_id: i64, err: ApprovalError) -> Self {
        ApiError::InvalidTransition {
            exam_id,
            reason: err.to_string(),
        }
    }
}

// ==========================================
// 从 RepositoryError 转换
// 目的: 将Repository层的技术错误转换为用户友好的业务错误
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            // 并发控制错误
            RepositoryError::OptimisticLockFailure {
                exam_id,
                expected,
                actual,
            } => ApiError::ConcurrentModification(format!(
                "考试{}的审批状态已被其他请求修改（期望={}，实际={}）",
                exam_id, expected, actual
            )),

            // 数据库错误
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::DatabaseConnectionError(msg) => ApiError::DatabaseConnectionError(msg),
            RepositoryError::DatabaseTransactionError(msg) => {
                ApiError::DatabaseTransactionError(msg)
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::DatabaseError(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::DatabaseError(format!("外键约束违反: {}", msg))
            }

            // 数据质量错误
            RepositoryError::FieldValueError { field, message } => {
                ApiError::DatabaseError(format!("字段{}错误: {}", field, message))
            }

            // 通用错误
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

impl From<ApprovalError> for ApiError {
    fn from(err: ApprovalError) -> Self {
        ApiError::InvalidTransition {
            exam_id: 0,
            reason: err.to_string(),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optimistic_lock_maps_to_concurrent_modification() {
        let repo_err = RepositoryError::OptimisticLockFailure {
            exam_id: 5,
            expected: "(0, 0)".to_string(),
            actual: "(1, 0)".to_string(),
        };
        let api_err: ApiError = repo_err.into();
        assert!(matches!(api_err, ApiError::ConcurrentModification(_)));
        assert_eq!(api_err.code(), "CONCURRENT_MODIFICATION");
    }

    #[test]
    fn test_not_found_keeps_entity_and_id() {
        let api_err: ApiError = RepositoryError::NotFound {
            entity: "Exam".to_string(),
            id: "42".to_string(),
        }
        .into();
        match api_err {
            ApiError::NotFound(msg) => {
                assert!(msg.contains("Exam"));
                assert!(msg.contains("42"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_approval_error_carries_reason() {
        let err = ApiError::from_approval(9, ApprovalError::DeptHeadApprovalRequired);
        assert_eq!(err.code(), "INVALID_TRANSITION");
        assert!(err.to_string().contains("dept-head approval required first"));
        assert!(err.to_string().contains("exam_id=9"));
    }
}
