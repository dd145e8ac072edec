// ==========================================
// 考试排期系统 - 应用命令
// ==========================================
// 职责: JSON 进出的异步命令入口, 供前端/外部调用
// 说明: API 为同步实现, 在 blocking 线程池上执行
// ==========================================

use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::api::{ApiError, ApiResult, CallerContext};
use crate::app::state::AppState;
use crate::domain::exam::{DateRange, ExamFilter, GenerationRequest};
use crate::domain::types::ApprovalStage;

// ==========================================
// 公共工具：错误映射、日期解析
// ==========================================

/// 错误响应（返回给调用方）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// 错误代码
    pub code: String,

    /// 错误消息
    pub message: String,

    /// 详细信息（可选）
    pub details: Option<serde_json::Value>,
}

/// 将ApiError转换为JSON字符串
pub fn map_api_error(err: ApiError) -> String {
    let error_response = ErrorResponse {
        code: err.code().to_string(),
        message: err.to_string(),
        details: match &err {
            ApiError::InvalidTransition { exam_id, reason } => Some(serde_json::json!({
                "exam_id": exam_id,
                "reason": reason,
            })),
            _ => None,
        },
    };

    serde_json::to_string(&error_response).unwrap_or_else(|_| err.to_string())
}

/// 解析日期字符串
fn parse_date(date_str: &str) -> ApiResult<NaiveDate> {
    NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d")
        .map_err(|e| ApiError::ValidationError(format!("日期格式错误（应为YYYY-MM-DD）: {}", e)))
}

/// 解析时间字符串
fn parse_time(time_str: &str) -> ApiResult<NaiveTime> {
    NaiveTime::parse_from_str(time_str.trim(), "%H:%M")
        .map_err(|e| ApiError::ValidationError(format!("时间格式错误（应为HH:MM）: {}", e)))
}

fn parse_stage(stage: &str) -> ApiResult<ApprovalStage> {
    stage.parse::<ApprovalStage>().map_err(ApiError::ValidationError)
}

fn parse_range(start_date: Option<String>, end_date: Option<String>) -> ApiResult<Option<DateRange>> {
    match (start_date, end_date) {
        (Some(start), Some(end)) => Ok(Some(DateRange::new(parse_date(&start)?, parse_date(&end)?))),
        (None, None) => Ok(None),
        _ => Err(ApiError::ValidationError(
            "start_date 与 end_date 需同时提供".to_string(),
        )),
    }
}

/// 在 blocking 线程池执行 API 调用并序列化结果
async fn run_blocking<T, F>(f: F) -> Result<String, String>
where
    T: Serialize + Send + 'static,
    F: FnOnce() -> ApiResult<T> + Send + 'static,
{
    let result = tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| map_api_error(ApiError::InternalError(format!("任务执行失败: {}", e))))?
        .map_err(map_api_error)?;

    serde_json::to_string(&result).map_err(|e| format!("序列化失败: {}", e))
}

// ==========================================
// 排考相关命令
// ==========================================

/// 生成考试排期
pub async fn generate_timetable(
    state: Arc<AppState>,
    ctx: CallerContext,
    start_date: String,
    end_date: String,
    exam_start_time: Option<String>,
    exam_end_time: Option<String>,
) -> Result<String, String> {
    run_blocking(move || {
        let request = GenerationRequest {
            start_date: parse_date(&start_date)?,
            end_date: parse_date(&end_date)?,
            exam_start_time: parse_time(exam_start_time.as_deref().unwrap_or("09:00"))?,
            exam_end_time: parse_time(exam_end_time.as_deref().unwrap_or("17:00"))?,
        };
        state.timetable_api.generate_timetable(&ctx, &request)
    })
    .await
}

/// 查询考试列表
pub async fn list_exams(
    state: Arc<AppState>,
    ctx: CallerContext,
    filter: Option<ExamFilter>,
) -> Result<String, String> {
    run_blocking(move || {
        state
            .timetable_api
            .list_exams(&ctx, &filter.unwrap_or_default())
    })
    .await
}

/// 查询单场考试
pub async fn get_exam(
    state: Arc<AppState>,
    ctx: CallerContext,
    exam_id: i64,
) -> Result<String, String> {
    run_blocking(move || state.timetable_api.get_exam(&ctx, exam_id)).await
}

/// 查询冲突列表
pub async fn list_conflicts(
    state: Arc<AppState>,
    ctx: CallerContext,
    start_date: Option<String>,
    end_date: Option<String>,
) -> Result<String, String> {
    run_blocking(move || {
        let range = parse_range(start_date, end_date)?;
        state.timetable_api.list_conflicts(&ctx, range)
    })
    .await
}

/// 查询监考负荷提示
pub async fn list_warnings(
    state: Arc<AppState>,
    ctx: CallerContext,
    start_date: Option<String>,
    end_date: Option<String>,
) -> Result<String, String> {
    run_blocking(move || {
        let range = parse_range(start_date, end_date)?;
        state.timetable_api.list_warnings(&ctx, range)
    })
    .await
}

/// 查询统计汇总
pub async fn get_statistics(state: Arc<AppState>, ctx: CallerContext) -> Result<String, String> {
    run_blocking(move || state.timetable_api.get_statistics(&ctx)).await
}

// ==========================================
// 审批相关命令
// ==========================================

/// 审批考试
///
/// stage: "dept-head" / "vice-dean"
pub async fn approve_exam(
    state: Arc<AppState>,
    ctx: CallerContext,
    stage: String,
    exam_id: i64,
    approved: bool,
) -> Result<String, String> {
    run_blocking(move || {
        let stage = parse_stage(&stage)?;
        state.approval_api.approve_exam(&ctx, stage, exam_id, approved)
    })
    .await
}

/// 查询待审队列
pub async fn list_pending_approvals(
    state: Arc<AppState>,
    ctx: CallerContext,
    stage: String,
) -> Result<String, String> {
    run_blocking(move || {
        let stage = parse_stage(&stage)?;
        state.approval_api.list_pending(&ctx, stage)
    })
    .await
}

/// 查询审批历史
pub async fn get_approval_history(
    state: Arc<AppState>,
    ctx: CallerContext,
    exam_id: i64,
) -> Result<String, String> {
    run_blocking(move || state.approval_api.approval_history(&ctx, exam_id)).await
}

// ==========================================
// 个人日程命令
// ==========================================

pub async fn get_student_timetable(
    state: Arc<AppState>,
    ctx: CallerContext,
    student_id: i64,
) -> Result<String, String> {
    run_blocking(move || state.timetable_api.get_student_timetable(&ctx, student_id)).await
}

pub async fn get_professor_timetable(
    state: Arc<AppState>,
    ctx: CallerContext,
    professor_id: i64,
) -> Result<String, String> {
    run_blocking(move || state.timetable_api.get_professor_timetable(&ctx, professor_id)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_api_error_includes_code_and_details() {
        let json = map_api_error(ApiError::InvalidTransition {
            exam_id: 3,
            reason: "dept-head approval required first".to_string(),
        });
        let resp: ErrorResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(resp.code, "INVALID_TRANSITION");
        assert_eq!(resp.details.unwrap()["exam_id"], 3);
    }

    #[test]
    fn test_parse_range_requires_both_ends() {
        assert!(parse_range(None, None).unwrap().is_none());
        assert!(parse_range(Some("2024-01-10".into()), None).is_err());
        let range = parse_range(Some("2024-01-10".into()), Some("2024-01-12".into()))
            .unwrap()
            .unwrap();
        assert_eq!(range.days().len(), 3);
    }

    #[test]
    fn test_parse_stage() {
        assert_eq!(parse_stage("vice-dean").unwrap(), ApprovalStage::ViceDean);
        assert!(matches!(parse_stage("dean"), Err(ApiError::ValidationError(_))));
    }
}
