// ==========================================
// 考试排期系统 - 排考与查询 API
// ==========================================
// 职责: 排考生成、考试查询、冲突/提示查询、统计汇总、个人日程
// 红线: 每次生成在同一事务内替换区间内考试; 生成与决策均写操作日志
// ==========================================

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Local;
use serde_json::json;
use tracing::{info, warn};

use crate::api::context::CallerContext;
use crate::api::dto::{ExamView, GenerationResponse};
use crate::api::error::{ApiError, ApiResult};
use crate::config::{ConfigManager, SchedulerConfig, SchedulerConfigReader};
use crate::domain::academic::AcademicDataset;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::conflict::{Conflict, ScheduleWarning};
use crate::domain::exam::{DateRange, Exam, ExamFilter, GenerationRequest};
use crate::domain::statistics::StatisticsSummary;
use crate::domain::timetable::{
    ProfessorRef, ProfessorTimetable, RoomRef, StudentTimetable, TimetableEntry,
};
use crate::domain::types::{ApprovalStatus, UserRole};
use crate::engine::{ConflictDetector, ConstraintScheduler, DetectionContext, StatisticsAggregator};
use crate::perf::PerfGuard;
use crate::repository::{AcademicRepository, ActionLogRepository, ExamRepository};

const STAFF_ROLES: &[UserRole] = &[UserRole::Admin, UserRole::Dean, UserRole::DeptHead];

// ==========================================
// TimetableApi - 排考与查询 API
// ==========================================

/// 排考与查询API
///
/// 职责：
/// 1. 排考生成（仅管理员）
/// 2. 考试列表（按角色过滤可见范围）
/// 3. 冲突 / 监考负荷提示 / 统计汇总（教务人员）
/// 4. 学生 / 教师个人考试日程（仅已发布考试）
pub struct TimetableApi {
    academic_repo: Arc<AcademicRepository>,
    exam_repo: Arc<ExamRepository>,
    action_log_repo: Arc<ActionLogRepository>,
    config_manager: Arc<ConfigManager>,
    detector: ConflictDetector,
    aggregator: StatisticsAggregator,
}

impl TimetableApi {
    /// 创建新的TimetableApi实例
    pub fn new(
        academic_repo: Arc<AcademicRepository>,
        exam_repo: Arc<ExamRepository>,
        action_log_repo: Arc<ActionLogRepository>,
        config_manager: Arc<ConfigManager>,
    ) -> Self {
        Self {
            academic_repo,
            exam_repo,
            action_log_repo,
            config_manager,
            detector: ConflictDetector::new(),
            aggregator: StatisticsAggregator::new(),
        }
    }

    // ==========================================
    // 排考生成
    // ==========================================

    /// 生成考试排期
    ///
    /// # 参数
    /// - ctx: 调用方上下文 (需 Admin)
    /// - request: 日期区间 + 每日考试窗口
    ///
    /// # 返回
    /// - Ok(GenerationResponse): 存在冲突时 success=false, 但考试已写入
    /// - Err(ApiError::ValidationError): 日期区间倒置 / 考试窗口容纳不下一场考试
    pub fn generate_timetable(
        &self,
        ctx: &CallerContext,
        request: &GenerationRequest,
    ) -> ApiResult<GenerationResponse> {
        let mut perf = PerfGuard::new("generate_timetable");
        ctx.require_any(&[UserRole::Admin], "排考生成")?;

        let config = self.scheduler_config()?;
        let scheduler = ConstraintScheduler::new(config.clone());
        validate_request(&scheduler, request)?;

        let dataset = self.academic_repo.load_dataset()?;
        let outcome = scheduler.schedule(&dataset, request);

        let range = request.date_range();
        let created_at = Local::now().naive_local();
        let (removed, exams) =
            self.exam_repo
                .replace_in_range(&range, &outcome.placements, created_at)?;

        let all_exams = self.exam_repo.list_all()?;
        perf.set_exam_count(exams.len());
        let detect_ctx = DetectionContext::new(&dataset, config.room_exam_capacity_cap);
        let conflicts = self.detector.detect(&detect_ctx, &all_exams);

        let mut warnings = outcome.warnings.clone();
        warnings.extend(
            self.detector
                .professor_load_warnings(&all_exams, config.professor_daily_limit),
        );

        info!(
            actor = %ctx.actor,
            start_date = %range.start,
            end_date = %range.end,
            generated = exams.len(),
            removed,
            conflicts = conflicts.len(),
            warnings = warnings.len(),
            "排考生成完成"
        );

        let snapshot = self
            .config_manager
            .get_config_snapshot()
            .ok()
            .and_then(|s| serde_json::from_str::<serde_json::Value>(&s).ok());

        let mut log = ActionLog::new(ActionType::GenerateTimetable, &ctx.actor, ctx.role);
        log.date_range_start = Some(range.start);
        log.date_range_end = Some(range.end);
        log.payload_json = Some(json!({
            "request": request,
            "generated_exams": exams.len(),
            "removed_exams": removed,
            "conflicts": conflicts.len(),
            "skipped_modules": outcome.skipped_modules,
            "unplaced_modules": outcome.unplaced_modules,
            "config": snapshot,
        }));
        log.detail = Some(format!(
            "生成{}场考试 ({} ~ {})",
            exams.len(),
            range.start,
            range.end
        ));
        if let Err(e) = self.action_log_repo.insert(&log) {
            warn!(error = %e, "记录操作日志失败");
        }

        Ok(GenerationResponse::new(removed, exams, conflicts, warnings))
    }

    // ==========================================
    // 考试查询
    // ==========================================

    /// 查询考试列表
    ///
    /// # 可见范围
    /// - 学生 / 教师: 仅已发布
    /// - 系主任: 默认不含已被系主任驳回的考试; include_pending=true 时可见全部
    /// - 管理员 / 副院长: 全部
    pub fn list_exams(&self, ctx: &CallerContext, filter: &ExamFilter) -> ApiResult<Vec<ExamView>> {
        let exams = self.exam_repo.list_all()?;

        Ok(exams
            .into_iter()
            .filter(|e| visible_to(ctx, filter, e))
            .filter(|e| filter.matches(e))
            .map(ExamView::from)
            .collect())
    }

    /// 按ID查询考试 (非教务人员只能看到已发布考试)
    pub fn get_exam(&self, ctx: &CallerContext, exam_id: i64) -> ApiResult<ExamView> {
        let exam = self
            .exam_repo
            .find_by_id(exam_id)?
            .filter(|e| ctx.is_staff() || e.is_published())
            .ok_or_else(|| ApiError::NotFound(format!("Exam(id={})不存在", exam_id)))?;
        Ok(ExamView::from(exam))
    }

    // ==========================================
    // 冲突 / 提示
    // ==========================================

    /// 基于当前考试集合重算冲突
    ///
    /// # 参数
    /// - range: 仅检测该日期区间内的考试 (None=全部)
    pub fn list_conflicts(
        &self,
        ctx: &CallerContext,
        range: Option<DateRange>,
    ) -> ApiResult<Vec<Conflict>> {
        let mut perf = PerfGuard::new("list_conflicts");
        ctx.require_any(STAFF_ROLES, "查询冲突")?;

        let config = self.scheduler_config()?;
        let dataset = self.academic_repo.load_dataset()?;
        let exams = self.load_exams(range)?;
        perf.set_exam_count(exams.len());

        let detect_ctx = DetectionContext::new(&dataset, config.room_exam_capacity_cap);
        Ok(self.detector.detect(&detect_ctx, &exams))
    }

    /// 教师单日监考超限提示
    pub fn list_warnings(
        &self,
        ctx: &CallerContext,
        range: Option<DateRange>,
    ) -> ApiResult<Vec<ScheduleWarning>> {
        ctx.require_any(STAFF_ROLES, "查询排考提示")?;

        let config = self.scheduler_config()?;
        let exams = self.load_exams(range)?;
        Ok(self
            .detector
            .professor_load_warnings(&exams, config.professor_daily_limit))
    }

    // ==========================================
    // 统计
    // ==========================================

    pub fn get_statistics(&self, ctx: &CallerContext) -> ApiResult<StatisticsSummary> {
        let mut perf = PerfGuard::new("get_statistics");
        ctx.require_any(STAFF_ROLES, "查询统计")?;

        let config = self.scheduler_config()?;
        let dataset = self.academic_repo.load_dataset()?;
        let exams = self.exam_repo.list_all()?;
        perf.set_exam_count(exams.len());

        let detect_ctx = DetectionContext::new(&dataset, config.room_exam_capacity_cap);
        let conflicts = self.detector.detect(&detect_ctx, &exams);
        Ok(self.aggregator.summarize(&dataset, &exams, &conflicts))
    }

    // ==========================================
    // 个人日程
    // ==========================================

    /// 学生考试日程 (仅已发布考试)
    ///
    /// # 鉴权
    /// - 学生只能查询本人; 教师不可查询学生日程; 教务人员不限
    pub fn get_student_timetable(
        &self,
        ctx: &CallerContext,
        student_id: i64,
    ) -> ApiResult<StudentTimetable> {
        match ctx.role {
            UserRole::Student if ctx.student_id != Some(student_id) => {
                return Err(ApiError::Forbidden("学生只能查询本人考试日程".to_string()));
            }
            UserRole::Professor => {
                return Err(ApiError::Forbidden("教师不能查询学生考试日程".to_string()));
            }
            _ => {}
        }

        let student = self
            .academic_repo
            .find_student(student_id)?
            .ok_or_else(|| ApiError::NotFound(format!("Student(id={})不存在", student_id)))?;

        let modules: BTreeSet<i64> = self
            .academic_repo
            .modules_of_student(student_id)?
            .into_iter()
            .collect();
        let dataset = self.academic_repo.load_dataset()?;
        let timetable = self
            .exam_repo
            .list_all()?
            .iter()
            .filter(|e| e.is_published() && modules.contains(&e.module_id()))
            .map(|e| to_entry(&dataset, e))
            .collect();

        Ok(StudentTimetable {
            student_id: student.student_id,
            last_name: student.last_name,
            first_name: student.first_name,
            timetable,
        })
    }

    /// 教师监考日程 (仅已发布考试)
    ///
    /// # 鉴权
    /// - 教师只能查询本人; 学生不可查询; 教务人员不限
    pub fn get_professor_timetable(
        &self,
        ctx: &CallerContext,
        professor_id: i64,
    ) -> ApiResult<ProfessorTimetable> {
        match ctx.role {
            UserRole::Professor if ctx.professor_id != Some(professor_id) => {
                return Err(ApiError::Forbidden("教师只能查询本人监考日程".to_string()));
            }
            UserRole::Student => {
                return Err(ApiError::Forbidden("学生不能查询教师监考日程".to_string()));
            }
            _ => {}
        }

        let professor = self
            .academic_repo
            .find_professor(professor_id)?
            .ok_or_else(|| ApiError::NotFound(format!("Professor(id={})不存在", professor_id)))?;

        let dataset = self.academic_repo.load_dataset()?;
        let timetable = self
            .exam_repo
            .find_supervised_by(professor_id)?
            .iter()
            .filter(|e| e.is_published())
            .map(|e| to_entry(&dataset, e))
            .collect();

        Ok(ProfessorTimetable {
            professor_id: professor.professor_id,
            name: professor.name,
            timetable,
        })
    }

    // ==========================================
    // 辅助方法
    // ==========================================

    fn scheduler_config(&self) -> ApiResult<SchedulerConfig> {
        self.config_manager
            .get_scheduler_config()
            .map_err(|e| ApiError::InternalError(format!("读取排考参数失败: {}", e)))
    }

    fn load_exams(&self, range: Option<DateRange>) -> ApiResult<Vec<Exam>> {
        let exams = match range {
            Some(range) => {
                if range.start > range.end {
                    return Err(ApiError::ValidationError(format!(
                        "日期区间倒置: {} > {}",
                        range.start, range.end
                    )));
                }
                self.exam_repo.list_in_range(&range)?
            }
            None => self.exam_repo.list_all()?,
        };
        Ok(exams)
    }
}

/// 排考请求校验 (在任何排考工作之前)
fn validate_request(scheduler: &ConstraintScheduler, request: &GenerationRequest) -> ApiResult<()> {
    if request.start_date > request.end_date {
        return Err(ApiError::ValidationError(format!(
            "日期区间倒置: {} > {}",
            request.start_date, request.end_date
        )));
    }
    if request.exam_start_time >= request.exam_end_time {
        return Err(ApiError::ValidationError(format!(
            "考试窗口为空: {} - {}",
            request.exam_start_time, request.exam_end_time
        )));
    }
    if scheduler
        .time_slots(request.exam_start_time, request.exam_end_time)
        .is_empty()
    {
        return Err(ApiError::ValidationError(format!(
            "考试窗口 {} - {} 容纳不下一场{}分钟的考试",
            request.exam_start_time,
            request.exam_end_time,
            scheduler.config().exam_duration_minutes
        )));
    }
    Ok(())
}

/// 按角色判断考试是否可见
fn visible_to(ctx: &CallerContext, filter: &ExamFilter, exam: &Exam) -> bool {
    match ctx.role {
        UserRole::Admin | UserRole::Dean => true,
        UserRole::DeptHead => {
            filter.include_pending || exam.dept_head_approval != ApprovalStatus::Rejected
        }
        UserRole::Professor | UserRole::Student => exam.is_published(),
    }
}

/// 考试 -> 日程条目 (解析考场与监考名称)
fn to_entry(dataset: &AcademicDataset, exam: &Exam) -> TimetableEntry {
    TimetableEntry {
        exam_id: exam.exam_id,
        module_id: exam.module_id(),
        module: dataset
            .modules
            .get(&exam.module_id())
            .map(|m| m.name.clone())
            .unwrap_or_default(),
        date: exam.date(),
        start_time: exam.placement.start_time,
        duration_minutes: exam.placement.duration_minutes,
        rooms: exam
            .placement
            .room_ids
            .iter()
            .filter_map(|id| dataset.rooms.get(id))
            .map(|r| RoomRef {
                room_id: r.room_id,
                name: r.name.clone(),
                building: r.building_name.clone(),
            })
            .collect(),
        professors: exam
            .placement
            .professor_ids
            .iter()
            .filter_map(|id| dataset.professors.get(id))
            .map(|p| ProfessorRef {
                professor_id: p.professor_id,
                name: p.name.clone(),
            })
            .collect(),
    }
}
