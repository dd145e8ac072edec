// ==========================================
// 考试排期系统 - 约束排考引擎
// ==========================================
// 职责: 为每门有选课学生的课程模块选择 日期 + 时段 + 考场 + 监考
// 输入: 教学基础数据快照 + 排考请求 + 排考参数
// 输出: 考试落位列表 (尚未落库) + 排考提示
// 红线: Engine 不拼 SQL; 同一输入结果确定
// ==========================================
// 两轮落位:
// 1) 严格轮: 按 (日期, 时段) 升序取第一个无冲突且满足偏好的候选
// 2) 降级轮: 无可行候选时取冲突代价最小的候选, 冲突留给检测报告
// ==========================================

use crate::config::SchedulerConfig;
use crate::domain::academic::AcademicDataset;
use crate::domain::conflict::ScheduleWarning;
use crate::domain::exam::{ExamPlacement, GenerationRequest};
use crate::engine::conflict_detector::{ConflictCost, ConflictDetector, DetectionContext};
use chrono::{NaiveDate, NaiveTime, Timelike};
use std::collections::BTreeSet;
use tracing::{debug, info, instrument, warn};

// ==========================================
// ScheduleOutcome - 排考结果
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct ScheduleOutcome {
    pub placements: Vec<ExamPlacement>,   // 按课程模块ID升序
    pub warnings: Vec<ScheduleWarning>,   // 降级落位提示
    pub skipped_modules: Vec<i64>,        // 无选课学生, 不排考
    pub unplaced_modules: Vec<i64>,       // 无任何候选 (日期或时段为空)
}

// 单个候选落位
#[derive(Debug, Clone)]
struct Candidate {
    placement: ExamPlacement,
    cost: ConflictCost,
    complete: bool,          // 考场与监考均满足
    preferences_hold: bool,  // 专业/学生每日偏好满足
}

impl Candidate {
    fn is_strict(&self) -> bool {
        self.complete && self.preferences_hold && self.cost.is_clean()
    }
}

// ==========================================
// ConstraintScheduler - 约束排考引擎
// ==========================================
pub struct ConstraintScheduler {
    config: SchedulerConfig,
    detector: ConflictDetector,
}

impl ConstraintScheduler {
    /// 构造函数
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            detector: ConflictDetector::new(),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// 生成每日可用开考时段
    ///
    /// # 规则
    /// - 从窗口开始时间起, 每隔 slot_step_minutes 一个时段
    /// - 考试必须在窗口结束前完成 (start + duration <= end)
    pub fn time_slots(&self, window_start: NaiveTime, window_end: NaiveTime) -> Vec<NaiveTime> {
        let start = window_start.num_seconds_from_midnight() / 60;
        let end = window_end.num_seconds_from_midnight() / 60;
        let step = self.config.slot_step_minutes.max(1);

        let mut slots = Vec::new();
        let mut current = start;
        while let Some(finish) = current.checked_add(self.config.exam_duration_minutes) {
            if finish > end {
                break;
            }
            if let Some(t) = NaiveTime::from_num_seconds_from_midnight_opt(current * 60, 0) {
                slots.push(t);
            }
            match current.checked_add(step) {
                Some(next) => current = next,
                None => break,
            }
        }
        slots
    }

    // ==========================================
    // 核心方法
    // ==========================================

    /// 执行排考
    ///
    /// # 参数
    /// - `dataset`: 教学基础数据快照
    /// - `request`: 排考请求 (调用方已校验)
    ///
    /// # 返回
    /// 落位按课程模块ID顺序产生; 同一输入多次调用结果一致
    #[instrument(skip(self, dataset, request), fields(
        start_date = %request.start_date,
        end_date = %request.end_date,
        modules = dataset.modules.len(),
        rooms = dataset.rooms.len(),
        professors = dataset.professors.len()
    ))]
    pub fn schedule(&self, dataset: &AcademicDataset, request: &GenerationRequest) -> ScheduleOutcome {
        let ctx = DetectionContext::new(dataset, self.config.room_exam_capacity_cap);
        let days = request.date_range().days();
        let slots = self.time_slots(request.exam_start_time, request.exam_end_time);

        let mut outcome = ScheduleOutcome::default();

        for module_id in dataset.modules.keys().copied() {
            if dataset.enrolled_count(module_id) == 0 {
                debug!(module_id, "无选课学生, 跳过");
                outcome.skipped_modules.push(module_id);
                continue;
            }

            let mut best: Option<Candidate> = None;
            let mut accepted_strict = false;

            'search: for date in &days {
                for slot in &slots {
                    let candidate =
                        self.build_candidate(&ctx, module_id, *date, *slot, &outcome.placements);

                    if candidate.is_strict() {
                        debug!(module_id, date = %date, slot = %slot, "严格落位");
                        best = Some(candidate);
                        accepted_strict = true;
                        break 'search;
                    }

                    // 降级候选: 代价最小者, 同代价取偏好满足者, 再取最早
                    let better = match &best {
                        None => true,
                        Some(current) => {
                            (candidate.cost, !candidate.preferences_hold)
                                < (current.cost, !current.preferences_hold)
                        }
                    };
                    if better {
                        best = Some(candidate);
                    }
                }
            }

            match best {
                Some(candidate) => {
                    if !accepted_strict {
                        warn!(
                            module_id,
                            date = %candidate.placement.date,
                            slot = %candidate.placement.start_time,
                            student_conflicts = candidate.cost.student_conflicts,
                            professor_conflicts = candidate.cost.professor_conflicts,
                            capacity_shortfall = candidate.cost.capacity_shortfall,
                            "无可行落位, 降级排入"
                        );
                        outcome.warnings.push(ScheduleWarning::DegradedPlacement {
                            description: format!(
                                "Module {} could not be placed without violating constraints; placed on {} at {}",
                                module_id,
                                candidate.placement.date,
                                candidate.placement.start_time.format("%H:%M")
                            ),
                            module_id,
                            date: candidate.placement.date,
                            start_time: candidate.placement.start_time,
                        });
                    }
                    outcome.placements.push(candidate.placement);
                }
                None => {
                    warn!(module_id, "无可用日期或时段, 未排入");
                    outcome.unplaced_modules.push(module_id);
                }
            }
        }

        info!(
            placed = outcome.placements.len(),
            degraded = outcome.warnings.len(),
            skipped = outcome.skipped_modules.len(),
            unplaced = outcome.unplaced_modules.len(),
            "排考完成"
        );

        outcome
    }

    // ==========================================
    // 候选构建
    // ==========================================

    fn build_candidate(
        &self,
        ctx: &DetectionContext,
        module_id: i64,
        date: NaiveDate,
        slot: NaiveTime,
        accepted: &[ExamPlacement],
    ) -> Candidate {
        let mut placement = ExamPlacement {
            module_id,
            date,
            start_time: slot,
            duration_minutes: self.config.exam_duration_minutes,
            room_ids: Vec::new(),
            professor_ids: Vec::new(),
        };

        let overlapping: Vec<&ExamPlacement> =
            accepted.iter().filter(|a| a.overlaps(&placement)).collect();
        let busy_rooms: BTreeSet<i64> = overlapping
            .iter()
            .flat_map(|a| a.room_ids.iter().copied())
            .collect();
        let busy_professors: BTreeSet<i64> = overlapping
            .iter()
            .flat_map(|a| a.professor_ids.iter().copied())
            .collect();

        let (room_ids, rooms_complete) = self.allocate_rooms(ctx, module_id, &busy_rooms);
        let (professor_ids, supervisors_complete) =
            self.assign_supervisors(ctx.dataset, module_id, date, &busy_professors, accepted);
        placement.room_ids = room_ids;
        placement.professor_ids = professor_ids;

        let cost = self.detector.cost_against(ctx, &placement, accepted);
        let preferences_hold = self.preferences_hold(ctx.dataset, module_id, date, accepted);

        Candidate {
            placement,
            cost,
            complete: rooms_complete && supervisors_complete,
            preferences_hold,
        }
    }

    /// 按专业分组分配考场
    ///
    /// # 规则
    /// - 同一专业的学生坐在同一组考场, 考场不跨专业共用
    /// - 空闲考场按 room_id 升序取用, 有效容量 = min(额定容量, 上限)
    /// - 已被时间重叠考试占用的考场不可再用
    ///
    /// # 返回
    /// (考场列表, 是否容纳全部学生)
    fn allocate_rooms(
        &self,
        ctx: &DetectionContext,
        module_id: i64,
        busy_rooms: &BTreeSet<i64>,
    ) -> (Vec<i64>, bool) {
        let cap = ctx.capacity_cap;
        let mut free = ctx
            .dataset
            .rooms
            .values()
            .filter(|r| !busy_rooms.contains(&r.room_id) && r.exam_capacity(cap) > 0);

        let mut room_ids = Vec::new();
        let mut complete = true;

        for (_formation_id, count) in ctx.dataset.students_by_formation(module_id) {
            let mut remaining = count as u32;
            while remaining > 0 {
                match free.next() {
                    Some(room) => {
                        room_ids.push(room.room_id);
                        remaining = remaining.saturating_sub(room.exam_capacity(cap));
                    }
                    None => {
                        complete = false;
                        break;
                    }
                }
            }
        }

        (room_ids, complete)
    }

    /// 分配监考教师
    ///
    /// # 排序键
    /// (是否忙碌, 当日已监考场次, 是否外院系, professor_id)
    ///
    /// # 返回
    /// (教师ID升序, 是否全部为空闲教师)
    fn assign_supervisors(
        &self,
        dataset: &AcademicDataset,
        module_id: i64,
        date: NaiveDate,
        busy_professors: &BTreeSet<i64>,
        accepted: &[ExamPlacement],
    ) -> (Vec<i64>, bool) {
        let department_id = dataset.department_of_module(module_id).map(|d| d.department_id);

        let mut ranked: Vec<(bool, usize, bool, i64)> = dataset
            .professors
            .values()
            .map(|p| {
                let load = accepted
                    .iter()
                    .filter(|a| a.date == date && a.supervised_by(p.professor_id))
                    .count();
                (
                    busy_professors.contains(&p.professor_id),
                    load,
                    Some(p.department_id) != department_id,
                    p.professor_id,
                )
            })
            .collect();
        ranked.sort();

        let wanted = self.config.supervisors_per_exam.min(ranked.len());
        let chosen = &ranked[..wanted];
        let complete = chosen.iter().all(|(busy, ..)| !busy);

        let mut professor_ids: Vec<i64> = chosen.iter().map(|(.., id)| *id).collect();
        professor_ids.sort_unstable();
        (professor_ids, complete)
    }

    /// 每日偏好: 同专业每日一场 / 学生每日考试数
    ///
    /// student_daily_exam_limit = 0 表示不限制
    fn preferences_hold(
        &self,
        dataset: &AcademicDataset,
        module_id: i64,
        date: NaiveDate,
        accepted: &[ExamPlacement],
    ) -> bool {
        let same_day: Vec<&ExamPlacement> = accepted.iter().filter(|a| a.date == date).collect();
        if same_day.is_empty() {
            return true;
        }

        if self.config.formation_single_exam_per_day {
            let formation = dataset.modules.get(&module_id).map(|m| m.formation_id);
            let clash = same_day
                .iter()
                .any(|a| dataset.modules.get(&a.module_id).map(|m| m.formation_id) == formation);
            if formation.is_some() && clash {
                return false;
            }
        }

        let limit = self.config.student_daily_exam_limit as usize;
        if limit > 0 {
            for student_id in dataset.enrolled_students(module_id) {
                let count = same_day
                    .iter()
                    .filter(|a| dataset.enrolled_students(a.module_id).contains(student_id))
                    .count();
                if count >= limit {
                    return false;
                }
            }
        }

        true
    }
}
