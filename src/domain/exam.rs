// ==========================================
// 考试排期系统 - 考试领域模型
// ==========================================
// 红线: 只有排考引擎能创建 Exam, 只有审批流能修改审批字段
// ==========================================

use crate::domain::types::{ApprovalStatus, ExamState};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

// ==========================================
// ExamPlacement - 排考落位
// ==========================================
// 一门课程考试的 日期 + 时段 + 考场 + 监考 组合
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamPlacement {
    pub module_id: i64,            // 课程模块
    pub date: NaiveDate,           // 考试日期
    pub start_time: NaiveTime,     // 开考时间
    pub duration_minutes: u32,     // 时长 (分钟)
    pub room_ids: Vec<i64>,        // 考场 (有序)
    pub professor_ids: Vec<i64>,   // 监考教师
}

impl ExamPlacement {
    /// 开考时刻 (当日分钟数)
    pub fn start_minute(&self) -> u32 {
        self.start_time.num_seconds_from_midnight() / 60
    }

    /// 结束时刻 (当日分钟数, 不含)
    pub fn end_minute(&self) -> u32 {
        self.start_minute() + self.duration_minutes
    }

    /// 时间窗是否相交: 同一天且 [start, start+duration) 有交集
    pub fn overlaps(&self, other: &ExamPlacement) -> bool {
        self.date == other.date
            && self.start_minute() < other.end_minute()
            && other.start_minute() < self.end_minute()
    }

    /// 该教师是否监考此场考试
    pub fn supervised_by(&self, professor_id: i64) -> bool {
        self.professor_ids.contains(&professor_id)
    }
}

// ==========================================
// Exam - 考试
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exam {
    pub exam_id: i64,                         // 考试ID
    #[serde(flatten)]
    pub placement: ExamPlacement,             // 落位信息
    pub dept_head_approval: ApprovalStatus,   // 系主任审批
    pub vice_dean_approval: ApprovalStatus,   // 副院长审批
    pub created_at: NaiveDateTime,            // 生成时间
}

impl Exam {
    /// 派生审批状态
    pub fn state(&self) -> ExamState {
        ExamState::derive(self.dept_head_approval, self.vice_dean_approval)
    }

    /// 是否已对学生/教师发布 (两级均通过)
    pub fn is_published(&self) -> bool {
        self.state() == ExamState::Published
    }

    pub fn module_id(&self) -> i64 {
        self.placement.module_id
    }

    pub fn date(&self) -> NaiveDate {
        self.placement.date
    }
}

// ==========================================
// DateRange - 日期区间 (闭区间)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// 区间内的日期 (升序)
    pub fn days(&self) -> Vec<NaiveDate> {
        self.start
            .iter_days()
            .take_while(|d| *d <= self.end)
            .collect()
    }
}

// ==========================================
// GenerationRequest - 排考请求
// ==========================================
// 临时对象, 不落库
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default = "default_exam_start_time")]
    pub exam_start_time: NaiveTime, // 每日考试窗口开始
    #[serde(default = "default_exam_end_time")]
    pub exam_end_time: NaiveTime,   // 每日考试窗口结束
}

impl GenerationRequest {
    pub fn date_range(&self) -> DateRange {
        DateRange::new(self.start_date, self.end_date)
    }
}

fn default_exam_start_time() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN)
}

fn default_exam_end_time() -> NaiveTime {
    NaiveTime::from_hms_opt(17, 0, 0).unwrap_or(NaiveTime::MIN)
}

// ==========================================
// ExamFilter - 考试列表过滤条件
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamFilter {
    #[serde(default)]
    pub include_pending: bool,
    #[serde(default)]
    pub module_id: Option<i64>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

impl ExamFilter {
    pub fn matches(&self, exam: &Exam) -> bool {
        if let Some(module_id) = self.module_id {
            if exam.module_id() != module_id {
                return false;
            }
        }
        if let Some(start) = self.start_date {
            if exam.date() < start {
                return false;
            }
        }
        if let Some(end) = self.end_date {
            if exam.date() > end {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn placement(date: (i32, u32, u32), hour: u32, minute: u32, duration: u32) -> ExamPlacement {
        ExamPlacement {
            module_id: 1,
            date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            start_time: NaiveTime::from_hms_opt(hour, minute, 0).unwrap(),
            duration_minutes: duration,
            room_ids: vec![1],
            professor_ids: vec![1],
        }
    }

    #[test]
    fn test_overlap_is_half_open() {
        let a = placement((2024, 1, 10), 9, 0, 120);
        let b = placement((2024, 1, 10), 11, 0, 120);
        let c = placement((2024, 1, 10), 10, 30, 60);
        let d = placement((2024, 1, 11), 9, 0, 120);

        // 11:00 结束与 11:00 开考不相交
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&c));
        assert!(c.overlaps(&b));
        // 不同日期不相交
        assert!(!a.overlaps(&d));
    }

    #[test]
    fn test_date_range_days() {
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 12).unwrap(),
        );
        assert_eq!(range.days().len(), 3);
        assert!(range.contains(NaiveDate::from_ymd_opt(2024, 1, 12).unwrap()));
        assert!(!range.contains(NaiveDate::from_ymd_opt(2024, 1, 13).unwrap()));
    }

    #[test]
    fn test_generation_request_default_window() {
        let req: GenerationRequest =
            serde_json::from_str(r#"{"start_date":"2024-01-10","end_date":"2024-01-12"}"#).unwrap();
        assert_eq!(req.exam_start_time, NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        assert_eq!(req.exam_end_time, NaiveTime::from_hms_opt(17, 0, 0).unwrap());
    }
}
