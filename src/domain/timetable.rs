// ==========================================
// 考试排期系统 - 个人考试日程
// ==========================================
// 学生/教师视角的考试列表, 考场与监考信息已解析
// ==========================================

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomRef {
    pub room_id: i64,
    pub name: String,
    pub building: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfessorRef {
    pub professor_id: i64,
    pub name: String,
}

// ==========================================
// TimetableEntry - 日程条目
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimetableEntry {
    pub exam_id: i64,
    pub module_id: i64,
    pub module: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub duration_minutes: u32,
    pub rooms: Vec<RoomRef>,
    pub professors: Vec<ProfessorRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentTimetable {
    pub student_id: i64,
    pub last_name: String,
    pub first_name: String,
    pub timetable: Vec<TimetableEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfessorTimetable {
    pub professor_id: i64,
    pub name: String,
    pub timetable: Vec<TimetableEntry>,
}
