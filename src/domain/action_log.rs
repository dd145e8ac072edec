// ==========================================
// 考试排期系统 - 操作日志领域模型
// ==========================================
// 红线: 所有写入必须记录 (排考生成 / 审批决定)
// 用途: 审计追踪, 审批历史查询
// ==========================================

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::domain::types::{ApprovalStage, UserRole};

// ==========================================
// ActionLog - 操作日志
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLog {
    pub action_id: String,               // 日志ID (uuid)
    pub exam_id: Option<i64>,            // 关联考试 (排考生成为 None)
    pub action_type: String,             // 操作类型 (存储为字符串)
    pub action_ts: NaiveDateTime,        // 操作时间
    pub actor: String,                   // 操作人
    pub actor_role: String,              // 操作人角色
    pub payload_json: Option<JsonValue>, // 操作参数/结果 (JSON)
    pub date_range_start: Option<NaiveDate>,
    pub date_range_end: Option<NaiveDate>,
    pub detail: Option<String>,          // 详细描述
}

// ==========================================
// ActionType - 操作类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionType {
    GenerateTimetable, // 生成考试排期
    ApproveDeptHead,   // 系主任通过
    RejectDeptHead,    // 系主任驳回
    ApproveViceDean,   // 副院长通过
    RejectViceDean,    // 副院长驳回
}

impl ActionType {
    /// 转换为字符串 (用于数据库存储)
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::GenerateTimetable => "GENERATE_TIMETABLE",
            ActionType::ApproveDeptHead => "APPROVE_DEPT_HEAD",
            ActionType::RejectDeptHead => "REJECT_DEPT_HEAD",
            ActionType::ApproveViceDean => "APPROVE_VICE_DEAN",
            ActionType::RejectViceDean => "REJECT_VICE_DEAN",
        }
    }

    /// 由审批环节与决定得到操作类型
    pub fn for_decision(stage: ApprovalStage, approved: bool) -> Self {
        match (stage, approved) {
            (ApprovalStage::DeptHead, true) => ActionType::ApproveDeptHead,
            (ApprovalStage::DeptHead, false) => ActionType::RejectDeptHead,
            (ApprovalStage::ViceDean, true) => ActionType::ApproveViceDean,
            (ApprovalStage::ViceDean, false) => ActionType::RejectViceDean,
        }
    }
}

impl ActionLog {
    /// 构造一条新日志 (action_id / action_ts 自动生成)
    pub fn new(action_type: ActionType, actor: &str, role: UserRole) -> Self {
        Self {
            action_id: uuid::Uuid::new_v4().to_string(),
            exam_id: None,
            action_type: action_type.as_str().to_string(),
            action_ts: chrono::Local::now().naive_local(),
            actor: actor.to_string(),
            actor_role: role.as_str().to_string(),
            payload_json: None,
            date_range_start: None,
            date_range_end: None,
            detail: None,
        }
    }
}
