use super::core::ActionLogRepository;
use crate::domain::action_log::ActionLog;
use crate::repository::error::RepositoryResult;
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Result as SqliteResult, Row};

impl ActionLogRepository {
    // ==========================================
    // 查询操作
    // ==========================================

    /// 按 action_id 查询单个日志
    pub fn find_by_id(&self, action_id: &str) -> RepositoryResult<Option<ActionLog>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT action_id, exam_id, action_type, action_ts, actor, actor_role,
                   payload_json, date_range_start, date_range_end, detail
            FROM action_log
            WHERE action_id = ?
            "#,
        )?;

        match stmt.query_row(params![action_id], |row| self.map_row(row)) {
            Ok(log) => Ok(Some(log)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 查询指定考试的审批历史 (按时间正序)
    pub fn find_by_exam_id(&self, exam_id: i64) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT action_id, exam_id, action_type, action_ts, actor, actor_role,
                   payload_json, date_range_start, date_range_end, detail
            FROM action_log
            WHERE exam_id = ?
            ORDER BY action_ts ASC, rowid ASC
            "#,
        )?;

        let logs = stmt
            .query_map(params![exam_id], |row| self.map_row(row))?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(logs)
    }

    /// 查询指定考试最近的 limit 条日志 (结果仍按时间正序)
    pub fn find_recent_by_exam_id(
        &self,
        exam_id: i64,
        limit: usize,
    ) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT action_id, exam_id, action_type, action_ts, actor, actor_role,
                   payload_json, date_range_start, date_range_end, detail
            FROM action_log
            WHERE exam_id = ?
            ORDER BY action_ts DESC, rowid DESC
            LIMIT ?
            "#,
        )?;

        let mut logs = stmt
            .query_map(params![exam_id, limit as i64], |row| self.map_row(row))?
            .collect::<SqliteResult<Vec<_>>>()?;
        logs.reverse();

        Ok(logs)
    }

    /// 查询指定操作类型的日志
    pub fn find_by_action_type(
        &self,
        action_type: &str,
        limit: i32,
    ) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT action_id, exam_id, action_type, action_ts, actor, actor_role,
                   payload_json, date_range_start, date_range_end, detail
            FROM action_log
            WHERE action_type = ?
            ORDER BY action_ts DESC, rowid DESC
            LIMIT ?
            "#,
        )?;

        let logs = stmt
            .query_map(params![action_type, limit], |row| self.map_row(row))?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(logs)
    }

    /// 查询最近的 N 条日志
    pub fn find_recent(&self, limit: i32) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT action_id, exam_id, action_type, action_ts, actor, actor_role,
                   payload_json, date_range_start, date_range_end, detail
            FROM action_log
            ORDER BY action_ts DESC, rowid DESC
            LIMIT ?
            "#,
        )?;

        let logs = stmt
            .query_map(params![limit], |row| self.map_row(row))?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(logs)
    }

    /// 统计指定考试的操作总数
    pub fn count_by_exam(&self, exam_id: i64) -> RepositoryResult<i32> {
        let conn = self.get_conn()?;

        let count: i32 = conn.query_row(
            "SELECT COUNT(*) FROM action_log WHERE exam_id = ?",
            params![exam_id],
            |row| row.get(0),
        )?;

        Ok(count)
    }

    // ==========================================
    // 辅助方法
    // ==========================================

    /// 将数据库行映射为 ActionLog 实体
    fn map_row(&self, row: &Row) -> SqliteResult<ActionLog> {
        let action_ts_str: String = row.get(3)?;
        let payload_json_str: Option<String> = row.get(6)?;
        let date_range_start_str: Option<String> = row.get(7)?;
        let date_range_end_str: Option<String> = row.get(8)?;

        // 解析时间戳
        let action_ts = NaiveDateTime::parse_from_str(&action_ts_str, "%Y-%m-%d %H:%M:%S")
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e)))?;

        // 解析 JSON 字段
        let payload_json = payload_json_str.and_then(|s| serde_json::from_str(&s).ok());

        // 解析日期
        let date_range_start = date_range_start_str
            .and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok());
        let date_range_end = date_range_end_str
            .and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok());

        Ok(ActionLog {
            action_id: row.get(0)?,
            exam_id: row.get(1)?,
            action_type: row.get(2)?,
            action_ts,
            actor: row.get(4)?,
            actor_role: row.get(5)?,
            payload_json,
            date_range_start,
            date_range_end,
            detail: row.get(9)?,
        })
    }
}
