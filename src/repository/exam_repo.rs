// ==========================================
// 考试排期系统 - 考试数据仓储
// ==========================================
// 表: exams / exam_rooms / exam_supervisors
// 红线: Repository 不含业务逻辑
// 红线: 审批字段只能通过 update_approval (CAS) 修改
// ==========================================

use crate::domain::exam::{DateRange, Exam, ExamPlacement};
use crate::domain::types::ApprovalStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

const DATE_FMT: &str = "%Y-%m-%d";
const TIME_FMT: &str = "%H:%M";
const TS_FMT: &str = "%Y-%m-%d %H:%M:%S";

const EXAM_COLUMNS: &str = r#"exam_id, module_id, exam_date, start_time, duration_minutes,
       dept_head_approval, vice_dean_approval, created_at"#;

// ==========================================
// ExamRepository - 考试仓储
// ==========================================
pub struct ExamRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ExamRepository {
    /// 创建新的ExamRepository实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 写入操作
    // ==========================================

    /// 用新的排考结果替换日期区间内的全部考试
    ///
    /// # 参数
    /// - `range`: 排考日期区间 (闭区间)
    /// - `placements`: 本次生成的落位, 按顺序写入
    /// - `created_at`: 生成时间
    ///
    /// # 返回
    /// - `Ok((removed, exams))`: 删除的旧考试数, 新写入的考试 (两级审批均为 Pending)
    ///
    /// # 说明
    /// - 删除与写入在同一事务内完成, 任一步失败整体回滚
    pub fn replace_in_range(
        &self,
        range: &DateRange,
        placements: &[ExamPlacement],
        created_at: NaiveDateTime,
    ) -> RepositoryResult<(usize, Vec<Exam>)> {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let removed = tx.execute(
            "DELETE FROM exams WHERE exam_date BETWEEN ? AND ?",
            params![
                range.start.format(DATE_FMT).to_string(),
                range.end.format(DATE_FMT).to_string(),
            ],
        )?;

        let mut exams = Vec::with_capacity(placements.len());
        {
            let mut insert_exam = tx.prepare(
                r#"INSERT INTO exams (
                    module_id, exam_date, start_time, duration_minutes,
                    dept_head_approval, vice_dean_approval, created_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?)"#,
            )?;
            let mut insert_room = tx.prepare(
                "INSERT INTO exam_rooms (exam_id, room_id, seq_no) VALUES (?, ?, ?)",
            )?;
            let mut insert_supervisor = tx.prepare(
                "INSERT INTO exam_supervisors (exam_id, professor_id) VALUES (?, ?)",
            )?;

            for placement in placements {
                insert_exam.execute(params![
                    placement.module_id,
                    placement.date.format(DATE_FMT).to_string(),
                    placement.start_time.format(TIME_FMT).to_string(),
                    placement.duration_minutes,
                    ApprovalStatus::Pending.as_code(),
                    ApprovalStatus::Pending.as_code(),
                    created_at.format(TS_FMT).to_string(),
                ])?;
                let exam_id = tx.last_insert_rowid();

                for (seq_no, room_id) in placement.room_ids.iter().enumerate() {
                    insert_room.execute(params![exam_id, room_id, seq_no as i64])?;
                }
                for professor_id in &placement.professor_ids {
                    insert_supervisor.execute(params![exam_id, professor_id])?;
                }

                exams.push(Exam {
                    exam_id,
                    placement: placement.clone(),
                    dept_head_approval: ApprovalStatus::Pending,
                    vice_dean_approval: ApprovalStatus::Pending,
                    created_at,
                });
            }
        }

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok((removed, exams))
    }

    /// 更新审批字段 (比较并交换)
    ///
    /// # 并发控制
    /// 仅当库中审批字段仍等于 `expected` 时写入 `new`
    ///
    /// # 错误
    /// - `RepositoryError::OptimisticLockFailure`: 审批字段已被其他请求修改
    /// - `RepositoryError::NotFound`: exam_id不存在
    pub fn update_approval(
        &self,
        exam_id: i64,
        expected: (ApprovalStatus, ApprovalStatus),
        new: (ApprovalStatus, ApprovalStatus),
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;

        let rows_affected = conn.execute(
            r#"UPDATE exams
               SET dept_head_approval = ?, vice_dean_approval = ?
               WHERE exam_id = ? AND dept_head_approval = ? AND vice_dean_approval = ?"#,
            params![
                new.0.as_code(),
                new.1.as_code(),
                exam_id,
                expected.0.as_code(),
                expected.1.as_code(),
            ],
        )?;

        if rows_affected == 0 {
            let actual: Option<(i64, i64)> = conn
                .query_row(
                    "SELECT dept_head_approval, vice_dean_approval FROM exams WHERE exam_id = ?",
                    params![exam_id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            return match actual {
                Some((dh, vd)) => Err(RepositoryError::OptimisticLockFailure {
                    exam_id,
                    expected: format!("({}, {})", expected.0.as_code(), expected.1.as_code()),
                    actual: format!("({}, {})", dh, vd),
                }),
                None => Err(RepositoryError::NotFound {
                    entity: "Exam".to_string(),
                    id: exam_id.to_string(),
                }),
            };
        }

        Ok(())
    }

    // ==========================================
    // 查询操作
    // ==========================================

    /// 按exam_id查询考试 (含考场与监考)
    pub fn find_by_id(&self, exam_id: i64) -> RepositoryResult<Option<Exam>> {
        let conn = self.get_conn()?;

        let row = conn
            .query_row(
                &format!("SELECT {} FROM exams WHERE exam_id = ?", EXAM_COLUMNS),
                params![exam_id],
                map_exam_row,
            )
            .optional()?;

        match row {
            Some(exam) => Ok(Some(load_links(&conn, exam)?)),
            None => Ok(None),
        }
    }

    /// 查询全部考试 (按日期/时间/ID排序)
    pub fn list_all(&self) -> RepositoryResult<Vec<Exam>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM exams ORDER BY exam_date, start_time, exam_id",
            EXAM_COLUMNS
        ))?;
        let rows = stmt
            .query_map([], map_exam_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        hydrate(&conn, rows)
    }

    /// 查询日期区间内的考试
    pub fn list_in_range(&self, range: &DateRange) -> RepositoryResult<Vec<Exam>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            r#"SELECT {} FROM exams
               WHERE exam_date BETWEEN ? AND ?
               ORDER BY exam_date, start_time, exam_id"#,
            EXAM_COLUMNS
        ))?;
        let rows = stmt
            .query_map(
                params![
                    range.start.format(DATE_FMT).to_string(),
                    range.end.format(DATE_FMT).to_string(),
                ],
                map_exam_row,
            )?
            .collect::<SqliteResult<Vec<_>>>()?;
        hydrate(&conn, rows)
    }

    /// 按审批字段查询 (审批队列)
    pub fn find_by_approval(
        &self,
        dept_head: ApprovalStatus,
        vice_dean: ApprovalStatus,
    ) -> RepositoryResult<Vec<Exam>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            r#"SELECT {} FROM exams
               WHERE dept_head_approval = ? AND vice_dean_approval = ?
               ORDER BY exam_date, start_time, exam_id"#,
            EXAM_COLUMNS
        ))?;
        let rows = stmt
            .query_map(
                params![dept_head.as_code(), vice_dean.as_code()],
                map_exam_row,
            )?
            .collect::<SqliteResult<Vec<_>>>()?;
        hydrate(&conn, rows)
    }

    /// 查询某位教师监考的考试
    pub fn find_supervised_by(&self, professor_id: i64) -> RepositoryResult<Vec<Exam>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"SELECT e.exam_id, e.module_id, e.exam_date, e.start_time, e.duration_minutes,
                      e.dept_head_approval, e.vice_dean_approval, e.created_at
               FROM exams e
               JOIN exam_supervisors s ON s.exam_id = e.exam_id
               WHERE s.professor_id = ?
               ORDER BY e.exam_date, e.start_time, e.exam_id"#,
        )?;
        let rows = stmt
            .query_map(params![professor_id], map_exam_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        hydrate(&conn, rows)
    }

    pub fn count(&self) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM exams", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}

// ==========================================
// 行映射
// ==========================================

fn conversion_error(idx: usize, e: impl std::error::Error + Send + Sync + 'static) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
}

fn approval_from_row(row: &Row, idx: usize) -> SqliteResult<ApprovalStatus> {
    let code: i64 = row.get(idx)?;
    ApprovalStatus::from_code(code).ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, code))
}

/// 映射 exams 行 (考场/监考为空, 由 load_links 补齐)
fn map_exam_row(row: &Row) -> SqliteResult<Exam> {
    let date_str: String = row.get(2)?;
    let time_str: String = row.get(3)?;
    let created_str: String = row.get(7)?;

    Ok(Exam {
        exam_id: row.get(0)?,
        placement: ExamPlacement {
            module_id: row.get(1)?,
            date: NaiveDate::parse_from_str(&date_str, DATE_FMT)
                .map_err(|e| conversion_error(2, e))?,
            start_time: NaiveTime::parse_from_str(&time_str, TIME_FMT)
                .map_err(|e| conversion_error(3, e))?,
            duration_minutes: row.get(4)?,
            room_ids: Vec::new(),
            professor_ids: Vec::new(),
        },
        dept_head_approval: approval_from_row(row, 5)?,
        vice_dean_approval: approval_from_row(row, 6)?,
        created_at: NaiveDateTime::parse_from_str(&created_str, TS_FMT)
            .map_err(|e| conversion_error(7, e))?,
    })
}

fn load_links(conn: &Connection, mut exam: Exam) -> RepositoryResult<Exam> {
    let mut rooms = conn.prepare_cached(
        "SELECT room_id FROM exam_rooms WHERE exam_id = ? ORDER BY seq_no, room_id",
    )?;
    exam.placement.room_ids = rooms
        .query_map(params![exam.exam_id], |row| row.get(0))?
        .collect::<SqliteResult<Vec<i64>>>()?;

    let mut supervisors = conn.prepare_cached(
        "SELECT professor_id FROM exam_supervisors WHERE exam_id = ? ORDER BY professor_id",
    )?;
    exam.placement.professor_ids = supervisors
        .query_map(params![exam.exam_id], |row| row.get(0))?
        .collect::<SqliteResult<Vec<i64>>>()?;

    Ok(exam)
}

fn hydrate(conn: &Connection, rows: Vec<Exam>) -> RepositoryResult<Vec<Exam>> {
    rows.into_iter().map(|exam| load_links(conn, exam)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (ExamRepository, i64, Vec<i64>, Vec<i64>) {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::configure_sqlite_connection(&conn).unwrap();
        crate::db::init_schema(&conn).unwrap();
        conn.execute_batch(
            r#"
            INSERT INTO departments (department_id, name) VALUES (1, 'Informatique');
            INSERT INTO formations (formation_id, name, department_id) VALUES (1, 'L3', 1);
            INSERT INTO modules (module_id, name, formation_id) VALUES (1, 'Algo', 1);
            INSERT INTO buildings (building_id, name) VALUES (1, 'Bloc A');
            INSERT INTO rooms (room_id, name, capacity, room_type, building_id) VALUES (1, 'A1', 30, 'td', 1);
            INSERT INTO rooms (room_id, name, capacity, room_type, building_id) VALUES (2, 'A2', 30, 'td', 1);
            INSERT INTO professors (professor_id, name, department_id) VALUES (1, 'P1', 1);
            INSERT INTO professors (professor_id, name, department_id) VALUES (2, 'P2', 1);
            "#,
        )
        .unwrap();
        (
            ExamRepository::new(Arc::new(Mutex::new(conn))),
            1,
            vec![2, 1],
            vec![1, 2],
        )
    }

    fn placement(module_id: i64, day: u32, rooms: Vec<i64>, profs: Vec<i64>) -> ExamPlacement {
        ExamPlacement {
            module_id,
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            duration_minutes: 120,
            room_ids: rooms,
            professor_ids: profs,
        }
    }

    fn range(start: u32, end: u32) -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2024, 1, start).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, end).unwrap(),
        )
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_replace_in_range_round_trips_links() {
        let (repo, module_id, rooms, profs) = setup();
        let (removed, exams) = repo
            .replace_in_range(&range(10, 12), &[placement(module_id, 10, rooms.clone(), profs.clone())], now())
            .unwrap();
        assert_eq!(removed, 0);
        assert_eq!(exams.len(), 1);

        let loaded = repo.find_by_id(exams[0].exam_id).unwrap().unwrap();
        // 考场保持写入顺序
        assert_eq!(loaded.placement.room_ids, rooms);
        assert_eq!(loaded.placement.professor_ids, profs);
        assert_eq!(loaded.dept_head_approval, ApprovalStatus::Pending);
        assert_eq!(loaded, exams[0]);
    }

    #[test]
    fn test_replace_in_range_only_touches_range() {
        let (repo, module_id, _, _) = setup();
        repo.replace_in_range(&range(10, 10), &[placement(module_id, 10, vec![1], vec![1])], now())
            .unwrap();
        repo.replace_in_range(&range(20, 20), &[placement(module_id, 20, vec![1], vec![1])], now())
            .unwrap();

        let (removed, _) = repo
            .replace_in_range(&range(10, 12), &[placement(module_id, 11, vec![2], vec![2])], now())
            .unwrap();
        assert_eq!(removed, 1);

        let all = repo.list_all().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].date(), NaiveDate::from_ymd_opt(2024, 1, 11).unwrap());
        assert_eq!(all[1].date(), NaiveDate::from_ymd_opt(2024, 1, 20).unwrap());
        assert_eq!(repo.list_in_range(&range(10, 12)).unwrap().len(), 1);
    }

    #[test]
    fn test_update_approval_cas() {
        let (repo, module_id, _, _) = setup();
        let (_, exams) = repo
            .replace_in_range(&range(10, 10), &[placement(module_id, 10, vec![1], vec![1])], now())
            .unwrap();
        let id = exams[0].exam_id;
        let pending = (ApprovalStatus::Pending, ApprovalStatus::Pending);
        let approved = (ApprovalStatus::Approved, ApprovalStatus::Pending);

        repo.update_approval(id, pending, approved).unwrap();

        // 过期的期望值 -> 乐观锁失败
        let err = repo.update_approval(id, pending, approved).unwrap_err();
        assert!(matches!(err, RepositoryError::OptimisticLockFailure { .. }));

        let err = repo.update_approval(999, pending, approved).unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { .. }));

        let queue = repo
            .find_by_approval(ApprovalStatus::Approved, ApprovalStatus::Pending)
            .unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(repo.find_supervised_by(1).unwrap().len(), 1);
        assert!(repo.find_supervised_by(2).unwrap().is_empty());
    }
}
