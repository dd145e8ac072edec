// ==========================================
// 考试排期系统 - 教学基础数据仓储
// ==========================================
// 覆盖: 院系 / 专业 / 课程模块 / 学生 / 选课 / 教师 / 教学楼 / 考场
// 红线: Repository 不含业务逻辑, 只做数据映射
// ==========================================

use crate::domain::academic::{
    AcademicDataset, Building, Department, Enrollment, Formation, Module, Professor, Room, Student,
};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

// ==========================================
// AcademicRepository - 教学基础数据仓储
// ==========================================
pub struct AcademicRepository {
    conn: Arc<Mutex<Connection>>,
}

impl AcademicRepository {
    /// 创建新的AcademicRepository实例
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
    // 写入操作 (演示数据 / 测试夹具)
    // ==========================================

    pub fn insert_department(&self, name: &str) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        conn.execute("INSERT INTO departments (name) VALUES (?)", params![name])?;
        Ok(conn.last_insert_rowid())
    }

    pub fn insert_formation(
        &self,
        name: &str,
        department_id: i64,
        level: Option<&str>,
    ) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO formations (name, department_id, level) VALUES (?, ?, ?)",
            params![name, department_id, level],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn insert_module(
        &self,
        name: &str,
        credits: Option<i32>,
        formation_id: i64,
    ) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO modules (name, credits, formation_id) VALUES (?, ?, ?)",
            params![name, credits, formation_id],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn insert_student(
        &self,
        registration_no: &str,
        last_name: &str,
        first_name: &str,
        formation_id: i64,
        promo: Option<i32>,
    ) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"INSERT INTO students (registration_no, last_name, first_name, formation_id, promo)
               VALUES (?, ?, ?, ?, ?)"#,
            params![registration_no, last_name, first_name, formation_id, promo],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// 选课 (重复选课忽略)
    pub fn enroll(&self, student_id: i64, module_id: i64) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT OR IGNORE INTO enrollments (student_id, module_id) VALUES (?, ?)",
            params![student_id, module_id],
        )?;
        Ok(())
    }

    pub fn insert_professor(
        &self,
        name: &str,
        department_id: i64,
        specialty: Option<&str>,
    ) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO professors (name, department_id, specialty) VALUES (?, ?, ?)",
            params![name, department_id, specialty],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn insert_building(&self, name: &str) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        conn.execute("INSERT INTO buildings (name) VALUES (?)", params![name])?;
        Ok(conn.last_insert_rowid())
    }

    pub fn insert_room(
        &self,
        name: &str,
        capacity: u32,
        room_type: &str,
        building_id: i64,
    ) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO rooms (name, capacity, room_type, building_id) VALUES (?, ?, ?, ?)",
            params![name, capacity, room_type, building_id],
        )?;
        Ok(conn.last_insert_rowid())
    }

    // ==========================================
    // 查询操作
    // ==========================================

    pub fn list_departments(&self) -> RepositoryResult<Vec<Department>> {
        let conn = self.get_conn()?;
        Self::query_departments(&conn)
    }

    pub fn list_modules(&self) -> RepositoryResult<Vec<Module>> {
        let conn = self.get_conn()?;
        Self::query_modules(&conn)
    }

    pub fn list_rooms(&self) -> RepositoryResult<Vec<Room>> {
        let conn = self.get_conn()?;
        Self::query_rooms(&conn)
    }

    pub fn list_buildings(&self) -> RepositoryResult<Vec<Building>> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare("SELECT building_id, name FROM buildings ORDER BY building_id")?;
        let buildings = stmt
            .query_map([], |row| {
                Ok(Building {
                    building_id: row.get(0)?,
                    name: row.get(1)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(buildings)
    }

    /// 按ID查询学生
    pub fn find_student(&self, student_id: i64) -> RepositoryResult<Option<Student>> {
        let conn = self.get_conn()?;
        let student = conn
            .query_row(
                r#"SELECT student_id, registration_no, last_name, first_name, formation_id, promo
                   FROM students WHERE student_id = ?"#,
                params![student_id],
                map_student,
            )
            .optional()?;
        Ok(student)
    }

    /// 按ID查询教师
    pub fn find_professor(&self, professor_id: i64) -> RepositoryResult<Option<Professor>> {
        let conn = self.get_conn()?;
        let professor = conn
            .query_row(
                r#"SELECT professor_id, name, department_id, specialty
                   FROM professors WHERE professor_id = ?"#,
                params![professor_id],
                map_professor,
            )
            .optional()?;
        Ok(professor)
    }

    /// 学生选修的课程模块ID
    pub fn modules_of_student(&self, student_id: i64) -> RepositoryResult<Vec<i64>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT module_id FROM enrollments WHERE student_id = ? ORDER BY module_id",
        )?;
        let ids = stmt
            .query_map(params![student_id], |row| row.get(0))?
            .collect::<SqliteResult<Vec<i64>>>()?;
        Ok(ids)
    }

    pub fn count_students(&self) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM students", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    pub fn count_professors(&self) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM professors", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    /// 读取完整的教学基础数据快照
    ///
    /// # 说明
    /// - 全部查询在同一把连接锁内完成, 快照内部一致
    pub fn load_dataset(&self) -> RepositoryResult<AcademicDataset> {
        let conn = self.get_conn()?;

        let departments = Self::query_departments(&conn)?;

        let formations = {
            let mut stmt = conn.prepare(
                "SELECT formation_id, name, department_id, level FROM formations ORDER BY formation_id",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(Formation {
                        formation_id: row.get(0)?,
                        name: row.get(1)?,
                        department_id: row.get(2)?,
                        level: row.get(3)?,
                    })
                })?
                .collect::<SqliteResult<Vec<_>>>()?;
            rows
        };

        let modules = Self::query_modules(&conn)?;

        let students = {
            let mut stmt = conn.prepare(
                r#"SELECT student_id, registration_no, last_name, first_name, formation_id, promo
                   FROM students ORDER BY student_id"#,
            )?;
            let rows = stmt
                .query_map([], map_student)?
                .collect::<SqliteResult<Vec<_>>>()?;
            rows
        };

        let professors = {
            let mut stmt = conn.prepare(
                "SELECT professor_id, name, department_id, specialty FROM professors ORDER BY professor_id",
            )?;
            let rows = stmt
                .query_map([], map_professor)?
                .collect::<SqliteResult<Vec<_>>>()?;
            rows
        };

        let rooms = Self::query_rooms(&conn)?;

        let enrollments = {
            let mut stmt = conn.prepare(
                "SELECT student_id, module_id FROM enrollments ORDER BY module_id, student_id",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(Enrollment {
                        student_id: row.get(0)?,
                        module_id: row.get(1)?,
                    })
                })?
                .collect::<SqliteResult<Vec<_>>>()?;
            rows
        };

        Ok(AcademicDataset::new(
            departments,
            formations,
            modules,
            students,
            professors,
            rooms,
            enrollments,
        ))
    }

    // ==========================================
    // 内部查询 (调用方已持有连接锁)
    // ==========================================

    fn query_departments(conn: &Connection) -> RepositoryResult<Vec<Department>> {
        let mut stmt =
            conn.prepare("SELECT department_id, name FROM departments ORDER BY department_id")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(Department {
                    department_id: row.get(0)?,
                    name: row.get(1)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }

    fn query_modules(conn: &Connection) -> RepositoryResult<Vec<Module>> {
        let mut stmt = conn.prepare(
            "SELECT module_id, name, credits, formation_id FROM modules ORDER BY module_id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(Module {
                    module_id: row.get(0)?,
                    name: row.get(1)?,
                    credits: row.get(2)?,
                    formation_id: row.get(3)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }

    fn query_rooms(conn: &Connection) -> RepositoryResult<Vec<Room>> {
        let mut stmt = conn.prepare(
            r#"SELECT r.room_id, r.name, r.capacity, r.room_type, r.building_id, b.name
               FROM rooms r
               JOIN buildings b ON b.building_id = r.building_id
               ORDER BY r.room_id"#,
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(Room {
                    room_id: row.get(0)?,
                    name: row.get(1)?,
                    capacity: row.get(2)?,
                    room_type: row.get(3)?,
                    building_id: row.get(4)?,
                    building_name: row.get(5)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }
}

fn map_student(row: &Row) -> SqliteResult<Student> {
    Ok(Student {
        student_id: row.get(0)?,
        registration_no: row.get(1)?,
        last_name: row.get(2)?,
        first_name: row.get(3)?,
        formation_id: row.get(4)?,
        promo: row.get(5)?,
    })
}

fn map_professor(row: &Row) -> SqliteResult<Professor> {
    Ok(Professor {
        professor_id: row.get(0)?,
        name: row.get(1)?,
        department_id: row.get(2)?,
        specialty: row.get(3)?,
    })
}
