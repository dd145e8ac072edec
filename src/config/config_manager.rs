// ==========================================
// 考试排期系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::scheduler_config::{SchedulerConfig, SchedulerConfigReader};
use crate::db::open_sqlite_connection;
use rusqlite::{params, Connection};
use serde_json::json;
use std::collections::BTreeMap;
use std::error::Error;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 写入 global scope 的配置值 (存在则覆盖)
    pub fn set_global_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    /// 读取并解析配置值, 缺失或格式错误时回退默认值
    fn get_parsed_or_default<T>(&self, key: &str, default: T) -> Result<T, Box<dyn Error>>
    where
        T: FromStr + Copy + std::fmt::Display,
    {
        let raw = match self.get_config_value(key)? {
            Some(v) => v,
            None => return Ok(default),
        };

        match raw.trim().parse::<T>() {
            Ok(v) => Ok(v),
            Err(_) => {
                tracing::warn!(
                    config_key = key,
                    raw_value = %raw,
                    default = %default,
                    "配置值格式错误，使用默认值"
                );
                Ok(default)
            }
        }
    }

    /// 获取所有配置的快照（JSON格式）
    ///
    /// # 返回
    /// - Ok(String): 有效排考参数 + 库中全部 global 配置
    ///
    /// # 用途
    /// - 写入排考操作日志, 便于追溯当次生成使用的参数
    pub fn get_config_snapshot(&self) -> Result<String, Box<dyn Error>> {
        let effective = self.get_scheduler_config()?;

        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        let mut stmt = conn.prepare(
            "SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key",
        )?;

        let mut stored: BTreeMap<String, String> = BTreeMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        for row in rows {
            let (key, value) = row?;
            stored.insert(key, value);
        }

        let json_value = json!({
            "effective": effective,
            "stored": stored,
        });
        Ok(serde_json::to_string(&json_value)?)
    }
}

// ==========================================
// SchedulerConfigReader Trait 实现
// ==========================================
impl SchedulerConfigReader for ConfigManager {
    fn get_scheduler_config(&self) -> Result<SchedulerConfig, Box<dyn Error>> {
        let d = SchedulerConfig::default();

        let supervisors_per_exam = self.get_parsed_or_default(
            config_keys::SUPERVISORS_PER_EXAM,
            d.supervisors_per_exam as u32,
        )?;

        let formation_single_exam_per_day = match self
            .get_config_value(config_keys::FORMATION_SINGLE_EXAM_PER_DAY)?
        {
            Some(v) => matches!(v.trim().to_lowercase().as_str(), "true" | "1" | "yes"),
            None => d.formation_single_exam_per_day,
        };

        // 时长与间隔限制在一天之内
        let exam_duration_minutes = self
            .get_parsed_or_default(config_keys::EXAM_DURATION_MINUTES, d.exam_duration_minutes)?
            .clamp(1, MINUTES_PER_DAY);
        let slot_step_minutes = self
            .get_parsed_or_default(config_keys::SLOT_STEP_MINUTES, d.slot_step_minutes)?
            .clamp(1, MINUTES_PER_DAY);

        Ok(SchedulerConfig {
            exam_duration_minutes,
            slot_step_minutes,
            room_exam_capacity_cap: self
                .get_parsed_or_default(config_keys::ROOM_EXAM_CAPACITY_CAP, d.room_exam_capacity_cap)?,
            supervisors_per_exam: supervisors_per_exam as usize,
            professor_daily_limit: self
                .get_parsed_or_default(config_keys::PROFESSOR_DAILY_LIMIT, d.professor_daily_limit)?,
            student_daily_exam_limit: self.get_parsed_or_default(
                config_keys::STUDENT_DAILY_EXAM_LIMIT,
                d.student_daily_exam_limit,
            )?,
            formation_single_exam_per_day,
        })
    }
}

const MINUTES_PER_DAY: u32 = 24 * 60;

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 时段
    pub const EXAM_DURATION_MINUTES: &str = "exam_duration_minutes";
    pub const SLOT_STEP_MINUTES: &str = "slot_step_minutes";

    // 考场
    pub const ROOM_EXAM_CAPACITY_CAP: &str = "room_exam_capacity_cap";

    // 监考
    pub const SUPERVISORS_PER_EXAM: &str = "supervisors_per_exam";
    pub const PROFESSOR_DAILY_LIMIT: &str = "professor_daily_limit";

    // 排考偏好
    pub const STUDENT_DAILY_EXAM_LIMIT: &str = "student_daily_exam_limit";
    pub const FORMATION_SINGLE_EXAM_PER_DAY: &str = "formation_single_exam_per_day";
}
