// ==========================================
// 考试排期系统 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// 说明: 所有仓储共享同一个 SQLite 连接
// ==========================================

use std::sync::{Arc, Mutex};

use crate::api::{ApprovalApi, TimetableApi};
use crate::config::ConfigManager;
use crate::db::{init_schema, open_sqlite_connection};
use crate::perf::install_sqlite_tracing;
use crate::repository::{AcademicRepository, ActionLogRepository, ExamRepository};

/// 数据库路径环境变量
pub const DB_PATH_ENV: &str = "EXAM_TIMETABLE_DB_PATH";

/// 应用状态
///
/// 包含所有API实例和共享资源
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 排考与查询API
    pub timetable_api: Arc<TimetableApi>,

    /// 审批API
    pub approval_api: Arc<ApprovalApi>,

    /// 教学基础数据仓储（用于种子数据/导入）
    pub academic_repo: Arc<AcademicRepository>,

    /// 配置管理器（用于参数覆写）
    pub config_manager: Arc<ConfigManager>,

    /// 操作日志仓储（用于审计追踪）
    pub action_log_repo: Arc<ActionLogRepository>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    ///
    /// # 返回
    /// - Ok(AppState): 应用状态实例
    /// - Err(String): 初始化错误
    ///
    /// # 说明
    /// 该方法会：
    /// 1. 打开共享连接并建表（幂等）
    /// 2. 初始化所有Repository
    /// 3. 创建所有API实例
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let mut conn =
            open_sqlite_connection(&db_path).map_err(|e| format!("无法打开数据库: {}", e))?;
        init_schema(&conn).map_err(|e| format!("数据库建表失败: {}", e))?;
        if install_sqlite_tracing(&mut conn) {
            tracing::debug!("SQL 性能统计已开启");
        }
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 初始化Repository层
        // ==========================================
        let academic_repo = Arc::new(AcademicRepository::new(conn.clone()));
        let exam_repo = Arc::new(ExamRepository::new(conn.clone()));
        let action_log_repo = Arc::new(ActionLogRepository::new(conn.clone()));

        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );

        // ==========================================
        // 初始化API层
        // ==========================================
        let timetable_api = Arc::new(TimetableApi::new(
            academic_repo.clone(),
            exam_repo.clone(),
            action_log_repo.clone(),
            config_manager.clone(),
        ));
        let approval_api = Arc::new(ApprovalApi::new(exam_repo, action_log_repo.clone()));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            timetable_api,
            approval_api,
            academic_repo,
            config_manager,
            action_log_repo,
        })
    }
}

/// 获取默认数据库路径
///
/// # 规则
/// 1. 环境变量 EXAM_TIMETABLE_DB_PATH（非空）优先
/// 2. 用户数据目录下的 exam-timetable/exam_timetable.db（debug 构建使用 -dev 目录）
/// 3. 回退到当前目录 ./exam_timetable.db
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var(DB_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./exam_timetable.db");

    if let Some(data_dir) = dirs::data_dir() {
        #[cfg(debug_assertions)]
        {
            path = data_dir.join("exam-timetable-dev");
        }

        #[cfg(not(debug_assertions))]
        {
            path = data_dir.join("exam-timetable");
        }

        // 确保目录存在
        std::fs::create_dir_all(&path).ok();
        path = path.join("exam_timetable.db");
    }

    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_default_db_path() {
        let path = get_default_db_path();
        assert!(path.ends_with(".db"));
    }

    #[test]
    fn test_app_state_initializes_empty_database() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let state = AppState::new(file.path().to_string_lossy().to_string()).unwrap();
        assert_eq!(state.academic_repo.count_students().unwrap(), 0);
        assert_eq!(state.approval_api.tracked_locks(), 0);
    }
}
