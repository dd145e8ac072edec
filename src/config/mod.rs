// ==========================================
// 考试排期系统 - 配置层
// ==========================================
// 职责: 排考参数管理, 缺省值 + 库内覆写
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod scheduler_config;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager};
pub use scheduler_config::{SchedulerConfig, SchedulerConfigReader};
