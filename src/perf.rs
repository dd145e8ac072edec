// ==========================================
// 考试排期系统 - 性能观测
// ==========================================
// 每个 API 操作: 耗时 + SQL 语句数 + 慢 SQL 数 + 涉及考试数
// 日志 target: perf / slow_sql
// ==========================================

use rusqlite::Connection;
use std::cell::Cell;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// 性能统计开关环境变量
pub const PERF_SQL_ENV: &str = "EXAM_TIMETABLE_PERF_SQL";

/// 慢 SQL 阈值环境变量（毫秒）
pub const SLOW_SQL_MS_ENV: &str = "EXAM_TIMETABLE_SLOW_SQL_MS";

/// 慢 SQL 日志中 SQL 文本的最大字符数
const SQL_LOG_CHARS: usize = 240;

static ENABLED: AtomicBool = AtomicBool::new(false);
static SLOW_SQL_MS: AtomicU64 = AtomicU64::new(0);

// ==========================================
// PerfSettings - 观测开关
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PerfSettings {
    pub enabled: bool,
    pub slow_sql_ms: u64,
}

impl PerfSettings {
    /// 由环境变量取值构造
    ///
    /// # 规则
    /// - 未设置开关: Debug 开启, Release 关闭
    /// - 阈值缺失或非数字: Debug 50ms, Release 200ms
    pub fn from_values(enabled: Option<&str>, slow_sql_ms: Option<&str>) -> Self {
        let enabled = match enabled {
            Some(v) => matches!(
                v.trim().to_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            ),
            None => cfg!(debug_assertions),
        };
        let slow_sql_ms = slow_sql_ms
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(if cfg!(debug_assertions) { 50 } else { 200 });
        Self { enabled, slow_sql_ms }
    }

    pub fn from_env() -> Self {
        let enabled = std::env::var(PERF_SQL_ENV).ok();
        let slow = std::env::var(SLOW_SQL_MS_ENV).ok();
        Self::from_values(enabled.as_deref(), slow.as_deref())
    }
}

// ==========================================
// 线程内计数
// ==========================================
#[derive(Debug, Clone, Copy, Default)]
struct Counters {
    open_guards: u32,
    statements: u64,
    slow_statements: u64,
}

thread_local! {
    static COUNTERS: Cell<Counters> = Cell::new(Counters::default());
}

fn update(f: impl FnOnce(&mut Counters)) {
    COUNTERS.with(|c| {
        let mut v = c.get();
        f(&mut v);
        c.set(v);
    });
}

fn snapshot() -> Counters {
    COUNTERS.with(|c| c.get())
}

/// SQL 单行化并按字符截断
fn clip_sql(sql: &str, max_chars: usize) -> String {
    let flat = sql.split_whitespace().collect::<Vec<_>>().join(" ");
    match flat.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &flat[..idx]),
        None => flat,
    }
}

/// 按环境变量安装 SQLite 语句观测
///
/// # 返回
/// 是否已启用
pub fn install_sqlite_tracing(conn: &mut Connection) -> bool {
    install_with(conn, PerfSettings::from_env())
}

/// 按给定开关安装 SQLite 语句观测 (关闭时清除已有回调)
pub fn install_with(conn: &mut Connection, settings: PerfSettings) -> bool {
    ENABLED.store(settings.enabled, Ordering::Relaxed);
    SLOW_SQL_MS.store(settings.slow_sql_ms, Ordering::Relaxed);

    if settings.enabled {
        conn.trace(Some(on_statement));
        conn.profile(Some(on_profile));
    } else {
        conn.trace(None);
        conn.profile(None);
    }
    settings.enabled
}

fn on_statement(_sql: &str) {
    if ENABLED.load(Ordering::Relaxed) && snapshot().open_guards > 0 {
        update(|c| c.statements = c.statements.saturating_add(1));
    }
}

fn on_profile(sql: &str, duration: Duration) {
    if !ENABLED.load(Ordering::Relaxed) {
        return;
    }
    let ms = duration.as_millis() as u64;
    let threshold = SLOW_SQL_MS.load(Ordering::Relaxed);
    if threshold == 0 || ms < threshold {
        return;
    }

    tracing::warn!(
        target: "slow_sql",
        duration_ms = ms,
        sql = %clip_sql(sql, SQL_LOG_CHARS),
        "slow sql"
    );
    if snapshot().open_guards > 0 {
        update(|c| c.slow_statements = c.slow_statements.saturating_add(1));
    }
}

// ==========================================
// PerfGuard - 操作级耗时
// ==========================================
/// 作用域结束时输出一条 perf 日志
///
/// ```ignore
/// let mut perf = PerfGuard::new("list_conflicts");
/// let exams = repo.list_all()?;
/// perf.set_exam_count(exams.len());
/// ```
pub struct PerfGuard {
    op: &'static str,
    start: Instant,
    baseline: Counters,
    exam_count: Option<usize>,
}

impl PerfGuard {
    pub fn new(op: &'static str) -> Self {
        update(|c| c.open_guards = c.open_guards.saturating_add(1));
        Self {
            op,
            start: Instant::now(),
            baseline: snapshot(),
            exam_count: None,
        }
    }

    /// 记录本次操作涉及的考试数
    pub fn set_exam_count(&mut self, count: usize) {
        self.exam_count = Some(count);
    }

    /// 自创建以来本线程执行的 SQL 语句数
    pub fn statements(&self) -> u64 {
        snapshot().statements.saturating_sub(self.baseline.statements)
    }
}

impl Drop for PerfGuard {
    fn drop(&mut self) {
        let now = snapshot();
        tracing::info!(
            target: "perf",
            op = self.op,
            elapsed_ms = self.start.elapsed().as_millis() as u64,
            sql_count = now.statements.saturating_sub(self.baseline.statements),
            slow_sql_count = now.slow_statements.saturating_sub(self.baseline.slow_statements),
            exams = self.exam_count,
            "done"
        );
        update(|c| c.open_guards = c.open_guards.saturating_sub(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_from_values() {
        let on = PerfSettings::from_values(Some(" Yes "), Some("15"));
        assert!(on.enabled);
        assert_eq!(on.slow_sql_ms, 15);

        let off = PerfSettings::from_values(Some("0"), Some("abc"));
        assert!(!off.enabled);
        assert!(off.slow_sql_ms == 50 || off.slow_sql_ms == 200);
    }

    #[test]
    fn test_clip_sql_respects_char_boundaries() {
        assert_eq!(clip_sql("SELECT 1\n  FROM t", 100), "SELECT 1 FROM t");
        assert_eq!(clip_sql("abcdef", 3), "abc…");
        assert_eq!(clip_sql("考试排期", 2), "考试…");
    }

    #[test]
    fn test_guard_counts_statements_inside_scope() {
        let mut conn = Connection::open_in_memory().unwrap();
        let settings = PerfSettings { enabled: true, slow_sql_ms: 0 };
        assert!(install_with(&mut conn, settings));

        let mut perf = PerfGuard::new("test_scope");
        conn.execute_batch("CREATE TABLE t (x INTEGER); INSERT INTO t VALUES (1);")
            .unwrap();
        perf.set_exam_count(1);
        assert!(perf.statements() > 0);
    }
}
