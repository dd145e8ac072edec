// ==========================================
// 考试排期系统 - 演示数据库初始化工具
// ==========================================
// 用法: seed_demo_db [db_path]
// 备份并重置数据库, 写入确定性的演示院校数据
// ==========================================

use chrono::Local;
use std::error::Error;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use exam_timetable::app::get_default_db_path;
use exam_timetable::db::{init_schema, open_sqlite_connection};
use exam_timetable::repository::AcademicRepository;

const DEPARTMENTS: [&str; 4] = ["Informatique", "Mathématiques", "Physique", "Chimie"];
const LEVELS: [&str; 2] = ["L3", "M1"];
const MODULES_PER_FORMATION: usize = 3;
const STUDENTS_PER_FORMATION: usize = 24;
const PROFESSORS_PER_DEPARTMENT: usize = 5;

const LAST_NAMES: [&str; 8] = [
    "Benali", "Martin", "Haddad", "Bernard", "Mansouri", "Petit", "Khelifi", "Durand",
];
const FIRST_NAMES: [&str; 6] = ["Amine", "Sarah", "Yacine", "Lina", "Karim", "Nour"];

fn main() -> Result<(), Box<dyn Error>> {
    let db_path = std::env::args()
        .nth(1)
        .unwrap_or_else(get_default_db_path);

    backup_and_reset_db(&db_path)?;

    let conn = open_sqlite_connection(&db_path)?;
    init_schema(&conn)?;
    let repo = AcademicRepository::new(Arc::new(Mutex::new(conn)));

    seed_demo_institution(&repo)?;
    print_quick_counts(&repo)?;

    Ok(())
}

fn backup_and_reset_db(db_path: &str) -> Result<(), Box<dyn Error>> {
    let path = Path::new(db_path);
    if !path.exists() {
        return Ok(());
    }

    let ts = Local::now().format("%Y%m%d_%H%M%S").to_string();
    let backup_path = format!("{}.bak.{}", db_path, ts);
    fs::copy(path, &backup_path)?;
    fs::remove_file(path)?;

    eprintln!("Backed up {} -> {}", db_path, backup_path);
    Ok(())
}

fn seed_demo_institution(repo: &AcademicRepository) -> Result<(), Box<dyn Error>> {
    // ===== 考场 =====
    let main_building = repo.insert_building("Bâtiment A")?;
    let annex = repo.insert_building("Bâtiment B")?;
    for i in 1..=2 {
        repo.insert_room(&format!("Amphi {}", i), 120, "amphi", main_building)?;
    }
    for i in 1..=6 {
        let building = if i <= 3 { main_building } else { annex };
        repo.insert_room(&format!("TD {}", i), 30, "td", building)?;
    }
    for i in 1..=2 {
        repo.insert_room(&format!("TP {}", i), 18, "tp", annex)?;
    }

    let mut student_seq = 0usize;
    for (d_idx, dept_name) in DEPARTMENTS.iter().enumerate() {
        let department_id = repo.insert_department(dept_name)?;

        // ===== 教师 =====
        for p in 0..PROFESSORS_PER_DEPARTMENT {
            let name = format!(
                "{} {}",
                FIRST_NAMES[(d_idx + p) % FIRST_NAMES.len()],
                LAST_NAMES[(d_idx * PROFESSORS_PER_DEPARTMENT + p) % LAST_NAMES.len()]
            );
            repo.insert_professor(&name, department_id, Some(dept_name))?;
        }

        // ===== 专业 / 课程 / 学生 =====
        let mut department_modules: Vec<i64> = Vec::new();
        for level in LEVELS {
            let formation_id = repo.insert_formation(
                &format!("{} {}", level, dept_name),
                department_id,
                Some(level),
            )?;

            let mut modules = Vec::with_capacity(MODULES_PER_FORMATION);
            for m in 1..=MODULES_PER_FORMATION {
                let module_id = repo.insert_module(
                    &format!("{} {} - Module {}", dept_name, level, m),
                    Some(if m == 1 { 6 } else { 4 }),
                    formation_id,
                )?;
                modules.push(module_id);
            }

            for _ in 0..STUDENTS_PER_FORMATION {
                student_seq += 1;
                let student_id = repo.insert_student(
                    &format!("2024{:05}", student_seq),
                    LAST_NAMES[student_seq % LAST_NAMES.len()],
                    FIRST_NAMES[student_seq % FIRST_NAMES.len()],
                    formation_id,
                    Some(2024),
                )?;
                for module_id in &modules {
                    repo.enroll(student_id, *module_id)?;
                }
                // 每 6 名学生跨专业补修一门本院系课程
                if student_seq % 6 == 0 {
                    if let Some(extra) = department_modules.first() {
                        repo.enroll(student_id, *extra)?;
                    }
                }
            }

            department_modules.extend(modules);
        }
    }

    Ok(())
}

fn print_quick_counts(repo: &AcademicRepository) -> Result<(), Box<dyn Error>> {
    let dataset = repo.load_dataset()?;
    println!("departments: {}", dataset.departments.len());
    println!("formations:  {}", dataset.formations.len());
    println!("modules:     {}", dataset.modules.len());
    println!("students:    {}", dataset.students.len());
    println!("professors:  {}", dataset.professors.len());
    println!("rooms:       {}", dataset.rooms.len());
    Ok(())
}
