// ==========================================
// 考试排期系统 - 教学基础数据领域模型
// ==========================================
// 院系 -> 专业(培养方案) -> 课程模块
// 学生归属专业, 通过选课关系关联课程模块
// ==========================================

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// ==========================================
// Department - 院系
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Department {
    pub department_id: i64, // 院系ID
    pub name: String,       // 院系名称
}

// ==========================================
// Formation - 专业(培养方案)
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Formation {
    pub formation_id: i64,     // 专业ID
    pub name: String,          // 专业名称
    pub department_id: i64,    // 所属院系
    pub level: Option<String>, // 层次 (L1/L2/M1...)
}

// ==========================================
// Module - 课程模块
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    pub module_id: i64,        // 模块ID
    pub name: String,          // 模块名称
    pub credits: Option<i32>,  // 学分
    pub formation_id: i64,     // 所属专业
}

// ==========================================
// Student - 学生
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub student_id: i64,               // 学生ID
    pub registration_no: String,       // 学号
    pub last_name: String,             // 姓
    pub first_name: String,            // 名
    pub formation_id: i64,             // 所属专业
    pub promo: Option<i32>,            // 年级
}

// ==========================================
// Professor - 教师
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Professor {
    pub professor_id: i64,          // 教师ID
    pub name: String,               // 姓名
    pub department_id: i64,         // 所属院系
    pub specialty: Option<String>,  // 专长
}

// ==========================================
// Building - 教学楼
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Building {
    pub building_id: i64,
    pub name: String,
}

// ==========================================
// Room - 考场
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub room_id: i64,          // 考场ID
    pub name: String,          // 考场名称
    pub capacity: u32,         // 额定容量
    pub room_type: String,     // 类型 (amphi/td/tp)
    pub building_id: i64,      // 所属教学楼
    pub building_name: String, // 教学楼名称 (查询时关联补充)
}

impl Room {
    /// 考试期间的有效容量 = min(额定容量, 单场考试座位上限)
    pub fn exam_capacity(&self, cap: u32) -> u32 {
        self.capacity.min(cap)
    }
}

// ==========================================
// Enrollment - 选课关系
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Enrollment {
    pub student_id: i64,
    pub module_id: i64,
}

// ==========================================
// AcademicDataset - 教学基础数据快照
// ==========================================
// 一次读取得到的只读快照, 供排考 / 冲突检测 / 统计使用
// 所有索引均为有序容器, 保证遍历顺序稳定
#[derive(Debug, Clone, Default)]
pub struct AcademicDataset {
    pub departments: BTreeMap<i64, Department>,
    pub formations: BTreeMap<i64, Formation>,
    pub modules: BTreeMap<i64, Module>,
    pub students: BTreeMap<i64, Student>,
    pub professors: BTreeMap<i64, Professor>,
    pub rooms: BTreeMap<i64, Room>,
    module_students: BTreeMap<i64, BTreeSet<i64>>, // module_id -> 选课学生
}

impl AcademicDataset {
    /// 由各实体列表构建快照
    pub fn new(
        departments: Vec<Department>,
        formations: Vec<Formation>,
        modules: Vec<Module>,
        students: Vec<Student>,
        professors: Vec<Professor>,
        rooms: Vec<Room>,
        enrollments: Vec<Enrollment>,
    ) -> Self {
        let mut module_students: BTreeMap<i64, BTreeSet<i64>> = BTreeMap::new();
        for e in enrollments {
            module_students.entry(e.module_id).or_default().insert(e.student_id);
        }

        Self {
            departments: departments.into_iter().map(|d| (d.department_id, d)).collect(),
            formations: formations.into_iter().map(|f| (f.formation_id, f)).collect(),
            modules: modules.into_iter().map(|m| (m.module_id, m)).collect(),
            students: students.into_iter().map(|s| (s.student_id, s)).collect(),
            professors: professors.into_iter().map(|p| (p.professor_id, p)).collect(),
            rooms: rooms.into_iter().map(|r| (r.room_id, r)).collect(),
            module_students,
        }
    }

    /// 课程模块的选课学生集合
    pub fn enrolled_students(&self, module_id: i64) -> &BTreeSet<i64> {
        static EMPTY: BTreeSet<i64> = BTreeSet::new();
        self.module_students.get(&module_id).unwrap_or(&EMPTY)
    }

    pub fn enrolled_count(&self, module_id: i64) -> usize {
        self.enrolled_students(module_id).len()
    }

    /// 学生选修的课程模块
    pub fn modules_of_student(&self, student_id: i64) -> Vec<i64> {
        self.module_students
            .iter()
            .filter(|(_, students)| students.contains(&student_id))
            .map(|(module_id, _)| *module_id)
            .collect()
    }

    pub fn formation_of_module(&self, module_id: i64) -> Option<&Formation> {
        self.modules
            .get(&module_id)
            .and_then(|m| self.formations.get(&m.formation_id))
    }

    pub fn department_of_module(&self, module_id: i64) -> Option<&Department> {
        self.formation_of_module(module_id)
            .and_then(|f| self.departments.get(&f.department_id))
    }

    /// 按学生所属专业分组的选课人数 (formation_id -> 人数)
    pub fn students_by_formation(&self, module_id: i64) -> BTreeMap<i64, usize> {
        let mut groups: BTreeMap<i64, usize> = BTreeMap::new();
        for student_id in self.enrolled_students(module_id) {
            if let Some(student) = self.students.get(student_id) {
                *groups.entry(student.formation_id).or_insert(0) += 1;
            }
        }
        groups
    }
}
