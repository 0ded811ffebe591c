//! The persistence store: courses, students and the four per-student record
//! streams.
//!
//! Two layers live here. The plain operations (`add_course`, `get_students`,
//! `add_attendance`, ...) keep the classroom UI contract: they never fail
//! loudly, answering with `false`, `None`, an empty list or a skipped write.
//! Each is backed by a `try_*` twin that returns a [`StoreError`], so callers
//! that care can tell "not found" apart from a storage fault. Faults folded by
//! the plain layer are logged.
//!
//! Every write runs in its own transaction; dropping an uncommitted
//! transaction rolls it back.

use chrono::{Local, NaiveDate};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::calc::{self, StatusCount, StudentSummaryRow};
use crate::config::Config;
use crate::db::{self, DbPool};
use crate::error::{StoreError, StoreResult};
use crate::export;
use crate::model::{
    display_name, parse_display_name, AssignmentRecord, AssignmentStatus, AttendanceRecord,
    AttendanceStatus, BehaviorRecord, CourseId, NewStudent, NoteRecord, RecordId, StudentId,
    StudentRecords, StudentSummary,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentBreakdown {
    pub attendance: Vec<StatusCount>,
    pub assignments: Vec<StatusCount>,
}

pub struct Store {
    pool: DbPool,
}

impl Store {
    /// Open the pool described by `config` and ensure the schema exists.
    pub fn open(config: &Config) -> StoreResult<Self> {
        let pool = db::open_pool(&config.database, &config.pool)?;
        info!(database = ?config.database, "store opened");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    // ---- courses ----

    /// `false` when the name is taken, blank, or the write fails.
    pub fn add_course(&self, name: &str) -> bool {
        settle("add_course", self.try_add_course(name)).is_some()
    }

    pub fn try_add_course(&self, name: &str) -> StoreResult<CourseId> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::EmptyName { field: "name" });
        }
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;
        if course_id(&tx, name)?.is_some() {
            return Err(StoreError::DuplicateCourse(name.to_string()));
        }
        let res = tx.execute("INSERT INTO courses(name) VALUES(?)", [name]);
        if let Err(e) = res {
            return Err(match e.sqlite_error_code() {
                Some(ErrorCode::ConstraintViolation) => {
                    StoreError::DuplicateCourse(name.to_string())
                }
                _ => e.into(),
            });
        }
        let id = CourseId(tx.last_insert_rowid());
        tx.commit()?;
        info!(course = name, id = id.0, "course added");
        Ok(id)
    }

    /// Course names, sorted.
    pub fn get_courses(&self) -> Vec<String> {
        settle("get_courses", self.try_get_courses()).unwrap_or_default()
    }

    pub fn try_get_courses(&self) -> StoreResult<Vec<String>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare("SELECT name FROM courses ORDER BY name")?;
        let names = stmt
            .query_map([], |r| r.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    /// Deletes the course and, by cascade, its students and all their records.
    pub fn delete_course(&self, name: &str) -> bool {
        settle("delete_course", self.try_delete_course(name)).is_some()
    }

    pub fn try_delete_course(&self, name: &str) -> StoreResult<()> {
        let name = name.trim();
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;
        let n = tx.execute("DELETE FROM courses WHERE name = ?", [name])?;
        if n == 0 {
            return Err(StoreError::CourseNotFound(name.to_string()));
        }
        tx.commit()?;
        info!(course = name, "course deleted");
        Ok(())
    }

    // ---- students ----

    /// `false` when the course does not exist, a name is blank, or the write fails.
    pub fn add_student(&self, course: &str, student: &NewStudent) -> bool {
        settle("add_student", self.try_add_student(course, student)).is_some()
    }

    pub fn try_add_student(&self, course: &str, student: &NewStudent) -> StoreResult<StudentId> {
        let first = student.first_name.trim();
        let last = student.last_name.trim();
        if first.is_empty() {
            return Err(StoreError::EmptyName {
                field: "firstName",
            });
        }
        if last.is_empty() {
            return Err(StoreError::EmptyName { field: "lastName" });
        }
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;
        let cid = require_course(&tx, course)?;
        tx.execute(
            "INSERT INTO students(course_id, first_name, last_name) VALUES(?, ?, ?)",
            params![cid.0, first, last],
        )?;
        let id = StudentId(tx.last_insert_rowid());
        tx.commit()?;
        info!(course, student = %display_name(last, first), id = id.0, "student added");
        Ok(id)
    }

    /// Display names (`"Lastname, Firstname"`) in enrollment order; empty for an
    /// unknown course.
    pub fn get_students(&self, course: &str) -> Vec<String> {
        self.list_students(course)
            .into_iter()
            .map(|s| s.display_name)
            .collect()
    }

    pub fn list_students(&self, course: &str) -> Vec<StudentSummary> {
        settle("list_students", self.try_list_students(course)).unwrap_or_default()
    }

    pub fn try_list_students(&self, course: &str) -> StoreResult<Vec<StudentSummary>> {
        let conn = self.pool.get()?;
        let cid = require_course(&conn, course)?;
        students_in(&conn, cid)
    }

    /// Resolve a display name to a student id within a course.
    pub fn find_student(&self, course: &str, name: &str) -> Option<StudentId> {
        settle("find_student", self.try_find_student(course, name))
    }

    pub fn try_find_student(&self, course: &str, name: &str) -> StoreResult<StudentId> {
        let conn = self.pool.get()?;
        resolve_student(&conn, course, name)
    }

    /// Deletes the student and, by cascade, all of their records.
    pub fn delete_student(&self, student: StudentId) -> bool {
        settle("delete_student", self.try_delete_student(student)).is_some()
    }

    pub fn try_delete_student(&self, student: StudentId) -> StoreResult<()> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;
        let n = tx.execute("DELETE FROM students WHERE id = ?", [student.0])?;
        if n == 0 {
            return Err(StoreError::StudentNotFound(student.to_string()));
        }
        tx.commit()?;
        info!(student = student.0, "student deleted");
        Ok(())
    }

    // ---- records by display name ----

    /// All four lists empty when the course or student is unknown.
    pub fn get_student_records(&self, course: &str, name: &str) -> StudentRecords {
        settle("get_student_records", self.try_student_records(course, name)).unwrap_or_default()
    }

    pub fn try_student_records(&self, course: &str, name: &str) -> StoreResult<StudentRecords> {
        let conn = self.pool.get()?;
        let sid = resolve_student(&conn, course, name)?;
        load_records(&conn, sid)
    }

    /// Appends an attendance entry. Unknown students are skipped; the return
    /// value says whether a row was written.
    pub fn add_attendance(&self, course: &str, name: &str, status: &str, date: &str) -> bool {
        settle(
            "add_attendance",
            self.try_add_attendance(course, name, status, date),
        )
        .is_some()
    }

    pub fn try_add_attendance(
        &self,
        course: &str,
        name: &str,
        status: &str,
        date: &str,
    ) -> StoreResult<RecordId> {
        let status: AttendanceStatus = status.parse()?;
        let date = parse_date(date)?;
        self.write_for_name(course, name, |conn, sid| {
            insert_attendance(conn, sid, status, date)
        })
    }

    /// Appends a behavior entry dated today. The score is stored as given.
    pub fn add_behavior_note(&self, course: &str, name: &str, score: i64, description: &str) -> bool {
        settle(
            "add_behavior_note",
            self.try_add_behavior_note(course, name, score, description),
        )
        .is_some()
    }

    pub fn try_add_behavior_note(
        &self,
        course: &str,
        name: &str,
        score: i64,
        description: &str,
    ) -> StoreResult<RecordId> {
        let date = today();
        self.write_for_name(course, name, |conn, sid| {
            insert_behavior(conn, sid, score, description, date)
        })
    }

    pub fn add_assignment(
        &self,
        course: &str,
        name: &str,
        title: &str,
        status: &str,
        date: &str,
    ) -> bool {
        settle(
            "add_assignment",
            self.try_add_assignment(course, name, title, status, date),
        )
        .is_some()
    }

    pub fn try_add_assignment(
        &self,
        course: &str,
        name: &str,
        title: &str,
        status: &str,
        date: &str,
    ) -> StoreResult<RecordId> {
        let status: AssignmentStatus = status.parse()?;
        let date = parse_date(date)?;
        self.write_for_name(course, name, |conn, sid| {
            insert_assignment(conn, sid, title, status, date)
        })
    }

    /// Appends a free-text note dated today.
    pub fn add_note(&self, course: &str, name: &str, content: &str) -> bool {
        settle("add_note", self.try_add_note(course, name, content)).is_some()
    }

    pub fn try_add_note(&self, course: &str, name: &str, content: &str) -> StoreResult<RecordId> {
        let date = today();
        self.write_for_name(course, name, |conn, sid| {
            insert_note(conn, sid, content, date)
        })
    }

    fn write_for_name<F>(&self, course: &str, name: &str, write: F) -> StoreResult<RecordId>
    where
        F: FnOnce(&Connection, StudentId) -> StoreResult<RecordId>,
    {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;
        let sid = resolve_student(&tx, course, name)?;
        let id = write(&*tx, sid)?;
        tx.commit()?;
        debug!(course, student = name, record = id.0, "record added");
        Ok(id)
    }

    // ---- records by student id ----

    pub fn records_for(&self, student: StudentId) -> StoreResult<StudentRecords> {
        let conn = self.pool.get()?;
        require_student(&conn, student)?;
        load_records(&conn, student)
    }

    pub fn add_attendance_for(
        &self,
        student: StudentId,
        status: AttendanceStatus,
        date: NaiveDate,
    ) -> StoreResult<RecordId> {
        self.write_for_id(student, |conn| insert_attendance(conn, student, status, date))
    }

    /// Unlike [`Store::add_behavior_note`], rejects scores outside 1..=10.
    pub fn add_behavior_for(
        &self,
        student: StudentId,
        score: i64,
        description: &str,
        date: NaiveDate,
    ) -> StoreResult<RecordId> {
        if !(1..=10).contains(&score) {
            return Err(StoreError::ScoreOutOfRange(score));
        }
        self.write_for_id(student, |conn| {
            insert_behavior(conn, student, score, description, date)
        })
    }

    pub fn add_assignment_for(
        &self,
        student: StudentId,
        title: &str,
        status: AssignmentStatus,
        date: NaiveDate,
    ) -> StoreResult<RecordId> {
        self.write_for_id(student, |conn| {
            insert_assignment(conn, student, title, status, date)
        })
    }

    pub fn add_note_for(
        &self,
        student: StudentId,
        content: &str,
        date: NaiveDate,
    ) -> StoreResult<RecordId> {
        self.write_for_id(student, |conn| insert_note(conn, student, content, date))
    }

    fn write_for_id<F>(&self, student: StudentId, write: F) -> StoreResult<RecordId>
    where
        F: FnOnce(&Connection) -> StoreResult<RecordId>,
    {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;
        require_student(&tx, student)?;
        let id = write(&*tx)?;
        tx.commit()?;
        debug!(student = student.0, record = id.0, "record added");
        Ok(id)
    }

    pub fn student_breakdown(&self, student: StudentId) -> StoreResult<StudentBreakdown> {
        let records = self.records_for(student)?;
        Ok(StudentBreakdown {
            attendance: calc::attendance_breakdown(&records.attendance),
            assignments: calc::assignment_breakdown(&records.assignments),
        })
    }

    // ---- aggregates ----

    /// One aggregate row per student; `None` for an unknown course.
    pub fn course_overview(&self, course: &str) -> Option<Vec<StudentSummaryRow>> {
        settle("course_overview", self.try_course_overview(course))
    }

    pub fn try_course_overview(&self, course: &str) -> StoreResult<Vec<StudentSummaryRow>> {
        let conn = self.pool.get()?;
        let cid = require_course(&conn, course)?;
        let mut rows = Vec::new();
        for s in students_in(&conn, cid)? {
            let records = load_records(&conn, s.id)?;
            rows.push(calc::summarize(s.display_name, &records));
        }
        Ok(rows)
    }

    /// CSV with a header row and one row per student; `None` for an unknown course.
    pub fn export_course_csv(&self, course: &str) -> Option<String> {
        settle("export_course_csv", self.try_export_course_csv(course))
    }

    pub fn try_export_course_csv(&self, course: &str) -> StoreResult<String> {
        let rows = self.try_course_overview(course)?;
        Ok(export::course_csv(&rows))
    }
}

/// Fold an error into the caller-visible "nothing happened" outcome, logging it.
fn settle<T>(op: &'static str, res: StoreResult<T>) -> Option<T> {
    match res {
        Ok(v) => Some(v),
        Err(e) if e.is_storage_fault() => {
            warn!(op, code = e.code(), error = %e, "storage fault, changes rolled back");
            None
        }
        Err(e) if e.is_not_found() => {
            debug!(op, code = e.code(), error = %e, "target not found, skipped");
            None
        }
        Err(e) => {
            info!(op, code = e.code(), error = %e, "request rejected");
            None
        }
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn parse_date(text: &str) -> StoreResult<NaiveDate> {
    calc::validate_date(text).ok_or_else(|| StoreError::InvalidDate(text.to_string()))
}

/// Course names are stored trimmed, so lookups trim too.
fn course_id(conn: &Connection, name: &str) -> StoreResult<Option<CourseId>> {
    Ok(conn
        .query_row("SELECT id FROM courses WHERE name = ?", [name.trim()], |r| {
            r.get::<_, i64>(0)
        })
        .optional()?
        .map(CourseId))
}

fn require_course(conn: &Connection, name: &str) -> StoreResult<CourseId> {
    course_id(conn, name)?.ok_or_else(|| StoreError::CourseNotFound(name.trim().to_string()))
}

fn require_student(conn: &Connection, student: StudentId) -> StoreResult<()> {
    let exists: Option<i64> = conn
        .query_row("SELECT 1 FROM students WHERE id = ?", [student.0], |r| r.get(0))
        .optional()?;
    match exists {
        Some(_) => Ok(()),
        None => Err(StoreError::StudentNotFound(student.to_string())),
    }
}

fn students_in(conn: &Connection, course: CourseId) -> StoreResult<Vec<StudentSummary>> {
    let mut stmt = conn.prepare(
        "SELECT id, first_name, last_name
         FROM students
         WHERE course_id = ?
         ORDER BY id",
    )?;
    let rows = stmt
        .query_map([course.0], |r| {
            let first: String = r.get(1)?;
            let last: String = r.get(2)?;
            Ok(StudentSummary {
                id: StudentId(r.get(0)?),
                display_name: display_name(&last, &first),
                first_name: first,
                last_name: last,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Exact match on the formatted `"Last, First"` within the course. Comparing the
/// whole string keeps names that themselves contain `", "` reachable. Names are
/// not unique; when several students share one, the earliest enrolled wins.
fn resolve_student(conn: &Connection, course: &str, name: &str) -> StoreResult<StudentId> {
    if parse_display_name(name).is_none() {
        return Err(StoreError::MalformedDisplayName(name.to_string()));
    }
    let cid = require_course(conn, course)?;
    let mut stmt = conn.prepare(
        "SELECT id FROM students
         WHERE course_id = ? AND last_name || ', ' || first_name = ?
         ORDER BY id
         LIMIT 2",
    )?;
    let ids = stmt
        .query_map(params![cid.0, name], |r| r.get::<_, i64>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    if ids.len() > 1 {
        warn!(course, student = name, "display name is ambiguous, using earliest enrolled");
    }
    ids.first()
        .copied()
        .map(StudentId)
        .ok_or_else(|| StoreError::StudentNotFound(name.to_string()))
}

fn load_records(conn: &Connection, student: StudentId) -> StoreResult<StudentRecords> {
    let sid = student.0;

    let mut stmt = conn.prepare(
        "SELECT id, date, status FROM attendances WHERE student_id = ? ORDER BY date, id",
    )?;
    let attendance = stmt
        .query_map([sid], |r| {
            Ok(AttendanceRecord {
                id: RecordId(r.get(0)?),
                date: r.get(1)?,
                status: r.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut stmt = conn.prepare(
        "SELECT id, date, score, description FROM behaviors WHERE student_id = ? ORDER BY date, id",
    )?;
    let behavior = stmt
        .query_map([sid], |r| {
            Ok(BehaviorRecord {
                id: RecordId(r.get(0)?),
                date: r.get(1)?,
                score: r.get(2)?,
                description: r.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut stmt = conn.prepare(
        "SELECT id, date, title, status FROM assignments WHERE student_id = ? ORDER BY date, id",
    )?;
    let assignments = stmt
        .query_map([sid], |r| {
            Ok(AssignmentRecord {
                id: RecordId(r.get(0)?),
                date: r.get(1)?,
                title: r.get(2)?,
                status: r.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut stmt = conn
        .prepare("SELECT id, date, content FROM notes WHERE student_id = ? ORDER BY date, id")?;
    let notes = stmt
        .query_map([sid], |r| {
            Ok(NoteRecord {
                id: RecordId(r.get(0)?),
                date: r.get(1)?,
                content: r.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(StudentRecords {
        attendance,
        behavior,
        assignments,
        notes,
    })
}

fn insert_attendance(
    conn: &Connection,
    student: StudentId,
    status: AttendanceStatus,
    date: NaiveDate,
) -> StoreResult<RecordId> {
    conn.execute(
        "INSERT INTO attendances(student_id, date, status) VALUES(?, ?, ?)",
        params![student.0, date, status],
    )?;
    Ok(RecordId(conn.last_insert_rowid()))
}

fn insert_behavior(
    conn: &Connection,
    student: StudentId,
    score: i64,
    description: &str,
    date: NaiveDate,
) -> StoreResult<RecordId> {
    conn.execute(
        "INSERT INTO behaviors(student_id, date, score, description) VALUES(?, ?, ?, ?)",
        params![student.0, date, score, description],
    )?;
    Ok(RecordId(conn.last_insert_rowid()))
}

fn insert_assignment(
    conn: &Connection,
    student: StudentId,
    title: &str,
    status: AssignmentStatus,
    date: NaiveDate,
) -> StoreResult<RecordId> {
    conn.execute(
        "INSERT INTO assignments(student_id, date, title, status) VALUES(?, ?, ?, ?)",
        params![student.0, date, title, status],
    )?;
    Ok(RecordId(conn.last_insert_rowid()))
}

fn insert_note(
    conn: &Connection,
    student: StudentId,
    content: &str,
    date: NaiveDate,
) -> StoreResult<RecordId> {
    conn.execute(
        "INSERT INTO notes(student_id, date, content) VALUES(?, ?, ?)",
        params![student.0, date, content],
    )?;
    Ok(RecordId(conn.last_insert_rowid()))
}
