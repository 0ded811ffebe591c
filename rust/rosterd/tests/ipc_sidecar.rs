use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

fn spawn_sidecar(db_path: &Path) -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_rosterd");
    let mut child = Command::new(exe)
        .env("DATABASE_URL", db_path)
        .env("ROSTERD_LOG", "warn")
        .env_remove("RUST_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn rosterd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown error")
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn error_code(value: &serde_json::Value) -> Option<&str> {
    assert_eq!(value.get("ok").and_then(|v| v.as_bool()), Some(false));
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
}

#[test]
fn course_student_record_flow_and_csv() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (_child, mut stdin, mut reader) = spawn_sidecar(&dir.path().join("roster.sqlite3"));

    let health = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert_eq!(health.get("courseCount").and_then(|v| v.as_u64()), Some(0));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "courses.create",
        json!({ "name": "Math101" }),
    );
    let dup = request(
        &mut stdin,
        &mut reader,
        "3",
        "courses.create",
        json!({ "name": "Math101" }),
    );
    assert_eq!(error_code(&dup), Some("duplicate_course"));

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "students.create",
        json!({ "courseName": "Math101", "firstName": "Jane", "lastName": "Doe" }),
    );
    assert_eq!(
        created.get("displayName").and_then(|v| v.as_str()),
        Some("Doe, Jane")
    );
    let student_id = created
        .get("studentId")
        .and_then(|v| v.as_i64())
        .expect("studentId");

    // Name-based targeting resolves to the same student as the id.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "attendance.add",
        json!({
            "courseName": "Math101",
            "displayName": "Doe, Jane",
            "status": "Present",
            "date": "2024-03-01"
        }),
    );
    let recs = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "students.records",
        json!({ "studentId": student_id }),
    );
    let attendance = recs
        .get("records")
        .and_then(|r| r.get("attendance"))
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    assert_eq!(attendance.len(), 1);
    assert_eq!(
        attendance[0].get("date").and_then(|v| v.as_str()),
        Some("2024-03-01")
    );
    assert_eq!(
        attendance[0].get("status").and_then(|v| v.as_str()),
        Some("Present")
    );
    assert_eq!(
        recs.get("totals")
            .and_then(|t| t.get("attendancePercent"))
            .and_then(|v| v.as_f64()),
        Some(100.0)
    );

    let export = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "courses.exportCsv",
        json!({ "courseName": "Math101" }),
    );
    assert_eq!(
        export.get("csv").and_then(|v| v.as_str()),
        Some("Alumno,Asistencia (%),Promedio Conducta,Trabajos Entregados,Total Trabajos\n\"Doe, Jane\",100.0,0,0,0\n")
    );

    let listed = request_ok(&mut stdin, &mut reader, "8", "courses.list", json!({}));
    assert_eq!(listed.get("courses"), Some(&json!(["Math101"])));
}

#[test]
fn record_validation_errors_are_reported() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (_child, mut stdin, mut reader) = spawn_sidecar(&dir.path().join("roster.sqlite3"));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "courses.create",
        json!({ "name": "Math101" }),
    );
    let created = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "students.create",
        json!({ "courseName": "Math101", "firstName": "Jane", "lastName": "Doe" }),
    );
    let sid = created.get("studentId").cloned().expect("studentId");

    let bad_date = request(
        &mut stdin,
        &mut reader,
        "3",
        "attendance.add",
        json!({ "studentId": sid, "status": "Present", "date": "2024-02-30" }),
    );
    assert_eq!(error_code(&bad_date), Some("bad_date"));

    let bad_status = request(
        &mut stdin,
        &mut reader,
        "4",
        "assignments.add",
        json!({ "studentId": sid, "title": "TP1", "status": "Lost", "date": "2024-02-15" }),
    );
    assert_eq!(error_code(&bad_status), Some("bad_status"));

    let bad_score = request(
        &mut stdin,
        &mut reader,
        "5",
        "behavior.add",
        json!({ "studentId": sid, "score": 11, "description": "too high" }),
    );
    assert_eq!(error_code(&bad_score), Some("bad_score"));

    let missing = request(
        &mut stdin,
        &mut reader,
        "6",
        "notes.add",
        json!({ "courseName": "Math101", "displayName": "Ghost, Casper", "content": "hi" }),
    );
    assert_eq!(error_code(&missing), Some("student_not_found"));

    let no_target = request(&mut stdin, &mut reader, "7", "notes.add", json!({ "content": "hi" }));
    assert_eq!(error_code(&no_target), Some("bad_params"));

    let unknown = request(&mut stdin, &mut reader, "8", "grades.add", json!({}));
    assert_eq!(error_code(&unknown), Some("not_implemented"));

    let breakdown = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "students.breakdown",
        json!({ "studentId": sid }),
    );
    let counts = breakdown
        .get("breakdown")
        .and_then(|b| b.get("attendance"))
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    assert_eq!(counts.len(), 3);
    assert!(counts
        .iter()
        .all(|c| c.get("count").and_then(|v| v.as_u64()) == Some(0)));
}

#[test]
fn course_delete_cascades_over_ipc() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (_child, mut stdin, mut reader) = spawn_sidecar(&dir.path().join("roster.sqlite3"));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "courses.create",
        json!({ "name": "Math101" }),
    );
    let created = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "students.create",
        json!({ "courseName": "Math101", "firstName": "Jane", "lastName": "Doe" }),
    );
    let sid = created.get("studentId").cloned().expect("studentId");
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "behavior.add",
        json!({ "studentId": sid, "score": 9, "description": "great", "date": "2024-03-01" }),
    );
    let overview = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "courses.overview",
        json!({ "courseName": "Math101" }),
    );
    let rows = overview
        .get("rows")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    assert_eq!(rows.len(), 1);
    assert_eq!(
        rows[0].get("behaviorAverage").and_then(|v| v.as_f64()),
        Some(9.0)
    );

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "courses.delete",
        json!({ "name": "Math101" }),
    );
    let gone = request(
        &mut stdin,
        &mut reader,
        "6",
        "students.records",
        json!({ "studentId": sid }),
    );
    assert_eq!(error_code(&gone), Some("student_not_found"));
    let gone = request(
        &mut stdin,
        &mut reader,
        "7",
        "courses.exportCsv",
        json!({ "courseName": "Math101" }),
    );
    assert_eq!(error_code(&gone), Some("course_not_found"));
}

#[test]
fn bad_json_line_gets_an_error_envelope() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (_child, mut stdin, mut reader) = spawn_sidecar(&dir.path().join("roster.sqlite3"));

    writeln!(stdin, "{{not json").expect("write garbage");
    stdin.flush().expect("flush");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("ok").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(
        value
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str()),
        Some("bad_json")
    );

    // The session keeps going.
    let health = request_ok(&mut stdin, &mut reader, "after", "health", json!({}));
    assert!(health.get("version").is_some());
}

#[test]
fn missing_database_url_fails_startup() {
    let dir = tempfile::tempdir().expect("tempdir");
    let output = Command::new(env!("CARGO_BIN_EXE_rosterd"))
        .current_dir(dir.path())
        .env_remove("DATABASE_URL")
        .stdin(Stdio::null())
        .output()
        .expect("run rosterd");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("DATABASE_URL"), "stderr: {}", stderr);
    assert!(output.stdout.is_empty());
}
