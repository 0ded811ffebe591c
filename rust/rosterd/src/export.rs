use crate::calc::{Aggregates, StudentSummaryRow};

pub const CSV_HEADER: [&str; 5] = [
    "Alumno",
    "Asistencia (%)",
    "Promedio Conducta",
    "Trabajos Entregados",
    "Total Trabajos",
];

/// Render the course overview as CSV.
///
/// A percentage/average column is written as the integer `0` for every row
/// when no student in the course has a record backing it; once any student
/// does, the whole column is written as floats (`100.0`, `66.67`, `0.0`).
pub fn course_csv(rows: &[StudentSummaryRow]) -> String {
    let attendance_is_float = rows.iter().any(|r| r.totals.attendance_count > 0);
    let behavior_is_float = rows.iter().any(|r| r.totals.behavior_count > 0);

    let mut csv = CSV_HEADER.join(",");
    csv.push('\n');
    for r in rows {
        let t = &r.totals;
        csv.push_str(&format!(
            "{},{},{},{},{}\n",
            csv_quote(&r.display_name),
            number_cell(t.attendance_percent, attendance_is_float),
            number_cell(t.behavior_average, behavior_is_float),
            t.assignments_submitted,
            t.assignments_total
        ));
    }
    csv
}

fn number_cell(v: f64, as_float: bool) -> String {
    if as_float {
        // `{:?}` keeps a trailing `.0` on whole numbers.
        format!("{:?}", v)
    } else {
        format!("{}", v.round() as i64)
    }
}

fn csv_quote(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(
        name: &str,
        att: f64,
        att_n: usize,
        beh: f64,
        beh_n: usize,
        sub: usize,
        tot: usize,
    ) -> StudentSummaryRow {
        StudentSummaryRow {
            display_name: name.to_string(),
            totals: Aggregates {
                attendance_percent: att,
                behavior_average: beh,
                assignments_submitted: sub,
                assignments_total: tot,
                attendance_count: att_n,
                behavior_count: beh_n,
            },
        }
    }

    #[test]
    fn header_only_for_empty_course() {
        assert_eq!(
            course_csv(&[]),
            "Alumno,Asistencia (%),Promedio Conducta,Trabajos Entregados,Total Trabajos\n"
        );
    }

    #[test]
    fn single_present_attendance() {
        let csv = course_csv(&[row("Doe, Jane", 100.0, 1, 0.0, 0, 0, 0)]);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], "\"Doe, Jane\",100.0,0,0,0");
    }

    #[test]
    fn columns_go_float_when_any_row_has_records() {
        let csv = course_csv(&[
            row("Doe, Jane", 66.67, 3, 7.67, 3, 1, 2),
            row("Roe, Rick", 0.0, 0, 0.0, 0, 0, 0),
        ]);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[1], "\"Doe, Jane\",66.67,7.67,1,2");
        assert_eq!(lines[2], "\"Roe, Rick\",0.0,0.0,0,0");
    }

    #[test]
    fn quotes_embedded_quotes() {
        assert_eq!(csv_quote("O\"Neil, Ann"), "\"O\"\"Neil, Ann\"");
        assert_eq!(csv_quote("plain"), "plain");
    }
}
