use mongodb::Database;
use rocket::serde::json::Json;
use rocket::State;

use crate::data::attendance::db::AttendanceDbExt;
use crate::data::attendance::{AttendanceRecord, AttendanceSheet};
use crate::data::lecture::db::{LectureDbExt, LectureQuery};
use crate::data::subject::SubjectDbExt;
use crate::data::user::db::UserDbExt;
use crate::data::Id;
use crate::report::attendance::{self, AttendanceReport};
use crate::resp::error::problems;
use crate::resp::jwt::UserRoleToken;
use crate::resp::{ApiError, ApiResponse, ApiResult};
use crate::role::Role;

use super::{check_roster, student};

/// The student's enrolled subjects, narrowed to `subject` when they take it.
fn report_subjects(enrolled: &[Id], subject: Option<Id>) -> Option<Vec<Id>> {
    match subject {
        Some(subject) if enrolled.contains(&subject) => Some(vec![subject]),
        Some(_) => None,
        None => Some(enrolled.to_vec()),
    }
}

/// Attendance of `student_id` over their enrolled subjects, or just `subject`.
async fn student_report(
    db: &Database,
    student_id: Id,
    subject: Option<Id>,
) -> Result<AttendanceReport, ApiError> {
    let student = student(db, student_id).await?;

    if let Some(subject) = subject {
        db.get_subject(subject)
            .await?
            .ok_or_else(|| problems::not_found("Subject", subject))?;
    }
    let subjects = report_subjects(&student.subjects, subject).ok_or_else(|| {
        ApiError::new(
            rocket::http::Status::NotFound,
            "Student isn't enrolled in the selected subject.",
        )
    })?;

    let query = LectureQuery {
        subjects: Some(subjects.clone()),
        ..Default::default()
    };
    let lectures = db.find_lectures(&query).await?;
    if lectures.is_empty() {
        return Err(ApiError::new(
            rocket::http::Status::NotFound,
            "No lectures found for the selected subjects.",
        ));
    }

    let lecture_ids: Vec<Id> = lectures.iter().map(|it| it.id).collect();
    let records = db.student_attendance(student.id, &lecture_ids).await?;
    let names = db.subject_names(&subjects).await?;

    Ok(AttendanceReport {
        overall: attendance::summarize(lectures.len() as u64, &records),
        subjects: attendance::subject_breakdown(&lectures, &records, &names),
    })
}

/// Take attendance for a lecture
///
/// Marking a student again replaces their earlier status.
#[utoipa::path(
    params(("lecture", description = "lecture ID")),
    request_body = AttendanceSheet,
    responses(
        (status = 200, description = "Attendance of the lecture after marking", body = Vec<AttendanceRecord>),
        (status = 400, description = "Empty sheet or a student outside the lecture's subject", body = ApiError),
        (status = 404, description = "Queried lecture doesn't exist", body = ApiError),
    ),
    security(("jwt" = []), ("jwt_cookie" = []))
)]
#[post("/attendance/<lecture>", data = "<sheet>")]
#[tracing::instrument(skip(db))]
pub async fn attendance_mark(
    lecture: Id,
    sheet: Json<AttendanceSheet>,
    auth: UserRoleToken,
    db: &State<Database>,
) -> ApiResult<Vec<AttendanceRecord>> {
    auth.require(&[Role::Tutor, Role::Admin])?;
    sheet.validate()?;

    let subject = db
        .get_lecture(lecture)
        .await?
        .ok_or_else(|| problems::not_found("Lecture", lecture))?
        .subject;

    let students: Vec<Id> = sheet.entries.iter().map(|it| it.student).collect();
    check_roster(&students, &db.enrolled_students(subject).await?)?;

    let written = db
        .record_attendance(lecture, &sheet.entries, auth.user)
        .await?;
    db.set_marked(lecture, true).await?;
    tracing::info!("Recorded {} attendance entries for lecture {}.", written, lecture);

    Ok(ApiResponse::ok(
        db.lecture_attendance(lecture).await?,
        "Attendance recorded.",
    ))
}

/// Attendance of a lecture; students only see their own row
#[utoipa::path(
    params(("lecture", description = "lecture ID")),
    responses((status = 200, description = "Attendance records", body = Vec<AttendanceRecord>)),
    security(("jwt" = []), ("jwt_cookie" = []))
)]
#[get("/attendance/<lecture>")]
#[tracing::instrument(skip(db))]
pub async fn attendance_list(
    lecture: Id,
    auth: UserRoleToken,
    db: &State<Database>,
) -> ApiResult<Vec<AttendanceRecord>> {
    let mut records = db.lecture_attendance(lecture).await?;
    if auth.role == Role::Student {
        records.retain(|it| it.student == auth.user);
    }
    Ok(ApiResponse::ok(records, "Attendance."))
}

/// Discard the attendance taken for a lecture
#[utoipa::path(
    params(("lecture", description = "lecture ID")),
    responses(
        (status = 200, description = "Number of deleted records", body = u64),
        (status = 404, description = "Queried lecture doesn't exist", body = ApiError),
    ),
    security(("jwt" = []), ("jwt_cookie" = []))
)]
#[delete("/attendance/<lecture>")]
#[tracing::instrument(skip(db))]
pub async fn attendance_delete(
    lecture: Id,
    auth: UserRoleToken,
    db: &State<Database>,
) -> ApiResult<u64> {
    auth.require(&[Role::Admin])?;

    db.get_lecture(lecture)
        .await?
        .ok_or_else(|| problems::not_found("Lecture", lecture))?;

    let deleted = db.delete_lecture_attendance(lecture).await?;
    db.set_marked(lecture, false).await?;

    Ok(ApiResponse::ok(deleted, "Attendance deleted."))
}

/// Attendance statistics of the signed in student
#[utoipa::path(
    params(("subject" = Option<Id>, Query, description = "Only this subject")),
    responses(
        (status = 200, description = "Overall and per subject statistics", body = AttendanceReport),
        (status = 404, description = "Unknown or unenrolled subject, or no lectures", body = ApiError),
    ),
    security(("jwt" = []), ("jwt_cookie" = []))
)]
#[get("/attendance/stats?<subject>")]
#[tracing::instrument(skip(db))]
pub async fn attendance_stats(
    subject: Option<Id>,
    auth: UserRoleToken,
    db: &State<Database>,
) -> ApiResult<AttendanceReport> {
    auth.require(&[Role::Student])?;

    let report = student_report(db, auth.user, subject).await?;
    Ok(ApiResponse::ok(report, "Attendance statistics."))
}

/// Attendance statistics of a student
#[utoipa::path(
    params(
        ("id", description = "student ID"),
        ("subject" = Option<Id>, Query, description = "Only this subject"),
    ),
    responses(
        (status = 200, description = "Overall and per subject statistics", body = AttendanceReport),
        (status = 404, description = "Unknown student, subject not taken or no lectures", body = ApiError),
    ),
    security(("jwt" = []), ("jwt_cookie" = []))
)]
#[get("/attendance/student/<id>/stats?<subject>")]
#[tracing::instrument(skip(db))]
pub async fn attendance_student_stats(
    id: Id,
    subject: Option<Id>,
    auth: UserRoleToken,
    db: &State<Database>,
) -> ApiResult<AttendanceReport> {
    auth.require(&[Role::Tutor, Role::Admin])?;

    let report = student_report(db, id, subject).await?;
    Ok(ApiResponse::ok(report, "Attendance statistics."))
}

#[cfg(test)]
mod tests {
    use rocket::http::{ContentType, Status};

    use super::report_subjects;
    use crate::data::Id;
    use crate::role::Role;
    use crate::route::testing::*;

    #[test]
    fn reports_stay_within_enrolled_subjects() {
        let (maths, science, physics) = (Id::new(), Id::new(), Id::new());
        let enrolled = [maths, science];

        assert_eq!(report_subjects(&enrolled, None), Some(vec![maths, science]));
        assert_eq!(report_subjects(&enrolled, Some(science)), Some(vec![science]));
        assert_eq!(report_subjects(&enrolled, Some(physics)), None);
        assert_eq!(report_subjects(&[], None), Some(vec![]));
    }

    #[rocket::async_test]
    async fn students_cannot_take_attendance() {
        let client = client().await;
        let (me, student) = bearer(Role::Student);

        let response = client
            .post(format!("/api/v1/attendance/{}", Id::new()))
            .header(student)
            .header(ContentType::JSON)
            .body(format!(r#"{{"entries":[{{"student":"{}","status":"Present"}}]}}"#, me))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Forbidden);
    }

    #[rocket::async_test]
    async fn empty_sheets_are_rejected() {
        let client = client().await;
        let (_, tutor) = bearer(Role::Tutor);

        let response = client
            .post(format!("/api/v1/attendance/{}", Id::new()))
            .header(tutor)
            .header(ContentType::JSON)
            .body(r#"{"entries":[]}"#)
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::BadRequest);
        assert_eq!(envelope(response).await["errors"][0]["field"], "entries");
    }

    #[rocket::async_test]
    async fn unknown_statuses_do_not_parse() {
        let client = client().await;
        let (_, tutor) = bearer(Role::Tutor);

        let response = client
            .post(format!("/api/v1/attendance/{}", Id::new()))
            .header(tutor)
            .header(ContentType::JSON)
            .body(format!(r#"{{"entries":[{{"student":"{}","status":"Late"}}]}}"#, Id::new()))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::UnprocessableEntity);
    }

    #[rocket::async_test]
    async fn stats_are_split_by_role() {
        let client = client().await;
        let (_, tutor) = bearer(Role::Tutor);
        let (_, student) = bearer(Role::Student);

        let own = client
            .get("/api/v1/attendance/stats")
            .header(tutor)
            .dispatch()
            .await;
        assert_eq!(own.status(), Status::Forbidden);

        let other = client
            .get(format!("/api/v1/attendance/student/{}/stats", Id::new()))
            .header(student)
            .dispatch()
            .await;
        assert_eq!(other.status(), Status::Forbidden);
    }

    #[rocket::async_test]
    async fn only_admins_discard_attendance() {
        let client = client().await;
        let (_, tutor) = bearer(Role::Tutor);

        let response = client
            .delete(format!("/api/v1/attendance/{}", Id::new()))
            .header(tutor)
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Forbidden);
    }
}
