use std::collections::{BTreeMap, HashSet};

use chrono::{Local, NaiveDate, NaiveDateTime};
use mongodb::Database;
use rocket::http::Status;
use rocket::{Build, Catcher, Request, Rocket, Route};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod announcements;
pub mod attendance;
pub mod auth;
pub mod files;
pub mod homework;
pub mod lectures;
pub mod marks;
pub mod notes;
pub mod remarks;
pub mod standards;
pub mod subjects;
pub mod users;

use announcements::*;
use attendance::*;
use auth::*;
use files::*;
use homework::*;
use lectures::*;
use marks::*;
use notes::*;
use remarks::*;
use standards::*;
use subjects::*;
use users::*;

use crate::data::user::db::{
    problem as user_problem, ChangePasswordData, NewUserData, UserDbExt, UserLoginData,
    UserSignupData,
};
use crate::data::user::{User, UserResponse};
use crate::data::{announcement, attendance as ad, homework as hd, lecture, marks as md};
use crate::data::{note, remark, standard, subject, Id};
use crate::report::attendance::{AttendanceReport, AttendanceSummary, SubjectAttendance};
use crate::report::marks::{Grade, MarksReport, SubjectMarks, TestResult};
use crate::report::schedule::{DaySchedule, PendingAttendance, WeekSchedule};
use crate::resp::error::problems;
use crate::resp::jwt::doc::JWTAuth;
use crate::resp::jwt::{GuardFailure, UserRoleToken};
use crate::resp::{ApiError, FieldError};
use crate::role::Role;
use crate::time::{self, TimeRange};

#[derive(OpenApi)]
#[openapi(
    paths(
        signup,
        login,
        logout,
        me,
        change_password,
        user_create,
        user_list,
        user_get,
        user_set_subjects,
        user_delete,
        standard_create,
        standard_list,
        standard_delete,
        subject_create,
        subject_list,
        subject_delete,
        lecture_create,
        lecture_reschedule,
        lecture_delete,
        lecture_week,
        lecture_day,
        lecture_tests,
        lecture_pending_attendance,
        attendance_mark,
        attendance_list,
        attendance_delete,
        attendance_stats,
        attendance_student_stats,
        marks_create,
        marks_update,
        marks_delete,
        marks_list,
        marks_report,
        marks_student_report,
        homework_create,
        homework_list,
        homework_delete,
        note_create,
        note_list,
        note_delete,
        announcement_create,
        announcement_list,
        announcement_delete,
        remark_create,
        remark_list,
        remark_delete,
    ),
    components(schemas(
        Id,
        Role,
        TimeRange,
        ApiError,
        FieldError,
        UserRoleToken,
        UserResponse,
        UserSignupData,
        UserLoginData,
        NewUserData,
        ChangePasswordData,
        AuthResponse,
        SubjectsData,
        standard::Standard,
        standard::StandardCreateData,
        subject::Subject,
        subject::SubjectCreateData,
        lecture::Lecture,
        lecture::LectureKind,
        lecture::LectureScheduleData,
        lecture::LectureRescheduleData,
        DaySchedule,
        WeekSchedule,
        PendingAttendance,
        ad::AttendanceStatus,
        ad::AttendanceRecord,
        ad::AttendanceEntry,
        ad::AttendanceSheet,
        AttendanceSummary,
        SubjectAttendance,
        AttendanceReport,
        md::MarksRecord,
        md::MarksEntry,
        md::MarksSheet,
        md::MarksUpdateData,
        Grade,
        TestResult,
        SubjectMarks,
        MarksReport,
        hd::Homework,
        HomeworkUpload,
        note::Note,
        NoteUpload,
        announcement::Announcement,
        announcement::AnnouncementCreateData,
        remark::Remark,
        remark::RemarkCreateData,
    )),
    modifiers(&JWTAuth, &V1_PREFIX)
)]
pub struct ApiDocV1;

pub struct PathPrefix(pub &'static str);
static V1_PREFIX: PathPrefix = PathPrefix("/api/v1");

impl utoipa::Modify for PathPrefix {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let mut new_paths = BTreeMap::new();

        for (path, item) in std::mem::take(&mut openapi.paths.paths) {
            new_paths.insert(self.0.to_string() + path.as_ref(), item);
        }

        openapi.paths.paths = new_paths;
    }
}

pub fn api_v1() -> Vec<Route> {
    routes![
        signup,
        login,
        logout,
        me,
        change_password,
        user_create,
        user_list,
        user_get,
        user_set_subjects,
        user_delete,
        standard_create,
        standard_list,
        standard_delete,
        subject_create,
        subject_list,
        subject_delete,
        lecture_create,
        lecture_reschedule,
        lecture_delete,
        lecture_week,
        lecture_day,
        lecture_tests,
        lecture_pending_attendance,
        attendance_mark,
        attendance_list,
        attendance_delete,
        attendance_stats,
        attendance_student_stats,
        marks_create,
        marks_update,
        marks_delete,
        marks_list,
        marks_report,
        marks_student_report,
        homework_create,
        homework_list,
        homework_delete,
        note_create,
        note_list,
        note_delete,
        announcement_create,
        announcement_list,
        announcement_delete,
        remark_create,
        remark_list,
        remark_delete,
    ]
}

#[catch(400)]
fn bad_request(req: &Request) -> ApiError {
    problems::bad_request("Malformed request.").detail(req.uri())
}

#[catch(401)]
fn unauthorized(req: &Request) -> ApiError {
    req.local_cache(GuardFailure::default)
        .0
        .clone()
        .unwrap_or_else(|| problems::unauthorized("Missing credentials."))
}

#[catch(403)]
fn forbidden(_: &Request) -> ApiError {
    problems::forbidden("Not allowed.")
}

#[catch(404)]
fn not_found(req: &Request) -> ApiError {
    ApiError::new(Status::NotFound, "Resource not found.").detail(req.uri())
}

#[catch(422)]
fn unprocessable(_: &Request) -> ApiError {
    ApiError::new(
        Status::UnprocessableEntity,
        "Request body doesn't match the expected shape.",
    )
}

#[catch(default)]
fn fallback(status: Status, _: &Request) -> ApiError {
    if status.code >= 500 {
        return problems::internal();
    }
    ApiError::new(status, status.reason().unwrap_or("Request failed."))
}

pub fn catchers() -> Vec<Catcher> {
    catchers![
        bad_request,
        unauthorized,
        forbidden,
        not_found,
        unprocessable,
        fallback
    ]
}

pub fn mount_api(rocket: Rocket<Build>) -> Rocket<Build> {
    rocket
        .mount("/api/v1", api_v1())
        .register("/", catchers())
        .mount(
            "/",
            SwaggerUi::new("/swagger/<_..>").url("/api/v1/openapi.json", ApiDocV1::openapi()),
        )
        .mount("/", routes![app, app_path])
}

/// Lectures are scheduled in the center's local time.
pub(crate) fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub(crate) fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

pub(crate) fn date_or_today(field: &str, value: Option<&str>) -> Result<NaiveDate, ApiError> {
    match value {
        Some(value) => time::parse_date(field, value),
        None => Ok(today()),
    }
}

/// The account behind a token; a token for a deleted user no longer authorizes.
pub(crate) async fn current_user(db: &Database, auth: &UserRoleToken) -> Result<User, ApiError> {
    db.get_user(auth.user)
        .await?
        .ok_or_else(|| problems::unauthorized("User no longer exists."))
}

/// A student by id, or 404.
pub(crate) async fn student(db: &Database, id: Id) -> Result<User, ApiError> {
    db.get_user(id)
        .await?
        .filter(|it| it.role == Role::Student)
        .ok_or_else(|| user_problem::not_found(id))
}

/// Subjects a student may see content of; other roles see everything.
pub(crate) async fn subject_scope(
    db: &Database,
    auth: &UserRoleToken,
) -> Result<Option<Vec<Id>>, ApiError> {
    if auth.role != Role::Student {
        return Ok(None);
    }
    Ok(Some(current_user(db, auth).await?.subjects))
}

/// Sheet entries must name students enrolled in the lecture's subject.
pub(crate) fn check_roster(students: &[Id], enrolled: &[Id]) -> Result<(), ApiError> {
    let enrolled: HashSet<&Id> = enrolled.iter().collect();
    match students.iter().position(|it| !enrolled.contains(it)) {
        Some(i) => Err(problems::invalid_field(
            format!("entries[{}].student", i),
            "Student isn't enrolled in this lecture's subject.",
        )),
        None => Ok(()),
    }
}

/// Authors manage their own content; admins manage everything.
pub(crate) fn require_author(auth: &UserRoleToken, author: Id) -> Result<(), ApiError> {
    if auth.user == author || auth.role.can_administer() {
        return Ok(());
    }
    Err(problems::forbidden("Only the author can change this."))
}

#[cfg(test)]
pub(crate) mod testing {
    use mongodb::Database;
    use rocket::http::{ContentType, Header};
    use rocket::local::asynchronous::{Client, LocalResponse};
    use serde_json::Value;

    use crate::config::Config;
    use crate::data::Id;
    use crate::resp::jwt::UserRoleToken;
    use crate::role::Role;

    /// Client for a backend whose MongoDB client never connects unless a
    /// request reaches the database.
    pub async fn client() -> Client {
        let db: Database = mongodb::Client::with_uri_str("mongodb://localhost:27017")
            .await
            .expect("valid MongoDB URI")
            .database("tuition_test");

        let rocket = crate::build(Config::default(), db).expect("backend must build");
        Client::tracked(rocket).await.expect("invalid backend")
    }

    pub fn bearer(role: Role) -> (Id, Header<'static>) {
        let user = Id::new();
        let token = UserRoleToken::for_user(user, role)
            .encode_jwt(&crate::SECURITY.jwt_secret)
            .expect("unable to encode test token");
        (user, Header::new("Authorization", format!("Bearer {}", token)))
    }

    /// Multipart body with text `fields` and an optional `(field, file name, bytes)`.
    pub fn multipart(
        fields: &[(&str, &str)],
        file: Option<(&str, &str, &[u8])>,
    ) -> (ContentType, Vec<u8>) {
        const BOUNDARY: &str = "tuition-test-boundary";

        let mut body = vec![];
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                    BOUNDARY, name, value
                )
                .as_bytes(),
            );
        }
        if let Some((name, file_name, bytes)) = file {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                    BOUNDARY, name, file_name
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

        let content_type =
            ContentType::new("multipart", "form-data").with_params(("boundary", BOUNDARY));
        (content_type, body)
    }

    pub async fn envelope(response: LocalResponse<'_>) -> Value {
        response
            .into_json::<Value>()
            .await
            .expect("response must be a JSON envelope")
    }
}

#[cfg(test)]
mod tests {
    use rocket::http::Status;

    use super::check_roster;
    use super::testing::*;
    use crate::data::Id;

    #[test]
    fn roster_rejects_students_outside_the_subject() {
        let (a, b, stranger) = (Id::new(), Id::new(), Id::new());

        assert!(check_roster(&[a, b], &[b, a]).is_ok());

        let err = check_roster(&[a, stranger, b], &[a, b]).unwrap_err();
        assert_eq!(err.status, Status::BadRequest);
        assert_eq!(err.errors[0].field, "entries[1].student");

        assert!(check_roster(&[a], &[]).is_err());
    }

    #[rocket::async_test]
    async fn unknown_api_paths_use_the_envelope() {
        let client = client().await;
        let response = client.get("/api/v1/nothing/here/at/all").dispatch().await;

        assert_eq!(response.status(), Status::NotFound);
        let body = envelope(response).await;
        assert_eq!(body["statusCode"], 404);
        assert_eq!(body["success"], false);
    }

    #[rocket::async_test]
    async fn openapi_document_is_prefixed() {
        let client = client().await;
        let response = client.get("/api/v1/openapi.json").dispatch().await;

        assert_eq!(response.status(), Status::Ok);
        let doc = envelope(response).await;
        assert!(doc["paths"]["/api/v1/lectures/week"].is_object());
        assert!(doc["components"]["securitySchemes"]["jwt"].is_object());
    }
}
