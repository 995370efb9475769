use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use mongodb::Database;
use rocket::serde::json::Json;
use rocket::State;

use crate::data::lecture::db::{LectureDbExt, LectureQuery};
use crate::data::lecture::LectureKind;
use crate::data::marks::db::MarksDbExt;
use crate::data::marks::{MarksRecord, MarksSheet, MarksUpdateData};
use crate::data::subject::SubjectDbExt;
use crate::data::user::db::UserDbExt;
use crate::data::Id;
use crate::report::marks::{analyze, MarksReport};
use crate::resp::error::problems;
use crate::resp::jwt::UserRoleToken;
use crate::resp::{ApiError, ApiResponse, ApiResult};
use crate::role::Role;

use super::{check_roster, student};

async fn student_report(db: &Database, student_id: Id) -> Result<MarksReport, ApiError> {
    let student = student(db, student_id).await?;
    let mut records = db.student_marks(student.id).await?;
    records.retain(|it| student.is_enrolled(it.subject));

    let mut subjects: Vec<Id> = records.iter().map(|it| it.subject).collect();
    subjects.sort_by_key(|it| it.uuid());
    subjects.dedup();

    let tests = db
        .find_lectures(&LectureQuery {
            subjects: Some(subjects.clone()),
            kind: Some(LectureKind::Test),
            ..Default::default()
        })
        .await?;
    let dates: HashMap<Id, NaiveDate> = tests.iter().map(|it| (it.id, it.date)).collect();
    let names = db.subject_names(&subjects).await?;

    Ok(analyze(&records, &dates, &names))
}

/// Record marks for a test
#[utoipa::path(
    params(("lecture", description = "test lecture ID")),
    request_body = MarksSheet,
    responses(
        (status = 201, description = "Created marks records", body = Vec<MarksRecord>),
        (status = 400, description = "Lecture isn't a test, marks are out of range or a student is listed twice or not enrolled", body = ApiError),
        (status = 404, description = "Queried lecture doesn't exist", body = ApiError),
        (status = 409, description = "A student already has marks for this test", body = ApiError),
    ),
    security(("jwt" = []), ("jwt_cookie" = []))
)]
#[post("/marks/<lecture>", data = "<sheet>")]
#[tracing::instrument(skip(db))]
pub async fn marks_create(
    lecture: Id,
    sheet: Json<MarksSheet>,
    auth: UserRoleToken,
    db: &State<Database>,
) -> ApiResult<Vec<MarksRecord>> {
    auth.require(&[Role::Tutor, Role::Admin])?;
    sheet.validate()?;

    let test = db
        .get_lecture(lecture)
        .await?
        .ok_or_else(|| problems::not_found("Lecture", lecture))?;
    if !test.is_test() {
        return Err(problems::invalid_field(
            "lecture",
            "Marks can only be recorded for tests.",
        ));
    }

    let students: Vec<Id> = sheet.entries.iter().map(|it| it.student).collect();
    check_roster(&students, &db.enrolled_students(test.subject).await?)?;

    let graded = db.graded_students(lecture, &students).await?;
    if let Some(first) = graded.first() {
        return Err(problems::conflict("Marks already recorded for this test.")
            .field("student", first));
    }

    let sheet = sheet.into_inner();
    let created = Utc::now();
    let records: Vec<MarksRecord> = sheet
        .entries
        .iter()
        .map(|entry| MarksRecord {
            id: Id::new(),
            student: entry.student,
            lecture,
            subject: test.subject,
            marks: entry.marks,
            total_marks: sheet.total_marks,
            description: sheet.description.clone(),
            created_by: auth.user,
            created,
        })
        .collect();

    db.insert_marks(&records).await?;
    tracing::info!("Recorded marks of {} students for test {}.", records.len(), lecture);

    Ok(ApiResponse::created(records, "Marks recorded."))
}

/// Correct a single marks record
#[utoipa::path(
    params(("id", description = "marks record ID")),
    request_body = MarksUpdateData,
    responses(
        (status = 200, description = "Updated record", body = MarksRecord),
        (status = 400, description = "Marks are out of range", body = ApiError),
        (status = 404, description = "Queried record doesn't exist", body = ApiError),
    ),
    security(("jwt" = []), ("jwt_cookie" = []))
)]
#[put("/marks/record/<id>", data = "<update>")]
#[tracing::instrument(skip(db))]
pub async fn marks_update(
    id: Id,
    update: Json<MarksUpdateData>,
    auth: UserRoleToken,
    db: &State<Database>,
) -> ApiResult<MarksRecord> {
    auth.require(&[Role::Tutor, Role::Admin])?;
    update.validate()?;

    let update = update.into_inner();
    let record = db
        .update_marks(id, update.marks, update.total_marks, update.description)
        .await?
        .ok_or_else(|| problems::not_found("Marks record", id))?;
    Ok(ApiResponse::ok(record, "Marks updated."))
}

/// Delete a single marks record
#[utoipa::path(
    params(("id", description = "marks record ID")),
    responses(
        (status = 200, description = "Deleted record", body = MarksRecord),
        (status = 404, description = "Queried record doesn't exist", body = ApiError),
    ),
    security(("jwt" = []), ("jwt_cookie" = []))
)]
#[delete("/marks/record/<id>")]
#[tracing::instrument(skip(db))]
pub async fn marks_delete(id: Id, auth: UserRoleToken, db: &State<Database>) -> ApiResult<MarksRecord> {
    auth.require(&[Role::Tutor, Role::Admin])?;

    let removed = db
        .delete_marks(id)
        .await?
        .ok_or_else(|| problems::not_found("Marks record", id))?;
    Ok(ApiResponse::ok(removed, "Marks deleted."))
}

/// Marks of a test, highest first; students only see their own
#[utoipa::path(
    params(("lecture", description = "test lecture ID")),
    responses((status = 200, description = "Marks records", body = Vec<MarksRecord>)),
    security(("jwt" = []), ("jwt_cookie" = []))
)]
#[get("/marks/<lecture>")]
#[tracing::instrument(skip(db))]
pub async fn marks_list(
    lecture: Id,
    auth: UserRoleToken,
    db: &State<Database>,
) -> ApiResult<Vec<MarksRecord>> {
    let mut records = db.lecture_marks(lecture).await?;
    if auth.role == Role::Student {
        records.retain(|it| it.student == auth.user);
    }
    Ok(ApiResponse::ok(records, "Marks."))
}

/// Marks report of the signed in student
#[utoipa::path(
    responses((status = 200, description = "Per subject and overall results", body = MarksReport)),
    security(("jwt" = []), ("jwt_cookie" = []))
)]
#[get("/marks/report")]
#[tracing::instrument(skip(db))]
pub async fn marks_report(auth: UserRoleToken, db: &State<Database>) -> ApiResult<MarksReport> {
    auth.require(&[Role::Student])?;
    Ok(ApiResponse::ok(
        student_report(db, auth.user).await?,
        "Marks report.",
    ))
}

/// Marks report of a student
#[utoipa::path(
    params(("id", description = "student ID")),
    responses(
        (status = 200, description = "Per subject and overall results", body = MarksReport),
        (status = 404, description = "Queried student doesn't exist", body = ApiError),
    ),
    security(("jwt" = []), ("jwt_cookie" = []))
)]
#[get("/marks/student/<id>/report")]
#[tracing::instrument(skip(db))]
pub async fn marks_student_report(
    id: Id,
    auth: UserRoleToken,
    db: &State<Database>,
) -> ApiResult<MarksReport> {
    auth.require_self_or(id, &[Role::Tutor, Role::Admin])?;
    Ok(ApiResponse::ok(student_report(db, id).await?, "Marks report."))
}
