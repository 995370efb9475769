use mongodb::Database;
use rocket::serde::json::Json;
use rocket::State;

use crate::data::attendance::db::AttendanceDbExt;
use crate::data::lecture::db::{LectureDbExt, LectureQuery};
use crate::data::lecture::{Lecture, LectureKind, LectureRescheduleData, LectureScheduleData};
use crate::data::standard::StandardDbExt;
use crate::data::subject::SubjectDbExt;
use crate::data::user::db::UserDbExt;
use crate::data::user::User;
use crate::data::Id;
use crate::report::schedule::{self, DaySchedule, PendingAttendance, WeekSchedule};
use crate::resp::error::problems;
use crate::resp::jwt::UserRoleToken;
use crate::resp::{ApiError, ApiResponse, ApiResult};
use crate::role::Role;
use crate::time::{self, TimeRange};

use super::{current_user, date_or_today, now, today};

/// Rejects slots in the past or already taken by another lecture.
async fn check_slot(
    db: &Database,
    date: chrono::NaiveDate,
    range: TimeRange,
    except: Option<Id>,
) -> Result<(), ApiError> {
    if schedule::is_past_date(date, today()) {
        return Err(problems::invalid_field(
            "date",
            "Lectures can't be scheduled in the past.",
        ));
    }

    let existing = db.find_conflicts(date, range, except).await?;
    if schedule::has_conflict(&existing, date, range, except) {
        return Err(problems::conflict(format!(
            "Another lecture is already scheduled on {} at {}.",
            date, range
        )));
    }
    Ok(())
}

async fn check_tutor(db: &Database, id: Id) -> Result<User, ApiError> {
    db.get_user(id)
        .await?
        .filter(|it| it.role.can_teach())
        .ok_or_else(|| problems::not_found("Tutor", id))
}

/// Standard whose schedule the caller sees; students only see their own.
async fn visible_standard(
    db: &Database,
    auth: &UserRoleToken,
    requested: Option<Id>,
) -> Result<Option<Id>, ApiError> {
    if auth.role != Role::Student {
        return Ok(requested);
    }
    let user = current_user(db, auth).await?;
    match user.standard {
        Some(standard) => Ok(Some(standard)),
        None => Err(problems::bad_request("Student isn't assigned to a standard.")),
    }
}

/// Schedule a lecture or test
#[utoipa::path(
    request_body = LectureScheduleData,
    responses(
        (status = 201, description = "Scheduled lecture", body = Lecture),
        (status = 400, description = "Malformed or past date, malformed time range", body = ApiError),
        (status = 404, description = "Unknown subject, tutor or standard", body = ApiError),
        (status = 409, description = "Slot is already taken", body = ApiError),
    ),
    security(("jwt" = []), ("jwt_cookie" = []))
)]
#[post("/lectures", data = "<lecture>")]
#[tracing::instrument(skip(db))]
pub async fn lecture_create(
    lecture: Json<LectureScheduleData>,
    auth: UserRoleToken,
    db: &State<Database>,
) -> ApiResult<Lecture> {
    auth.require(&[Role::Admin])?;
    let (date, range) = lecture.parse()?;

    check_slot(db, date, range, None).await?;

    let subject = db
        .get_subject(lecture.subject)
        .await?
        .ok_or_else(|| problems::not_found("Subject", lecture.subject))?;
    if subject.standard != lecture.standard {
        return Err(problems::invalid_field(
            "subject",
            "Subject doesn't belong to the given standard.",
        ));
    }
    db.get_standard(lecture.standard)
        .await?
        .ok_or_else(|| problems::not_found("Standard", lecture.standard))?;
    check_tutor(db, lecture.tutor).await?;

    let lecture = lecture.into_inner().into_lecture(date, range);
    db.create_lecture(&lecture).await?;
    tracing::info!("Scheduled lecture {} on {} at {}.", lecture.id, date, range);

    Ok(ApiResponse::created(lecture, "Lecture scheduled."))
}

/// Move a lecture to another slot
#[utoipa::path(
    params(("id", description = "lecture ID")),
    request_body = LectureRescheduleData,
    responses(
        (status = 200, description = "Rescheduled lecture", body = Lecture),
        (status = 400, description = "Malformed or past date, malformed time range", body = ApiError),
        (status = 404, description = "Unknown lecture or tutor", body = ApiError),
        (status = 409, description = "Slot is already taken", body = ApiError),
    ),
    security(("jwt" = []), ("jwt_cookie" = []))
)]
#[put("/lectures/<id>", data = "<slot>")]
#[tracing::instrument(skip(db))]
pub async fn lecture_reschedule(
    id: Id,
    slot: Json<LectureRescheduleData>,
    auth: UserRoleToken,
    db: &State<Database>,
) -> ApiResult<Lecture> {
    auth.require(&[Role::Admin])?;
    let (date, range) = slot.parse()?;

    let current = db
        .get_lecture(id)
        .await?
        .ok_or_else(|| problems::not_found("Lecture", id))?;

    check_slot(db, date, range, Some(id)).await?;

    let tutor = match slot.tutor {
        Some(tutor) => check_tutor(db, tutor).await?.id,
        None => current.tutor,
    };

    let lecture = db
        .reschedule_lecture(id, date, range, tutor)
        .await?
        .ok_or_else(|| problems::not_found("Lecture", id))?;
    Ok(ApiResponse::ok(lecture, "Lecture rescheduled."))
}

/// Delete a lecture with its attendance and marks
#[utoipa::path(
    params(("id", description = "lecture ID")),
    responses(
        (status = 200, description = "Deleted lecture", body = Lecture),
        (status = 404, description = "Queried lecture doesn't exist", body = ApiError),
    ),
    security(("jwt" = []), ("jwt_cookie" = []))
)]
#[delete("/lectures/<id>")]
#[tracing::instrument(skip(db))]
pub async fn lecture_delete(id: Id, auth: UserRoleToken, db: &State<Database>) -> ApiResult<Lecture> {
    auth.require(&[Role::Admin])?;

    let removed = db
        .delete_lecture(id)
        .await?
        .ok_or_else(|| problems::not_found("Lecture", id))?;
    Ok(ApiResponse::ok(removed, "Lecture deleted."))
}

/// Lectures of the week containing `date`, grouped by weekday
#[utoipa::path(
    params(
        ("date" = Option<String>, Query, description = "Any day of the week as YYYY-MM-DD, defaults to today"),
        ("standard" = Option<Id>, Query, description = "Only lectures of this standard"),
    ),
    responses(
        (status = 200, description = "Sunday to Saturday schedule", body = WeekSchedule),
        (status = 400, description = "Malformed date", body = ApiError),
    ),
    security(("jwt" = []), ("jwt_cookie" = []))
)]
#[get("/lectures/week?<date>&<standard>")]
#[tracing::instrument(skip(db))]
pub async fn lecture_week(
    date: Option<&str>,
    standard: Option<Id>,
    auth: UserRoleToken,
    db: &State<Database>,
) -> ApiResult<WeekSchedule> {
    let date = date_or_today("date", date)?;
    let (from, to) = time::week_bounds(date);

    let query = LectureQuery {
        from: Some(from),
        to: Some(to),
        standard: visible_standard(db, &auth, standard).await?,
        ..Default::default()
    };
    let lectures = db.find_lectures(&query).await?;

    Ok(ApiResponse::ok(
        schedule::group_by_weekday(date, lectures),
        "Week schedule.",
    ))
}

/// Lectures of one day, by start time
#[utoipa::path(
    params(
        ("date" = Option<String>, Query, description = "YYYY-MM-DD, defaults to today"),
        ("standard" = Option<Id>, Query, description = "Only lectures of this standard"),
    ),
    responses(
        (status = 200, description = "Day schedule", body = DaySchedule),
        (status = 400, description = "Malformed date", body = ApiError),
    ),
    security(("jwt" = []), ("jwt_cookie" = []))
)]
#[get("/lectures/day?<date>&<standard>")]
#[tracing::instrument(skip(db))]
pub async fn lecture_day(
    date: Option<&str>,
    standard: Option<Id>,
    auth: UserRoleToken,
    db: &State<Database>,
) -> ApiResult<DaySchedule> {
    let date = date_or_today("date", date)?;

    let query = LectureQuery {
        from: Some(date),
        to: Some(date),
        standard: visible_standard(db, &auth, standard).await?,
        ..Default::default()
    };
    let mut lectures = db.find_lectures(&query).await?;
    schedule::sort_by_start(&mut lectures);

    Ok(ApiResponse::ok(
        DaySchedule {
            day: time::weekday_name(date).to_string(),
            date,
            lectures,
        },
        "Day schedule.",
    ))
}

/// Test lectures, optionally of one subject
#[utoipa::path(
    params(("subject" = Option<Id>, Query, description = "Only tests of this subject")),
    responses((status = 200, description = "Tests by date", body = Vec<Lecture>)),
    security(("jwt" = []), ("jwt_cookie" = []))
)]
#[get("/lectures/tests?<subject>")]
#[tracing::instrument(skip(db))]
pub async fn lecture_tests(
    subject: Option<Id>,
    auth: UserRoleToken,
    db: &State<Database>,
) -> ApiResult<Vec<Lecture>> {
    let mut subjects = subject.map(|it| vec![it]);

    if auth.role == Role::Student {
        let user = current_user(db, &auth).await?;
        subjects = Some(match subjects {
            Some(requested) => requested
                .into_iter()
                .filter(|it| user.is_enrolled(*it))
                .collect(),
            None => user.subjects,
        });
    }

    let query = LectureQuery {
        subjects,
        kind: Some(LectureKind::Test),
        ..Default::default()
    };
    Ok(ApiResponse::ok(db.find_lectures(&query).await?, "Tests."))
}

/// Ended lectures whose attendance is missing or incomplete
///
/// Tutors only see their own lectures.
#[utoipa::path(
    responses(
        (status = 200, description = "Lectures needing attendance", body = Vec<PendingAttendance>),
        (status = 403, description = "Students can't take attendance", body = ApiError),
    ),
    security(("jwt" = []), ("jwt_cookie" = []))
)]
#[get("/lectures/pending-attendance")]
#[tracing::instrument(skip(db))]
pub async fn lecture_pending_attendance(
    auth: UserRoleToken,
    db: &State<Database>,
) -> ApiResult<Vec<PendingAttendance>> {
    auth.require(&[Role::Admin, Role::Tutor])?;

    let query = LectureQuery {
        to: Some(today()),
        tutor: (auth.role == Role::Tutor).then_some(auth.user),
        ..Default::default()
    };
    let lectures = db.find_lectures(&query).await?;

    let now = now();
    let mut pending = vec![];
    for lecture in lectures {
        if !schedule::has_ended(lecture.date, lecture.time.end, now) {
            continue;
        }
        let taken = db.count_lecture_attendance(lecture.id).await?;
        let enrolled = db.count_enrolled(lecture.subject).await?;
        if schedule::needs_attendance(&lecture, taken, enrolled, now) {
            pending.push(PendingAttendance {
                lecture,
                taken,
                enrolled,
            });
        }
    }

    Ok(ApiResponse::ok(pending, "Lectures pending attendance."))
}

#[cfg(test)]
mod tests {
    use rocket::http::{ContentType, Status};

    use crate::data::Id;
    use crate::role::Role;
    use crate::route::testing::*;

    fn schedule_body(date: &str, time: &str) -> String {
        format!(
            r#"{{"date":"{}","time":"{}","subject":"{}","tutor":"{}","standard":"{}","kind":"Test"}}"#,
            date,
            time,
            Id::new(),
            Id::new(),
            Id::new()
        )
    }

    #[rocket::async_test]
    async fn only_admins_schedule() {
        let client = client().await;
        let (_, tutor) = bearer(Role::Tutor);

        let response = client
            .post("/api/v1/lectures")
            .header(tutor)
            .header(ContentType::JSON)
            .body(schedule_body("2999-01-01", "9:00 AM to 10:00 AM"))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Forbidden);
    }

    #[rocket::async_test]
    async fn past_dates_are_rejected() {
        let client = client().await;
        let (_, admin) = bearer(Role::Admin);

        let response = client
            .post("/api/v1/lectures")
            .header(admin)
            .header(ContentType::JSON)
            .body(schedule_body("2001-01-01", "9:00 AM to 10:00 AM"))
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::BadRequest);
        assert_eq!(envelope(response).await["errors"][0]["field"], "date");
    }

    #[rocket::async_test]
    async fn inverted_time_ranges_are_rejected() {
        let client = client().await;
        let (_, admin) = bearer(Role::Admin);

        let response = client
            .post("/api/v1/lectures")
            .header(admin)
            .header(ContentType::JSON)
            .body(schedule_body("2999-01-01", "11:00 AM to 10:00 AM"))
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::BadRequest);
        assert_eq!(envelope(response).await["errors"][0]["field"], "time");
    }

    #[rocket::async_test]
    async fn reschedule_validates_the_slot_first() {
        let client = client().await;
        let (_, admin) = bearer(Role::Admin);

        let response = client
            .put(format!("/api/v1/lectures/{}", Id::new()))
            .header(admin)
            .header(ContentType::JSON)
            .body(r#"{"date":"01/02/2030","time":"9:00 AM to 10:00 AM"}"#)
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::BadRequest);
        assert_eq!(envelope(response).await["errors"][0]["field"], "date");
    }

    #[rocket::async_test]
    async fn malformed_week_dates_are_rejected() {
        let client = client().await;
        let (_, tutor) = bearer(Role::Tutor);

        let response = client
            .get("/api/v1/lectures/week?date=next-monday")
            .header(tutor)
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);
    }

    #[rocket::async_test]
    async fn students_have_no_pending_attendance() {
        let client = client().await;
        let (_, student) = bearer(Role::Student);

        let response = client
            .get("/api/v1/lectures/pending-attendance")
            .header(student)
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Forbidden);
    }
}
