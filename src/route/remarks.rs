use chrono::Utc;
use mongodb::Database;
use rocket::serde::json::Json;
use rocket::State;

use crate::data::remark::{Remark, RemarkCreateData, RemarkDbExt};
use crate::data::Id;
use crate::middleware::paging::PageState;
use crate::resp::error::problems;
use crate::resp::jwt::UserRoleToken;
use crate::resp::{ApiError, ApiResponse, ApiResult};
use crate::role::Role;

use super::{require_author, student};

/// Leave a remark about a student
#[utoipa::path(
    request_body = RemarkCreateData,
    responses(
        (status = 201, description = "Created remark", body = Remark),
        (status = 400, description = "Empty remark", body = ApiError),
        (status = 404, description = "Unknown student", body = ApiError),
    ),
    security(("jwt" = []), ("jwt_cookie" = []))
)]
#[post("/remarks", data = "<remark>")]
#[tracing::instrument(skip(db))]
pub async fn remark_create(
    remark: Json<RemarkCreateData>,
    auth: UserRoleToken,
    db: &State<Database>,
) -> ApiResult<Remark> {
    auth.require(&[Role::Tutor, Role::Admin])?;
    remark.validate()?;

    student(db, remark.student).await?;

    let remark = remark.into_inner();
    let remark = Remark {
        id: Id::new(),
        student: remark.student,
        tutor: auth.user,
        subject: remark.subject,
        text: remark.text.trim().to_string(),
        created: Utc::now(),
    };
    db.create_remark(&remark).await?;

    Ok(ApiResponse::created(remark, "Remark added."))
}

/// Remarks about a student, newest first
#[utoipa::path(
    params(
        ("id", description = "student ID"),
        ("page" = Option<u32>, Query, description = "Page number, starting at 0"),
        ("len" = Option<u32>, Query, description = "Page length"),
    ),
    responses(
        (status = 200, description = "A page of remarks", body = Vec<Remark>),
        (status = 403, description = "Students only see their own remarks", body = ApiError),
    ),
    security(("jwt" = []), ("jwt_cookie" = []))
)]
#[get("/remarks/student/<id>")]
#[tracing::instrument(skip(db))]
pub async fn remark_list(
    id: Id,
    page: PageState,
    auth: UserRoleToken,
    db: &State<Database>,
) -> ApiResult<Vec<Remark>> {
    auth.require_self_or(id, &[Role::Tutor, Role::Admin])?;
    Ok(ApiResponse::ok(
        db.student_remarks(id, page).await?,
        "Remarks.",
    ))
}

/// Delete a remark
#[utoipa::path(
    params(("id", description = "remark ID")),
    responses(
        (status = 200, description = "Deleted remark", body = Remark),
        (status = 403, description = "Only the author or an admin may delete", body = ApiError),
        (status = 404, description = "Queried remark doesn't exist", body = ApiError),
    ),
    security(("jwt" = []), ("jwt_cookie" = []))
)]
#[delete("/remarks/<id>")]
#[tracing::instrument(skip(db))]
pub async fn remark_delete(id: Id, auth: UserRoleToken, db: &State<Database>) -> ApiResult<Remark> {
    let remark = db
        .get_remark(id)
        .await?
        .ok_or_else(|| problems::not_found("Remark", id))?;
    require_author(&auth, remark.tutor)?;

    let removed = db
        .delete_remark(id)
        .await?
        .ok_or_else(|| problems::not_found("Remark", id))?;
    Ok(ApiResponse::ok(removed, "Remark deleted."))
}

#[cfg(test)]
mod tests {
    use rocket::http::{ContentType, Status};

    use crate::data::Id;
    use crate::role::Role;
    use crate::route::testing::*;

    #[rocket::async_test]
    async fn empty_remarks_are_rejected() {
        let client = client().await;
        let (_, tutor) = bearer(Role::Tutor);

        let response = client
            .post("/api/v1/remarks")
            .header(tutor)
            .header(ContentType::JSON)
            .body(format!(r#"{{"student":"{}","text":"   "}}"#, Id::new()))
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::BadRequest);
        assert_eq!(envelope(response).await["errors"][0]["field"], "text");
    }

    #[rocket::async_test]
    async fn students_only_read_their_own_remarks() {
        let client = client().await;
        let (_, student) = bearer(Role::Student);

        let response = client
            .get(format!("/api/v1/remarks/student/{}", Id::new()))
            .header(student)
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Forbidden);
    }
}
