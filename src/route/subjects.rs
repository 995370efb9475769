use mongodb::Database;
use rocket::serde::json::Json;
use rocket::State;

use crate::data::standard::StandardDbExt;
use crate::data::subject::{Subject, SubjectCreateData, SubjectDbExt};
use crate::data::Id;
use crate::resp::error::problems;
use crate::resp::jwt::UserRoleToken;
use crate::resp::{ApiError, ApiResponse, ApiResult};
use crate::role::Role;

/// Create a subject within a standard
#[utoipa::path(
    request_body = SubjectCreateData,
    responses(
        (status = 201, description = "Created subject", body = Subject),
        (status = 404, description = "Unknown standard", body = ApiError),
        (status = 409, description = "The standard already has that subject", body = ApiError),
    ),
    security(("jwt" = []), ("jwt_cookie" = []))
)]
#[post("/subjects", data = "<subject>")]
#[tracing::instrument(skip(db))]
pub async fn subject_create(
    subject: Json<SubjectCreateData>,
    auth: UserRoleToken,
    db: &State<Database>,
) -> ApiResult<Subject> {
    auth.require(&[Role::Admin])?;
    subject.validate()?;

    db.get_standard(subject.standard)
        .await?
        .ok_or_else(|| problems::not_found("Standard", subject.standard))?;

    let created = db.create_subject(subject.into_inner()).await?;
    Ok(ApiResponse::created(created, "Subject created."))
}

/// List subjects, optionally of one standard
#[utoipa::path(
    responses((status = 200, description = "Subjects by name", body = Vec<Subject>)),
    security(("jwt" = []), ("jwt_cookie" = []))
)]
#[get("/subjects?<standard>")]
#[tracing::instrument(skip(db))]
pub async fn subject_list(
    standard: Option<Id>,
    _auth: UserRoleToken,
    db: &State<Database>,
) -> ApiResult<Vec<Subject>> {
    Ok(ApiResponse::ok(db.list_subjects(standard).await?, "Subjects."))
}

/// Delete a subject
#[utoipa::path(
    params(("id", description = "subject ID")),
    responses(
        (status = 200, description = "Deleted subject", body = Subject),
        (status = 404, description = "Queried subject doesn't exist", body = ApiError),
    ),
    security(("jwt" = []), ("jwt_cookie" = []))
)]
#[delete("/subjects/<id>")]
#[tracing::instrument(skip(db))]
pub async fn subject_delete(id: Id, auth: UserRoleToken, db: &State<Database>) -> ApiResult<Subject> {
    auth.require(&[Role::Admin])?;

    let removed = db
        .delete_subject(id)
        .await?
        .ok_or_else(|| problems::not_found("Subject", id))?;
    Ok(ApiResponse::ok(removed, "Subject deleted."))
}

#[cfg(test)]
mod tests {
    use rocket::http::Status;

    use crate::data::Id;
    use crate::role::Role;
    use crate::route::testing::*;

    #[rocket::async_test]
    async fn tutors_cannot_delete_subjects() {
        let client = client().await;
        let (_, tutor) = bearer(Role::Tutor);

        let response = client
            .delete(format!("/api/v1/subjects/{}", Id::new()))
            .header(tutor)
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Forbidden);
    }
}
