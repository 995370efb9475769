use mongodb::Database;
use rocket::serde::json::Json;
use rocket::State;

use crate::data::standard::{Standard, StandardCreateData, StandardDbExt};
use crate::data::Id;
use crate::resp::error::problems;
use crate::resp::jwt::UserRoleToken;
use crate::resp::{ApiError, ApiResponse, ApiResult};
use crate::role::Role;

/// Create a standard (grade level)
#[utoipa::path(
    request_body = StandardCreateData,
    responses(
        (status = 201, description = "Created standard", body = Standard),
        (status = 409, description = "A standard with that name exists", body = ApiError),
    ),
    security(("jwt" = []), ("jwt_cookie" = []))
)]
#[post("/standards", data = "<standard>")]
#[tracing::instrument(skip(db))]
pub async fn standard_create(
    standard: Json<StandardCreateData>,
    auth: UserRoleToken,
    db: &State<Database>,
) -> ApiResult<Standard> {
    auth.require(&[Role::Admin])?;
    standard.validate()?;

    let created = db.create_standard(&standard.name).await?;
    Ok(ApiResponse::created(created, "Standard created."))
}

/// List standards by name
#[utoipa::path(
    responses((status = 200, description = "All standards", body = Vec<Standard>)),
    security(("jwt" = []), ("jwt_cookie" = []))
)]
#[get("/standards")]
#[tracing::instrument(skip(db))]
pub async fn standard_list(_auth: UserRoleToken, db: &State<Database>) -> ApiResult<Vec<Standard>> {
    Ok(ApiResponse::ok(db.list_standards().await?, "Standards."))
}

/// Delete a standard
#[utoipa::path(
    params(("id", description = "standard ID")),
    responses(
        (status = 200, description = "Deleted standard", body = Standard),
        (status = 404, description = "Queried standard doesn't exist", body = ApiError),
    ),
    security(("jwt" = []), ("jwt_cookie" = []))
)]
#[delete("/standards/<id>")]
#[tracing::instrument(skip(db))]
pub async fn standard_delete(
    id: Id,
    auth: UserRoleToken,
    db: &State<Database>,
) -> ApiResult<Standard> {
    auth.require(&[Role::Admin])?;

    let removed = db
        .delete_standard(id)
        .await?
        .ok_or_else(|| problems::not_found("Standard", id))?;
    Ok(ApiResponse::ok(removed, "Standard deleted."))
}

#[cfg(test)]
mod tests {
    use rocket::http::{ContentType, Status};

    use crate::role::Role;
    use crate::route::testing::*;

    #[rocket::async_test]
    async fn blank_names_are_rejected() {
        let client = client().await;
        let (_, admin) = bearer(Role::Admin);

        let response = client
            .post("/api/v1/standards")
            .header(admin)
            .header(ContentType::JSON)
            .body(r#"{"name":"   "}"#)
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::BadRequest);
        assert_eq!(envelope(response).await["errors"][0]["field"], "name");
    }

    #[rocket::async_test]
    async fn listing_needs_a_token() {
        let client = client().await;
        let response = client.get("/api/v1/standards").dispatch().await;
        assert_eq!(response.status(), Status::Unauthorized);
    }
}
