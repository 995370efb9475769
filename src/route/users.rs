use mongodb::Database;
use rocket::http::CookieJar;
use rocket::serde::json::Json;
use rocket::State;
use utoipa::ToSchema;

use crate::data::standard::StandardDbExt;
use crate::data::subject::SubjectDbExt;
use crate::data::user::db::problem as user_problem;
use crate::data::user::db::{NewUserData, UserDbExt};
use crate::data::user::UserResponse;
use crate::data::Id;
use crate::middleware::paging::PageState;
use crate::resp::error::problems;
use crate::resp::jwt::{remove_cookie, UserRoleToken};
use crate::resp::{ApiError, ApiResponse, ApiResult};
use crate::role::Role;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SubjectsData {
    pub subjects: Vec<Id>,
}

async fn check_subjects(db: &Database, subjects: &[Id]) -> Result<(), ApiError> {
    let known = db.subject_names(subjects).await?;
    match subjects.iter().find(|it| !known.contains_key(it)) {
        Some(missing) => Err(problems::not_found("Subject", missing)),
        None => Ok(()),
    }
}

/// Create a tutor or student account
#[utoipa::path(
    request_body = NewUserData,
    responses(
        (status = 201, description = "Created user", body = UserResponse),
        (status = 400, description = "Invalid user data", body = ApiError),
        (status = 403, description = "Caller isn't an admin", body = ApiError),
    ),
    security(("jwt" = []), ("jwt_cookie" = []))
)]
#[post("/users", data = "<user>")]
#[tracing::instrument(skip(db))]
pub async fn user_create(
    user: Json<NewUserData>,
    auth: UserRoleToken,
    db: &State<Database>,
) -> ApiResult<UserResponse> {
    auth.require(&[Role::Admin])?;
    user.validate()?;

    if let Some(standard) = user.standard {
        db.get_standard(standard)
            .await?
            .ok_or_else(|| problems::not_found("Standard", standard))?;
    }
    check_subjects(db, &user.subjects).await?;

    let created = db.create_user(user.into_inner().into_user()).await?;
    Ok(ApiResponse::created(created.into(), "User created."))
}

/// List users, optionally by role
#[utoipa::path(
    params(
        ("page" = Option<u32>, Query, description = "Page number, starting at 0"),
        ("len" = Option<u32>, Query, description = "Page length"),
    ),
    responses(
        (status = 200, description = "A page of users", body = Vec<UserResponse>),
        (status = 403, description = "Students can't list users", body = ApiError),
    ),
    security(("jwt" = []), ("jwt_cookie" = []))
)]
#[get("/users?<role>")]
#[tracing::instrument(skip(db))]
pub async fn user_list(
    role: Option<Role>,
    page: PageState,
    auth: UserRoleToken,
    db: &State<Database>,
) -> ApiResult<Vec<UserResponse>> {
    auth.require(&[Role::Admin, Role::Tutor])?;

    let users = db.list_users(role, page).await?;
    Ok(ApiResponse::ok(
        users.into_iter().map(UserResponse::from).collect(),
        "Users.",
    ))
}

/// Information about a user
#[utoipa::path(
    params(("id", description = "user ID")),
    responses(
        (status = 200, description = "Existing user", body = UserResponse),
        (status = 403, description = "Students can only view themselves", body = ApiError),
        (status = 404, description = "Queried user doesn't exist", body = ApiError),
    ),
    security(("jwt" = []), ("jwt_cookie" = []))
)]
#[get("/users/<id>")]
#[tracing::instrument(skip(db))]
pub async fn user_get(id: Id, auth: UserRoleToken, db: &State<Database>) -> ApiResult<UserResponse> {
    auth.require_self_or(id, &[Role::Admin, Role::Tutor])?;

    let user = db
        .get_user(id)
        .await?
        .ok_or_else(|| user_problem::not_found(id))?;
    Ok(ApiResponse::ok(user.into(), "User."))
}

/// Replace the subjects a user is enrolled in or teaches
#[utoipa::path(
    params(("id", description = "user ID")),
    request_body = SubjectsData,
    responses(
        (status = 200, description = "Updated user", body = UserResponse),
        (status = 404, description = "Unknown user or subject", body = ApiError),
    ),
    security(("jwt" = []), ("jwt_cookie" = []))
)]
#[put("/users/<id>/subjects", data = "<data>")]
#[tracing::instrument(skip(db))]
pub async fn user_set_subjects(
    id: Id,
    data: Json<SubjectsData>,
    auth: UserRoleToken,
    db: &State<Database>,
) -> ApiResult<UserResponse> {
    auth.require(&[Role::Admin])?;
    check_subjects(db, &data.subjects).await?;

    let user = db
        .set_subjects(id, &data.subjects)
        .await?
        .ok_or_else(|| user_problem::not_found(id))?;
    Ok(ApiResponse::ok(user.into(), "Subjects updated."))
}

/// Delete a user
#[utoipa::path(
    params(("id", description = "user ID")),
    responses(
        (status = 200, description = "Deleted user", body = UserResponse),
        (status = 403, description = "Only admins can delete other users", body = ApiError),
        (status = 404, description = "Queried user doesn't exist", body = ApiError),
    ),
    security(("jwt" = []), ("jwt_cookie" = []))
)]
#[delete("/users/<id>")]
#[tracing::instrument(skip(cookies, db))]
pub async fn user_delete(
    id: Id,
    auth: UserRoleToken,
    cookies: &CookieJar<'_>,
    db: &State<Database>,
) -> ApiResult<UserResponse> {
    auth.require_self_or(id, &[Role::Admin])?;

    let removed = db
        .delete_user(id)
        .await?
        .ok_or_else(|| user_problem::not_found(id))?;

    if auth.user == id {
        remove_cookie(cookies);
    }
    tracing::info!("Deleted user {}.", id);

    Ok(ApiResponse::ok(removed.into(), "User deleted."))
}
