use chrono::Utc;
use mongodb::Database;
use rocket::form::Form;
use rocket::fs::TempFile;
use rocket::State;
use utoipa::ToSchema;

use crate::config::Config;
use crate::data::homework::{Homework, HomeworkDbExt};
use crate::data::subject::SubjectDbExt;
use crate::data::Id;
use crate::middleware::paging::PageState;
use crate::resp::error::problems;
use crate::resp::jwt::UserRoleToken;
use crate::resp::{ApiError, ApiResponse, ApiResult};
use crate::role::Role;
use crate::storage::{commit_upload, store_upload, BlobStore, LocalBlobStore};
use crate::time;

use super::{require_author, subject_scope};

#[derive(Debug, FromForm)]
pub struct HomeworkForm<'r> {
    pub title: String,
    #[field(default = String::new())]
    pub description: String,
    pub subject: Id,
    #[field(name = "dueDate")]
    pub due_date: String,
    pub attachment: Option<TempFile<'r>>,
}

/// Multipart fields accepted by [homework_create].
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HomeworkUpload {
    pub title: String,
    pub description: Option<String>,
    pub subject: Id,
    /// `YYYY-MM-DD`
    pub due_date: String,
    #[schema(value_type = Option<String>, format = Binary)]
    pub attachment: Option<Vec<u8>>,
}

/// Assign homework to a subject
#[utoipa::path(
    request_body(content = HomeworkUpload, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Created homework", body = Homework),
        (status = 400, description = "Missing title, malformed due date or empty attachment", body = ApiError),
        (status = 404, description = "Unknown subject", body = ApiError),
    ),
    security(("jwt" = []), ("jwt_cookie" = []))
)]
#[post("/homework", data = "<form>")]
#[tracing::instrument(skip(form, db, store, c))]
pub async fn homework_create(
    mut form: Form<HomeworkForm<'_>>,
    auth: UserRoleToken,
    db: &State<Database>,
    store: &State<LocalBlobStore>,
    c: &State<Config>,
) -> ApiResult<Homework> {
    auth.require(&[Role::Tutor, Role::Admin])?;

    if form.title.trim().is_empty() {
        return Err(problems::invalid_field("title", "Title can't be empty."));
    }
    let due_date = time::parse_date("dueDate", &form.due_date)?;

    let subject = db
        .get_subject(form.subject)
        .await?
        .ok_or_else(|| problems::not_found("Subject", form.subject))?;

    let attachment = match form.attachment.as_mut() {
        Some(file) => Some(store_upload(store.inner(), &c.upload_temp_dir, file).await?),
        None => None,
    };

    let homework = Homework {
        id: Id::new(),
        title: form.title.trim().to_string(),
        description: form.description.clone(),
        subject: subject.id,
        standard: subject.standard,
        tutor: auth.user,
        due_date,
        attachment,
        created: Utc::now(),
    };
    commit_upload(
        store.inner(),
        homework.attachment.as_deref(),
        db.create_homework(&homework),
    )
    .await?;

    Ok(ApiResponse::created(homework, "Homework assigned."))
}

/// Homework, newest first; students see their subjects only
#[utoipa::path(
    params(
        ("page" = Option<u32>, Query, description = "Page number, starting at 0"),
        ("len" = Option<u32>, Query, description = "Page length"),
    ),
    responses((status = 200, description = "A page of homework", body = Vec<Homework>)),
    security(("jwt" = []), ("jwt_cookie" = []))
)]
#[get("/homework")]
#[tracing::instrument(skip(db))]
pub async fn homework_list(
    page: PageState,
    auth: UserRoleToken,
    db: &State<Database>,
) -> ApiResult<Vec<Homework>> {
    let scope = subject_scope(db, &auth).await?;
    let homework = db.list_homework(scope.as_deref(), page).await?;
    Ok(ApiResponse::ok(homework, "Homework."))
}

/// Delete homework and its attachment
#[utoipa::path(
    params(("id", description = "homework ID")),
    responses(
        (status = 200, description = "Deleted homework", body = Homework),
        (status = 403, description = "Only the author or an admin may delete", body = ApiError),
        (status = 404, description = "Queried homework doesn't exist", body = ApiError),
    ),
    security(("jwt" = []), ("jwt_cookie" = []))
)]
#[delete("/homework/<id>")]
#[tracing::instrument(skip(db, store))]
pub async fn homework_delete(
    id: Id,
    auth: UserRoleToken,
    db: &State<Database>,
    store: &State<LocalBlobStore>,
) -> ApiResult<Homework> {
    auth.require(&[Role::Tutor, Role::Admin])?;

    let homework = db
        .get_homework(id)
        .await?
        .ok_or_else(|| problems::not_found("Homework", id))?;
    require_author(&auth, homework.tutor)?;

    let removed = db
        .delete_homework(id)
        .await?
        .ok_or_else(|| problems::not_found("Homework", id))?;

    if let Some(url) = &removed.attachment {
        if let Err(e) = store.remove(url).await {
            tracing::warn!("Unable to remove attachment '{}': {}", url, e);
        }
    }

    Ok(ApiResponse::ok(removed, "Homework deleted."))
}
