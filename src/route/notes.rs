use chrono::Utc;
use mongodb::Database;
use rocket::form::Form;
use rocket::fs::TempFile;
use rocket::State;
use utoipa::ToSchema;

use crate::config::Config;
use crate::data::note::{Note, NoteDbExt};
use crate::data::subject::SubjectDbExt;
use crate::data::Id;
use crate::middleware::paging::PageState;
use crate::resp::error::problems;
use crate::resp::jwt::UserRoleToken;
use crate::resp::{ApiError, ApiResponse, ApiResult};
use crate::role::Role;
use crate::storage::{commit_upload, store_upload, BlobStore, LocalBlobStore};

use super::{require_author, subject_scope};

#[derive(Debug, FromForm)]
pub struct NoteForm<'r> {
    pub title: String,
    #[field(default = String::new())]
    pub description: String,
    pub subject: Id,
    pub file: TempFile<'r>,
}

/// Multipart fields accepted by [note_create].
#[derive(Serialize, ToSchema)]
pub struct NoteUpload {
    pub title: String,
    pub description: Option<String>,
    pub subject: Id,
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}

/// Share study material with a subject
#[utoipa::path(
    request_body(content = NoteUpload, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Created note", body = Note),
        (status = 400, description = "Missing title or empty file", body = ApiError),
        (status = 404, description = "Unknown subject", body = ApiError),
    ),
    security(("jwt" = []), ("jwt_cookie" = []))
)]
#[post("/notes", data = "<form>")]
#[tracing::instrument(skip(form, db, store, c))]
pub async fn note_create(
    mut form: Form<NoteForm<'_>>,
    auth: UserRoleToken,
    db: &State<Database>,
    store: &State<LocalBlobStore>,
    c: &State<Config>,
) -> ApiResult<Note> {
    auth.require(&[Role::Tutor, Role::Admin])?;

    if form.title.trim().is_empty() {
        return Err(problems::invalid_field("title", "Title can't be empty."));
    }

    let subject = db
        .get_subject(form.subject)
        .await?
        .ok_or_else(|| problems::not_found("Subject", form.subject))?;

    let file = store_upload(store.inner(), &c.upload_temp_dir, &mut form.file).await?;

    let note = Note {
        id: Id::new(),
        title: form.title.trim().to_string(),
        description: form.description.clone(),
        subject: subject.id,
        standard: subject.standard,
        tutor: auth.user,
        file,
        created: Utc::now(),
    };
    commit_upload(store.inner(), Some(note.file.as_str()), db.create_note(&note)).await?;

    Ok(ApiResponse::created(note, "Note shared."))
}

/// Notes, newest first; students see their subjects only
#[utoipa::path(
    params(
        ("page" = Option<u32>, Query, description = "Page number, starting at 0"),
        ("len" = Option<u32>, Query, description = "Page length"),
    ),
    responses((status = 200, description = "A page of notes", body = Vec<Note>)),
    security(("jwt" = []), ("jwt_cookie" = []))
)]
#[get("/notes")]
#[tracing::instrument(skip(db))]
pub async fn note_list(
    page: PageState,
    auth: UserRoleToken,
    db: &State<Database>,
) -> ApiResult<Vec<Note>> {
    let scope = subject_scope(db, &auth).await?;
    Ok(ApiResponse::ok(
        db.list_notes(scope.as_deref(), page).await?,
        "Notes.",
    ))
}

/// Delete a note and its file
#[utoipa::path(
    params(("id", description = "note ID")),
    responses(
        (status = 200, description = "Deleted note", body = Note),
        (status = 403, description = "Only the author or an admin may delete", body = ApiError),
        (status = 404, description = "Queried note doesn't exist", body = ApiError),
    ),
    security(("jwt" = []), ("jwt_cookie" = []))
)]
#[delete("/notes/<id>")]
#[tracing::instrument(skip(db, store))]
pub async fn note_delete(
    id: Id,
    auth: UserRoleToken,
    db: &State<Database>,
    store: &State<LocalBlobStore>,
) -> ApiResult<Note> {
    auth.require(&[Role::Tutor, Role::Admin])?;

    let note = db
        .get_note(id)
        .await?
        .ok_or_else(|| problems::not_found("Note", id))?;
    require_author(&auth, note.tutor)?;

    let removed = db
        .delete_note(id)
        .await?
        .ok_or_else(|| problems::not_found("Note", id))?;
    if let Err(e) = store.remove(&removed.file).await {
        tracing::warn!("Unable to remove note file '{}': {}", removed.file, e);
    }

    Ok(ApiResponse::ok(removed, "Note deleted."))
}

#[cfg(test)]
mod tests {
    use rocket::http::Status;

    use crate::data::Id;
    use crate::role::Role;
    use crate::route::testing::*;

    #[rocket::async_test]
    async fn notes_need_a_file() {
        let client = client().await;
        let (_, tutor) = bearer(Role::Tutor);
        let subject = Id::new().to_string();
        let (content_type, body) =
            multipart(&[("title", "Algebra"), ("subject", subject.as_str())], None);

        let response = client
            .post("/api/v1/notes")
            .header(tutor)
            .header(content_type)
            .body(body)
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::UnprocessableEntity);
    }

    #[rocket::async_test]
    async fn students_cannot_share_notes() {
        let client = client().await;
        let (_, student) = bearer(Role::Student);
        let subject = Id::new().to_string();
        let (content_type, body) = multipart(
            &[("title", "Algebra"), ("subject", subject.as_str())],
            Some(("file", "algebra.pdf", &b"%PDF-1.4"[..])),
        );

        let response = client
            .post("/api/v1/notes")
            .header(student)
            .header(content_type)
            .body(body)
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Forbidden);
    }

    #[rocket::async_test]
    async fn listing_needs_a_token() {
        let client = client().await;
        let response = client.get("/api/v1/notes").dispatch().await;
        assert_eq!(response.status(), Status::Unauthorized);
    }
}
