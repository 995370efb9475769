use mongodb::Database;
use rocket::serde::json::Json;
use rocket::State;

use crate::data::announcement::{Announcement, AnnouncementCreateData, AnnouncementDbExt};
use crate::data::standard::StandardDbExt;
use crate::data::user::db::UserDbExt;
use crate::data::Id;
use crate::middleware::paging::PageState;
use crate::resp::error::problems;
use crate::resp::jwt::UserRoleToken;
use crate::resp::{ApiError, ApiResponse, ApiResult};
use crate::role::Role;

use super::{current_user, require_author};

/// Publish an announcement to a standard, or to everyone
#[utoipa::path(
    request_body = AnnouncementCreateData,
    responses(
        (status = 201, description = "Published announcement", body = Announcement),
        (status = 400, description = "Missing title or body", body = ApiError),
        (status = 404, description = "Unknown standard", body = ApiError),
    ),
    security(("jwt" = []), ("jwt_cookie" = []))
)]
#[post("/announcements", data = "<announcement>")]
#[tracing::instrument(skip(db))]
pub async fn announcement_create(
    announcement: Json<AnnouncementCreateData>,
    auth: UserRoleToken,
    db: &State<Database>,
) -> ApiResult<Announcement> {
    auth.require(&[Role::Admin, Role::Tutor])?;
    announcement.validate()?;

    if let Some(standard) = announcement.standard {
        db.get_standard(standard)
            .await?
            .ok_or_else(|| problems::not_found("Standard", standard))?;
    }

    let announcement = announcement.into_inner().into_announcement(auth.user);
    db.create_announcement(&announcement).await?;
    let recipients = db
        .push_announcement(announcement.standard, announcement.id)
        .await?;
    tracing::info!(
        "Announcement {} delivered to {} users.",
        announcement.id,
        recipients
    );

    Ok(ApiResponse::created(announcement, "Announcement published."))
}

/// Announcements, newest first
///
/// Students only see announcements delivered to them.
#[utoipa::path(
    params(
        ("page" = Option<u32>, Query, description = "Page number, starting at 0"),
        ("len" = Option<u32>, Query, description = "Page length"),
    ),
    responses((status = 200, description = "A page of announcements", body = Vec<Announcement>)),
    security(("jwt" = []), ("jwt_cookie" = []))
)]
#[get("/announcements")]
#[tracing::instrument(skip(db))]
pub async fn announcement_list(
    page: PageState,
    auth: UserRoleToken,
    db: &State<Database>,
) -> ApiResult<Vec<Announcement>> {
    let delivered = match auth.role {
        Role::Student => Some(current_user(db, &auth).await?.announcements),
        _ => None,
    };

    let announcements = db.list_announcements(delivered.as_deref(), page).await?;
    Ok(ApiResponse::ok(announcements, "Announcements."))
}

/// Retract an announcement
#[utoipa::path(
    params(("id", description = "announcement ID")),
    responses(
        (status = 200, description = "Deleted announcement", body = Announcement),
        (status = 403, description = "Only the author or an admin may delete", body = ApiError),
        (status = 404, description = "Queried announcement doesn't exist", body = ApiError),
    ),
    security(("jwt" = []), ("jwt_cookie" = []))
)]
#[delete("/announcements/<id>")]
#[tracing::instrument(skip(db))]
pub async fn announcement_delete(
    id: Id,
    auth: UserRoleToken,
    db: &State<Database>,
) -> ApiResult<Announcement> {
    let announcement = db
        .get_announcement(id)
        .await?
        .ok_or_else(|| problems::not_found("Announcement", id))?;
    require_author(&auth, announcement.author)?;

    let removed = db
        .delete_announcement(id)
        .await?
        .ok_or_else(|| problems::not_found("Announcement", id))?;
    db.pull_announcement(id).await?;

    Ok(ApiResponse::ok(removed, "Announcement deleted."))
}
