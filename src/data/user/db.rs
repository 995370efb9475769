use bson::doc;
use mongodb::options::UpdateOptions;
use mongodb::Database;
use utoipa::ToSchema;

use crate::data::{filter, find_many, Id};
use crate::middleware::paging::PageState;
use crate::resp::ApiError;
use crate::role::Role;

use super::{PasswordHash, User};

pub static USER_COLLECTION_NAME: &str = "users";

pub mod problem {
    use crate::resp::error::problems;
    use crate::resp::ApiError;
    use rocket::http::Status;

    #[inline]
    pub fn bad_email(email: impl ToString, detail: impl ToString) -> ApiError {
        ApiError::new(Status::BadRequest, "Bad email.")
            .field("email", detail)
            .detail(email)
    }

    #[inline]
    pub fn bad_username(username: impl ToString, detail: impl ToString) -> ApiError {
        ApiError::new(Status::BadRequest, "Bad username.")
            .field("username", detail)
            .detail(username)
    }

    #[inline]
    pub fn bad_password(detail: impl ToString) -> ApiError {
        ApiError::new(Status::BadRequest, "Bad password.").field("password", detail)
    }

    #[inline]
    pub fn not_found(id: impl ToString) -> ApiError {
        problems::not_found("User", id)
    }

    #[inline]
    pub fn bad_login(is_email: bool) -> ApiError {
        ApiError::new(
            Status::Unauthorized,
            if is_email {
                "Bad email or password."
            } else {
                "Bad username or password."
            },
        )
    }
}

fn validate_credentials(email: &str, username: &str, password: &str) -> Result<(), ApiError> {
    if !email.contains('@') {
        return Err(problem::bad_email(email, "Not a valid e-mail address."));
    }

    if username.len() < 3 {
        return Err(problem::bad_username(
            username,
            "Username must be at least 3 characters (bytes) long.",
        ));
    }

    if username.len() > 32 {
        return Err(problem::bad_username(
            username,
            "Username can't be longer than 32 (bytes) characters.",
        ));
    }

    validate_password(password)
}

fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.len() < 8 {
        return Err(problem::bad_password(
            "Password must be at least 8 characters (bytes) long.",
        ));
    }

    if password.len() > 1024 {
        return Err(problem::bad_password(
            "Passwords longer than 1024 characters aren't supported.",
        ));
    }

    Ok(())
}

#[derive(Clone, Deserialize, ToSchema)]
pub struct UserSignupData {
    #[schema(format = "email")]
    pub email: String,
    pub username: String,
    #[schema(format = "password")]
    pub password: String,
}

impl std::fmt::Debug for UserSignupData {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "UserSignupInfo:{}", self.username)
    }
}

impl UserSignupData {
    pub fn validate(&self) -> Result<(), ApiError> {
        validate_credentials(&self.email, &self.username, &self.password)
    }
}

/// Account created by an admin for a tutor or student.
#[derive(Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewUserData {
    #[schema(format = "email")]
    pub email: String,
    pub username: String,
    #[schema(format = "password")]
    pub password: String,
    pub role: Role,
    #[serde(default)]
    pub standard: Option<Id>,
    #[serde(default)]
    pub subjects: Vec<Id>,
}

impl std::fmt::Debug for NewUserData {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NewUser:{}:{}", self.role, self.username)
    }
}

impl NewUserData {
    pub fn validate(&self) -> Result<(), ApiError> {
        validate_credentials(&self.email, &self.username, &self.password)?;
        if self.role == Role::Student && self.standard.is_none() {
            return Err(crate::resp::error::problems::invalid_field(
                "standard",
                "Students must belong to a standard.",
            ));
        }
        Ok(())
    }

    pub fn into_user(self) -> User {
        let mut user = User::new(self.email, self.username, self.password, self.role);
        user.standard = self.standard;
        user.subjects = self.subjects;
        user
    }
}

#[derive(Clone, Deserialize, ToSchema)]
pub struct UserLoginData {
    /// Username or e-mail address.
    pub identifier: String,
    #[schema(format = "password")]
    pub password: String,
}

impl std::fmt::Debug for UserLoginData {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "UserLoginInfo:{}", self.identifier)
    }
}

impl UserLoginData {
    pub fn is_email(&self) -> bool {
        self.identifier.contains('@')
    }

    pub fn validate(&self, is_email: bool) -> Result<(), ApiError> {
        if self.identifier.len() < 3
            || self.identifier.len() > 254
            || self.password.len() < 8
            || self.password.len() > 1024
        {
            return Err(problem::bad_login(is_email));
        }

        Ok(())
    }
}

#[derive(Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordData {
    #[schema(format = "password")]
    pub current_password: String,
    #[schema(format = "password")]
    pub new_password: String,
}

impl std::fmt::Debug for ChangePasswordData {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ChangePassword")
    }
}

impl ChangePasswordData {
    pub fn validate(&self) -> Result<(), ApiError> {
        validate_password(&self.new_password)
    }
}

pub trait UserDbExt {
    async fn create_user(&self, user: User) -> Result<User, ApiError>;

    async fn get_user(&self, id: Id) -> Result<Option<User>, ApiError>;

    async fn find_user_by_email(&self, email: impl AsRef<str>) -> Result<Option<User>, ApiError>;
    async fn find_user_by_username(
        &self,
        username: impl AsRef<str>,
    ) -> Result<Option<User>, ApiError>;

    async fn list_users(&self, role: Option<Role>, page: PageState)
        -> Result<Vec<User>, ApiError>;

    async fn set_subjects(&self, id: Id, subjects: &[Id]) -> Result<Option<User>, ApiError>;
    async fn set_password(&self, id: Id, pw_hash: PasswordHash) -> Result<(), ApiError>;

    /// Number of students enrolled in `subject`.
    async fn count_enrolled(&self, subject: Id) -> Result<u64, ApiError>;
    async fn enrolled_students(&self, subject: Id) -> Result<Vec<Id>, ApiError>;

    /// Adds `announcement` to every user in `standard`, or to everyone.
    async fn push_announcement(
        &self,
        standard: Option<Id>,
        announcement: Id,
    ) -> Result<u64, ApiError>;
    async fn pull_announcement(&self, announcement: Id) -> Result<u64, ApiError>;

    async fn delete_user(&self, id: Id) -> Result<Option<User>, ApiError>;
}

impl UserDbExt for Database {
    async fn create_user(&self, user: User) -> Result<User, ApiError> {
        if self.find_user_by_email(&user.email).await?.is_some() {
            return Err(problem::bad_email(
                user.email.clone(),
                "Email already registered.",
            ));
        }

        if self.find_user_by_username(&user.username).await?.is_some() {
            return Err(problem::bad_username(
                user.username.clone(),
                "Username already used.",
            ));
        }

        self.collection::<User>(USER_COLLECTION_NAME)
            .insert_one(&user, None)
            .await?;

        Ok(user)
    }

    async fn get_user(&self, id: Id) -> Result<Option<User>, ApiError> {
        self.collection(USER_COLLECTION_NAME)
            .find_one(filter::by_id(id), None)
            .await
            .map_err(ApiError::from)
    }

    async fn find_user_by_email(&self, email: impl AsRef<str>) -> Result<Option<User>, ApiError> {
        self.collection(USER_COLLECTION_NAME)
            .find_one(filter::by_email(email), None)
            .await
            .map_err(ApiError::from)
    }

    async fn find_user_by_username(
        &self,
        username: impl AsRef<str>,
    ) -> Result<Option<User>, ApiError> {
        self.collection(USER_COLLECTION_NAME)
            .find_one(filter::by_username(username), None)
            .await
            .map_err(ApiError::from)
    }

    async fn list_users(
        &self,
        role: Option<Role>,
        page: PageState,
    ) -> Result<Vec<User>, ApiError> {
        let filter = match role {
            Some(role) => doc! { "role": role },
            None => doc! {},
        };
        Ok(find_many(
            self,
            USER_COLLECTION_NAME,
            filter,
            Some(doc! { "username": 1 }),
            Some(page),
        )
        .await?)
    }

    async fn set_subjects(&self, id: Id, subjects: &[Id]) -> Result<Option<User>, ApiError> {
        let options = mongodb::options::FindOneAndUpdateOptions::builder()
            .return_document(mongodb::options::ReturnDocument::After)
            .build();

        self.collection(USER_COLLECTION_NAME)
            .find_one_and_update(
                filter::by_id(id),
                doc! { "$set": { "subjects": filter::ids_bson(subjects) } },
                options,
            )
            .await
            .map_err(ApiError::from)
    }

    async fn set_password(&self, id: Id, pw_hash: PasswordHash) -> Result<(), ApiError> {
        self.collection::<User>(USER_COLLECTION_NAME)
            .update_one(
                filter::by_id(id),
                doc! { "$set": { "pwHash": bson::to_bson(&pw_hash)? } },
                None,
            )
            .await?;
        Ok(())
    }

    async fn count_enrolled(&self, subject: Id) -> Result<u64, ApiError> {
        self.collection::<User>(USER_COLLECTION_NAME)
            .count_documents(doc! { "role": Role::Student, "subjects": subject }, None)
            .await
            .map_err(ApiError::from)
    }

    async fn enrolled_students(&self, subject: Id) -> Result<Vec<Id>, ApiError> {
        let students: Vec<User> = find_many(
            self,
            USER_COLLECTION_NAME,
            doc! { "role": Role::Student, "subjects": subject },
            None,
            None,
        )
        .await?;
        Ok(students.into_iter().map(|it| it.id).collect())
    }

    async fn push_announcement(
        &self,
        standard: Option<Id>,
        announcement: Id,
    ) -> Result<u64, ApiError> {
        let filter = match standard {
            Some(standard) => doc! { "standard": standard },
            None => doc! {},
        };

        let result = self
            .collection::<User>(USER_COLLECTION_NAME)
            .update_many(
                filter,
                doc! { "$addToSet": { "announcements": announcement } },
                UpdateOptions::default(),
            )
            .await?;
        Ok(result.modified_count)
    }

    async fn pull_announcement(&self, announcement: Id) -> Result<u64, ApiError> {
        let result = self
            .collection::<User>(USER_COLLECTION_NAME)
            .update_many(
                doc! { "announcements": announcement },
                doc! { "$pull": { "announcements": announcement } },
                None,
            )
            .await?;
        Ok(result.modified_count)
    }

    async fn delete_user(&self, id: Id) -> Result<Option<User>, ApiError> {
        self.collection(USER_COLLECTION_NAME)
            .find_one_and_delete(filter::by_id(id), None)
            .await
            .map_err(ApiError::from)
    }
}
