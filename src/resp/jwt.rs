use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rocket::http::{Cookie, CookieJar, Status};
use rocket::outcome::Outcome;
use rocket::request::{self, FromRequest, Request};
use rocket::time::OffsetDateTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::data::user::User;
use crate::data::Id;
use crate::resp::error::problems;
use crate::resp::ApiError;
use crate::role::Role;

pub static AUTH_COOKIE_NAME: &str = "jwt_auth";

/// Claims carried by the auth token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UserRoleToken {
    #[serde(with = "jwt_numeric_date")]
    #[schema(value_type = i64)]
    iat: DateTime<Utc>,
    #[serde(with = "jwt_numeric_date")]
    #[schema(value_type = i64)]
    exp: DateTime<Utc>,
    pub user: Id,
    pub role: Role,
}

impl UserRoleToken {
    pub fn new(user: &User, lifetime_days: i64) -> UserRoleToken {
        let now = Utc::now();
        UserRoleToken {
            iat: now,
            exp: now + Duration::days(lifetime_days.max(1)),
            user: user.id,
            role: user.role,
        }
    }

    pub fn expires(&self) -> DateTime<Utc> {
        self.exp
    }

    #[cfg(test)]
    pub(crate) fn for_user(user: Id, role: Role) -> UserRoleToken {
        let now = Utc::now();
        UserRoleToken {
            iat: now,
            exp: now + Duration::days(1),
            user,
            role,
        }
    }

    pub fn encode_jwt(&self, secret: impl AsRef<[u8]>) -> Result<String, jsonwebtoken::errors::Error> {
        let header = Header::new(Algorithm::HS256);
        encode(&header, &self, &EncodingKey::from_secret(secret.as_ref()))
    }

    pub fn cookie(
        &self,
        secret: impl AsRef<[u8]>,
    ) -> Result<Cookie<'static>, jsonwebtoken::errors::Error> {
        Ok(Cookie::build((AUTH_COOKIE_NAME, self.encode_jwt(secret)?))
            .secure(true)
            .expires(OffsetDateTime::from_unix_timestamp(self.exp.timestamp()).ok())
            .path("/")
            .http_only(true)
            .build())
    }

    pub fn decode_jwt(
        token: &str,
        secret: impl AsRef<[u8]>,
    ) -> Result<UserRoleToken, jsonwebtoken::errors::Error> {
        decode::<UserRoleToken>(
            token,
            &DecodingKey::from_secret(secret.as_ref()),
            &Validation::new(Algorithm::HS256),
        )
        .map(|data| data.claims)
    }

    /// Fails with 403 unless the token carries one of `roles`.
    pub fn require(&self, roles: &[Role]) -> Result<(), ApiError> {
        if self.role.is_any_of(roles) {
            return Ok(());
        }
        Err(problems::forbidden(format!(
            "{} can't access this resource.",
            self.role
        )))
    }

    /// Like [UserRoleToken::require], but the user `id` itself always passes.
    pub fn require_self_or(&self, id: Id, roles: &[Role]) -> Result<(), ApiError> {
        if self.user == id {
            return Ok(());
        }
        self.require(roles)
    }
}

/// Reads the raw token from the auth cookie, then from a bearer header.
pub fn extract_token(req: &Request<'_>) -> Option<String> {
    if let Some(cookie) = req.cookies().get(AUTH_COOKIE_NAME) {
        tracing::trace!("found jwt auth cookie");
        return Some(cookie.value().to_string());
    }

    req.headers()
        .get_one("Authorization")
        .and_then(|it| it.strip_prefix("Bearer "))
        .map(|it| it.trim().to_string())
        .filter(|it| !it.is_empty())
}

pub fn extract_claims(
    req: &Request<'_>,
    secret: impl AsRef<[u8]>,
) -> Result<UserRoleToken, ApiError> {
    let token = extract_token(req)
        .ok_or_else(|| problems::unauthorized("No JWT auth cookie or bearer token."))?;

    let claims = UserRoleToken::decode_jwt(&token, secret)?;
    tracing::debug!("decoded user role token for user: {}", claims.user);
    Ok(claims)
}

pub fn remove_cookie(cookies: &CookieJar<'_>) {
    cookies.remove(Cookie::build(AUTH_COOKIE_NAME).path("/"));
}

/// Guard failure kept for the catcher that renders it.
#[derive(Debug, Clone, Default)]
pub struct GuardFailure(pub Option<ApiError>);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for UserRoleToken {
    type Error = ApiError;

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        match extract_claims(req, &crate::SECURITY.jwt_secret) {
            Ok(claims) => Outcome::Success(claims),
            Err(e) => {
                tracing::debug!("unable to authorize request: {:?}", e.detail);
                req.local_cache(|| GuardFailure(Some(e.clone())));
                Outcome::Error((Status::Unauthorized, e))
            }
        }
    }
}

mod jwt_numeric_date {
    //! `DateTime<Utc>` as JWT "NumericDate" seconds.
    use chrono::{DateTime, TimeZone, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i64(date.timestamp())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Utc.timestamp_opt(i64::deserialize(deserializer)?, 0)
            .single()
            .ok_or_else(|| serde::de::Error::custom("Invalid Unix timestamp value."))
    }
}

pub mod doc {
    use utoipa::openapi::security::*;

    use super::AUTH_COOKIE_NAME;

    #[derive(Clone, Copy)]
    pub struct JWTAuth;

    impl utoipa::Modify for JWTAuth {
        fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
            let components = openapi.components.get_or_insert_with(Default::default);
            components.add_security_scheme(
                "jwt",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
            components.add_security_scheme(
                "jwt_cookie",
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new(AUTH_COOKIE_NAME))),
            );
        }
    }
}

#[cfg(test)]
pub trait HasAuthCookie {
    fn get_auth_cookie(&self) -> Option<UserRoleToken>;
}

#[cfg(test)]
impl HasAuthCookie for rocket::local::asynchronous::LocalResponse<'_> {
    fn get_auth_cookie(&self) -> Option<UserRoleToken> {
        let cookie = self.cookies().get(AUTH_COOKIE_NAME)?;
        UserRoleToken::decode_jwt(cookie.value(), &crate::SECURITY.jwt_secret).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::SubsecRound;

    const SECRET: &[u8] = b"a test secret that is long enough!";

    fn token(role: Role) -> UserRoleToken {
        let now = Utc::now().round_subsecs(0);
        UserRoleToken {
            iat: now,
            exp: now + Duration::weeks(1),
            user: Id::new(),
            role,
        }
    }

    #[test]
    fn jwt_round_trips_with_secret() {
        let urt = token(Role::Tutor);
        let encoded = urt.encode_jwt(SECRET).expect("encoding should work for example");

        let decoded = UserRoleToken::decode_jwt(&encoded, SECRET).expect("token must decode");
        assert_eq!(decoded, urt);

        assert!(UserRoleToken::decode_jwt(&encoded, b"some other secret entirely....!!").is_err());
    }

    #[test]
    fn expired_tokens_are_unauthorized() {
        let mut urt = token(Role::Student);
        urt.iat = urt.iat - Duration::weeks(3);
        urt.exp = urt.iat + Duration::weeks(1);

        let encoded = urt.encode_jwt(SECRET).unwrap();
        let err: ApiError = UserRoleToken::decode_jwt(&encoded, SECRET).unwrap_err().into();
        assert_eq!(err.status, Status::Unauthorized);
        assert_eq!(err.detail.as_deref(), Some("Expired JWT signature."));
    }

    #[test]
    fn role_requirements() {
        let student = token(Role::Student);
        let err = student.require(&[Role::Admin, Role::Tutor]).unwrap_err();
        assert_eq!(err.status, Status::Forbidden);

        assert!(student.require_self_or(student.user, &[Role::Admin]).is_ok());
        assert!(student.require_self_or(Id::new(), &[Role::Admin]).is_err());
        assert!(token(Role::Admin).require(&[Role::Admin]).is_ok());
    }

    #[test]
    fn cookie_is_http_only_and_expires_with_token() {
        let urt = token(Role::Admin);
        let cookie = urt.cookie(SECRET).unwrap();

        assert_eq!(cookie.name(), AUTH_COOKIE_NAME);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(
            cookie.expires_datetime().map(|it| it.unix_timestamp()),
            Some(urt.exp.timestamp())
        );
    }
}
