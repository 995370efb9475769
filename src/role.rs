use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(
    Debug,
    Clone,
    Copy,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    Serialize,
    Deserialize,
    ToSchema,
    rocket::FromFormField,
)]
pub enum Role {
    Student,
    Tutor,
    Admin,
}

impl Role {
    /// Indicates whether user with role can schedule lectures and manage enrollment
    pub fn can_administer(self) -> bool {
        self == Role::Admin
    }

    /// Indicates whether user with role can take attendance and grade tests
    pub fn can_teach(self) -> bool {
        self >= Role::Tutor
    }

    pub fn is_any_of(self, roles: &[Role]) -> bool {
        roles.contains(&self)
    }
}

impl std::default::Default for Role {
    fn default() -> Self {
        Role::Student
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Student => write!(f, "Student"),
            Role::Tutor => write!(f, "Tutor"),
            Role::Admin => write!(f, "Admin"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "tutor" => Ok(Role::Tutor),
            "admin" => Ok(Role::Admin),
            _ => Err(()),
        }
    }
}

impl From<Role> for bson::Bson {
    fn from(role: Role) -> Self {
        bson::Bson::String(role.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_are_ordered_by_privilege() {
        assert!(Role::Student < Role::Tutor);
        assert!(Role::Tutor < Role::Admin);
        assert!(Role::Admin.can_teach());
        assert!(!Role::Tutor.can_administer());
        assert!(!Role::Student.can_teach());
    }

    #[test]
    fn roles_parse_case_insensitively() {
        assert_eq!("tutor".parse::<Role>(), Ok(Role::Tutor));
        assert_eq!("ADMIN".parse::<Role>(), Ok(Role::Admin));
        assert!("janitor".parse::<Role>().is_err());
    }
}
