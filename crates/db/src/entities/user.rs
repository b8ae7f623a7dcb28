//! User entity.
//!
//! Only the slice of the school directory the feed needs: names for author
//! display, the role used for permission checks and audience analytics, and
//! the bearer token the API authenticates with.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// School role of a user.
#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    #[sea_orm(string_value = "STUDENT")]
    Student,
    #[sea_orm(string_value = "TEACHER")]
    Teacher,
    #[sea_orm(string_value = "ADMIN")]
    Admin,
    #[sea_orm(string_value = "PARENT")]
    Parent,
}

impl UserRole {
    /// Upper-case wire name of the role.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Student => "STUDENT",
            Self::Teacher => "TEACHER",
            Self::Admin => "ADMIN",
            Self::Parent => "PARENT",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub first_name: String,

    pub last_name: String,

    /// Name in the school's local script, preferred for students and teachers
    #[sea_orm(nullable)]
    pub localized_name: Option<String>,

    #[sea_orm(nullable)]
    pub avatar_url: Option<String>,

    pub role: UserRole,

    /// Class name for students, position for staff
    #[sea_orm(nullable)]
    pub subtitle: Option<String>,

    /// API bearer token
    #[sea_orm(unique, nullable)]
    #[serde(skip_serializing)]
    pub token: Option<String>,

    pub created_at: DateTimeWithTimeZone,
}

impl Model {
    /// Name shown next to posts and comments.
    #[must_use]
    pub fn display_name(&self) -> String {
        match (&self.role, &self.localized_name) {
            (UserRole::Student | UserRole::Teacher, Some(name)) if !name.trim().is_empty() => {
                name.clone()
            }
            _ => format!("{} {}", self.first_name, self.last_name)
                .trim()
                .to_string(),
        }
    }

    /// Whether this user may moderate any post or comment.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self.role, UserRole::Admin)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::post::Entity")]
    Posts,
}

impl Related<super::post::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Posts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
