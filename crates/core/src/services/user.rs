//! User service.

use std::collections::HashMap;

use campus_common::{AppError, AppResult};
use campus_db::{
    entities::user::{self, UserRole},
    repositories::UserRepository,
};
use serde::Serialize;

const MIN_SEARCH_LEN: usize = 2;
const SEARCH_LIMIT: u64 = 10;

/// Author display info embedded in posts and comments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorInfo {
    pub id: String,
    pub name: String,
    pub avatar: Option<String>,
    pub role: UserRole,
    pub subtitle: Option<String>,
}

impl From<&user::Model> for AuthorInfo {
    fn from(user: &user::Model) -> Self {
        Self {
            id: user.id.clone(),
            name: user.display_name(),
            avatar: user.avatar_url.clone(),
            role: user.role.clone(),
            subtitle: user.subtitle.clone(),
        }
    }
}

/// One user search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserSearchResult {
    pub id: String,
    pub name: String,
    pub avatar: Option<String>,
    /// Class or position when known, otherwise the role name.
    pub role: String,
}

impl From<&user::Model> for UserSearchResult {
    fn from(user: &user::Model) -> Self {
        let role = user
            .subtitle
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map_or_else(|| user.role.as_str().to_string(), ToString::to_string);

        Self {
            id: user.id.clone(),
            name: user.display_name(),
            avatar: user.avatar_url.clone(),
            role,
        }
    }
}

/// User service for business logic.
#[derive(Clone)]
pub struct UserService {
    user_repo: UserRepository,
}

impl UserService {
    /// Create a new user service.
    #[must_use]
    pub const fn new(user_repo: UserRepository) -> Self {
        Self { user_repo }
    }

    /// Resolve a bearer token to its user.
    pub async fn authenticate_by_token(&self, token: &str) -> AppResult<user::Model> {
        self.user_repo
            .find_by_token(token)
            .await?
            .ok_or(AppError::Unauthorized)
    }

    /// Get a user by ID.
    pub async fn get(&self, id: &str) -> AppResult<user::Model> {
        self.user_repo.get_by_id(id).await
    }

    /// Search users by name for mentions and sharing pickers.
    pub async fn search(&self, query: &str) -> AppResult<Vec<UserSearchResult>> {
        let query = query.trim();
        if query.chars().count() < MIN_SEARCH_LEN {
            return Ok(vec![]);
        }

        let users = self.user_repo.search_by_name(query, SEARCH_LIMIT).await?;
        Ok(users.iter().map(UserSearchResult::from).collect())
    }

    /// Author info for a set of user IDs, keyed by ID. Unknown IDs are absent.
    pub async fn authors(&self, ids: &[String]) -> AppResult<HashMap<String, AuthorInfo>> {
        let mut unique = ids.to_vec();
        unique.sort();
        unique.dedup();

        let users = self.user_repo.find_by_ids(&unique).await?;
        Ok(users
            .iter()
            .map(|u| (u.id.clone(), AuthorInfo::from(u)))
            .collect())
    }

    /// Roles of a set of users, keyed by ID.
    pub async fn roles(&self, ids: &[String]) -> AppResult<HashMap<String, UserRole>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let users = self.user_repo.find_by_ids(ids).await?;
        Ok(users.into_iter().map(|u| (u.id, u.role)).collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::sync::Arc;

    fn create_test_user(id: &str, role: UserRole, subtitle: Option<&str>) -> user::Model {
        user::Model {
            id: id.to_string(),
            first_name: "Mei".to_string(),
            last_name: "Chan".to_string(),
            localized_name: Some("陳美".to_string()),
            avatar_url: Some("/files/avatars/mei.png".to_string()),
            role,
            subtitle: subtitle.map(ToString::to_string),
            token: Some("token-1".to_string()),
            created_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_search_short_query_skips_database() {
        // No results queued: any query would fail.
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
        let service = UserService::new(UserRepository::new(db));

        assert!(service.search(" m ").await.unwrap().is_empty());
        assert!(service.search("").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_formats_results() {
        let student = create_test_user("u1", UserRole::Student, Some("Grade 10A"));
        let mut parent = create_test_user("u2", UserRole::Parent, None);
        parent.localized_name = None;

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[student, parent]])
                .into_connection(),
        );
        let service = UserService::new(UserRepository::new(db));

        let results = service.search("  me ").await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].name, "陳美");
        assert_eq!(results[0].role, "Grade 10A");
        assert_eq!(results[1].name, "Mei Chan");
        assert_eq!(results[1].role, "PARENT");
    }

    #[tokio::test]
    async fn test_authenticate_unknown_token() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<user::Model>::new()])
                .into_connection(),
        );
        let service = UserService::new(UserRepository::new(db));

        let result = service.authenticate_by_token("nope").await;
        assert!(matches!(result, Err(AppError::Unauthorized)));
    }

    #[test]
    fn test_author_info_from_teacher() {
        let teacher = create_test_user("t1", UserRole::Teacher, Some("Mathematics"));
        let info = AuthorInfo::from(&teacher);
        assert_eq!(info.name, "陳美");
        assert_eq!(info.subtitle.as_deref(), Some("Mathematics"));
        assert_eq!(info.role, UserRole::Teacher);
    }
}
