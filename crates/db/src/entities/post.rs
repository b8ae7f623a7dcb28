//! Post entity.
//!
//! A post is a shared envelope (author, content, visibility, media, counters)
//! plus a [`PostDetails`] payload whose shape depends on the post type. The
//! payload is stored as JSONB next to a plain `post_type` column that the feed
//! filters on.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Who can see a post in the feed.
#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Visibility {
    #[sea_orm(string_value = "PUBLIC")]
    Public,
    #[sea_orm(string_value = "SCHOOL")]
    School,
    /// Only the author sees the post.
    #[sea_orm(string_value = "PRIVATE")]
    Private,
}

/// Closed set of post kinds.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PostType {
    #[sea_orm(string_value = "ARTICLE")]
    Article,
    #[sea_orm(string_value = "POLL")]
    Poll,
    #[sea_orm(string_value = "QUIZ")]
    Quiz,
    #[sea_orm(string_value = "ASSIGNMENT")]
    Assignment,
    #[sea_orm(string_value = "COURSE")]
    Course,
    #[sea_orm(string_value = "ANNOUNCEMENT")]
    Announcement,
    #[sea_orm(string_value = "TUTORIAL")]
    Tutorial,
    #[sea_orm(string_value = "EXAM")]
    Exam,
    #[sea_orm(string_value = "RESOURCE")]
    Resource,
    #[sea_orm(string_value = "RESEARCH")]
    Research,
    #[sea_orm(string_value = "PROJECT")]
    Project,
    #[sea_orm(string_value = "ACHIEVEMENT")]
    Achievement,
    #[sea_orm(string_value = "REFLECTION")]
    Reflection,
    #[sea_orm(string_value = "COLLABORATION")]
    Collaboration,
    #[sea_orm(string_value = "QUESTION")]
    Question,
}

/// One attached media file: its public URL and the storage key it was written under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    pub url: String,
    pub key: String,
}

/// Poll configuration carried by POLL posts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollSettings {
    #[serde(
        rename = "pollExpiresAt",
        default,
        deserialize_with = "flexible_date::deserialize"
    )]
    pub expires_at: Option<DateTime<Utc>>,

    #[serde(rename = "pollAllowMultiple", default)]
    pub allow_multiple: bool,

    /// Upper bound on options a user may pick when `allow_multiple` is set
    #[serde(rename = "pollMaxChoices", default)]
    pub max_choices: Option<i32>,

    #[serde(rename = "pollIsAnonymous", default)]
    pub is_anonymous: bool,
}

impl PollSettings {
    /// Whether voting is closed at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| now > expires_at)
    }
}

/// Type-specific fields of a post, tagged by `postType`.
///
/// Field names on the wire keep their type prefix (`assignmentDueDate`,
/// `examTotalPoints`, ...) so the same value can be flattened into a post body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "postType", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PostDetails {
    Article,
    Poll(PollSettings),
    Quiz,
    Assignment {
        #[serde(
            rename = "assignmentDueDate",
            default,
            deserialize_with = "flexible_date::deserialize"
        )]
        due_date: Option<DateTime<Utc>>,
        #[serde(rename = "assignmentPoints", default)]
        points: Option<i32>,
        #[serde(rename = "assignmentSubmissionType", default)]
        submission_type: Option<String>,
    },
    Course {
        #[serde(rename = "courseCode", default)]
        code: Option<String>,
        #[serde(rename = "courseLevel", default)]
        level: Option<String>,
        #[serde(rename = "courseDuration", default)]
        duration: Option<String>,
    },
    Announcement {
        #[serde(rename = "announcementUrgency", default)]
        urgency: Option<String>,
        #[serde(
            rename = "announcementExpiryDate",
            default,
            deserialize_with = "flexible_date::deserialize"
        )]
        expiry_date: Option<DateTime<Utc>>,
    },
    Tutorial {
        #[serde(rename = "tutorialDifficulty", default)]
        difficulty: Option<String>,
        #[serde(rename = "tutorialEstimatedTime", default)]
        estimated_time: Option<String>,
        #[serde(rename = "tutorialPrerequisites", default)]
        prerequisites: Option<String>,
    },
    Exam {
        #[serde(
            rename = "examDate",
            default,
            deserialize_with = "flexible_date::deserialize"
        )]
        date: Option<DateTime<Utc>>,
        /// Minutes
        #[serde(rename = "examDuration", default)]
        duration: Option<i32>,
        #[serde(rename = "examTotalPoints", default)]
        total_points: Option<i32>,
        #[serde(rename = "examPassingScore", default)]
        passing_score: Option<i32>,
    },
    Resource {
        #[serde(rename = "resourceType", default)]
        resource_type: Option<String>,
        #[serde(rename = "resourceUrl", default)]
        url: Option<String>,
    },
    Research {
        #[serde(rename = "researchField", default)]
        field: Option<String>,
        #[serde(rename = "researchCollaborators", default)]
        collaborators: Option<String>,
    },
    Project {
        #[serde(rename = "projectStatus", default)]
        status: Option<String>,
        #[serde(
            rename = "projectDeadline",
            default,
            deserialize_with = "flexible_date::deserialize"
        )]
        deadline: Option<DateTime<Utc>>,
        #[serde(rename = "projectTeamSize", default)]
        team_size: Option<i32>,
    },
    Achievement,
    Reflection,
    Collaboration,
    Question,
}

impl PostDetails {
    /// Details with every optional field unset.
    #[must_use]
    pub fn empty(post_type: PostType) -> Self {
        match post_type {
            PostType::Article => Self::Article,
            PostType::Poll => Self::Poll(PollSettings::default()),
            PostType::Quiz => Self::Quiz,
            PostType::Assignment => Self::Assignment {
                due_date: None,
                points: None,
                submission_type: None,
            },
            PostType::Course => Self::Course {
                code: None,
                level: None,
                duration: None,
            },
            PostType::Announcement => Self::Announcement {
                urgency: None,
                expiry_date: None,
            },
            PostType::Tutorial => Self::Tutorial {
                difficulty: None,
                estimated_time: None,
                prerequisites: None,
            },
            PostType::Exam => Self::Exam {
                date: None,
                duration: None,
                total_points: None,
                passing_score: None,
            },
            PostType::Resource => Self::Resource {
                resource_type: None,
                url: None,
            },
            PostType::Research => Self::Research {
                field: None,
                collaborators: None,
            },
            PostType::Project => Self::Project {
                status: None,
                deadline: None,
                team_size: None,
            },
            PostType::Achievement => Self::Achievement,
            PostType::Reflection => Self::Reflection,
            PostType::Collaboration => Self::Collaboration,
            PostType::Question => Self::Question,
        }
    }

    /// The post type this payload belongs to.
    #[must_use]
    pub const fn post_type(&self) -> PostType {
        match self {
            Self::Article => PostType::Article,
            Self::Poll(_) => PostType::Poll,
            Self::Quiz => PostType::Quiz,
            Self::Assignment { .. } => PostType::Assignment,
            Self::Course { .. } => PostType::Course,
            Self::Announcement { .. } => PostType::Announcement,
            Self::Tutorial { .. } => PostType::Tutorial,
            Self::Exam { .. } => PostType::Exam,
            Self::Resource { .. } => PostType::Resource,
            Self::Research { .. } => PostType::Research,
            Self::Project { .. } => PostType::Project,
            Self::Achievement => PostType::Achievement,
            Self::Reflection => PostType::Reflection,
            Self::Collaboration => PostType::Collaboration,
            Self::Question => PostType::Question,
        }
    }

    /// Poll settings, if this is a poll.
    #[must_use]
    pub const fn poll(&self) -> Option<&PollSettings> {
        match self {
            Self::Poll(settings) => Some(settings),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "post")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(indexed)]
    pub author_id: String,

    #[sea_orm(column_type = "Text")]
    pub content: String,

    pub post_type: PostType,

    pub visibility: Visibility,

    /// Ordered `[{url, key}]`
    #[sea_orm(column_type = "JsonBinary")]
    pub media: Json,

    /// Serialized [`PostDetails`]
    #[sea_orm(column_type = "JsonBinary")]
    pub details: Json,

    #[sea_orm(default_value = false)]
    pub is_pinned: bool,

    #[sea_orm(default_value = false)]
    pub is_edited: bool,

    #[sea_orm(default_value = 0)]
    pub likes_count: i32,

    #[sea_orm(default_value = 0)]
    pub comments_count: i32,

    #[sea_orm(default_value = 0)]
    pub shares_count: i32,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    /// Attached media in display order.
    #[must_use]
    pub fn media_items(&self) -> Vec<MediaItem> {
        serde_json::from_value(self.media.clone()).unwrap_or_default()
    }

    /// Type-specific payload. Rows whose JSON no longer parses fall back to
    /// an empty payload of the stored type.
    #[must_use]
    pub fn details(&self) -> PostDetails {
        serde_json::from_value(self.details.clone())
            .unwrap_or_else(|_| PostDetails::empty(self.post_type))
    }

    /// Poll settings, if this is a poll.
    #[must_use]
    pub fn poll_settings(&self) -> Option<PollSettings> {
        match self.details() {
            PostDetails::Poll(settings) => Some(settings),
            _ => None,
        }
    }

    /// Private posts are seen by their author only.
    #[must_use]
    pub fn is_visible_to(&self, viewer_id: Option<&str>) -> bool {
        self.visibility != Visibility::Private || viewer_id == Some(self.author_id.as_str())
    }
}

/// Encode media for the `media` column.
#[must_use]
pub fn media_to_json(items: &[MediaItem]) -> Json {
    Json::Array(
        items
            .iter()
            .map(|item| serde_json::json!({ "url": item.url, "key": item.key }))
            .collect(),
    )
}

/// Encode details for the `details` column.
pub fn details_to_json(details: &PostDetails) -> Result<Json, serde_json::Error> {
    serde_json::to_value(details)
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::AuthorId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Author,

    #[sea_orm(has_many = "super::poll_option::Entity")]
    PollOptions,

    #[sea_orm(has_many = "super::quiz_question::Entity")]
    QuizQuestions,

    #[sea_orm(has_many = "super::comment::Entity")]
    Comments,

    #[sea_orm(has_many = "super::post_like::Entity")]
    Likes,

    #[sea_orm(has_many = "super::post_view::Entity")]
    Views,

    #[sea_orm(has_many = "super::bookmark::Entity")]
    Bookmarks,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Author.def()
    }
}

impl Related<super::poll_option::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PollOptions.def()
    }
}

impl Related<super::quiz_question::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::QuizQuestions.def()
    }
}

impl Related<super::comment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Comments.def()
    }
}

impl Related<super::post_like::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Likes.def()
    }
}

impl Related<super::post_view::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Views.def()
    }
}

impl Related<super::bookmark::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Bookmarks.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Lenient date parsing for form fields.
///
/// Accepts RFC 3339, `datetime-local` style values without an offset (read as
/// UTC) and bare `YYYY-MM-DD` dates. Empty strings read as unset.
pub mod flexible_date {
    use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer};

    /// Parse a single date value.
    #[must_use]
    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        let raw = raw.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
                return Some(naive.and_utc());
            }
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
    }

    /// Serde adapter for `Option<DateTime<Utc>>` fields.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(value) => parse(value)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid date: {value}"))),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_details_flat_wire_format() {
        let details: PostDetails = serde_json::from_value(json!({
            "postType": "ASSIGNMENT",
            "assignmentDueDate": "2025-03-01",
            "assignmentPoints": 20,
            "content": "ignored by the payload",
        }))
        .unwrap();

        assert_eq!(details.post_type(), PostType::Assignment);
        match &details {
            PostDetails::Assignment {
                due_date, points, ..
            } => {
                assert_eq!(due_date.unwrap().to_rfc3339(), "2025-03-01T00:00:00+00:00");
                assert_eq!(*points, Some(20));
            }
            other => panic!("unexpected details: {other:?}"),
        }

        let value = details_to_json(&details).unwrap();
        assert_eq!(value["postType"], "ASSIGNMENT");
        assert_eq!(value["assignmentPoints"], 20);
    }

    #[test]
    fn test_poll_settings_defaults() {
        let details: PostDetails = serde_json::from_value(json!({ "postType": "POLL" })).unwrap();
        let settings = details.poll().unwrap();
        assert!(!settings.allow_multiple);
        assert!(settings.expires_at.is_none());
        assert!(!settings.is_expired(Utc::now()));
    }

    #[test]
    fn test_poll_expiry() {
        let settings = PollSettings {
            expires_at: flexible_date::parse("2020-01-01T00:00"),
            ..PollSettings::default()
        };
        assert!(settings.is_expired(Utc::now()));
    }

    #[test]
    fn test_empty_date_is_unset() {
        let details: PostDetails =
            serde_json::from_value(json!({ "postType": "EXAM", "examDate": "" })).unwrap();
        assert_eq!(details, PostDetails::empty(PostType::Exam));
    }

    #[test]
    fn test_invalid_date_rejected() {
        let result: Result<PostDetails, _> =
            serde_json::from_value(json!({ "postType": "PROJECT", "projectDeadline": "soon" }));
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_matches_type() {
        for post_type in <PostType as sea_orm::Iterable>::iter() {
            assert_eq!(PostDetails::empty(post_type).post_type(), post_type);
        }
    }

    #[test]
    fn test_media_json_roundtrip() {
        let items = vec![
            MediaItem {
                url: "https://cdn/a.jpg".to_string(),
                key: "posts/a.jpg".to_string(),
            },
            MediaItem {
                url: "https://cdn/b.jpg".to_string(),
                key: "posts/b.jpg".to_string(),
            },
        ];
        let value = media_to_json(&items);
        let parsed: Vec<MediaItem> = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, items);
    }
}
