//! Request extractors.

use axum::{
    Json,
    extract::{FromRequest, FromRequestParts, Multipart, Request},
    http::{header, request::Parts},
};
use campus_common::AppError;
use campus_core::{CreatePostInput, MediaUpload, PollPatch, QuizQuestionInput, UpdatePostInput};
use campus_db::entities::{
    post::{PostDetails, Visibility, flexible_date},
    user,
};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Authenticated user extractor.
#[derive(Debug, Clone)]
pub struct AuthUser(pub user::Model);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Get user from request extensions (set by auth middleware)
        parts
            .extensions
            .get::<user::Model>()
            .cloned()
            .map(AuthUser)
            .ok_or(AppError::Unauthorized)
    }
}

/// Optional authenticated user extractor.
#[derive(Debug, Clone)]
pub struct MaybeAuthUser(pub Option<user::Model>);

impl<S> FromRequestParts<S> for MaybeAuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(parts.extensions.get::<user::Model>().cloned()))
    }
}

/// Form part carrying uploaded media.
const MEDIA_FIELD: &str = "media";

/// Multipart text fields holding JSON arrays.
const JSON_FIELDS: &[&str] = &["pollOptions", "quizQuestions", "mediaUrls", "mediaDeleted"];

const INTEGER_FIELDS: &[&str] = &[
    "pollMaxChoices",
    "assignmentPoints",
    "examDuration",
    "examTotalPoints",
    "examPassingScore",
    "projectTeamSize",
];

const BOOLEAN_FIELDS: &[&str] = &["pollAllowMultiple", "pollIsAnonymous"];

/// Fields where `null` or a blank value means "clear" on update.
const CLEARABLE_FIELDS: &[&str] = &["pollExpiresAt", "pollMaxChoices"];

/// Body of `POST /posts` and `PUT /posts/{id}`.
///
/// Accepts JSON or `multipart/form-data`. Both are normalized into one flat
/// field map: blank values are dropped (clearable fields keep an explicit
/// `null`), numeric and boolean fields sent as text are converted, and
/// multipart array fields are decoded from JSON.
#[derive(Debug, Default)]
pub struct PostForm {
    pub fields: Map<String, Value>,
    pub files: Vec<MediaUpload>,
}

impl<S> FromRequest<S> for PostForm
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("multipart/form-data"));

        if is_multipart {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            Self::from_multipart(multipart).await
        } else {
            let Json(raw) = Json::<Map<String, Value>>::from_request(req, state)
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            let mut form = Self::default();
            for (name, value) in raw {
                form.insert(name, value)?;
            }
            Ok(form)
        }
    }
}

impl PostForm {
    async fn from_multipart(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = Self::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?
        {
            let name = field.name().unwrap_or_default().to_string();

            if name == MEDIA_FIELD {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.body_text()))?;
                if !data.is_empty() {
                    form.files.push(MediaUpload {
                        file_name,
                        content_type,
                        data,
                    });
                }
                continue;
            }

            let text = field
                .text()
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;

            let value = if JSON_FIELDS.contains(&name.as_str()) && !text.trim().is_empty() {
                serde_json::from_str(&text)
                    .map_err(|_| AppError::BadRequest(format!("{name} must be a JSON array")))?
            } else {
                Value::String(text)
            };
            form.insert(name, value)?;
        }

        Ok(form)
    }

    fn insert(&mut self, name: String, value: Value) -> Result<(), AppError> {
        if let Some(value) = normalize(&name, value)? {
            self.fields.insert(name, value);
        }
        Ok(())
    }

    fn take<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, AppError> {
        self.fields
            .get(name)
            .cloned()
            .map(|value| {
                serde_json::from_value(value)
                    .map_err(|e| AppError::BadRequest(format!("Invalid {name}: {e}")))
            })
            .transpose()
    }

    fn text(&self, name: &str) -> Option<String> {
        self.fields.get(name).and_then(Value::as_str).map(str::to_string)
    }

    /// A clearable field: absent is `None`, an explicit clear is `Some(None)`.
    fn take_clearable<T: DeserializeOwned>(&self, name: &str) -> Result<Option<Option<T>>, AppError> {
        match self.fields.get(name) {
            None => Ok(None),
            Some(Value::Null) => Ok(Some(None)),
            Some(_) => self.take(name).map(|value| value.map(Some)),
        }
    }

    fn clearable_date(
        &self,
        name: &str,
    ) -> Result<Option<Option<chrono::DateTime<chrono::Utc>>>, AppError> {
        match self.fields.get(name) {
            None => Ok(None),
            Some(Value::Null) => Ok(Some(None)),
            Some(_) => {
                let raw = self.text(name).unwrap_or_default();
                flexible_date::parse(&raw)
                    .map(|date| Some(Some(date)))
                    .ok_or_else(|| AppError::BadRequest(format!("Invalid {name}: {raw}")))
            }
        }
    }

    /// Create input. `postType` defaults to ARTICLE.
    pub fn into_create_input(mut self) -> Result<(CreatePostInput, Vec<MediaUpload>), AppError> {
        if !self.fields.contains_key("postType") {
            self.fields
                .insert("postType".to_string(), Value::String("ARTICLE".to_string()));
        }

        let details: PostDetails = serde_json::from_value(Value::Object(self.fields.clone()))
            .map_err(|e| AppError::BadRequest(format!("Invalid post: {e}")))?;

        let input = CreatePostInput {
            content: self.text("content").unwrap_or_default(),
            visibility: self.take::<Visibility>("visibility")?,
            details,
            poll_options: self.take("pollOptions")?.unwrap_or_default(),
            quiz_questions: self
                .take::<Vec<QuizQuestionInput>>("quizQuestions")?
                .unwrap_or_default(),
        };
        Ok((input, self.files))
    }

    /// Update input. Absent fields stay unchanged.
    pub fn into_update_input(self) -> Result<(UpdatePostInput, Vec<MediaUpload>), AppError> {
        let input = UpdatePostInput {
            content: self.text("content"),
            visibility: self.take("visibility")?,
            media_urls: self.take("mediaUrls")?,
            media_deleted: self.take("mediaDeleted")?,
            poll_options: self.take("pollOptions")?,
            poll: PollPatch {
                expires_at: self.clearable_date("pollExpiresAt")?,
                allow_multiple: self.take("pollAllowMultiple")?,
                max_choices: self.take_clearable("pollMaxChoices")?,
                is_anonymous: self.take("pollIsAnonymous")?,
            },
        };
        Ok((input, self.files))
    }
}

/// Drop blank values and coerce text sent for numeric or boolean fields.
fn normalize(name: &str, value: Value) -> Result<Option<Value>, AppError> {
    let cleared = CLEARABLE_FIELDS.contains(&name).then_some(Value::Null);

    let Value::String(text) = value else {
        return Ok(match value {
            Value::Null => cleared,
            other => Some(other),
        });
    };

    let text = text.trim();
    if text.is_empty() {
        return Ok(cleared);
    }

    if INTEGER_FIELDS.contains(&name) {
        let number: i64 = text
            .parse()
            .map_err(|_| AppError::BadRequest(format!("{name} must be a number")))?;
        return Ok(Some(Value::from(number)));
    }

    if BOOLEAN_FIELDS.contains(&name) {
        return match text {
            "true" | "1" | "on" => Ok(Some(Value::Bool(true))),
            "false" | "0" | "off" => Ok(Some(Value::Bool(false))),
            _ => Err(AppError::BadRequest(format!("{name} must be a boolean"))),
        };
    }

    Ok(Some(Value::String(text.to_string())))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use campus_db::entities::post::PostType;
    use serde_json::json;

    fn form(fields: Value) -> PostForm {
        let mut form = PostForm::default();
        for (name, value) in fields.as_object().unwrap().clone() {
            form.insert(name, value).unwrap();
        }
        form
    }

    #[test]
    fn test_normalize_text_values() {
        assert_eq!(normalize("content", json!("  ")).unwrap(), None);
        assert_eq!(normalize("examDuration", json!("90")).unwrap(), Some(json!(90)));
        assert_eq!(
            normalize("pollAllowMultiple", json!("true")).unwrap(),
            Some(json!(true))
        );
        assert_eq!(normalize("courseCode", json!("101")).unwrap(), Some(json!("101")));
        assert!(normalize("examDuration", json!("soon")).is_err());
        assert_eq!(normalize("examDuration", Value::Null).unwrap(), None);
        assert_eq!(normalize("pollMaxChoices", json!("")).unwrap(), Some(Value::Null));
    }

    #[test]
    fn test_create_defaults_to_article() {
        let (input, files) = form(json!({ "content": "Hello" })).into_create_input().unwrap();
        assert_eq!(input.details.post_type(), PostType::Article);
        assert_eq!(input.content, "Hello");
        assert!(input.visibility.is_none());
        assert!(files.is_empty());
    }

    #[test]
    fn test_create_poll_from_text_fields() {
        let (input, _) = form(json!({
            "content": "Pick one",
            "postType": "POLL",
            "visibility": "PUBLIC",
            "pollOptions": ["A", "B"],
            "pollAllowMultiple": "true",
            "pollMaxChoices": "2",
            "pollExpiresAt": "",
        }))
        .into_create_input()
        .unwrap();

        let settings = input.details.poll().unwrap();
        assert!(settings.allow_multiple);
        assert_eq!(settings.max_choices, Some(2));
        assert_eq!(settings.expires_at, None);
        assert_eq!(input.poll_options, vec!["A".to_string(), "B".to_string()]);
        assert_eq!(input.visibility, Some(Visibility::Public));
    }

    #[test]
    fn test_create_rejects_unknown_post_type() {
        let result = form(json!({ "content": "x", "postType": "MEME" })).into_create_input();
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_update_patch_fields() {
        let (input, _) = form(json!({
            "mediaUrls": ["/files/a.png"],
            "mediaDeleted": [],
            "pollExpiresAt": "2030-01-01",
            "pollIsAnonymous": "false",
        }))
        .into_update_input()
        .unwrap();

        assert!(input.content.is_none());
        assert_eq!(input.media_urls, Some(vec!["/files/a.png".to_string()]));
        assert_eq!(input.media_deleted, Some(vec![]));
        assert!(input.poll_options.is_none());
        assert_eq!(input.poll.is_anonymous, Some(false));
        assert!(matches!(input.poll.expires_at, Some(Some(_))));
        assert_eq!(input.poll.max_choices, None);
    }

    #[test]
    fn test_update_clears_poll_expiry_and_limit() {
        let (input, _) = form(json!({
            "pollExpiresAt": null,
            "pollMaxChoices": "",
        }))
        .into_update_input()
        .unwrap();

        assert_eq!(input.poll.expires_at, Some(None));
        assert_eq!(input.poll.max_choices, Some(None));
        assert!(input.poll.allow_multiple.is_none());
    }
}
