//! View tracking and per-post analytics.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::services::user::UserService;
use campus_common::{AppError, AppResult, IdGenerator};
use campus_db::{
    entities::{post, post_view, user::UserRole},
    repositories::{PostRepository, PostViewRepository},
};
use chrono::{DateTime, Duration, Timelike, Utc};
use sea_orm::Set;
use serde::Serialize;

/// Repeat views by the same user inside this window update the earlier row.
const DEDUP_WINDOW_HOURS: i64 = 24;

const DEFAULT_SOURCE: &str = "feed";
const UNKNOWN_SOURCE: &str = "unknown";
const PEAK_HOURS: usize = 5;

/// Optional details sent with a view.
#[derive(Debug, Clone, Default)]
pub struct TrackViewInput {
    /// Seconds on screen.
    pub duration: Option<i32>,
    pub source: Option<String>,
    pub ip_address: Option<String>,
}

/// View counters returned after tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewCounts {
    pub views: u64,
    pub unique_viewers: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyViews {
    /// `YYYY-MM-DD`, UTC.
    pub date: String,
    pub views: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceCount {
    pub source: String,
    pub count: u64,
}

/// Viewers by school role. Views without a signed-in user count as guests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Audience {
    pub students: u64,
    pub teachers: u64,
    pub admins: u64,
    pub parents: u64,
    pub guests: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HourCount {
    /// Hour of day, UTC.
    pub hour: u32,
    pub views: u64,
}

/// Aggregates over a post's views in a date window.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostAnalytics {
    pub post_id: String,
    pub total_views: u64,
    pub unique_viewers: u64,
    pub likes_count: i32,
    pub comments_count: i32,
    /// `(likes + comments) / unique viewers * 100`, two decimals.
    pub engagement_rate: f64,
    pub views_by_day: Vec<DailyViews>,
    pub sources: Vec<SourceCount>,
    pub audience: Audience,
    /// Mean of recorded durations in seconds, rounded.
    pub avg_duration: i64,
    pub peak_hours: Vec<HourCount>,
    pub date_from: DateTime<Utc>,
    pub date_to: DateTime<Utc>,
}

/// Aggregate raw view rows in memory.
///
/// `roles` maps viewer IDs to their role; viewers missing from it are
/// counted as guests.
#[must_use]
pub fn compute_analytics(
    post: &post::Model,
    views: &[post_view::Model],
    roles: &HashMap<String, UserRole>,
    date_from: DateTime<Utc>,
    date_to: DateTime<Utc>,
) -> PostAnalytics {
    let viewers: HashSet<&str> = views.iter().filter_map(|v| v.user_id.as_deref()).collect();
    let unique_viewers = viewers.len() as u64;

    let engagement_rate = if unique_viewers == 0 {
        0.0
    } else {
        let engaged = f64::from(post.likes_count + post.comments_count);
        (engaged / unique_viewers as f64 * 100.0 * 100.0).round() / 100.0
    };

    let mut by_day: BTreeMap<String, u64> = BTreeMap::new();
    let mut by_source: HashMap<&str, u64> = HashMap::new();
    let mut by_hour: HashMap<u32, u64> = HashMap::new();
    let mut audience = Audience::default();
    let mut duration_sum: i64 = 0;
    let mut duration_count: i64 = 0;

    for view in views {
        let viewed_at = view.viewed_at.with_timezone(&Utc);
        *by_day
            .entry(viewed_at.format("%Y-%m-%d").to_string())
            .or_default() += 1;
        *by_hour.entry(viewed_at.hour()).or_default() += 1;

        let source = view
            .source
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(UNKNOWN_SOURCE);
        *by_source.entry(source).or_default() += 1;

        match view.user_id.as_ref().and_then(|id| roles.get(id)) {
            Some(UserRole::Student) => audience.students += 1,
            Some(UserRole::Teacher) => audience.teachers += 1,
            Some(UserRole::Admin) => audience.admins += 1,
            Some(UserRole::Parent) => audience.parents += 1,
            None => audience.guests += 1,
        }

        if let Some(duration) = view.duration.filter(|d| *d > 0) {
            duration_sum += i64::from(duration);
            duration_count += 1;
        }
    }

    let mut sources: Vec<SourceCount> = by_source
        .into_iter()
        .map(|(source, count)| SourceCount {
            source: source.to_string(),
            count,
        })
        .collect();
    sources.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.source.cmp(&b.source)));

    let mut peak_hours: Vec<HourCount> = by_hour
        .into_iter()
        .map(|(hour, views)| HourCount { hour, views })
        .collect();
    peak_hours.sort_by(|a, b| b.views.cmp(&a.views).then_with(|| a.hour.cmp(&b.hour)));
    peak_hours.truncate(PEAK_HOURS);

    let avg_duration = if duration_count == 0 {
        0
    } else {
        (duration_sum as f64 / duration_count as f64).round() as i64
    };

    PostAnalytics {
        post_id: post.id.clone(),
        total_views: views.len() as u64,
        unique_viewers,
        likes_count: post.likes_count,
        comments_count: post.comments_count,
        engagement_rate,
        views_by_day: by_day
            .into_iter()
            .map(|(date, views)| DailyViews { date, views })
            .collect(),
        sources,
        audience,
        avg_duration,
        peak_hours,
        date_from,
        date_to,
    }
}

/// View service for business logic.
#[derive(Clone)]
pub struct ViewService {
    view_repo: PostViewRepository,
    post_repo: PostRepository,
    users: UserService,
    id_gen: IdGenerator,
}

impl ViewService {
    /// Create a new view service.
    #[must_use]
    pub const fn new(
        view_repo: PostViewRepository,
        post_repo: PostRepository,
        users: UserService,
    ) -> Self {
        Self {
            view_repo,
            post_repo,
            users,
            id_gen: IdGenerator::new(),
        }
    }

    /// Record a view and return the post's current view counters.
    ///
    /// The author's own views are not recorded. A signed-in viewer seen in the
    /// last 24 hours only has the duration of their earlier view updated.
    pub async fn track_view(
        &self,
        post_id: &str,
        viewer_id: Option<&str>,
        input: TrackViewInput,
    ) -> AppResult<ViewCounts> {
        let post = self.post_repo.get_visible(post_id, viewer_id).await?;

        if viewer_id != Some(post.author_id.as_str()) {
            self.record(&post.id, viewer_id, input).await?;
        }

        Ok(ViewCounts {
            views: self.view_repo.count_views(&post.id).await?,
            unique_viewers: self.view_repo.count_unique_viewers(&post.id).await?,
        })
    }

    async fn record(
        &self,
        post_id: &str,
        viewer_id: Option<&str>,
        input: TrackViewInput,
    ) -> AppResult<()> {
        let now = Utc::now();

        if let Some(viewer_id) = viewer_id
            && let Some(recent) = self
                .view_repo
                .find_recent_by_user(post_id, viewer_id, now - Duration::hours(DEDUP_WINDOW_HOURS))
                .await?
        {
            if let Some(duration) = input.duration.filter(|d| *d > 0) {
                self.view_repo.update_duration(&recent.id, duration).await?;
            }
            return Ok(());
        }

        let model = post_view::ActiveModel {
            id: Set(self.id_gen.generate()),
            post_id: Set(post_id.to_string()),
            user_id: Set(viewer_id.map(ToString::to_string)),
            viewed_at: Set(now.into()),
            duration: Set(input.duration),
            source: Set(Some(
                input
                    .source
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_SOURCE.to_string()),
            )),
            ip_address: Set(input.ip_address),
        };
        self.view_repo.create(model).await?;

        Ok(())
    }

    /// Analytics for a post. Only its author may see them.
    ///
    /// The window defaults to the post's creation up to now.
    pub async fn get_analytics(
        &self,
        post_id: &str,
        actor_id: &str,
        date_from: Option<DateTime<Utc>>,
        date_to: Option<DateTime<Utc>>,
    ) -> AppResult<PostAnalytics> {
        let post = self.post_repo.get_by_id(post_id).await?;
        if post.author_id != actor_id {
            return Err(AppError::Forbidden(
                "You can only view analytics for your own posts".to_string(),
            ));
        }

        let date_from = date_from.unwrap_or_else(|| post.created_at.with_timezone(&Utc));
        let date_to = date_to.unwrap_or_else(Utc::now);
        if date_from > date_to {
            return Err(AppError::BadRequest(
                "dateFrom must not be after dateTo".to_string(),
            ));
        }

        let views = self
            .view_repo
            .find_in_window(&post.id, date_from, date_to)
            .await?;

        let mut viewer_ids: Vec<String> = views.iter().filter_map(|v| v.user_id.clone()).collect();
        viewer_ids.sort();
        viewer_ids.dedup();
        let roles = self.users.roles(&viewer_ids).await?;

        Ok(compute_analytics(&post, &views, &roles, date_from, date_to))
    }
}
