//! Template view models.
//!
//! Each template struct's fields are the template's top-level variables, so
//! the same files render under askama and, serialized, under minijinja.
//! Values are precomputed here; templates only test flags and print.

use askama::Template;
use axum::http::StatusCode;
use serde::Serialize;
use time::OffsetDateTime;

use crate::{
    domain::{
        content::{Author, Comment, Overview, Paginated, Post, Profile, Project, Reply},
        now_playing::NowPlaying,
        theme::Theme,
    },
    util::time::{humanize, iso8601},
};

#[derive(Debug, Clone, Serialize)]
pub struct ThemeView {
    pub name: &'static str,
    pub stylesheet: &'static str,
    pub is_dark: bool,
    /// Theme the toggle switches to.
    pub alternate: &'static str,
}

impl From<Theme> for ThemeView {
    fn from(theme: Theme) -> Self {
        let alternate = match theme {
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Dark,
        };
        Self {
            name: theme.as_str(),
            stylesheet: theme.stylesheet_path(),
            is_dark: theme.is_dark(),
            alternate: alternate.as_str(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileView {
    pub login: String,
    pub avatar_url: String,
    pub readme_html: String,
}

impl From<&Profile> for ProfileView {
    fn from(profile: &Profile) -> Self {
        Self {
            login: profile.login.clone(),
            avatar_url: profile.avatar_url.clone(),
            readme_html: profile.readme_html.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthorView {
    pub login: String,
    pub avatar_url: String,
    pub profile_url: String,
}

impl From<&Author> for AuthorView {
    fn from(author: &Author) -> Self {
        Self {
            login: author.login.clone(),
            avatar_url: author.avatar_url.clone(),
            profile_url: format!("https://github.com/{}", author.login),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplyView {
    pub author: AuthorView,
    pub url: String,
    pub created_iso: String,
    pub created_ago: String,
    pub html: String,
}

impl ReplyView {
    fn new(reply: &Reply, now: OffsetDateTime) -> Self {
        Self {
            author: AuthorView::from(&reply.author),
            url: reply.url.clone(),
            created_iso: iso8601(reply.created_at),
            created_ago: humanize(reply.created_at, now),
            html: reply.html.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentView {
    pub author: AuthorView,
    pub url: String,
    pub created_iso: String,
    pub created_ago: String,
    pub html: String,
    pub upvotes: i64,
    pub reply_total: i64,
    pub replies: Vec<ReplyView>,
    /// More replies exist upstream than were fetched.
    pub more_replies: bool,
}

impl CommentView {
    fn new(comment: &Comment, now: OffsetDateTime) -> Self {
        let replies: Vec<_> = comment
            .replies
            .iter()
            .map(|reply| ReplyView::new(reply, now))
            .collect();
        Self {
            author: AuthorView::from(&comment.author),
            url: comment.url.clone(),
            created_iso: iso8601(comment.created_at),
            created_ago: humanize(comment.created_at, now),
            html: comment.html.clone(),
            upvotes: comment.upvotes,
            reply_total: comment.reply_total,
            more_replies: comment.reply_total > replies.len() as i64,
            replies,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PostView {
    pub title: String,
    pub url: String,
    pub created_iso: String,
    pub created_ago: String,
    pub html: String,
    pub upvotes: i64,
    pub comment_total: i64,
    pub has_comments: bool,
    pub comments: Vec<CommentView>,
    pub more_comments: bool,
}

impl PostView {
    fn new(post: &Post, now: OffsetDateTime) -> Self {
        let comments: Vec<_> = post
            .comments
            .iter()
            .map(|comment| CommentView::new(comment, now))
            .collect();
        Self {
            title: post.title.clone(),
            url: post.url.clone(),
            created_iso: iso8601(post.created_at),
            created_ago: humanize(post.created_at, now),
            html: post.html.clone(),
            upvotes: post.upvotes,
            comment_total: post.comment_total,
            has_comments: !comments.is_empty(),
            more_comments: post.comment_total > comments.len() as i64,
            comments,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TopicView {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectView {
    pub name: String,
    pub url: String,
    pub has_description: bool,
    pub description: String,
    pub stars: i64,
    pub forks: i64,
    pub has_pushed_at: bool,
    pub pushed_iso: String,
    pub pushed_ago: String,
    pub has_language: bool,
    pub language_name: String,
    pub language_color: String,
    pub topics: Vec<TopicView>,
}

impl ProjectView {
    fn new(project: &Project, now: OffsetDateTime) -> Self {
        let (language_name, language_color) = project
            .language
            .as_ref()
            .map(|language| (language.name.clone(), language.color.clone()))
            .unwrap_or_default();
        Self {
            name: project.name.clone(),
            url: project.url.clone(),
            has_description: project.description.is_some(),
            description: project.description.clone().unwrap_or_default(),
            stars: project.stars,
            forks: project.forks,
            has_pushed_at: project.pushed_at.is_some(),
            pushed_iso: project.pushed_at.map(iso8601).unwrap_or_default(),
            pushed_ago: project
                .pushed_at
                .map(|pushed_at| humanize(pushed_at, now))
                .unwrap_or_default(),
            has_language: project.language.is_some(),
            language_name,
            language_color,
            topics: project
                .topics
                .iter()
                .map(|topic| TopicView {
                    name: topic.name.clone(),
                    url: topic.url.clone(),
                })
                .collect(),
        }
    }
}

/// One page of a list plus what the "load more" control needs.
#[derive(Debug, Clone, Serialize)]
pub struct ListView<T> {
    pub items: Vec<T>,
    pub cursor: String,
    pub has_more: bool,
}

impl<T> ListView<T> {
    fn from_page<S>(page: &Paginated<S>, map: impl Fn(&S) -> T) -> Self {
        Self {
            items: page.items.iter().map(map).collect(),
            cursor: page.cursor.as_str().to_string(),
            has_more: page.has_more,
        }
    }
}

pub type PostsView = ListView<PostView>;
pub type ProjectsView = ListView<ProjectView>;

impl PostsView {
    pub fn new(page: &Paginated<Post>, now: OffsetDateTime) -> Self {
        Self::from_page(page, |post| PostView::new(post, now))
    }
}

impl ProjectsView {
    pub fn new(page: &Paginated<Project>, now: OffsetDateTime) -> Self {
        Self::from_page(page, |project| ProjectView::new(project, now))
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct NowPlayingView {
    pub playing: bool,
    pub failed: bool,
    pub error: String,
    pub profile_url: String,
    pub name: String,
    pub url: String,
    pub artist: String,
    pub artist_url: String,
    pub album: String,
    pub has_artwork: bool,
    pub artwork_url: String,
    pub loved: bool,
}

impl From<&NowPlaying> for NowPlayingView {
    fn from(now_playing: &NowPlaying) -> Self {
        let mut view = Self {
            failed: now_playing.is_error(),
            error: now_playing.error.clone().unwrap_or_default(),
            profile_url: now_playing.profile_url.clone(),
            ..Self::default()
        };
        if let Some(track) = now_playing.track.as_ref() {
            view.playing = true;
            view.name = track.name.clone();
            view.url = track.url.clone();
            view.artist = track.artist.clone();
            view.artist_url = track.artist_url.clone();
            view.album = track.album.clone();
            view.has_artwork = !track.artwork_url.is_empty();
            view.artwork_url = track.artwork_url.clone();
            view.loved = track.loved;
        }
        view
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorView {
    pub status: u16,
    pub reason: String,
    pub message: String,
    pub request_id: String,
    pub path: String,
}

impl ErrorView {
    pub fn new(
        status: StatusCode,
        message: impl Into<String>,
        request_id: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("Error").to_string(),
            message: message.into(),
            request_id: request_id.into(),
            path: path.into(),
        }
    }
}

#[derive(Debug, Clone, Template, Serialize)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub theme: ThemeView,
    pub profile: ProfileView,
    pub posts: PostsView,
    pub projects: ProjectsView,
}

impl IndexTemplate {
    pub fn new(theme: Theme, overview: &Overview, now: OffsetDateTime) -> Self {
        Self {
            theme: theme.into(),
            profile: ProfileView::from(&overview.profile),
            posts: PostsView::new(&overview.posts, now),
            projects: ProjectsView::new(&overview.projects, now),
        }
    }
}

#[derive(Debug, Clone, Template, Serialize)]
#[template(path = "partials/posts.html")]
pub struct PostsTemplate {
    pub posts: PostsView,
}

#[derive(Debug, Clone, Template, Serialize)]
#[template(path = "partials/projects.html")]
pub struct ProjectsTemplate {
    pub projects: ProjectsView,
}

#[derive(Debug, Clone, Template, Serialize)]
#[template(path = "partials/lastfm.html")]
pub struct NowPlayingTemplate {
    pub now_playing: NowPlayingView,
}

#[derive(Debug, Clone, Template, Serialize)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub theme: ThemeView,
    pub error: ErrorView,
}
