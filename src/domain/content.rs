//! Assembled site content: profile, blog posts and projects.

use serde::Serialize;
use time::OffsetDateTime;

/// Opaque continuation token handed out by the upstream API.
///
/// Cursors are only ever copied: an empty cursor means "first page" on input
/// and "no further pages" on output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Continuation for a page described by upstream `pageInfo`.
    pub fn after_page(has_next_page: bool, end_cursor: Option<String>) -> Self {
        match end_cursor {
            Some(cursor) if has_next_page => Self(cursor),
            _ => Self::default(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The cursor as an upstream `after` argument; `None` requests the first page.
    pub fn as_after(&self) -> Option<&str> {
        (!self.0.is_empty()).then_some(self.0.as_str())
    }
}

/// One page of a cursor-paginated list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub cursor: Cursor,
    pub has_more: bool,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, cursor: Cursor) -> Self {
        let has_more = !cursor.is_empty();
        Self {
            items,
            cursor,
            has_more,
        }
    }
}

pub type PostPage = Paginated<Post>;
pub type ProjectPage = Paginated<Project>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Author {
    pub login: String,
    pub avatar_url: String,
}

impl Author {
    /// Placeholder for accounts that no longer exist upstream.
    pub fn ghost() -> Self {
        Self {
            login: "ghost".to_string(),
            avatar_url: "https://avatars.githubusercontent.com/u/10137?v=4".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Profile {
    pub login: String,
    pub avatar_url: String,
    pub readme: String,
    pub readme_html: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Post {
    pub title: String,
    pub url: String,
    pub created_at: OffsetDateTime,
    pub body: String,
    pub html: String,
    pub upvotes: i64,
    pub comment_total: i64,
    pub comments: Vec<Comment>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comment {
    pub author: Author,
    pub url: String,
    pub created_at: OffsetDateTime,
    pub body: String,
    pub html: String,
    pub upvotes: i64,
    pub reply_total: i64,
    pub replies: Vec<Reply>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reply {
    pub author: Author,
    pub url: String,
    pub created_at: OffsetDateTime,
    pub body: String,
    pub html: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Language {
    pub name: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Topic {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Project {
    pub name: String,
    pub description: Option<String>,
    pub url: String,
    pub stars: i64,
    pub forks: i64,
    pub pushed_at: Option<OffsetDateTime>,
    pub language: Option<Language>,
    pub topics: Vec<Topic>,
}

/// Everything the landing page shows on first load.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overview {
    pub profile: Profile,
    pub posts: PostPage,
    pub projects: ProjectPage,
}
