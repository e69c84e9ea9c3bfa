//! Query documents and their response DTOs.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::GraphQlQuery;

macro_rules! project_connection_fragment {
    () => {
        r#"
fragment ProjectConnection on RepositoryConnection {
  pageInfo { hasNextPage endCursor }
  nodes {
    name
    url
    description
    stargazerCount
    forkCount
    pushedAt
    repositoryTopics(first: $topics) { nodes { topic { name } url } }
    languages(first: 1, orderBy: {field: SIZE, direction: DESC}) { nodes { name color } }
  }
}
"#
    };
}

macro_rules! discussion_connection_fragment {
    () => {
        r#"
fragment DiscussionConnection on DiscussionConnection {
  pageInfo { hasNextPage endCursor }
  nodes {
    url
    title
    createdAt
    body
    upvoteCount
    comments(first: $comments) {
      totalCount
      nodes {
        author { login avatarUrl }
        url
        createdAt
        upvoteCount
        body
        replies(first: $replies) {
          totalCount
          nodes { author { login avatarUrl } url createdAt body }
        }
      }
    }
  }
}
"#
    };
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub has_next_page: bool,
    #[serde(default)]
    pub end_cursor: Option<String>,
}

/// A paginated GraphQL connection. Null nodes are skipped.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection<T> {
    pub page_info: PageInfo,
    #[serde(default = "Vec::new")]
    pub nodes: Vec<Option<T>>,
}

/// A non-paginated list that reports its full size.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Counted<T> {
    pub total_count: i64,
    #[serde(default = "Vec::new")]
    pub nodes: Vec<Option<T>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Nodes<T> {
    #[serde(default = "Vec::new")]
    pub nodes: Vec<Option<T>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorDto {
    pub login: String,
    pub avatar_url: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscussionDto {
    pub url: String,
    pub title: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub upvote_count: i64,
    pub comments: Counted<CommentDto>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentDto {
    #[serde(default)]
    pub author: Option<ActorDto>,
    pub url: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default)]
    pub upvote_count: i64,
    #[serde(default)]
    pub body: String,
    pub replies: Counted<ReplyDto>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyDto {
    #[serde(default)]
    pub author: Option<ActorDto>,
    pub url: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default)]
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TopicNameDto {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RepositoryTopicDto {
    pub topic: TopicNameDto,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LanguageDto {
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryDto {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub stargazer_count: i64,
    #[serde(default)]
    pub fork_count: i64,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub pushed_at: Option<OffsetDateTime>,
    pub repository_topics: Nodes<RepositoryTopicDto>,
    pub languages: Option<Nodes<LanguageDto>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DiscussionsDto {
    pub discussions: Connection<DiscussionDto>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BlobDto {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReadmeDto {
    #[serde(default)]
    pub object: Option<BlobDto>,
}

impl ReadmeDto {
    pub fn text(self) -> String {
        self.object.and_then(|blob| blob.text).unwrap_or_default()
    }
}

// Overview ------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverviewVariables {
    pub login: String,
    pub owner: String,
    pub repository: String,
    pub category_id: Option<String>,
    pub projects: u32,
    pub topics: u32,
    pub posts: u32,
    pub comments: u32,
    pub replies: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverviewUserDto {
    pub login: String,
    pub avatar_url: String,
    #[serde(default)]
    pub readme: Option<ReadmeDto>,
    pub repositories: Connection<RepositoryDto>,
}

/// Profile, README, first project page and first post page in one round trip.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OverviewData {
    pub user: Option<OverviewUserDto>,
    pub repository: Option<DiscussionsDto>,
}

impl GraphQlQuery for OverviewData {
    type Variables = OverviewVariables;

    const OPERATION: &'static str = "Overview";
    const DOCUMENT: &'static str = concat!(
        r#"
query Overview($login: String!, $owner: String!, $repository: String!, $categoryId: ID, $projects: Int!, $topics: Int!, $posts: Int!, $comments: Int!, $replies: Int!) {
  user(login: $login) {
    login
    avatarUrl
    readme: repository(name: $login) {
      object(expression: "HEAD:README.md") { ... on Blob { text } }
    }
    repositories(first: $projects, orderBy: {field: PUSHED_AT, direction: DESC}) { ...ProjectConnection }
  }
  repository(owner: $owner, name: $repository) {
    discussions(first: $posts, categoryId: $categoryId, orderBy: {field: CREATED_AT, direction: DESC}) { ...DiscussionConnection }
  }
}
"#,
        project_connection_fragment!(),
        discussion_connection_fragment!()
    );
}

// Posts ---------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostsVariables {
    pub owner: String,
    pub repository: String,
    pub category_id: Option<String>,
    pub posts: u32,
    pub after: Option<String>,
    pub comments: u32,
    pub replies: u32,
}

/// One page of discussions with their comments and replies.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PostsData {
    pub repository: Option<DiscussionsDto>,
}

impl GraphQlQuery for PostsData {
    type Variables = PostsVariables;

    const OPERATION: &'static str = "Posts";
    const DOCUMENT: &'static str = concat!(
        r#"
query Posts($owner: String!, $repository: String!, $categoryId: ID, $posts: Int!, $after: String, $comments: Int!, $replies: Int!) {
  repository(owner: $owner, name: $repository) {
    discussions(first: $posts, after: $after, categoryId: $categoryId, orderBy: {field: CREATED_AT, direction: DESC}) { ...DiscussionConnection }
  }
}
"#,
        discussion_connection_fragment!()
    );
}

// Projects ------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectsVariables {
    pub login: String,
    pub projects: u32,
    pub after: Option<String>,
    pub topics: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProjectsUserDto {
    pub repositories: Connection<RepositoryDto>,
}

/// One page of the user's repositories, most recently pushed first.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProjectsData {
    pub user: Option<ProjectsUserDto>,
}

impl GraphQlQuery for ProjectsData {
    type Variables = ProjectsVariables;

    const OPERATION: &'static str = "Projects";
    const DOCUMENT: &'static str = concat!(
        r#"
query Projects($login: String!, $projects: Int!, $after: String, $topics: Int!) {
  user(login: $login) {
    repositories(first: $projects, after: $after, orderBy: {field: PUSHED_AT, direction: DESC}) { ...ProjectConnection }
  }
}
"#,
        project_connection_fragment!()
    );
}

// Discussion category -------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryVariables {
    pub owner: String,
    pub repository: String,
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CategoryIdDto {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryRepositoryDto {
    #[serde(default)]
    pub discussion_category: Option<CategoryIdDto>,
}

/// Resolves a discussion category slug to its node id.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CategoryData {
    pub repository: Option<CategoryRepositoryDto>,
}

impl GraphQlQuery for CategoryData {
    type Variables = CategoryVariables;

    const OPERATION: &'static str = "DiscussionCategory";
    const DOCUMENT: &'static str = r#"
query DiscussionCategory($owner: String!, $repository: String!, $slug: String!) {
  repository(owner: $owner, name: $repository) {
    discussionCategory(slug: $slug) { id }
  }
}
"#;
}
