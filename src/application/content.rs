//! Assembles the site's view model from GitHub.
//!
//! Every operation issues one GraphQL query covering everything the view
//! needs, then renders each free-text body through the [`MarkupRenderer`].
//! The blog's discussion category is resolved once at start-up.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, instrument};

use crate::{
    application::render::{MarkupRenderer, RenderError},
    config::{PageSizes, Settings},
    domain::content::{
        Author, Comment, Cursor, Language, Overview, Paginated, Post, PostPage, Profile, Project,
        ProjectPage, Reply, Topic,
    },
    infra::upstream::{
        UpstreamError, UpstreamErrorKind,
        github::{
            GitHubClient, SERVICE,
            queries::{
                ActorDto, CategoryData, CategoryVariables, CommentDto, Connection, DiscussionDto,
                DiscussionsDto, OverviewData, OverviewVariables, PostsData, PostsVariables,
                ProjectsData, ProjectsVariables, ReplyDto, RepositoryDto,
            },
        },
    },
};

#[derive(Debug, Error)]
pub enum ContentError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Who and what to fetch.
#[derive(Debug, Clone)]
pub struct ContentSettings {
    /// Profile owner; also names the repository holding the README.
    pub login: String,
    /// Owner of the blog repository.
    pub blog_owner: String,
    pub blog_repository: String,
    /// Discussion category slug. `None` lists every discussion.
    pub blog_category: Option<String>,
    pub page_sizes: PageSizes,
}

impl ContentSettings {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            login: settings.github.user.clone(),
            blog_owner: settings.blog.user.clone(),
            blog_repository: settings.blog.repository.clone(),
            blog_category: settings.blog.category.clone(),
            page_sizes: settings.github.page_sizes,
        }
    }
}

pub struct ContentService {
    github: GitHubClient,
    markup: Arc<MarkupRenderer>,
    settings: ContentSettings,
    /// Discussion category id, set by [`ContentService::resolve_category`].
    category_id: OnceCell<String>,
}

impl ContentService {
    pub fn new(github: GitHubClient, markup: Arc<MarkupRenderer>, settings: ContentSettings) -> Self {
        Self {
            github,
            markup,
            settings,
            category_id: OnceCell::new(),
        }
    }

    /// Profile, README and the first page of both posts and projects.
    #[instrument(skip(self), fields(login = %self.settings.login))]
    pub async fn fetch_overview(&self) -> Result<Overview, ContentError> {
        let category_id = self.category_id()?;
        let sizes = self.settings.page_sizes;
        let data: OverviewData = self
            .github
            .query(&OverviewVariables {
                login: self.settings.login.clone(),
                owner: self.settings.blog_owner.clone(),
                repository: self.settings.blog_repository.clone(),
                category_id,
                projects: sizes.projects,
                topics: sizes.topics,
                posts: sizes.posts,
                comments: sizes.comments,
                replies: sizes.replies,
            })
            .await?;

        let user = data
            .user
            .ok_or_else(|| not_found(format!("user `{}`", self.settings.login)))?;
        let discussions = data.repository.ok_or_else(|| self.blog_not_found())?;

        let readme = user.readme.map(|readme| readme.text()).unwrap_or_default();
        let readme_html = self.markup.render(&readme)?;

        Ok(Overview {
            profile: Profile {
                login: user.login,
                avatar_url: user.avatar_url,
                readme,
                readme_html,
            },
            posts: self.map_posts(discussions)?,
            projects: map_projects(user.repositories),
        })
    }

    /// The page of posts following `cursor`; an empty cursor starts from the newest.
    #[instrument(skip(self), fields(after = cursor.as_str()))]
    pub async fn fetch_posts(&self, cursor: &Cursor) -> Result<PostPage, ContentError> {
        let category_id = self.category_id()?;
        let sizes = self.settings.page_sizes;
        let data: PostsData = self
            .github
            .query(&PostsVariables {
                owner: self.settings.blog_owner.clone(),
                repository: self.settings.blog_repository.clone(),
                category_id,
                posts: sizes.posts,
                after: cursor.as_after().map(str::to_string),
                comments: sizes.comments,
                replies: sizes.replies,
            })
            .await?;

        let discussions = data.repository.ok_or_else(|| self.blog_not_found())?;
        self.map_posts(discussions)
    }

    /// The page of repositories following `cursor`, most recently pushed first.
    #[instrument(skip(self), fields(after = cursor.as_str()))]
    pub async fn fetch_projects(&self, cursor: &Cursor) -> Result<ProjectPage, ContentError> {
        let sizes = self.settings.page_sizes;
        let data: ProjectsData = self
            .github
            .query(&ProjectsVariables {
                login: self.settings.login.clone(),
                projects: sizes.projects,
                after: cursor.as_after().map(str::to_string),
                topics: sizes.topics,
            })
            .await?;

        let user = data
            .user
            .ok_or_else(|| not_found(format!("user `{}`", self.settings.login)))?;
        Ok(map_projects(user.repositories))
    }

    /// Look up the configured discussion category once, before serving.
    ///
    /// Without a configured slug this is a no-op. Once resolved, the id is
    /// reused by every later call; a failed lookup leaves it unresolved.
    #[instrument(skip(self), fields(category = self.settings.blog_category.as_deref()))]
    pub async fn resolve_category(&self) -> Result<(), ContentError> {
        let Some(slug) = self.settings.blog_category.as_deref() else {
            return Ok(());
        };

        self.category_id
            .get_or_try_init(|| async {
                let data: CategoryData = self
                    .github
                    .query(&CategoryVariables {
                        owner: self.settings.blog_owner.clone(),
                        repository: self.settings.blog_repository.clone(),
                        slug: slug.to_string(),
                    })
                    .await?;

                let id = data
                    .repository
                    .ok_or_else(|| self.blog_not_found())?
                    .discussion_category
                    .ok_or_else(|| not_found(format!("discussion category `{slug}`")))?
                    .id;
                debug!(slug, id = %id, "resolved discussion category");
                Ok::<_, UpstreamError>(id)
            })
            .await?;
        Ok(())
    }

    fn category_id(&self) -> Result<Option<String>, UpstreamError> {
        let Some(slug) = self.settings.blog_category.as_deref() else {
            return Ok(None);
        };
        self.category_id.get().cloned().map(Some).ok_or_else(|| {
            UpstreamError::new(
                SERVICE,
                UpstreamErrorKind::Decode,
                format!("discussion category `{slug}` has not been resolved"),
            )
        })
    }

    fn blog_not_found(&self) -> UpstreamError {
        not_found(format!(
            "repository `{}/{}`",
            self.settings.blog_owner, self.settings.blog_repository
        ))
    }

    fn map_posts(&self, dto: DiscussionsDto) -> Result<PostPage, ContentError> {
        let Connection { page_info, nodes } = dto.discussions;
        let posts = nodes
            .into_iter()
            .flatten()
            .map(|discussion| self.map_post(discussion))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Paginated::new(
            posts,
            Cursor::after_page(page_info.has_next_page, page_info.end_cursor),
        ))
    }

    fn map_post(&self, dto: DiscussionDto) -> Result<Post, RenderError> {
        let html = self.markup.render(&dto.body)?;
        let comments = dto
            .comments
            .nodes
            .into_iter()
            .flatten()
            .map(|comment| self.map_comment(comment))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Post {
            title: dto.title,
            url: dto.url,
            created_at: dto.created_at,
            body: dto.body,
            html,
            upvotes: dto.upvote_count,
            comment_total: dto.comments.total_count,
            comments,
        })
    }

    fn map_comment(&self, dto: CommentDto) -> Result<Comment, RenderError> {
        let html = self.markup.render(&dto.body)?;
        let replies = dto
            .replies
            .nodes
            .into_iter()
            .flatten()
            .map(|reply| self.map_reply(reply))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Comment {
            author: map_author(dto.author),
            url: dto.url,
            created_at: dto.created_at,
            html,
            body: dto.body,
            upvotes: dto.upvote_count,
            reply_total: dto.replies.total_count,
            replies,
        })
    }

    fn map_reply(&self, dto: ReplyDto) -> Result<Reply, RenderError> {
        Ok(Reply {
            html: self.markup.render(&dto.body)?,
            author: map_author(dto.author),
            url: dto.url,
            created_at: dto.created_at,
            body: dto.body,
        })
    }
}

fn not_found(what: String) -> UpstreamError {
    UpstreamError::new(SERVICE, UpstreamErrorKind::Decode, format!("{what} not found"))
}

fn map_author(actor: Option<ActorDto>) -> Author {
    match actor {
        Some(actor) => Author {
            login: actor.login,
            avatar_url: actor.avatar_url,
        },
        None => Author::ghost(),
    }
}

fn map_projects(connection: Connection<RepositoryDto>) -> ProjectPage {
    let Connection { page_info, nodes } = connection;
    let projects = nodes.into_iter().flatten().map(map_project).collect();
    Paginated::new(
        projects,
        Cursor::after_page(page_info.has_next_page, page_info.end_cursor),
    )
}

fn map_project(dto: RepositoryDto) -> Project {
    let language = dto
        .languages
        .and_then(|languages| languages.nodes.into_iter().flatten().next())
        .map(|language| Language {
            name: language.name,
            color: language.color.unwrap_or_default(),
        });
    let topics = dto
        .repository_topics
        .nodes
        .into_iter()
        .flatten()
        .map(|topic| Topic {
            name: topic.topic.name,
            url: topic.url,
        })
        .collect();

    Project {
        name: dto.name,
        description: dto.description.filter(|text| !text.trim().is_empty()),
        url: dto.url,
        stars: dto.stargazer_count,
        forks: dto.fork_count,
        pushed_at: dto.pushed_at,
        language,
        topics,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::{Value, json};

    use super::*;
    use crate::{
        application::render::StyleRegistry,
        infra::upstream::github::{GraphQlRequest, GraphQlTransport},
    };

    /// Replays canned `data` payloads in order and records every request.
    struct ScriptedTransport {
        responses: Mutex<Vec<Result<Value, UpstreamError>>>,
        requests: Mutex<Vec<(String, Value)>>,
    }

    impl ScriptedTransport {
        fn new(responses: Vec<Result<Value, UpstreamError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<(String, Value)> {
            self.requests.lock().expect("requests lock").clone()
        }
    }

    #[async_trait]
    impl GraphQlTransport for ScriptedTransport {
        async fn execute(&self, request: GraphQlRequest) -> Result<Value, UpstreamError> {
            self.requests
                .lock()
                .expect("requests lock")
                .push((request.operation_name.to_string(), request.variables));
            let mut responses = self.responses.lock().expect("responses lock");
            assert!(!responses.is_empty(), "unexpected upstream call");
            responses.remove(0)
        }
    }

    fn settings(category: Option<&str>) -> ContentSettings {
        ContentSettings {
            login: "octocat".to_string(),
            blog_owner: "octocat".to_string(),
            blog_repository: "blog".to_string(),
            blog_category: category.map(str::to_string),
            page_sizes: PageSizes::default(),
        }
    }

    fn service(transport: Arc<ScriptedTransport>, category: Option<&str>) -> ContentService {
        let styles = Arc::new(StyleRegistry::new().expect("styles"));
        ContentService::new(
            GitHubClient::new(transport),
            Arc::new(MarkupRenderer::new(styles)),
            settings(category),
        )
    }

    fn discussion(title: &str) -> Value {
        json!({
            "url": format!("https://github.com/octocat/blog/discussions/{title}"),
            "title": title,
            "createdAt": "2024-05-01T12:00:00Z",
            "body": "Hello **world**",
            "upvoteCount": 3,
            "comments": {
                "totalCount": 1,
                "nodes": [{
                    "author": null,
                    "url": "https://github.com/octocat/blog/discussions/1#c1",
                    "createdAt": "2024-05-02T12:00:00Z",
                    "upvoteCount": 0,
                    "body": "nice",
                    "replies": { "totalCount": 0, "nodes": [] }
                }]
            }
        })
    }

    fn repository(name: &str) -> Value {
        json!({
            "name": name,
            "url": format!("https://github.com/octocat/{name}"),
            "description": "",
            "stargazerCount": 7,
            "forkCount": 1,
            "pushedAt": "2024-04-01T00:00:00Z",
            "repositoryTopics": { "nodes": [{ "topic": { "name": "rust" }, "url": "https://github.com/topics/rust" }] },
            "languages": { "nodes": [{ "name": "Rust", "color": "#dea584" }] }
        })
    }

    #[tokio::test]
    async fn posts_cursor_is_forwarded_and_returned_verbatim() {
        let transport = ScriptedTransport::new(vec![Ok(json!({
            "repository": { "discussions": {
                "pageInfo": { "hasNextPage": true, "endCursor": "Y3Vyc29yOjIw" },
                "nodes": [discussion("first"), null]
            }}
        }))]);
        let content = service(Arc::clone(&transport), None);

        let page = content
            .fetch_posts(&Cursor::new("Y3Vyc29yOjEw"))
            .await
            .expect("posts");

        assert_eq!(page.cursor.as_str(), "Y3Vyc29yOjIw");
        assert!(page.has_more);
        assert_eq!(page.items.len(), 1);
        let post = &page.items[0];
        assert!(post.html.contains("<strong>world</strong>"));
        assert_eq!(post.comments[0].author, Author::ghost());

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].0, "Posts");
        assert_eq!(requests[0].1["after"], json!("Y3Vyc29yOjEw"));
        assert_eq!(requests[0].1["categoryId"], Value::Null);
    }

    #[tokio::test]
    async fn exhausted_projects_return_an_empty_cursor() {
        let transport = ScriptedTransport::new(vec![Ok(json!({
            "user": { "repositories": {
                "pageInfo": { "hasNextPage": false, "endCursor": "ignored" },
                "nodes": [repository("topi")]
            }}
        }))]);
        let content = service(Arc::clone(&transport), None);

        let page = content.fetch_projects(&Cursor::default()).await.expect("projects");

        assert!(page.cursor.is_empty());
        assert!(!page.has_more);
        let project = &page.items[0];
        assert_eq!(project.description, None);
        assert_eq!(project.language.as_ref().map(|l| l.name.as_str()), Some("Rust"));
        assert_eq!(project.topics[0].name, "rust");
        assert_eq!(transport.requests()[0].1["after"], Value::Null);
    }

    fn posts_page(has_next_page: bool, end_cursor: Option<&str>) -> Value {
        json!({
            "repository": { "discussions": {
                "pageInfo": { "hasNextPage": has_next_page, "endCursor": end_cursor },
                "nodes": [discussion("post")]
            }}
        })
    }

    #[tokio::test]
    async fn resolved_category_leaves_one_query_per_fetch() {
        let transport = ScriptedTransport::new(vec![
            Ok(json!({ "repository": { "discussionCategory": { "id": "DIC_kwDO" } } })),
            Ok(posts_page(false, None)),
            Ok(posts_page(false, None)),
        ]);
        let content = service(Arc::clone(&transport), Some("blog"));

        content.resolve_category().await.expect("category");
        assert_eq!(transport.requests().len(), 1);

        content.fetch_posts(&Cursor::default()).await.expect("first");
        assert_eq!(transport.requests().len(), 2);
        content.fetch_posts(&Cursor::default()).await.expect("second");

        let requests = transport.requests();
        let operations: Vec<_> = requests.iter().map(|(op, _)| op.as_str()).collect();
        assert_eq!(operations, ["DiscussionCategory", "Posts", "Posts"]);
        assert_eq!(requests[1].1["categoryId"], json!("DIC_kwDO"));
        assert_eq!(requests[2].1["categoryId"], json!("DIC_kwDO"));
    }

    #[tokio::test]
    async fn resolving_a_second_time_does_not_query_again() {
        let transport = ScriptedTransport::new(vec![Ok(
            json!({ "repository": { "discussionCategory": { "id": "DIC_kwDO" } } }),
        )]);
        let content = service(Arc::clone(&transport), Some("blog"));

        content.resolve_category().await.expect("first");
        content.resolve_category().await.expect("second");

        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn no_category_needs_no_resolution() {
        let transport = ScriptedTransport::new(vec![Ok(posts_page(false, None))]);
        let content = service(Arc::clone(&transport), None);

        content.resolve_category().await.expect("no-op");
        content.fetch_posts(&Cursor::default()).await.expect("posts");

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].0, "Posts");
    }

    #[tokio::test]
    async fn unknown_category_is_an_upstream_error() {
        let transport = ScriptedTransport::new(vec![Ok(
            json!({ "repository": { "discussionCategory": null } }),
        )]);
        let content = service(transport, Some("missing"));

        let err = content.resolve_category().await.unwrap_err();
        match err {
            ContentError::Upstream(err) => {
                assert_eq!(err.kind, UpstreamErrorKind::Decode);
                assert!(err.message.contains("missing"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unresolved_category_fails_without_querying() {
        let transport = ScriptedTransport::new(Vec::new());
        let content = service(Arc::clone(&transport), Some("blog"));

        let err = content.fetch_posts(&Cursor::default()).await.unwrap_err();

        assert!(matches!(err, ContentError::Upstream(ref e) if e.kind == UpstreamErrorKind::Decode));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn posts_paginate_until_the_cursor_is_exhausted() {
        let transport = ScriptedTransport::new(vec![
            Ok(posts_page(true, Some("Y3Vyc29yOnYyOpK5MjAyNC0wNS0wMVQxMjowMDowMCswMDowMM4A+/="))),
            Ok(posts_page(false, Some("Y3Vyc29yOnYyOpK5bGFzdA=="))),
        ]);
        let content = service(Arc::clone(&transport), None);

        let first = content.fetch_posts(&Cursor::new("")).await.expect("first page");
        assert!(first.has_more);
        assert_eq!(
            first.cursor.as_str(),
            "Y3Vyc29yOnYyOpK5MjAyNC0wNS0wMVQxMjowMDowMCswMDowMM4A+/="
        );

        let second = content.fetch_posts(&first.cursor).await.expect("second page");
        assert!(!second.has_more);
        assert!(second.cursor.is_empty());

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].1["after"], Value::Null);
        assert_eq!(
            requests[1].1["after"],
            json!("Y3Vyc29yOnYyOpK5MjAyNC0wNS0wMVQxMjowMDowMCswMDowMM4A+/=")
        );
    }

    #[tokio::test]
    async fn overview_maps_profile_and_both_lists() {
        let transport = ScriptedTransport::new(vec![Ok(json!({
            "user": {
                "login": "octocat",
                "avatarUrl": "https://avatars.example/octocat",
                "readme": { "object": { "text": "# Hi" } },
                "repositories": {
                    "pageInfo": { "hasNextPage": true, "endCursor": "cHJvag" },
                    "nodes": [repository("topi")]
                }
            },
            "repository": { "discussions": {
                "pageInfo": { "hasNextPage": false, "endCursor": null },
                "nodes": [discussion("first")]
            }}
        }))]);
        let content = service(transport, None);

        let overview = content.fetch_overview().await.expect("overview");

        assert_eq!(overview.profile.login, "octocat");
        assert_eq!(overview.profile.readme, "# Hi");
        assert!(overview.profile.readme_html.contains("<h1>"));
        assert_eq!(overview.projects.cursor.as_str(), "cHJvag");
        assert_eq!(overview.posts.items.len(), 1);
        assert!(overview.posts.cursor.is_empty());
    }

    #[tokio::test]
    async fn missing_user_fails_the_whole_overview() {
        let transport = ScriptedTransport::new(vec![Ok(json!({
            "user": null,
            "repository": null
        }))]);
        let content = service(transport, None);

        let err = content.fetch_overview().await.unwrap_err();
        assert!(matches!(err, ContentError::Upstream(ref e) if e.kind == UpstreamErrorKind::Decode));
    }

    #[tokio::test]
    async fn transport_failures_propagate() {
        let transport = ScriptedTransport::new(vec![Err(UpstreamError::new(
            SERVICE,
            UpstreamErrorKind::Transport,
            "connection refused",
        ))]);
        let content = service(transport, None);

        let err = content.fetch_projects(&Cursor::default()).await.unwrap_err();
        assert!(matches!(err, ContentError::Upstream(ref e) if e.kind == UpstreamErrorKind::Transport));
    }
}
