//! Page rendering behind one capability with two implementations.
//!
//! [`TemplateRenderer`] uses askama templates compiled into the binary.
//! [`DevTemplateRenderer`] reads the same files from disk with minijinja on
//! every call, so template edits show up without a rebuild.

use std::path::{Path, PathBuf};

use askama::Template;
use minijinja::{Environment, path_loader};
use serde::Serialize;

use crate::application::render::RenderError;

use super::views::{
    ErrorTemplate, IndexTemplate, NowPlayingTemplate, PostsTemplate, ProjectsTemplate,
};

/// Everything the site can render, full pages and fragments alike.
#[derive(Debug, Clone)]
pub enum PageView {
    Index(IndexTemplate),
    Posts(PostsTemplate),
    Projects(ProjectsTemplate),
    NowPlaying(NowPlayingTemplate),
    Error(ErrorTemplate),
}

impl PageView {
    /// Template file, relative to the templates directory.
    pub fn template_name(&self) -> &'static str {
        match self {
            Self::Index(_) => "index.html",
            Self::Posts(_) => "partials/posts.html",
            Self::Projects(_) => "partials/projects.html",
            Self::NowPlaying(_) => "partials/lastfm.html",
            Self::Error(_) => "error.html",
        }
    }
}

pub trait PageRenderer: Send + Sync {
    fn render_page(&self, page: &PageView) -> Result<String, RenderError>;
}

/// Production renderer backed by compiled askama templates.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateRenderer;

impl TemplateRenderer {
    fn render<T: Template>(template: &T, name: &'static str) -> Result<String, RenderError> {
        template
            .render()
            .map_err(|err| RenderError::template(name, err.to_string()))
    }
}

impl PageRenderer for TemplateRenderer {
    fn render_page(&self, page: &PageView) -> Result<String, RenderError> {
        let name = page.template_name();
        match page {
            PageView::Index(template) => Self::render(template, name),
            PageView::Posts(template) => Self::render(template, name),
            PageView::Projects(template) => Self::render(template, name),
            PageView::NowPlaying(template) => Self::render(template, name),
            PageView::Error(template) => Self::render(template, name),
        }
    }
}

/// Development renderer that re-reads templates from disk on every call.
#[derive(Debug, Clone)]
pub struct DevTemplateRenderer {
    templates_dir: PathBuf,
}

impl DevTemplateRenderer {
    pub fn new(templates_dir: impl Into<PathBuf>) -> Self {
        Self {
            templates_dir: templates_dir.into(),
        }
    }

    fn render<T: Serialize>(&self, context: &T, name: &'static str) -> Result<String, RenderError> {
        let mut env = Environment::new();
        env.set_loader(path_loader(&self.templates_dir));

        env.get_template(name)
            .and_then(|template| template.render(context))
            .map_err(|err| RenderError::template(name, format!("{err:#}")))
    }
}

impl PageRenderer for DevTemplateRenderer {
    fn render_page(&self, page: &PageView) -> Result<String, RenderError> {
        let name = page.template_name();
        match page {
            PageView::Index(template) => self.render(template, name),
            PageView::Posts(template) => self.render(template, name),
            PageView::Projects(template) => self.render(template, name),
            PageView::NowPlaying(template) => self.render(template, name),
            PageView::Error(template) => self.render(template, name),
        }
    }
}

/// Pick the renderer for this process.
pub fn select_renderer(dev_mode: bool, templates_dir: &Path) -> Box<dyn PageRenderer> {
    if dev_mode {
        Box::new(DevTemplateRenderer::new(templates_dir))
    } else {
        Box::new(TemplateRenderer)
    }
}
