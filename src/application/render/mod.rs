//! Markdown rendering and syntax-highlighting stylesheets.

mod highlight;
mod markup;
mod sanitize;
mod styles;

use thiserror::Error;

pub use markup::MarkupRenderer;
pub use styles::{DARK_THEME, LIGHT_THEME, StyleRegistry};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("markdown rendering failed: {message}")]
    Markdown { message: String },
    #[error("syntax highlighting failed: {language}: {message}")]
    Highlighting { language: String, message: String },
    #[error("highlight theme `{theme}` unavailable: {message}")]
    Style { theme: String, message: String },
    #[error("template `{template}` failed: {message}")]
    Template {
        template: &'static str,
        message: String,
    },
}

impl RenderError {
    pub fn template(template: &'static str, message: impl Into<String>) -> Self {
        Self::Template {
            template,
            message: message.into(),
        }
    }
}
