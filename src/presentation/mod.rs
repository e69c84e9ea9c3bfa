//! HTML presentation: view models and page renderers.

pub mod renderer;
pub mod views;

pub use renderer::{DevTemplateRenderer, PageRenderer, PageView, TemplateRenderer, select_renderer};
