use std::sync::Arc;

use comrak::{
    Arena, format_html,
    nodes::{AstNode, NodeHtmlBlock, NodeValue},
    options::Options,
    parse_document,
};
use syntect::parsing::SyntaxSet;

use super::{RenderError, StyleRegistry, highlight::highlight_code, sanitize::build_sanitizer};

/// Markdown to sanitized HTML with classed syntax highlighting.
///
/// Output depends only on the input text, so a rendered page can be replayed
/// from the cache without invoking the renderer again.
pub struct MarkupRenderer {
    options: Options<'static>,
    syntax_set: SyntaxSet,
    styles: Arc<StyleRegistry>,
    sanitizer: ammonia::Builder<'static>,
}

impl MarkupRenderer {
    pub fn new(styles: Arc<StyleRegistry>) -> Self {
        Self {
            options: default_options(),
            syntax_set: SyntaxSet::load_defaults_newlines(),
            styles,
            sanitizer: build_sanitizer(),
        }
    }

    pub fn render(&self, markdown: &str) -> Result<String, RenderError> {
        if markdown.trim().is_empty() {
            return Ok(String::new());
        }

        let arena = Arena::new();
        let root = parse_document(&arena, markdown, &self.options);
        self.highlight_code_blocks(root)?;

        let mut html = String::new();
        format_html(root, &self.options, &mut html).map_err(|err| RenderError::Markdown {
            message: err.to_string(),
        })?;

        Ok(self.sanitizer.clean(&html).to_string())
    }

    fn highlight_code_blocks<'a>(&self, node: &'a AstNode<'a>) -> Result<(), RenderError> {
        if let Some((info, literal)) = extract_code_block(node) {
            let language = info.split_whitespace().next();
            let html = highlight_code(
                language,
                &literal,
                &self.syntax_set,
                self.styles.class_style(),
            )?;
            let mut data = node.data.borrow_mut();
            data.value = NodeValue::HtmlBlock(NodeHtmlBlock {
                block_type: 0,
                literal: html,
            });
            return Ok(());
        }

        let mut child = node.first_child();
        while let Some(next) = child {
            self.highlight_code_blocks(next)?;
            child = next.next_sibling();
        }
        Ok(())
    }
}

fn extract_code_block(node: &AstNode<'_>) -> Option<(String, String)> {
    let data = node.data.borrow();
    if let NodeValue::CodeBlock(block) = &data.value {
        Some((block.info.trim().to_string(), block.literal.clone()))
    } else {
        None
    }
}

fn default_options() -> Options<'static> {
    let mut options = Options::default();

    let ext = &mut options.extension;
    ext.strikethrough = true;
    ext.tagfilter = true;
    ext.table = true;
    ext.autolink = true;
    ext.tasklist = true;
    ext.superscript = false;
    ext.footnotes = true;
    ext.alerts = true;

    let render = &mut options.render;
    render.github_pre_lang = true;
    render.tasklist_classes = true;
    render.r#unsafe = true;
    render.gfm_quirks = true;

    options
}
