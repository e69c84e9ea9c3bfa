use syntect::{
    highlighting::ThemeSet,
    html::{ClassStyle, css_for_theme_with_class_style},
};

use crate::domain::theme::Theme;

use super::RenderError;

/// syntect theme used for the dark variant.
pub const DARK_THEME: &str = "base16-ocean.dark";
/// syntect theme used for the light variant.
pub const LIGHT_THEME: &str = "InspiredGitHub";

/// Highlight stylesheets for both color variants, computed once.
///
/// The registry owns the CSS class prefix so the markup renderer and the
/// stylesheets always agree on class names.
#[derive(Debug, Clone)]
pub struct StyleRegistry {
    class_style: ClassStyle,
    dark: String,
    light: String,
}

impl StyleRegistry {
    pub fn new() -> Result<Self, RenderError> {
        Self::with_themes(DARK_THEME, LIGHT_THEME)
    }

    pub fn with_themes(dark: &str, light: &str) -> Result<Self, RenderError> {
        let themes = ThemeSet::load_defaults();
        let class_style = ClassStyle::SpacedPrefixed { prefix: "syntax-" };

        let css_for = |name: &str| -> Result<String, RenderError> {
            let theme = themes.themes.get(name).ok_or_else(|| RenderError::Style {
                theme: name.to_string(),
                message: "not in the default theme set".to_string(),
            })?;
            css_for_theme_with_class_style(theme, class_style).map_err(|err| RenderError::Style {
                theme: name.to_string(),
                message: err.to_string(),
            })
        };

        Ok(Self {
            class_style,
            dark: css_for(dark)?,
            light: css_for(light)?,
        })
    }

    pub fn stylesheet(&self, theme: Theme) -> &str {
        match theme {
            Theme::Dark => &self.dark,
            Theme::Light => &self.light,
        }
    }

    pub fn class_style(&self) -> ClassStyle {
        self.class_style
    }
}
