//! Color theme system for revflow.
//!
//! A `Theme` holds named `ratatui::style::Color` fields covering every surface
//! revflow prints. Two built-in themes are provided:
//!
//! - `dark` uses ANSI 16 colors so it works on any terminal, including
//!   256-color SSH sessions with no truecolor support.
//! - `catppuccin_mocha` uses the Catppuccin Mocha palette in RGB; requires truecolor.

use ratatui::style::Color;
use revflow_core::types::Severity;

/// All color values used across revflow's prompts and messages.
#[derive(Debug, Clone)]
pub struct Theme {
    /// Prompt question marks, the selection cursor and headings.
    pub accent: Color,
    /// Hints and secondary text.
    pub muted: Color,
    /// The "recommended" tag on menu options.
    pub recommended: Color,
    /// Warning glyphs and warning messages.
    pub warning: Color,
    pub error: Color,
    pub success: Color,
    pub info: Color,

    // Diff previews
    pub diff_added: Color,
    pub diff_removed: Color,
    pub diff_context: Color,
    pub diff_hunk_header: Color,

    // Comment severity badges
    pub badge_risk: Color,
    pub badge_issue: Color,
    pub badge_suggestion: Color,
    pub badge_nit: Color,

    /// Name of the syntect theme used for code snippets.
    pub syntax_theme: &'static str,
}

impl Theme {
    /// Returns the built-in dark theme using ANSI 16 colors.
    pub fn dark() -> Self {
        Self {
            accent: Color::Cyan,
            muted: Color::DarkGray,
            recommended: Color::Green,
            warning: Color::Yellow,
            error: Color::Red,
            success: Color::Green,
            info: Color::Blue,

            diff_added: Color::Green,
            diff_removed: Color::Red,
            diff_context: Color::Reset,
            diff_hunk_header: Color::Cyan,

            badge_risk: Color::Red,
            badge_issue: Color::Yellow,
            badge_suggestion: Color::Blue,
            badge_nit: Color::DarkGray,

            syntax_theme: "base16-ocean.dark",
        }
    }

    /// Returns the Catppuccin Mocha theme using RGB truecolor values.
    ///
    /// Palette source: <https://github.com/catppuccin/catppuccin> Mocha variant.
    pub fn catppuccin_mocha() -> Self {
        let green = Color::Rgb(166, 227, 161);    // #a6e3a1
        let red = Color::Rgb(243, 139, 168);      // #f38ba8
        let yellow = Color::Rgb(249, 226, 175);   // #f9e2af
        let blue = Color::Rgb(137, 180, 250);     // #89b4fa
        let teal = Color::Rgb(148, 226, 213);     // #94e2d5
        let lavender = Color::Rgb(180, 190, 254); // #b4befe
        let overlay1 = Color::Rgb(127, 132, 156); // #7f849c
        let text = Color::Rgb(205, 214, 244);     // #cdd6f4
        let peach = Color::Rgb(250, 179, 135);    // #fab387

        Self {
            accent: lavender,
            muted: overlay1,
            recommended: green,
            warning: yellow,
            error: red,
            success: green,
            info: blue,

            diff_added: green,
            diff_removed: red,
            diff_context: text,
            diff_hunk_header: teal,

            badge_risk: red,
            badge_issue: peach,
            badge_suggestion: blue,
            badge_nit: overlay1,

            syntax_theme: "base16-mocha.dark",
        }
    }

    /// Resolves a theme name string to the corresponding built-in theme.
    ///
    /// Unknown names fall back to `dark()` so a typo in config never prevents
    /// startup.
    pub fn from_name(name: &str) -> Self {
        match name {
            "catppuccin-mocha" | "catppuccin_mocha" => Self::catppuccin_mocha(),
            "dark" => Self::dark(),
            other => {
                tracing::warn!(theme = other, "unknown theme, falling back to 'dark'");
                Self::dark()
            }
        }
    }

    pub fn severity(&self, severity: Severity) -> Color {
        match severity {
            Severity::Risk => self.badge_risk,
            Severity::Issue => self.badge_issue,
            Severity::Suggestion => self.badge_suggestion,
            Severity::Nit => self.badge_nit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_names_fall_back_to_dark() {
        assert_eq!(Theme::from_name("solarized").accent, Color::Cyan);
        assert_eq!(Theme::from_name("catppuccin_mocha").accent, Color::Rgb(180, 190, 254));
    }

    #[test]
    fn risk_and_nit_use_distinct_badges() {
        let theme = Theme::dark();
        assert_ne!(theme.severity(Severity::Risk), theme.severity(Severity::Nit));
    }
}
