use inksac::prelude::*;

/// Colors shell diagnostics when the terminal supports it.
#[derive(Debug, Clone, Copy)]
pub struct SyntaxHighlighter {
    color_support: ColorSupport,
}

impl Default for SyntaxHighlighter {
    fn default() -> Self {
        Self::new()
    }
}

impl SyntaxHighlighter {
    pub fn new() -> Self {
        let support = check_color_support().unwrap_or(ColorSupport::NoColor);
        Self {
            color_support: support,
        }
    }

    pub fn plain() -> Self {
        Self {
            color_support: ColorSupport::NoColor,
        }
    }

    fn enabled(&self) -> bool {
        !matches!(self.color_support, ColorSupport::NoColor)
    }

    pub fn highlight_error(&self, error: &str) -> String {
        if !self.enabled() {
            return error.to_string();
        }

        let error_style = Style::builder().foreground(Color::Red).bold().build();
        error.style(error_style).to_string()
    }

    pub fn highlight_warning(&self, warning: &str) -> String {
        if !self.enabled() {
            return warning.to_string();
        }

        let warning_style = Style::builder().foreground(Color::Yellow).build();
        warning.style(warning_style).to_string()
    }

    /// Styles the prompt.
    pub fn highlight_prompt(&self, prompt: &str) -> String {
        if !self.enabled() {
            return prompt.to_string();
        }

        let prompt_style = Style::builder().foreground(Color::Cyan).bold().build();
        prompt.style(prompt_style).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_leaves_text_alone() {
        let highlighter = SyntaxHighlighter::plain();
        assert_eq!(highlighter.highlight_error("error: boom"), "error: boom");
        assert_eq!(highlighter.highlight_warning("careful"), "careful");
        assert_eq!(highlighter.highlight_prompt("rdsh> "), "rdsh> ");
    }

    #[test]
    fn test_highlight_keeps_text() {
        let highlighter = SyntaxHighlighter::new();
        assert!(highlighter.highlight_error("error: boom").contains("error: boom"));
    }
}
