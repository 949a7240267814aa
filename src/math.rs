use std::panic;

use latex2mathml::{latex_to_mathml, DisplayStyle};
use tracing::debug;

/// Turns a math expression into renderable markup. Implementations never fail:
/// a bad expression yields best-effort markup instead.
pub trait RenderMath: Send + Sync {
    fn render(&self, expression: &str) -> String;
}

/// LaTeX to inline MathML.
#[derive(Debug, Clone, Copy, Default)]
pub struct LatexRenderer;

impl RenderMath for LatexRenderer {
    fn render(&self, expression: &str) -> String {
        // A panic inside the converter must not take the page down.
        match panic::catch_unwind(|| latex_to_mathml(expression, DisplayStyle::Inline)) {
            Ok(Ok(markup)) => markup,
            Ok(Err(e)) => {
                debug!(expression, error = %e, "LaTeX conversion failed");
                error_markup(expression, &e.to_string())
            }
            Err(_) => {
                debug!(expression, "LaTeX converter panicked");
                error_markup(expression, "converter panicked")
            }
        }
    }
}

/// Markup for an expression that could not be rendered: the escaped source in a
/// `katex-error` span, with the reason in the title attribute.
pub fn error_markup(expression: &str, reason: &str) -> String {
    format!(
        r#"<span class="katex-error" title="{}">{}</span>"#,
        html_escape::encode_double_quoted_attribute(reason),
        html_escape::encode_text(expression)
    )
}

/// Deterministic renderer for tests: wraps the expression in `<m>` tags.
#[cfg(test)]
pub struct EchoRenderer;

#[cfg(test)]
impl RenderMath for EchoRenderer {
    fn render(&self, expression: &str) -> String {
        format!("<m>{expression}</m>")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_mathml() {
        let out = LatexRenderer.render("x^2");
        assert!(out.contains("<math"), "{out}");
        assert!(out.contains("msup"), "{out}");
    }

    #[test]
    fn error_markup_escapes_source() {
        let out = error_markup("a < b & \"c\"", "bad \"token\"");
        assert!(out.starts_with(r#"<span class="katex-error""#));
        assert!(out.contains("a &lt; b &amp;"));
        assert!(out.contains("&quot;token&quot;"));
        assert!(!out.contains("a < b"));
    }

    #[test]
    fn never_empty_for_any_input() {
        let r = LatexRenderer;
        for expr in ["", "\\frac{1}{2}", "{", "\\unknowncommand{x}", "}}}"] {
            assert!(!r.render(expr).is_empty(), "empty output for {expr:?}");
        }
    }
}
