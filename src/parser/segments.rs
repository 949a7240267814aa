use tracing::trace;

use super::blocks::RichText;
use crate::math::RenderMath;
use crate::question::Segment;

/// Flatten inline spans into segments, one per text or equation span, in order.
/// Spans of any other kind produce nothing.
pub fn flatten(spans: &[RichText], renderer: &dyn RenderMath) -> Vec<Segment> {
    spans
        .iter()
        .filter_map(|span| match span {
            RichText::Text { text, .. } => Some(Segment::Text(text.content.clone())),
            RichText::Equation { equation, .. } => {
                Some(Segment::Equation(renderer.render(&equation.expression)))
            }
            RichText::Mention { plain_text } => {
                trace!(plain_text = %plain_text, "Skipping mention span");
                None
            }
            RichText::Unknown => {
                trace!("Skipping span of unknown type");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::EchoRenderer;

    #[test]
    fn text_preserved_exactly() {
        let spans = vec![
            RichText::text("  leading space"),
            RichText::text(""),
            RichText::text("ünïcödé ²"),
        ];
        let out = flatten(&spans, &EchoRenderer);
        assert_eq!(
            out,
            vec![
                Segment::Text("  leading space".into()),
                Segment::Text("".into()),
                Segment::Text("ünïcödé ²".into()),
            ]
        );
    }

    #[test]
    fn one_equation_segment_per_span() {
        let spans = vec![
            RichText::equation("a^2"),
            RichText::equation("a^2"),
            RichText::equation("\\sqrt{b}"),
        ];
        let out = flatten(&spans, &EchoRenderer);
        assert_eq!(out.len(), spans.len());
        assert!(out.iter().all(|s| matches!(s, Segment::Equation(_))));
        assert_eq!(out[2], Segment::Equation("<m>\\sqrt{b}</m>".into()));
    }

    #[test]
    fn mixed_order_kept() {
        let spans = vec![
            RichText::text("Jika "),
            RichText::equation("x = 2"),
            RichText::text(", maka "),
            RichText::equation("x^2 = 4"),
        ];
        let out = flatten(&spans, &EchoRenderer);
        assert_eq!(
            out,
            vec![
                Segment::Text("Jika ".into()),
                Segment::Equation("<m>x = 2</m>".into()),
                Segment::Text(", maka ".into()),
                Segment::Equation("<m>x^2 = 4</m>".into()),
            ]
        );
    }

    #[test]
    fn other_span_kinds_skipped() {
        let spans = vec![
            RichText::text("a"),
            RichText::Mention {
                plain_text: "@someone".into(),
            },
            RichText::Unknown,
            RichText::text("b"),
        ];
        let out = flatten(&spans, &EchoRenderer);
        assert_eq!(out, vec![Segment::Text("a".into()), Segment::Text("b".into())]);
    }

    #[test]
    fn empty_input() {
        assert!(flatten(&[], &EchoRenderer).is_empty());
    }
}
