use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, warn};

use super::blocks::Block;
use super::segments::flatten;
use crate::math::RenderMath;
use crate::question::{ChoiceLabel, Entry, Question};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Question,
    Answer,
    Solution,
}

impl Section {
    /// Map a level-2 heading's text to the section it opens.
    pub fn from_marker(text: &str) -> Option<Self> {
        match text {
            "Pertanyaan" => Some(Section::Question),
            "Jawaban" => Some(Section::Answer),
            "Solusi" => Some(Section::Solution),
            _ => None,
        }
    }
}

/// What to do with answer content that appears before any A/B/C/D heading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnlabeledAnswerPolicy {
    /// Hold the entries and attach them to the next choice label seen.
    #[default]
    Buffer,
    /// Discard them with a warning.
    Drop,
}

/// Where a content entry goes under the current cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Contents,
    Choice(ChoiceLabel),
    /// Answer section, but no choice label seen yet on this page.
    UnlabeledChoice,
    Solution,
    /// No section heading seen yet.
    Nowhere,
}

/// Classifier state: the active section and the active choice label.
///
/// The two axes are independent. Only heading blocks move them, and an
/// unrecognized heading leaves both untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursor {
    pub section: Option<Section>,
    pub choice: Option<ChoiceLabel>,
}

impl Cursor {
    pub fn advance(self, block: &Block) -> Cursor {
        match block {
            Block::Heading2 { heading_2 } => match Section::from_marker(&heading_2.plain_text()) {
                Some(section) => Cursor {
                    section: Some(section),
                    ..self
                },
                None => self,
            },
            Block::Heading3 { heading_3 } => {
                match ChoiceLabel::from_marker(&heading_3.plain_text()) {
                    Some(label) => Cursor {
                        choice: Some(label),
                        ..self
                    },
                    None => self,
                }
            }
            Block::Image { .. } | Block::Paragraph { .. } | Block::Unsupported => self,
        }
    }

    pub fn destination(&self) -> Destination {
        match (self.section, self.choice) {
            (None, _) => Destination::Nowhere,
            (Some(Section::Question), _) => Destination::Contents,
            (Some(Section::Solution), _) => Destination::Solution,
            (Some(Section::Answer), Some(label)) => Destination::Choice(label),
            (Some(Section::Answer), None) => Destination::UnlabeledChoice,
        }
    }
}

/// Fold state for one page.
#[derive(Debug)]
struct Walk {
    cursor: Cursor,
    pending: Vec<Entry>,
    question: Question,
}

impl Walk {
    fn new(page_id: &str) -> Self {
        Walk {
            cursor: Cursor::default(),
            pending: Vec::new(),
            question: Question::new(page_id),
        }
    }

    fn step(mut self, index: usize, block: &Block, classifier: &Classifier<'_>) -> Self {
        let next = self.cursor.advance(block);

        if !self.pending.is_empty() {
            if let Some(label) = next.choice {
                debug!(
                    page = %self.question.id,
                    choice = ?label,
                    count = self.pending.len(),
                    "Attaching buffered answer entries"
                );
                self.question.choices.get_mut(label).append(&mut self.pending);
            } else if next.section != Some(Section::Answer) {
                warn!(
                    page = %self.question.id,
                    count = self.pending.len(),
                    "Answer section ended before any choice label, dropping entries"
                );
                self.pending.clear();
            }
        }
        self.cursor = next;

        let Some(entry) = classifier.render(block) else {
            return self;
        };

        match self.cursor.destination() {
            Destination::Contents => self.question.contents.push(entry),
            Destination::Solution => self.question.solution.push(entry),
            Destination::Choice(label) => self.question.choices.get_mut(label).push(entry),
            Destination::UnlabeledChoice => match classifier.unlabeled {
                UnlabeledAnswerPolicy::Buffer => self.pending.push(entry),
                UnlabeledAnswerPolicy::Drop => {
                    warn!(page = %self.question.id, index, "Answer content before any choice label, dropping");
                }
            },
            Destination::Nowhere => {
                debug!(page = %self.question.id, index, "Content before any section heading, dropping");
            }
        }
        self
    }

    fn finish(self) -> Question {
        if self.question.is_empty() {
            debug!(page = %self.question.id, "No content under any recognized section");
        }
        if !self.pending.is_empty() {
            warn!(
                page = %self.question.id,
                count = self.pending.len(),
                "Page ended before any choice label, dropping buffered answer entries"
            );
        }
        self.question
    }
}

/// Walks one page's blocks and sorts their content into a [`Question`].
pub struct Classifier<'a> {
    renderer: &'a dyn RenderMath,
    unlabeled: UnlabeledAnswerPolicy,
}

impl<'a> Classifier<'a> {
    pub fn new(renderer: &'a dyn RenderMath, unlabeled: UnlabeledAnswerPolicy) -> Self {
        Classifier {
            renderer,
            unlabeled,
        }
    }

    pub fn classify(&self, page_id: &str, blocks: &[Block]) -> Question {
        blocks
            .iter()
            .enumerate()
            .fold(Walk::new(page_id), |walk, (i, block)| walk.step(i, block, self))
            .finish()
    }

    /// Rendered form of a content block. Headings and other blocks have none.
    fn render(&self, block: &Block) -> Option<Entry> {
        match block {
            Block::Paragraph { paragraph } => Some(Entry::Paragraph(flatten(
                &paragraph.rich_text,
                self.renderer,
            ))),
            Block::Image { image } => {
                if image.is_expired_at(Utc::now()) {
                    warn!(url = image.url(), "Hosted image URL has already expired");
                }
                Some(Entry::Image(image.url().to_string()))
            }
            Block::Heading2 { .. } | Block::Heading3 { .. } | Block::Unsupported => None,
        }
    }
}

// ── Tests ──
