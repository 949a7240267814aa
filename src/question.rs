use serde::Serialize;

/// One renderable piece of a paragraph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Segment {
    Text(String),
    /// Rendered math markup, not the raw expression.
    Equation(String),
}

/// One content block's rendered form inside a bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Entry {
    Image(String),
    Paragraph(Vec<Segment>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChoiceLabel {
    A,
    B,
    C,
    D,
}

impl ChoiceLabel {
    pub const ALL: [ChoiceLabel; 4] = [ChoiceLabel::A, ChoiceLabel::B, ChoiceLabel::C, ChoiceLabel::D];

    pub fn from_marker(text: &str) -> Option<Self> {
        match text {
            "A" => Some(ChoiceLabel::A),
            "B" => Some(ChoiceLabel::B),
            "C" => Some(ChoiceLabel::C),
            "D" => Some(ChoiceLabel::D),
            _ => None,
        }
    }
}

/// Answer choices. Every label is always present, possibly empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Choices {
    #[serde(rename = "A")]
    pub a: Vec<Entry>,
    #[serde(rename = "B")]
    pub b: Vec<Entry>,
    #[serde(rename = "C")]
    pub c: Vec<Entry>,
    #[serde(rename = "D")]
    pub d: Vec<Entry>,
}

impl Choices {
    pub fn get(&self, label: ChoiceLabel) -> &[Entry] {
        match label {
            ChoiceLabel::A => &self.a,
            ChoiceLabel::B => &self.b,
            ChoiceLabel::C => &self.c,
            ChoiceLabel::D => &self.d,
        }
    }

    pub fn get_mut(&mut self, label: ChoiceLabel) -> &mut Vec<Entry> {
        match label {
            ChoiceLabel::A => &mut self.a,
            ChoiceLabel::B => &mut self.b,
            ChoiceLabel::C => &mut self.c,
            ChoiceLabel::D => &mut self.d,
        }
    }

    pub fn is_empty(&self) -> bool {
        ChoiceLabel::ALL.iter().all(|l| self.get(*l).is_empty())
    }
}

/// A multiple-choice question assembled from one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Question {
    pub id: String,
    pub solution: Vec<Entry>,
    pub contents: Vec<Entry>,
    pub choices: Choices,
}

impl Question {
    pub fn new(id: impl Into<String>) -> Self {
        Question {
            id: id.into(),
            solution: Vec::new(),
            contents: Vec::new(),
            choices: Choices::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.solution.is_empty() && self.contents.is_empty() && self.choices.is_empty()
    }
}
