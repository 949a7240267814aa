use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::warn;

/// A Notion block, reduced to the kinds that carry question content.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum Block {
    #[serde(rename = "heading_2")]
    Heading2 { heading_2: TextBody },
    #[serde(rename = "heading_3")]
    Heading3 { heading_3: TextBody },
    #[serde(rename = "image")]
    Image { image: ImageSource },
    #[serde(rename = "paragraph")]
    Paragraph { paragraph: TextBody },
    /// Any other block type, or a block whose payload could not be decoded.
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TextBody {
    #[serde(default, deserialize_with = "spans_or_unknown")]
    pub rich_text: Vec<RichText>,
}

impl TextBody {
    /// Concatenated plain text of every span. Empty when there are no spans.
    pub fn plain_text(&self) -> String {
        self.rich_text.iter().map(RichText::plain_text).collect()
    }
}

/// One inline rich-text span.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RichText {
    Text {
        text: TextSpan,
        #[serde(default)]
        plain_text: String,
    },
    Equation {
        equation: EquationSpan,
        #[serde(default)]
        plain_text: String,
    },
    Mention {
        #[serde(default)]
        plain_text: String,
    },
    #[serde(other)]
    Unknown,
}

impl RichText {
    pub fn plain_text(&self) -> &str {
        match self {
            RichText::Text { text, plain_text } if plain_text.is_empty() => text.content.as_str(),
            RichText::Equation {
                equation,
                plain_text,
            } if plain_text.is_empty() => equation.expression.as_str(),
            RichText::Text { plain_text, .. }
            | RichText::Equation { plain_text, .. }
            | RichText::Mention { plain_text } => plain_text.as_str(),
            RichText::Unknown => "",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TextSpan {
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EquationSpan {
    pub expression: String,
}

/// Where an image block's bytes live.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ImageSource {
    External { external: ExternalFile },
    File { file: HostedFile },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExternalFile {
    pub url: String,
}

/// A Notion-hosted file. The URL is pre-signed and stops working at `expiry_time`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HostedFile {
    pub url: String,
    #[serde(default)]
    pub expiry_time: Option<DateTime<Utc>>,
}

impl ImageSource {
    pub fn url(&self) -> &str {
        match self {
            ImageSource::External { external } => &external.url,
            ImageSource::File { file } => &file.url,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self {
            ImageSource::External { .. } => false,
            ImageSource::File { file } => file.expiry_time.is_some_and(|t| t <= now),
        }
    }
}

/// Decode each span on its own so one bad span does not take the block with it.
fn spans_or_unknown<'de, D>(deserializer: D) -> Result<Vec<RichText>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<Value>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .enumerate()
        .map(|(i, value)| {
            serde_json::from_value(value).unwrap_or_else(|e| {
                warn!(span = i, error = %e, "Malformed rich text span, skipping");
                RichText::Unknown
            })
        })
        .collect())
}

/// Decode raw block objects one by one. A block that does not decode is kept as
/// `Unsupported` so that position-dependent classification is unaffected.
pub fn decode_blocks(raw: Vec<Value>) -> Vec<Block> {
    raw.into_iter()
        .enumerate()
        .map(|(i, value)| match serde_json::from_value::<Block>(value) {
            Ok(block) => block,
            Err(e) => {
                warn!(index = i, error = %e, "Malformed block, ignoring");
                Block::Unsupported
            }
        })
        .collect()
}

/// Parse a saved block listing: either a Notion list envelope (`{"results": [...]}`)
/// or a bare JSON array of blocks.
pub fn parse_block_list(json: &str) -> serde_json::Result<Vec<Block>> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Listing {
        Envelope { results: Vec<Value> },
        Bare(Vec<Value>),
    }

    let raw = match serde_json::from_str::<Listing>(json)? {
        Listing::Envelope { results } => results,
        Listing::Bare(values) => values,
    };
    Ok(decode_blocks(raw))
}

#[cfg(test)]
impl Block {
    pub fn h2(text: &str) -> Self {
        Block::Heading2 {
            heading_2: TextBody {
                rich_text: vec![RichText::text(text)],
            },
        }
    }

    pub fn h3(text: &str) -> Self {
        Block::Heading3 {
            heading_3: TextBody {
                rich_text: vec![RichText::text(text)],
            },
        }
    }

    pub fn para(text: &str) -> Self {
        Block::para_spans(vec![RichText::text(text)])
    }

    pub fn para_spans(rich_text: Vec<RichText>) -> Self {
        Block::Paragraph {
            paragraph: TextBody { rich_text },
        }
    }

    pub fn external_image(url: &str) -> Self {
        Block::Image {
            image: ImageSource::External {
                external: ExternalFile {
                    url: url.to_string(),
                },
            },
        }
    }
}

#[cfg(test)]
impl RichText {
    pub fn text(content: &str) -> Self {
        RichText::Text {
            text: TextSpan {
                content: content.to_string(),
            },
            plain_text: content.to_string(),
        }
    }

    pub fn equation(expression: &str) -> Self {
        RichText::Equation {
            equation: EquationSpan {
                expression: expression.to_string(),
            },
            plain_text: expression.to_string(),
        }
    }
}
