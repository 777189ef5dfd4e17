//! # IOBES Tags for Named Entity Recognition
//!
//! Defines the tag set used by the training corpora. Every tag other than
//! `O` carries an entity type (`Chemical`, `Disease`, ...), which is kept as
//! an open string because each corpus brings its own label inventory.

use std::fmt;
use std::str::FromStr;

use crate::error::LaunchError;

/// IOBES tag for one token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tag {
    /// First token of a multi-token span.
    Begin(String),
    /// Interior token of a multi-token span.
    Inside(String),
    /// Last token of a multi-token span.
    End(String),
    /// A span made of exactly one token.
    Single(String),
    /// Token outside any entity.
    Outside,
}

impl Tag {
    /// Parse a tag label such as `B-Chemical`, `S-Disease` or `O`.
    pub fn parse(label: &str) -> Result<Self, LaunchError> {
        if label == "O" {
            return Ok(Tag::Outside);
        }

        let (prefix, entity) = label
            .split_once('-')
            .ok_or_else(|| LaunchError::InvalidTag(label.to_string()))?;
        if entity.is_empty() {
            return Err(LaunchError::InvalidTag(label.to_string()));
        }

        let entity = entity.to_string();
        match prefix {
            "B" => Ok(Tag::Begin(entity)),
            "I" => Ok(Tag::Inside(entity)),
            "E" => Ok(Tag::End(entity)),
            "S" => Ok(Tag::Single(entity)),
            _ => Err(LaunchError::InvalidTag(label.to_string())),
        }
    }

    /// Get the entity type for this tag.
    pub fn entity_type(&self) -> Option<&str> {
        match self {
            Tag::Begin(e) | Tag::Inside(e) | Tag::End(e) | Tag::Single(e) => Some(e),
            Tag::Outside => None,
        }
    }

    /// Check if this is a "Begin" tag.
    pub fn is_begin(&self) -> bool {
        matches!(self, Tag::Begin(_))
    }

    /// Check if this is an "Inside" tag.
    pub fn is_inside(&self) -> bool {
        matches!(self, Tag::Inside(_))
    }

    /// A tag after which the current span is still open.
    fn is_open(&self) -> bool {
        matches!(self, Tag::Begin(_) | Tag::Inside(_))
    }

    /// Check if transitioning from `from` tag to `to` tag is valid.
    ///
    /// Sentence boundaries are modelled as `Outside`, so the first tag of a
    /// sentence is checked with `from = Outside` and the last one with
    /// `to = Outside`.
    pub fn is_valid_transition(from: &Tag, to: &Tag) -> bool {
        if from.is_open() {
            // An open span must continue with I-x or E-x of the same type.
            return match to {
                Tag::Inside(e) | Tag::End(e) => Some(e.as_str()) == from.entity_type(),
                _ => false,
            };
        }
        // I-* and E-* need an open span of their own type.
        !matches!(to, Tag::Inside(_) | Tag::End(_))
    }
}

impl FromStr for Tag {
    type Err = LaunchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tag::parse(s)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tag::Begin(e) => write!(f, "B-{e}"),
            Tag::Inside(e) => write!(f, "I-{e}"),
            Tag::End(e) => write!(f, "E-{e}"),
            Tag::Single(e) => write!(f, "S-{e}"),
            Tag::Outside => write!(f, "O"),
        }
    }
}

/// An extracted entity span with token indices (`end` exclusive).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub entity_type: String,
    pub start: usize,
    pub end: usize,
}

/// Count transitions in `tags` that break the IOBES rules, including an
/// open span at the end of the sequence.
pub fn count_invalid_transitions(tags: &[Tag]) -> usize {
    let mut prev = &Tag::Outside;
    let mut invalid = 0;
    for tag in tags {
        if !Tag::is_valid_transition(prev, tag) {
            invalid += 1;
        }
        prev = tag;
    }
    if !Tag::is_valid_transition(prev, &Tag::Outside) {
        invalid += 1;
    }
    invalid
}

/// Extract entity spans from a tag sequence.
///
/// Lenient about malformed input: a stray `I-x` opens a new span, a stray
/// `E-x` becomes a one-token span and spans left open are dropped.
pub fn spans(tags: &[Tag]) -> Vec<Span> {
    let mut out = Vec::new();
    let mut open: Option<(&str, usize)> = None;

    for (i, tag) in tags.iter().enumerate() {
        match tag {
            Tag::Outside => open = None,
            Tag::Single(e) => {
                open = None;
                out.push(Span {
                    entity_type: e.clone(),
                    start: i,
                    end: i + 1,
                });
            }
            Tag::Begin(e) => open = Some((e.as_str(), i)),
            Tag::Inside(e) => {
                if !matches!(open, Some((t, _)) if t == e.as_str()) {
                    open = Some((e.as_str(), i));
                }
            }
            Tag::End(e) => {
                let start = match open {
                    Some((t, s)) if t == e.as_str() => s,
                    _ => i,
                };
                open = None;
                out.push(Span {
                    entity_type: e.clone(),
                    start,
                    end: i + 1,
                });
            }
        }
    }

    out
}

/// Convert an IOB (BIO, either IOB1 or IOB2) tag sequence to IOBES.
///
/// Sequences that already use `E-`/`S-` come back unchanged.
pub fn iob_to_iobes(tags: &[Tag]) -> Vec<Tag> {
    let mut out = Vec::with_capacity(tags.len());

    for (i, tag) in tags.iter().enumerate() {
        let entity = match tag {
            Tag::Begin(e) | Tag::Inside(e) => e,
            other => {
                out.push(other.clone());
                continue;
            }
        };

        let continues_prev = tag.is_inside()
            && i > 0
            && tags[i - 1].is_open()
            && tags[i - 1].entity_type() == Some(entity.as_str());
        let continues_next = matches!(
            tags.get(i + 1),
            Some(Tag::Inside(e)) | Some(Tag::End(e)) if e == entity
        );

        let converted = match (continues_prev, continues_next) {
            (false, true) => Tag::Begin(entity.clone()),
            (false, false) => Tag::Single(entity.clone()),
            (true, true) => Tag::Inside(entity.clone()),
            (true, false) => Tag::End(entity.clone()),
        };
        out.push(converted);
    }

    out
}
