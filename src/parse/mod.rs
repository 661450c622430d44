//! @acp:module "Parser"
//! @acp:summary "Doc-comment tag extraction and argument parsing"
//! @acp:domain annotations
//! @acp:layer service
//!
//! Splits a doc comment into tag lines and parses each tag's arguments.
//! A tag line is any line whose first character, once comment decoration is
//! stripped, is the tag sigil:
//!
//! ```text
//! /**
//!  * Free text is ignored.
//!  * @Positive(0.01, message: "too small")
//!  * @Ignore
//!  */
//! ```

pub mod arguments;

pub use arguments::{parse_arguments, ArgumentError, ConstantScope, ParsedArguments};

use std::sync::LazyLock;

use regex::Regex;

use crate::config::Config;
use crate::error::{NotesError, Result};
use crate::model::Tag;

/// Line breaks in any platform convention
static LINE_BREAK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\r\n|\n|\r").unwrap());

/// Leading word of a tag name, used to recognize documentation-only tags
/// Matches: `var` in `var string`, `param` in `param int $x`
static LEADING_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z_][\w-]*)").unwrap());

/// @acp:summary "Tag line split into name and raw argument text"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTag {
    /// Tag name as written
    pub name: String,
    /// Text between the first `(` and the last `)`, if any
    pub arguments: Option<String>,
    /// The whole line after the sigil, for error messages
    pub text: String,
}

/// @acp:summary "Extract tag lines from a doc comment, in source order"
pub fn extract_tags(doc: &str, sigil: char) -> Vec<RawTag> {
    LINE_BREAK
        .split(doc)
        .filter_map(|line| {
            let line = line
                .trim_start_matches(['*', ' ', '\t', '/'])
                .trim_end_matches([' ', '\t']);
            let body = line.strip_prefix(sigil)?.trim_start_matches(sigil);
            if body.is_empty() {
                return None;
            }
            Some(split_tag(body))
        })
        .collect()
}

fn split_tag(body: &str) -> RawTag {
    let open = body.find('(');
    let close = body.rfind(')');

    let (name, arguments) = match (open, close) {
        (Some(open), Some(close)) if close > open + 1 => (
            body[..open].trim_end(),
            Some(body[open + 1..close].to_string()),
        ),
        // `@Name()` names the tag `Name` with an empty argument list rather than
        // keeping `Name()` as an unresolvable name
        (Some(open), Some(close)) if close == open + 1 && body[close + 1..].trim().is_empty() => {
            (body[..open].trim_end(), Some(String::new()))
        }
        _ => (body, None),
    };

    RawTag {
        name: name.to_string(),
        arguments,
        text: body.to_string(),
    }
}

/// Location label of a declaration: `Entity` or `Entity::member`
pub fn location(entity: &str, member: Option<&str>) -> String {
    match member {
        Some(member) => format!("{}::{}", entity, member),
        None => entity.to_string(),
    }
}

/// @acp:summary "Extract and parse every tag of one declaration's doc comment"
///
/// Documentation-only tags (see [`Config::doc_tags`]) are kept as written without
/// parsing their arguments. Every other tag must have well-formed arguments;
/// the first malformed one fails the whole declaration.
pub fn parse_doc_comment(
    doc: &str,
    scope: &ConstantScope<'_>,
    location: &str,
    config: &Config,
) -> Result<Vec<Tag>> {
    let mut tags = Vec::new();

    for raw in extract_tags(doc, config.sigil) {
        // An imported name always wins over the documentation vocabulary
        let doc_only = LEADING_WORD
            .captures(&raw.name)
            .and_then(|caps| caps.get(1))
            .map(|word| {
                config.is_doc_tag(word.as_str()) && scope.imports.resolve(word.as_str()).is_none()
            })
            .unwrap_or(false);

        if doc_only {
            tags.push(Tag {
                name: raw.name,
                raw_arguments: raw.arguments,
                doc_only: true,
                ..Default::default()
            });
            continue;
        }

        if raw.arguments.is_none() && raw.name.contains(['(', ')']) {
            return Err(NotesError::Parse {
                location: location.to_string(),
                raw: raw.text,
                message: "unbalanced parentheses".to_string(),
            });
        }

        let arguments = match &raw.arguments {
            Some(text) => parse_arguments(text, scope).map_err(|err| match err {
                ArgumentError::Host(source) => {
                    NotesError::host(format!("resolving constants for '{}'", location), source)
                }
                other => NotesError::Parse {
                    location: location.to_string(),
                    raw: raw.text.clone(),
                    message: other.to_string(),
                },
            })?,
            None => ParsedArguments::default(),
        };

        tags.push(Tag {
            name: raw.name,
            raw_arguments: raw.arguments,
            arguments,
            ..Default::default()
        });
    }

    Ok(tags)
}
