//! @acp:module "Argument Parser"
//! @acp:summary "Recursive-descent parser for annotation argument lists"
//! @acp:domain annotations
//! @acp:layer parser
//!
//! Argument text is parsed over a closed grammar: literals, collections and
//! references to constants. Nothing is ever evaluated. Constant references are
//! resolved through the declaring entity's imports and namespace, and their values
//! are asked from the host's [`ConstantResolver`].
//!
//! ```text
//! arguments := [ entry { "," entry } [ "," ] ]
//! entry     := ident (":" | "=>") value
//!            | string ":" value
//!            | value [ "=>" value ]
//! value     := int | float | string | true | false | null
//!            | ("-" | "+") number
//!            | "[" entries "]" | "array" "(" entries ")" | "{" entries "}"
//!            | name [ "::" ident ]
//! name      := [ "\" ] ident { "\" ident }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use thiserror::Error;

use crate::host::ConstantResolver;
use crate::imports::{normalize_name, ImportTable};

/// @acp:summary "Positional and named values parsed from one tag"
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedArguments {
    /// Values with an ordinal key, in ascending key order
    pub positional: Vec<Value>,
    /// Values with an explicit identifier key
    pub named: BTreeMap<String, Value>,
}

impl ParsedArguments {
    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }

    pub fn len(&self) -> usize {
        self.positional.len() + self.named.len()
    }
}

/// Failure while parsing argument text
#[derive(Debug, Error)]
pub enum ArgumentError {
    #[error("unexpected character `{ch}` at offset {offset}")]
    UnexpectedChar { ch: char, offset: usize },

    #[error("unterminated string literal starting at offset {0}")]
    UnterminatedString(usize),

    #[error("invalid number `{0}`")]
    InvalidNumber(String),

    #[error("unexpected {found} at offset {offset}, expected {expected}")]
    Unexpected {
        found: String,
        offset: usize,
        expected: &'static str,
    },

    #[error("unexpected end of input, expected {0}")]
    UnexpectedEnd(&'static str),

    #[error("illegal key {0}")]
    IllegalKey(String),

    #[error("undefined constant `{0}`")]
    UndefinedConstant(String),

    #[error("cannot use `{0}` outside of a class scope")]
    NoClassScope(String),

    #[error("collections nested deeper than {0} levels")]
    TooDeep(usize),

    #[error(transparent)]
    Host(#[from] anyhow::Error),
}

/// @acp:summary "Name resolution context of the declaration a tag belongs to"
#[derive(Clone, Copy)]
pub struct ConstantScope<'a> {
    /// Fully-qualified name of the declaring entity
    pub entity: &'a str,
    /// Supertype of the declaring entity, for `parent::` references
    pub parent: Option<&'a str>,
    pub namespace: &'a str,
    pub imports: &'a ImportTable,
    pub constants: &'a dyn ConstantResolver,
}

impl<'a> ConstantScope<'a> {
    /// Resolve a class name the way the declaring source would see it
    pub fn resolve_class(&self, name: &str) -> Result<String, ArgumentError> {
        if let Some(absolute) = name.strip_prefix('\\') {
            return Ok(absolute.to_string());
        }

        let (first, rest) = match name.split_once('\\') {
            Some((first, rest)) => (first, Some(rest)),
            None => (name, None),
        };

        if rest.is_none() {
            match first.to_ascii_lowercase().as_str() {
                "self" | "static" => return Ok(normalize_name(self.entity).to_string()),
                "parent" => {
                    return self
                        .parent
                        .map(|parent| normalize_name(parent).to_string())
                        .ok_or_else(|| ArgumentError::NoClassScope(name.to_string()))
                }
                _ => {}
            }
        }

        let base = match self.imports.resolve(first) {
            Some(imported) => imported.to_string(),
            None if self.namespace.is_empty() => first.to_string(),
            None => format!("{}\\{}", self.namespace, first),
        };

        Ok(match rest {
            Some(rest) => format!("{}\\{}", base, rest),
            None => base,
        })
    }

    /// Look up a free-standing constant: namespaced first, then global
    fn constant(&self, name: &str) -> Result<Value, ArgumentError> {
        let candidates = if let Some(absolute) = name.strip_prefix('\\') {
            vec![absolute.to_string()]
        } else if name.contains('\\') {
            vec![self.resolve_class(name)?]
        } else if self.namespace.is_empty() {
            vec![name.to_string()]
        } else {
            vec![format!("{}\\{}", self.namespace, name), name.to_string()]
        };

        for candidate in &candidates {
            if let Some(value) = self.constants.constant(candidate)? {
                return Ok(value);
            }
        }
        Err(ArgumentError::UndefinedConstant(name.to_string()))
    }

    fn class_constant(&self, class: &str, member: &str) -> Result<Value, ArgumentError> {
        let class = self.resolve_class(class)?;
        if member.eq_ignore_ascii_case("class") {
            return Ok(Value::String(class));
        }
        self.constants
            .class_constant(&class, member)?
            .ok_or_else(|| ArgumentError::UndefinedConstant(format!("{}::{}", class, member)))
    }
}

/// @acp:summary "Parse raw argument text into positional and named values"
pub fn parse_arguments(
    text: &str,
    scope: &ConstantScope<'_>,
) -> Result<ParsedArguments, ArgumentError> {
    if text.trim().is_empty() {
        return Ok(ParsedArguments::default());
    }

    let tokens = tokenize(text)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
        scope,
    };

    let entries = parser.entries(None)?;
    if let Some(spanned) = parser.peek_spanned() {
        return Err(ArgumentError::Unexpected {
            found: spanned.token.describe(),
            offset: spanned.offset,
            expected: "`,` or end of input",
        });
    }

    let mut ordinals: Vec<(i64, Value)> = Vec::new();
    let mut named = BTreeMap::new();
    for (key, value) in entries {
        match key {
            Key::Index(index) => ordinals.push((index, value)),
            Key::Name(name) => {
                named.insert(name, value);
            }
        }
    }
    ordinals.sort_by_key(|(index, _)| *index);

    Ok(ParsedArguments {
        positional: ordinals.into_iter().map(|(_, value)| value).collect(),
        named,
    })
}

// ============================================================================
// Tokens
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum ArgToken {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    Backslash,
    DoubleColon,
    Colon,
    FatArrow,
    Comma,
    Minus,
    Plus,
    LBracket,
    RBracket,
    LParen,
    RParen,
    LBrace,
    RBrace,
}

impl ArgToken {
    fn describe(&self) -> String {
        match self {
            ArgToken::Int(i) => format!("integer `{}`", i),
            ArgToken::Float(f) => format!("float `{}`", f),
            ArgToken::Str(s) => format!("string \"{}\"", s),
            ArgToken::Ident(name) => format!("identifier `{}`", name),
            ArgToken::Backslash => "`\\`".to_string(),
            ArgToken::DoubleColon => "`::`".to_string(),
            ArgToken::Colon => "`:`".to_string(),
            ArgToken::FatArrow => "`=>`".to_string(),
            ArgToken::Comma => "`,`".to_string(),
            ArgToken::Minus => "`-`".to_string(),
            ArgToken::Plus => "`+`".to_string(),
            ArgToken::LBracket => "`[`".to_string(),
            ArgToken::RBracket => "`]`".to_string(),
            ArgToken::LParen => "`(`".to_string(),
            ArgToken::RParen => "`)`".to_string(),
            ArgToken::LBrace => "`{`".to_string(),
            ArgToken::RBrace => "`}`".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct Spanned {
    token: ArgToken,
    offset: usize,
}

fn tokenize(text: &str) -> Result<Vec<Spanned>, ArgumentError> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < chars.len() {
        let c = chars[pos];
        let offset = pos;
        let next = chars.get(pos + 1).copied();

        let token = match c {
            c if c.is_whitespace() => {
                pos += 1;
                continue;
            }
            '\'' | '"' => {
                let (value, end) = read_string(&chars, pos)?;
                pos = end;
                ArgToken::Str(value)
            }
            c if c.is_ascii_digit() || (c == '.' && next.is_some_and(|n| n.is_ascii_digit())) => {
                let (token, end) = read_number(&chars, pos)?;
                pos = end;
                token
            }
            c if c.is_alphabetic() || c == '_' || !c.is_ascii() => {
                let start = pos;
                while pos < chars.len()
                    && (chars[pos].is_alphanumeric() || chars[pos] == '_' || !chars[pos].is_ascii())
                {
                    pos += 1;
                }
                ArgToken::Ident(chars[start..pos].iter().collect())
            }
            ':' if next == Some(':') => {
                pos += 2;
                ArgToken::DoubleColon
            }
            '=' if next == Some('>') => {
                pos += 2;
                ArgToken::FatArrow
            }
            _ => {
                pos += 1;
                match c {
                    '\\' => ArgToken::Backslash,
                    ':' => ArgToken::Colon,
                    ',' => ArgToken::Comma,
                    '-' => ArgToken::Minus,
                    '+' => ArgToken::Plus,
                    '[' => ArgToken::LBracket,
                    ']' => ArgToken::RBracket,
                    '(' => ArgToken::LParen,
                    ')' => ArgToken::RParen,
                    '{' => ArgToken::LBrace,
                    '}' => ArgToken::RBrace,
                    ch => return Err(ArgumentError::UnexpectedChar { ch, offset }),
                }
            }
        };
        tokens.push(Spanned { token, offset });
    }

    Ok(tokens)
}

fn read_string(chars: &[char], start: usize) -> Result<(String, usize), ArgumentError> {
    let quote = chars[start];
    let mut value = String::new();
    let mut pos = start + 1;

    while pos < chars.len() {
        let c = chars[pos];
        if c == quote {
            return Ok((value, pos + 1));
        }
        if c != '\\' || pos + 1 >= chars.len() {
            value.push(c);
            pos += 1;
            continue;
        }

        let escaped = chars[pos + 1];
        pos += 2;
        if quote == '\'' {
            // Single quotes only know \' and \\
            if escaped != '\'' && escaped != '\\' {
                value.push('\\');
            }
            value.push(escaped);
            continue;
        }

        match escaped {
            'n' => value.push('\n'),
            't' => value.push('\t'),
            'r' => value.push('\r'),
            'v' => value.push('\u{0B}'),
            'e' => value.push('\u{1B}'),
            'f' => value.push('\u{0C}'),
            '\\' | '"' | '$' => value.push(escaped),
            'u' if chars.get(pos) == Some(&'{') => {
                let close = chars[pos..]
                    .iter()
                    .position(|&c| c == '}')
                    .map(|idx| pos + idx);
                let decoded = close.and_then(|close| {
                    let hex: String = chars[pos + 1..close].iter().collect();
                    u32::from_str_radix(&hex, 16)
                        .ok()
                        .and_then(char::from_u32)
                        .map(|ch| (ch, close))
                });
                match decoded {
                    Some((ch, close)) => {
                        value.push(ch);
                        pos = close + 1;
                    }
                    None => {
                        value.push('\\');
                        value.push('u');
                    }
                }
            }
            'x' if chars.get(pos).is_some_and(|c| c.is_ascii_hexdigit()) => {
                let mut end = pos;
                while end < chars.len() && end < pos + 2 && chars[end].is_ascii_hexdigit() {
                    end += 1;
                }
                let hex: String = chars[pos..end].iter().collect();
                // At most two hex digits, always a valid scalar
                if let Some(ch) = u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    value.push(ch);
                }
                pos = end;
            }
            '0'..='7' => {
                let mut end = pos;
                while end < chars.len() && end < pos + 2 && ('0'..='7').contains(&chars[end]) {
                    end += 1;
                }
                let octal: String = std::iter::once(escaped)
                    .chain(chars[pos..end].iter().copied())
                    .collect();
                if let Some(ch) = u32::from_str_radix(&octal, 8).ok().and_then(char::from_u32) {
                    value.push(ch);
                }
                pos = end;
            }
            other => {
                value.push('\\');
                value.push(other);
            }
        }
    }

    Err(ArgumentError::UnterminatedString(start))
}

fn read_number(chars: &[char], start: usize) -> Result<(ArgToken, usize), ArgumentError> {
    let radix_prefix = match (chars.get(start), chars.get(start + 1)) {
        (Some('0'), Some('x' | 'X')) => Some(16),
        (Some('0'), Some('b' | 'B')) => Some(2),
        (Some('0'), Some('o' | 'O')) => Some(8),
        _ => None,
    };

    if let Some(radix) = radix_prefix {
        let mut pos = start + 2;
        while pos < chars.len() && (chars[pos].is_ascii_alphanumeric() || chars[pos] == '_') {
            pos += 1;
        }
        let raw: String = chars[start..pos].iter().collect();
        let digits: String = chars[start + 2..pos].iter().filter(|&&c| c != '_').collect();
        let value =
            i64::from_str_radix(&digits, radix).map_err(|_| ArgumentError::InvalidNumber(raw))?;
        return Ok((ArgToken::Int(value), pos));
    }

    let mut pos = start;
    let mut is_float = false;
    let digits = |pos: &mut usize| {
        while *pos < chars.len() && (chars[*pos].is_ascii_digit() || chars[*pos] == '_') {
            *pos += 1;
        }
    };

    digits(&mut pos);
    if chars.get(pos) == Some(&'.') && chars.get(pos + 1).is_some_and(|c| c.is_ascii_digit()) {
        is_float = true;
        pos += 1;
        digits(&mut pos);
    }
    if matches!(chars.get(pos), Some('e' | 'E')) {
        let sign = usize::from(matches!(chars.get(pos + 1), Some('+' | '-')));
        if chars.get(pos + 1 + sign).is_some_and(|c| c.is_ascii_digit()) {
            is_float = true;
            pos += 1 + sign;
            digits(&mut pos);
        }
    }
    if chars.get(pos).is_some_and(|c| c.is_alphanumeric() || *c == '_') {
        let mut end = pos;
        while end < chars.len() && (chars[end].is_alphanumeric() || chars[end] == '_') {
            end += 1;
        }
        return Err(ArgumentError::InvalidNumber(chars[start..end].iter().collect()));
    }

    let raw: String = chars[start..pos].iter().collect();
    let cleaned: String = raw.chars().filter(|&c| c != '_').collect();

    let token = if is_float {
        ArgToken::Float(
            cleaned
                .parse::<f64>()
                .map_err(|_| ArgumentError::InvalidNumber(raw.clone()))?,
        )
    } else if cleaned.len() > 1 && cleaned.starts_with('0') {
        ArgToken::Int(
            i64::from_str_radix(&cleaned[1..], 8)
                .map_err(|_| ArgumentError::InvalidNumber(raw.clone()))?,
        )
    } else {
        match cleaned.parse::<i64>() {
            Ok(value) => ArgToken::Int(value),
            // Integers past i64 become floats, as in the source language
            Err(_) => ArgToken::Float(
                cleaned
                    .parse::<f64>()
                    .map_err(|_| ArgumentError::InvalidNumber(raw.clone()))?,
            ),
        }
    };

    Ok((token, pos))
}

// ============================================================================
// Parser
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Key {
    Index(i64),
    Name(String),
}

impl Key {
    fn from_value(value: Value) -> Result<Key, ArgumentError> {
        match value {
            Value::Number(number) => number
                .as_i64()
                .map(Key::Index)
                .ok_or_else(|| ArgumentError::IllegalKey(number.to_string())),
            Value::Bool(flag) => Ok(Key::Index(i64::from(flag))),
            Value::String(text) => Ok(Key::from_string(text)),
            other => Err(ArgumentError::IllegalKey(other.to_string())),
        }
    }

    /// Canonical decimal strings are ordinal keys
    fn from_string(text: String) -> Key {
        match text.parse::<i64>() {
            Ok(index) if index.to_string() == text => Key::Index(index),
            _ => Key::Name(text),
        }
    }

    fn into_string(self) -> String {
        match self {
            Key::Index(index) => index.to_string(),
            Key::Name(name) => name,
        }
    }
}

/// Deepest collection nesting accepted in one argument list
pub const MAX_NESTING: usize = 64;

struct Parser<'s, 'a> {
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
    scope: &'s ConstantScope<'a>,
}

impl Parser<'_, '_> {
    fn peek_spanned(&self) -> Option<&Spanned> {
        self.tokens.get(self.pos)
    }

    fn peek(&self) -> Option<&ArgToken> {
        self.tokens.get(self.pos).map(|spanned| &spanned.token)
    }

    fn peek_at(&self, offset: usize) -> Option<&ArgToken> {
        self.tokens.get(self.pos + offset).map(|spanned| &spanned.token)
    }

    fn advance(&mut self) -> Option<ArgToken> {
        let token = self.tokens.get(self.pos).map(|spanned| spanned.token.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn unexpected(&self, expected: &'static str) -> ArgumentError {
        match self.peek_spanned() {
            Some(spanned) => ArgumentError::Unexpected {
                found: spanned.token.describe(),
                offset: spanned.offset,
                expected,
            },
            None => ArgumentError::UnexpectedEnd(expected),
        }
    }

    fn expect(&mut self, token: ArgToken, expected: &'static str) -> Result<(), ArgumentError> {
        if self.peek() == Some(&token) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.unexpected(expected))
        }
    }

    /// Entries up to `close` (or end of input at the top level)
    ///
    /// Keys follow ordinal semantics: an entry without a key takes the next index
    /// after the largest integer key seen so far; repeating a key replaces the
    /// earlier value in place.
    fn entries(&mut self, close: Option<ArgToken>) -> Result<Vec<(Key, Value)>, ArgumentError> {
        let closing: &'static str = match close {
            Some(ArgToken::RBracket) => "`,` or `]`",
            Some(ArgToken::RParen) => "`,` or `)`",
            Some(ArgToken::RBrace) => "`,` or `}`",
            _ => "`,` or end of input",
        };

        if close.is_some() {
            self.depth += 1;
            if self.depth > MAX_NESTING {
                return Err(ArgumentError::TooDeep(MAX_NESTING));
            }
        }

        let mut entries: Vec<(Key, Value)> = Vec::new();
        let mut next_index: i64 = 0;

        loop {
            if self.peek() == close.as_ref() {
                break;
            }

            let (key, value) = self.entry()?;
            let key = match key {
                Some(key) => key,
                None => Key::Index(next_index),
            };
            if let Key::Index(index) = key {
                next_index = next_index.max(index.saturating_add(1));
            }

            match entries.iter_mut().find(|(existing, _)| *existing == key) {
                Some(slot) => slot.1 = value,
                None => entries.push((key, value)),
            }

            match self.peek() {
                Some(ArgToken::Comma) => {
                    self.pos += 1;
                }
                token if token == close.as_ref() => break,
                _ => return Err(self.unexpected(closing)),
            }
        }

        if let Some(close) = close {
            self.expect(close, closing)?;
            self.depth -= 1;
        }
        Ok(entries)
    }

    fn entry(&mut self) -> Result<(Option<Key>, Value), ArgumentError> {
        let named_by_ident = matches!(
            (self.peek(), self.peek_at(1)),
            (Some(ArgToken::Ident(_)), Some(ArgToken::Colon | ArgToken::FatArrow))
        );
        let named_by_string = matches!(
            (self.peek(), self.peek_at(1)),
            (Some(ArgToken::Str(_)), Some(ArgToken::Colon))
        );

        if named_by_ident || named_by_string {
            let key = match self.advance() {
                Some(ArgToken::Ident(name)) => Key::Name(name),
                Some(ArgToken::Str(text)) => Key::from_string(text),
                _ => return Err(self.unexpected("a key")),
            };
            self.pos += 1;
            let value = self.value()?;
            return Ok((Some(key), value));
        }

        let value = self.value()?;
        if self.peek() == Some(&ArgToken::FatArrow) {
            self.pos += 1;
            let key = Key::from_value(value)?;
            let value = self.value()?;
            return Ok((Some(key), value));
        }
        Ok((None, value))
    }

    fn value(&mut self) -> Result<Value, ArgumentError> {
        let Some(token) = self.advance() else {
            return Err(ArgumentError::UnexpectedEnd("a value"));
        };

        match token {
            ArgToken::Int(value) => Ok(Value::from(value)),
            ArgToken::Float(value) => float(value),
            ArgToken::Str(text) => Ok(Value::String(text)),
            ArgToken::Minus => self.signed(true),
            ArgToken::Plus => self.signed(false),
            ArgToken::LBracket => {
                let entries = self.entries(Some(ArgToken::RBracket))?;
                Ok(collection(entries))
            }
            ArgToken::LBrace => {
                let entries = self.entries(Some(ArgToken::RBrace))?;
                Ok(Value::Object(
                    entries
                        .into_iter()
                        .map(|(key, value)| (key.into_string(), value))
                        .collect::<Map<String, Value>>(),
                ))
            }
            ArgToken::Ident(word) if self.peek() == Some(&ArgToken::LParen)
                && word.eq_ignore_ascii_case("array") =>
            {
                self.pos += 1;
                let entries = self.entries(Some(ArgToken::RParen))?;
                Ok(collection(entries))
            }
            ArgToken::Ident(word) => self.reference(word, false),
            ArgToken::Backslash => match self.advance() {
                Some(ArgToken::Ident(word)) => self.reference(word, true),
                _ => {
                    self.pos = self.pos.saturating_sub(1);
                    Err(self.unexpected("a name after `\\`"))
                }
            },
            _ => {
                self.pos -= 1;
                Err(self.unexpected("a value"))
            }
        }
    }

    fn signed(&mut self, negative: bool) -> Result<Value, ArgumentError> {
        match self.peek().cloned() {
            Some(ArgToken::Int(value)) => {
                self.pos += 1;
                Ok(Value::from(if negative { -value } else { value }))
            }
            Some(ArgToken::Float(value)) => {
                self.pos += 1;
                float(if negative { -value } else { value })
            }
            _ => Err(self.unexpected("a number")),
        }
    }

    /// Literal keyword, constant, class constant or `::class` reference
    fn reference(&mut self, first: String, absolute: bool) -> Result<Value, ArgumentError> {
        let mut name = if absolute {
            format!("\\{}", first)
        } else {
            first
        };
        let qualified = matches!(self.peek(), Some(ArgToken::Backslash | ArgToken::DoubleColon));

        if !absolute && !qualified {
            match name.to_ascii_lowercase().as_str() {
                "true" => return Ok(Value::Bool(true)),
                "false" => return Ok(Value::Bool(false)),
                "null" => return Ok(Value::Null),
                _ => {}
            }
        }

        while self.peek() == Some(&ArgToken::Backslash) {
            self.pos += 1;
            match self.advance() {
                Some(ArgToken::Ident(segment)) => {
                    name.push('\\');
                    name.push_str(&segment);
                }
                _ => {
                    self.pos = self.pos.saturating_sub(1);
                    return Err(self.unexpected("a name segment"));
                }
            }
        }

        if self.peek() == Some(&ArgToken::DoubleColon) {
            self.pos += 1;
            return match self.advance() {
                Some(ArgToken::Ident(member)) => self.scope.class_constant(&name, &member),
                _ => {
                    self.pos = self.pos.saturating_sub(1);
                    Err(self.unexpected("a constant name after `::`"))
                }
            };
        }

        self.scope.constant(&name)
    }
}

fn float(value: f64) -> Result<Value, ArgumentError> {
    Number::from_f64(value)
        .map(Value::Number)
        .ok_or_else(|| ArgumentError::InvalidNumber(value.to_string()))
}

/// A collection keyed exactly `0..n` is a list; anything else is a map
fn collection(entries: Vec<(Key, Value)>) -> Value {
    let is_list = entries
        .iter()
        .enumerate()
        .all(|(idx, (key, _))| *key == Key::Index(idx as i64));

    if is_list {
        Value::Array(entries.into_iter().map(|(_, value)| value).collect())
    } else {
        Value::Object(
            entries
                .into_iter()
                .map(|(key, value)| (key.into_string(), value))
                .collect(),
        )
    }
}
