//! @acp:module "Source Lexer"
//! @acp:summary "Tokenizer for the declaration header of a source file"
//! @acp:domain annotations
//! @acp:layer parser
//!
//! Produces just enough structure for import scanning: identifiers, namespace
//! separators and punctuation. Comments, string literals, heredocs and text outside
//! `<?php ... ?>` are consumed whole, so nothing inside them can look like an import.

/// A source token relevant to import scanning
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Identifier or keyword, as written
    Ident(String),
    /// `$name`
    Variable(String),
    /// `\`
    NsSeparator,
    /// `::`
    DoubleColon,
    /// `->` or `?->`
    Arrow,
    /// String, number or heredoc literal (content is not kept)
    Literal,
    /// `<?php`, `<?=` or `<?`
    OpenTag,
    /// `?>`
    CloseTag,
    /// Any other single character
    Punct(char),
}

/// @acp:summary "Iterator over the tokens of a source text"
pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    in_code: bool,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            in_code: false,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn starts_with(&self, text: &str) -> bool {
        text.chars()
            .enumerate()
            .all(|(i, c)| self.peek_at(i) == Some(c))
    }

    fn starts_with_ignore_case(&self, text: &str) -> bool {
        text.chars().enumerate().all(|(i, c)| {
            self.peek_at(i)
                .map(|actual| actual.eq_ignore_ascii_case(&c))
                .unwrap_or(false)
        })
    }

    /// Skip inline text up to the next open tag
    fn open_tag(&mut self) -> Option<Token> {
        while self.pos < self.chars.len() {
            if self.starts_with("<?") {
                self.pos += 2;
                if self.starts_with_ignore_case("php") {
                    self.pos += 3;
                } else if self.peek() == Some('=') {
                    self.pos += 1;
                }
                self.in_code = true;
                return Some(Token::OpenTag);
            }
            self.pos += 1;
        }
        None
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    /// Line comments end at a newline or right before `?>`
    fn skip_line_comment(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\n' || self.starts_with("?>") {
                break;
            }
            self.pos += 1;
        }
    }

    fn skip_block_comment(&mut self) {
        self.pos += 2;
        while self.pos < self.chars.len() {
            if self.starts_with("*/") {
                self.pos += 2;
                return;
            }
            self.pos += 1;
        }
    }

    fn skip_quoted(&mut self, quote: char) {
        self.pos += 1;
        while let Some(c) = self.peek() {
            self.pos += 1;
            if c == '\\' {
                self.pos += 1;
            } else if c == quote {
                return;
            }
        }
    }

    fn read_ident(&mut self) -> String {
        let start = self.pos;
        while self.peek().is_some_and(is_ident_char) {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    /// `<<<LABEL`, `<<<"LABEL"` or `<<<'LABEL'` up to the closing label
    fn skip_heredoc(&mut self) {
        self.pos += 3;
        while matches!(self.peek(), Some(' ') | Some('\t')) {
            self.pos += 1;
        }
        let quoted = matches!(self.peek(), Some('"') | Some('\''));
        if quoted {
            self.pos += 1;
        }
        let label = self.read_ident();
        if quoted {
            self.pos += 1;
        }
        if label.is_empty() {
            return;
        }

        // The closing label is the first line whose content starts with the label
        // and is not followed by another identifier character.
        loop {
            while let Some(c) = self.peek() {
                self.pos += 1;
                if c == '\n' {
                    break;
                }
            }
            if self.pos >= self.chars.len() {
                return;
            }
            while matches!(self.peek(), Some(' ') | Some('\t')) {
                self.pos += 1;
            }
            if self.starts_with(&label)
                && !self.peek_at(label.chars().count()).is_some_and(is_ident_char)
            {
                self.pos += label.chars().count();
                return;
            }
        }
    }

    fn skip_number(&mut self) {
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
        {
            self.pos += 1;
        }
    }
}

impl Iterator for Lexer {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        loop {
            if !self.in_code {
                return self.open_tag();
            }

            self.skip_whitespace();
            let c = self.peek()?;

            match c {
                '#' if self.peek_at(1) == Some('[') => {
                    self.pos += 1;
                    return Some(Token::Punct('#'));
                }
                '#' => self.skip_line_comment(),
                '/' if self.peek_at(1) == Some('/') => self.skip_line_comment(),
                '/' if self.peek_at(1) == Some('*') => self.skip_block_comment(),
                '?' if self.peek_at(1) == Some('>') => {
                    self.pos += 2;
                    self.in_code = false;
                    return Some(Token::CloseTag);
                }
                '?' if self.starts_with("?->") => {
                    self.pos += 3;
                    return Some(Token::Arrow);
                }
                '\'' | '"' | '`' => {
                    self.skip_quoted(c);
                    return Some(Token::Literal);
                }
                '<' if self.starts_with("<<<") => {
                    self.skip_heredoc();
                    return Some(Token::Literal);
                }
                '\\' => {
                    self.pos += 1;
                    return Some(Token::NsSeparator);
                }
                ':' if self.peek_at(1) == Some(':') => {
                    self.pos += 2;
                    return Some(Token::DoubleColon);
                }
                '-' if self.peek_at(1) == Some('>') => {
                    self.pos += 2;
                    return Some(Token::Arrow);
                }
                '$' if self.peek_at(1).is_some_and(is_ident_start) => {
                    self.pos += 1;
                    return Some(Token::Variable(self.read_ident()));
                }
                c if c.is_ascii_digit() => {
                    self.skip_number();
                    return Some(Token::Literal);
                }
                c if is_ident_start(c) => return Some(Token::Ident(self.read_ident())),
                c => {
                    self.pos += 1;
                    return Some(Token::Punct(c));
                }
            }
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || !c.is_ascii()
}

fn is_ident_char(c: char) -> bool {
    is_ident_start(c) || c.is_ascii_digit()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(source: &str) -> Vec<Token> {
        Lexer::new(source).collect()
    }

    fn ident(name: &str) -> Token {
        Token::Ident(name.to_string())
    }

    #[test]
    fn test_use_statement_tokens() {
        assert_eq!(
            tokens("<?php use App\\Order;"),
            vec![
                Token::OpenTag,
                ident("use"),
                ident("App"),
                Token::NsSeparator,
                ident("Order"),
                Token::Punct(';'),
            ]
        );
    }

    #[test]
    fn test_comments_and_strings_are_opaque() {
        let source = "<?php // use Fake\\One;\n/* use Fake\\Two; */ # use Fake\\Three;\n'use Fake\\Four;' \"x\\\"y\" Real";
        assert_eq!(
            tokens(source),
            vec![Token::OpenTag, Token::Literal, Token::Literal, ident("Real")]
        );
    }

    #[test]
    fn test_inline_html_is_skipped() {
        assert_eq!(
            tokens("use Html; <?php A ?> use More; <?= B"),
            vec![
                Token::OpenTag,
                ident("A"),
                Token::CloseTag,
                Token::OpenTag,
                ident("B"),
            ]
        );
    }

    #[test]
    fn test_heredoc_is_one_literal() {
        let source = "<?php $x = <<<EOT\nuse Fake\\Thing;\n  EOT;\nuse";
        assert_eq!(
            tokens(source),
            vec![
                Token::OpenTag,
                Token::Variable("x".to_string()),
                Token::Punct('='),
                Token::Literal,
                Token::Punct(';'),
                ident("use"),
            ]
        );
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            tokens("<?php Foo::class $a->b #[Attr]"),
            vec![
                Token::OpenTag,
                ident("Foo"),
                Token::DoubleColon,
                ident("class"),
                Token::Variable("a".to_string()),
                Token::Arrow,
                ident("b"),
                Token::Punct('#'),
                Token::Punct('['),
                ident("Attr"),
                Token::Punct(']'),
            ]
        );
    }
}
