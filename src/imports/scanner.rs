//! @acp:module "Import Scanner"
//! @acp:summary "State machine collecting use statements from a token stream"
//! @acp:domain annotations
//! @acp:layer parser

use super::lexer::{Lexer, Token};
use super::ImportTable;

/// Keywords that open the declaration body; imports never follow them
const DECLARATION_KEYWORDS: &[&str] = &["class", "trait", "interface", "enum"];

/// Progress through one `use` statement
#[derive(Debug, Default)]
struct Statement {
    /// `use function` / `use const` imports are not type aliases
    skip: bool,
    /// Path before `{` in a group import
    group: Option<Vec<String>>,
    /// Segments of the entry being read
    segments: Vec<String>,
    alias: Option<String>,
    expect_alias: bool,
    after_separator: bool,
}

impl Statement {
    /// Record the entry read so far and reset the per-entry state
    fn flush(&mut self, table: &mut ImportTable) {
        if !self.segments.is_empty() {
            let mut path = self.group.clone().unwrap_or_default();
            path.append(&mut self.segments);

            let alias = match self.alias.take() {
                Some(alias) => alias,
                None => path.last().cloned().unwrap_or_default(),
            };
            let name = path.join("\\");
            tracing::trace!("import {} as {}", name, alias);
            table.insert(name, alias);
        }

        self.segments.clear();
        self.alias = None;
        self.expect_alias = false;
        self.after_separator = false;
    }
}

/// @acp:summary "Build the import table declared in a source text"
///
/// Reads every `use` statement up to the first type declaration. Supports renamed
/// imports (`use A\B\C as D;`), lists (`use A, B;`) and groups
/// (`use A\B\{C, D as E};`).
pub fn scan_imports(source: &str) -> ImportTable {
    let mut table = ImportTable::new();
    let mut statement: Option<Statement> = None;
    let mut previous: Option<Token> = None;

    for token in Lexer::new(source) {
        match statement.as_mut() {
            None => {
                if let Token::Ident(word) = &token {
                    if is_declaration(word, previous.as_ref()) {
                        break;
                    }
                    if word.eq_ignore_ascii_case("use") {
                        statement = Some(Statement::default());
                    }
                }
            }
            Some(current) if current.skip => {
                if matches!(token, Token::Punct(';') | Token::CloseTag) {
                    statement = None;
                }
            }
            Some(current) => match &token {
                Token::Ident(word)
                    if current.segments.is_empty()
                        && current.group.is_none()
                        && !current.after_separator
                        && (word.eq_ignore_ascii_case("function")
                            || word.eq_ignore_ascii_case("const")) =>
                {
                    current.skip = true;
                }
                Token::Ident(word)
                    if word.eq_ignore_ascii_case("as") && !current.expect_alias =>
                {
                    current.expect_alias = true;
                }
                Token::Ident(word) => {
                    if current.expect_alias {
                        current.alias = Some(word.clone());
                        current.expect_alias = false;
                    } else {
                        current.segments.push(word.clone());
                    }
                    current.after_separator = false;
                }
                Token::NsSeparator => current.after_separator = true,
                Token::Punct('{') if current.after_separator && current.group.is_none() => {
                    current.group = Some(std::mem::take(&mut current.segments));
                    current.after_separator = false;
                }
                Token::Punct(',') => current.flush(&mut table),
                Token::Punct('}') if current.group.is_some() => {
                    current.flush(&mut table);
                    current.group = None;
                }
                Token::Punct(';') | Token::CloseTag => {
                    current.flush(&mut table);
                    statement = None;
                }
                // Anything else (closure `use (...)`, stray literals) is not an import
                _ => statement = None,
            },
        }
        previous = Some(token);
    }

    table
}

fn is_declaration(word: &str, previous: Option<&Token>) -> bool {
    if !DECLARATION_KEYWORDS
        .iter()
        .any(|keyword| word.eq_ignore_ascii_case(keyword))
    {
        return false;
    }

    match previous {
        Some(Token::DoubleColon) | Some(Token::Arrow) => false,
        Some(Token::Ident(prev)) => {
            !(prev.eq_ignore_ascii_case("new") || prev.eq_ignore_ascii_case("function"))
        }
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renamed_import() {
        let table = scan_imports("<?php\nnamespace App;\nuse A\\B\\C as D;\nclass X {}");
        assert_eq!(table.resolve("D"), Some("A\\B\\C"));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_group_import() {
        let table = scan_imports("<?php use A\\B\\{C, D as E}; class X {}");
        assert_eq!(table.resolve("C"), Some("A\\B\\C"));
        assert_eq!(table.resolve("E"), Some("A\\B\\D"));
        assert!(table.resolve("D").is_none());
    }

    #[test]
    fn test_nested_group_entries_and_lists() {
        let table = scan_imports(
            "<?php use A\\{B\\C, D,}; use \\E\\F, G\\H as I; final class X {}",
        );
        assert_eq!(table.resolve("C"), Some("A\\B\\C"));
        assert_eq!(table.resolve("D"), Some("A\\D"));
        assert_eq!(table.resolve("F"), Some("E\\F"));
        assert_eq!(table.resolve("I"), Some("G\\H"));
    }

    #[test]
    fn test_stops_at_declaration() {
        let table = scan_imports(
            "<?php use App\\Id; class X { use Traits\\Timestamps; }\nuse Late\\Thing;",
        );
        assert_eq!(table.len(), 1);
        assert!(table.resolve("Timestamps").is_none());
        assert!(table.resolve("Thing").is_none());
    }

    #[test]
    fn test_ignores_comments_and_strings() {
        let table = scan_imports(
            "<?php /* use Fake\\One; */ $s = 'use Fake\\Two;'; // use Fake\\Three;\nuse Real\\Four; class X {}",
        );
        assert_eq!(table.len(), 1);
        assert_eq!(table.resolve("Four"), Some("Real\\Four"));
    }

    #[test]
    fn test_function_and_const_imports_skipped() {
        let table = scan_imports(
            "<?php use function App\\helper; use const App\\LIMIT; use App\\Model; class X {}",
        );
        assert_eq!(table.len(), 1);
        assert_eq!(table.resolve("Model"), Some("App\\Model"));
    }

    #[test]
    fn test_class_constant_does_not_stop_scan() {
        let table = scan_imports(
            "<?php use App\\A; $n = A::class; use App\\B; interface I {}",
        );
        assert_eq!(table.resolve("A"), Some("App\\A"));
        assert_eq!(table.resolve("B"), Some("App\\B"));
    }

    #[test]
    fn test_closure_use_is_not_an_import() {
        let table = scan_imports("<?php $f = function () use ($x) {}; use App\\Z; trait T {}");
        assert_eq!(table.len(), 1);
        assert_eq!(table.resolve("Z"), Some("App\\Z"));
    }

    #[test]
    fn test_later_alias_wins_within_unit() {
        let table = scan_imports("<?php use One\\Tag; use Two\\Other as Tag; class X {}");
        assert_eq!(table.resolve("Tag"), Some("Two\\Other"));
    }
}
