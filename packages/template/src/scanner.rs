//! Template scanner: raw text to a flat token stream.
//!
//! Outside tags everything up to the next `{` is text. Inside a tag,
//! whitespace separates tokens, `(`, `)` and `,` are structural, and a token
//! starting with `'` is a quoted string in which `''` stands for one quote.

use std::fmt;

use crate::error::{Result, TemplateError};

/// What a token is.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenKind {
    Text(String),
    OpenTag,
    Expression(String),
    QuotedString(String),
    Comma,
    OpenArg,
    CloseArg,
    CloseTag,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Text(text) => write!(f, "text {:?}", text),
            TokenKind::OpenTag => f.write_str("'{'"),
            TokenKind::Expression(expr) => write!(f, "expression '{}'", expr),
            TokenKind::QuotedString(s) => write!(f, "string {:?}", s),
            TokenKind::Comma => f.write_str("','"),
            TokenKind::OpenArg => f.write_str("'('"),
            TokenKind::CloseArg => f.write_str("')'"),
            TokenKind::CloseTag => f.write_str("'}'"),
        }
    }
}

/// A token and the byte offset where it starts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub offset: usize,
}

impl Token {
    fn new(kind: TokenKind, offset: usize) -> Self {
        Token { kind, offset }
    }
}

#[derive(Default)]
struct Scanner {
    tokens: Vec<Token>,
    text: String,
    text_start: usize,
    word: String,
    word_start: usize,
}

impl Scanner {
    fn flush_text(&mut self) {
        if !self.text.is_empty() {
            let text = std::mem::take(&mut self.text);
            self.tokens
                .push(Token::new(TokenKind::Text(text), self.text_start));
        }
    }

    fn flush_word(&mut self) {
        if !self.word.is_empty() {
            let word = std::mem::take(&mut self.word);
            self.tokens
                .push(Token::new(TokenKind::Expression(word), self.word_start));
        }
    }

    fn push(&mut self, kind: TokenKind, offset: usize) {
        self.flush_word();
        self.tokens.push(Token::new(kind, offset));
    }
}

/// Scan template source into tokens.
///
/// ```rust
/// use urlstore_template::{scan, TokenKind};
///
/// let kinds: Vec<TokenKind> = scan("a {b} c").unwrap().into_iter().map(|t| t.kind).collect();
/// assert_eq!(kinds, vec![
///     TokenKind::Text("a ".into()),
///     TokenKind::OpenTag,
///     TokenKind::Expression("b".into()),
///     TokenKind::CloseTag,
///     TokenKind::Text(" c".into()),
/// ]);
/// ```
pub fn scan(source: &str) -> Result<Vec<Token>> {
    let mut scanner = Scanner::default();
    let mut chars = source.char_indices().peekable();
    let mut open_tag: Option<usize> = None;

    while let Some((offset, c)) = chars.next() {
        if open_tag.is_none() {
            if c == '{' {
                scanner.flush_text();
                scanner.push(TokenKind::OpenTag, offset);
                open_tag = Some(offset);
            } else {
                if scanner.text.is_empty() {
                    scanner.text_start = offset;
                }
                scanner.text.push(c);
            }
            continue;
        }

        match c {
            '{' => return Err(TemplateError::OverlappingOpenBrace { offset }),
            '}' => {
                scanner.push(TokenKind::CloseTag, offset);
                open_tag = None;
            }
            '(' => scanner.push(TokenKind::OpenArg, offset),
            ')' => scanner.push(TokenKind::CloseArg, offset),
            ',' => scanner.push(TokenKind::Comma, offset),
            '\'' if scanner.word.is_empty() => {
                let mut quoted = String::new();
                loop {
                    match chars.next() {
                        None => return Err(TemplateError::UnterminatedString { offset }),
                        Some((_, '\'')) => {
                            if chars.next_if(|(_, next)| *next == '\'').is_some() {
                                quoted.push('\'');
                            } else {
                                break;
                            }
                        }
                        Some((_, other)) => quoted.push(other),
                    }
                }
                scanner.push(TokenKind::QuotedString(quoted), offset);
            }
            c if c.is_whitespace() => scanner.flush_word(),
            _ => {
                if scanner.word.is_empty() {
                    scanner.word_start = offset;
                }
                scanner.word.push(c);
            }
        }
    }

    if let Some(offset) = open_tag {
        return Err(TemplateError::UnbalancedBrace { offset });
    }
    scanner.flush_text();
    Ok(scanner.tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use TokenKind::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        scan(source).unwrap().into_iter().map(|t| t.kind).collect()
    }

    fn expr(s: &str) -> TokenKind {
        Expression(s.to_string())
    }

    fn quoted(s: &str) -> TokenKind {
        QuotedString(s.to_string())
    }

    #[test]
    fn text_and_tag() {
        assert_eq!(
            kinds("a {b} c"),
            vec![
                Text("a ".to_string()),
                OpenTag,
                expr("b"),
                CloseTag,
                Text(" c".to_string())
            ]
        );
    }

    #[test]
    fn function_call_with_arguments() {
        assert_eq!(
            kinds("{a('b','c')}"),
            vec![
                OpenTag,
                expr("a"),
                OpenArg,
                quoted("b"),
                Comma,
                quoted("c"),
                CloseArg,
                CloseTag
            ]
        );
    }

    #[test]
    fn offsets_are_byte_positions() {
        let tokens = scan("é{x}").unwrap();
        assert_eq!(tokens[0].offset, 0);
        assert_eq!(tokens[1].offset, 2);
        assert_eq!(tokens[2].offset, 3);
    }

    #[test]
    fn whitespace_separates_expressions() {
        assert_eq!(
            kinds("{ :name  html }"),
            vec![OpenTag, expr(":name"), expr("html"), CloseTag]
        );
    }

    #[test]
    fn doubled_quote_is_literal() {
        assert_eq!(
            kinds("{f('it''s')}"),
            vec![OpenTag, expr("f"), OpenArg, quoted("it's"), CloseArg, CloseTag]
        );
        assert_eq!(
            kinds("{f('')}"),
            vec![OpenTag, expr("f"), OpenArg, quoted(""), CloseArg, CloseTag]
        );
    }

    #[test]
    fn braces_inside_strings_are_literal() {
        assert_eq!(
            kinds("{f('{x}')}"),
            vec![OpenTag, expr("f"), OpenArg, quoted("{x}"), CloseArg, CloseTag]
        );
    }

    #[test]
    fn quote_inside_word_is_part_of_it() {
        assert_eq!(kinds("{&it's}"), vec![OpenTag, expr("&it's"), CloseTag]);
    }

    #[test]
    fn stray_close_brace_is_text() {
        assert_eq!(kinds("a}b"), vec![Text("a}b".to_string())]);
    }

    #[test]
    fn empty_source() {
        assert!(kinds("").is_empty());
    }

    #[test]
    fn unbalanced_brace() {
        assert_eq!(
            scan("{a").unwrap_err(),
            TemplateError::UnbalancedBrace { offset: 0 }
        );
    }

    #[test]
    fn overlapping_open_brace() {
        assert_eq!(
            scan("{a {b}}").unwrap_err(),
            TemplateError::OverlappingOpenBrace { offset: 3 }
        );
    }

    #[test]
    fn unterminated_string() {
        assert_eq!(
            scan("{f('abc)}").unwrap_err(),
            TemplateError::UnterminatedString { offset: 3 }
        );
    }
}
