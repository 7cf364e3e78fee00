//! Template analyzer: token stream to element tree.
//!
//! A single cursor walks the tokens. Block directives recurse into their
//! content and hand the cursor back to the enclosing block once they reach
//! `.end`.

use urlstore_core::decode_component;

use crate::element::{Element, Foreach, If, Section, Tag, TagToken};
use crate::error::{Result, TemplateError};
use crate::scanner::{Token, TokenKind};

/// Build the element tree for a scanned template.
pub fn analyze(tokens: &[Token]) -> Result<Vec<Element>> {
    let mut analyzer = Analyzer { tokens, pos: 0 };
    let (elements, _) = analyzer.content(None, &[])?;
    Ok(elements)
}

struct Directive {
    name: String,
    expression: Tag,
    offset: usize,
}

enum Parsed {
    Tag(Tag),
    Directive(Directive),
}

/// An expression word inside a tag, with its argument list if it had one.
struct Word {
    text: String,
    args: Option<Vec<String>>,
    offset: usize,
}

struct Analyzer<'a> {
    tokens: &'a [Token],
    pos: usize,
}

fn sibling_of(block: &str) -> &'static str {
    match block {
        "section" => "or",
        "foreach" => "join",
        _ => "else",
    }
}

fn unknown(token: impl Into<String>, offset: usize) -> TemplateError {
    TemplateError::UnknownToken {
        token: token.into(),
        offset,
    }
}

fn decode(text: &str) -> Result<String> {
    Ok(decode_component(text, text)?)
}

impl<'a> Analyzer<'a> {
    fn next(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    /// Collect elements until a directive in `allowed` or the end of input.
    ///
    /// Inside a block (`block` is set) running out of tokens is an error.
    fn content(
        &mut self,
        block: Option<&str>,
        allowed: &[&str],
    ) -> Result<(Vec<Element>, Option<Directive>)> {
        let mut elements = Vec::new();
        while let Some(token) = self.next() {
            match &token.kind {
                TokenKind::Text(text) => elements.push(Element::Text(text.clone())),
                TokenKind::OpenTag => match self.tag(token.offset)? {
                    Parsed::Tag(tag) => elements.push(Element::Tag(tag)),
                    Parsed::Directive(directive) => {
                        let name = directive.name.clone();
                        match name.as_str() {
                            "section" | "foreach" | "if" => elements.push(self.block(directive)?),
                            name if allowed.contains(&name) => {
                                let has_expression = directive
                                    .expression
                                    .tokens
                                    .iter()
                                    .any(|token| !matches!(token, TagToken::Comment(_)));
                                if has_expression {
                                    return Err(unknown(
                                        format!("expression after '.{}'", name),
                                        directive.offset,
                                    ));
                                }
                                return Ok((elements, Some(directive)));
                            }
                            "or" | "join" | "else" | "end" => {
                                return Err(TemplateError::UnexpectedDirective {
                                    name: directive.name,
                                    offset: directive.offset,
                                })
                            }
                            _ => {
                                return Err(TemplateError::UnknownDirective {
                                    name: directive.name,
                                    offset: directive.offset,
                                })
                            }
                        }
                    }
                },
                other => return Err(unknown(other.to_string(), token.offset)),
            }
        }
        match block {
            Some(name) => Err(TemplateError::MissingEndDirective {
                directive: name.to_string(),
            }),
            None => Ok((elements, None)),
        }
    }

    fn block(&mut self, open: Directive) -> Result<Element> {
        let sibling = sibling_of(&open.name);
        let (first, stop) = self.content(Some(&open.name), &[sibling, "end"])?;
        let second = match stop {
            Some(directive) if directive.name == sibling => {
                Some(self.content(Some(&open.name), &["end"])?.0)
            }
            _ => None,
        };

        Ok(match open.name.as_str() {
            "section" => Element::Section(Section {
                expression: open.expression,
                content: first,
                or: second,
            }),
            "foreach" => Element::Foreach(Foreach {
                expression: open.expression,
                body: first,
                join: second,
            }),
            _ => Element::If(If {
                condition: open.expression,
                then: first,
                otherwise: second,
            }),
        })
    }

    /// Parse one tag; the cursor sits just past its `{`.
    fn tag(&mut self, offset: usize) -> Result<Parsed> {
        let mut words: Vec<Word> = Vec::new();
        let mut comment: Option<Vec<String>> = None;

        loop {
            let Some(token) = self.next() else {
                return Err(TemplateError::UnbalancedBrace { offset });
            };
            if let Some(comment) = comment.as_mut() {
                match &token.kind {
                    TokenKind::CloseTag => break,
                    TokenKind::Expression(text) | TokenKind::QuotedString(text) => {
                        comment.push(text.clone())
                    }
                    _ => {}
                }
                continue;
            }
            match &token.kind {
                TokenKind::CloseTag => break,
                TokenKind::Expression(text) if text.starts_with('#') => {
                    comment = Some(vec![text[1..].to_string()]);
                }
                TokenKind::Expression(text) => {
                    let args = match self.peek() {
                        Some(Token {
                            kind: TokenKind::OpenArg,
                            ..
                        }) => {
                            self.pos += 1;
                            Some(self.args()?)
                        }
                        _ => None,
                    };
                    words.push(Word {
                        text: text.clone(),
                        args,
                        offset: token.offset,
                    });
                }
                other => return Err(unknown(other.to_string(), token.offset)),
            }
        }

        let comment = comment.map(|words| TagToken::Comment(words.join(" ")));
        let Some(first) = words.first() else {
            return match comment {
                Some(comment) => Ok(Parsed::Tag(Tag {
                    tokens: vec![comment],
                    offset,
                })),
                None => Err(unknown("empty tag", offset)),
            };
        };

        if let Some(name) = first.text.strip_prefix('.') {
            if first.args.is_some() {
                return Err(unknown(format!("arguments after '{}'", first.text), first.offset));
            }
            let mut expression = compile(&words[1..], offset)?;
            expression.tokens.extend(comment);
            return Ok(Parsed::Directive(Directive {
                name: name.to_string(),
                expression,
                offset,
            }));
        }

        let mut tag = compile(&words, offset)?;
        tag.tokens.extend(comment);
        Ok(Parsed::Tag(tag))
    }

    /// Parse an argument list; the cursor sits just past its `(`.
    fn args(&mut self) -> Result<Vec<String>> {
        let mut args = Vec::new();
        let mut expect_value = true;
        loop {
            let Some(token) = self.next() else {
                return Err(unknown("end of input", usize::MAX));
            };
            match (&token.kind, expect_value) {
                (TokenKind::QuotedString(value) | TokenKind::Expression(value), true) => {
                    args.push(value.clone());
                    expect_value = false;
                }
                (TokenKind::Comma, false) => expect_value = true,
                (TokenKind::CloseArg, false) => return Ok(args),
                (TokenKind::CloseArg, true) if args.is_empty() => return Ok(args),
                (other, _) => return Err(unknown(other.to_string(), token.offset)),
            }
        }
    }
}

fn compile(words: &[Word], offset: usize) -> Result<Tag> {
    let mut tokens = Vec::with_capacity(words.len());
    for word in words {
        let text = word.text.as_str();
        if let Some(name) = text.strip_prefix('.') {
            return Err(TemplateError::UnexpectedDirective {
                name: name.to_string(),
                offset: word.offset,
            });
        }

        let is_function = !matches!(text.chars().next(), Some(':' | '@' | '&'));
        if word.args.is_some() && !is_function {
            return Err(unknown(format!("arguments after '{}'", text), word.offset));
        }

        let token = if let Some(field) = text.strip_prefix(':') {
            let keys = match field {
                "" | "." => Vec::new(),
                _ => field
                    .split('.')
                    .filter(|key| !key.is_empty())
                    .map(decode)
                    .collect::<Result<_>>()?,
            };
            TagToken::Field {
                name: field.to_string(),
                keys,
            }
        } else if let Some(url) = text.strip_prefix('@') {
            TagToken::Load(url.to_string())
        } else if let Some(literal) = text.strip_prefix('&') {
            TagToken::Literal(decode(literal)?)
        } else {
            TagToken::Function {
                name: text.to_string(),
                args: word.args.clone().unwrap_or_default(),
            }
        };
        tokens.push(token);
    }
    Ok(Tag { tokens, offset })
}
