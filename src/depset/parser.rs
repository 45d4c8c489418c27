// src/depset/parser.rs

//! Token-stream parser for dependency expressions
//!
//! Single left-to-right scan over whitespace-separated tokens. Each open
//! parenthesis pushes a frame; the frame remembers what opened it (plain
//! group, any-of operator or use conditional) so the matching `)` knows
//! which node to build.

use super::DepNode;
use crate::error::{Error, Result};

/// Parser configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOptions {
    /// Tokens that open an any-of group
    pub or_operators: Vec<String>,
    /// Accept `flag? ( ... )` guards
    pub allow_conditionals: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            or_operators: vec!["||".to_string()],
            allow_conditionals: true,
        }
    }
}

enum FrameKind {
    Root,
    Plain,
    AnyOf,
    Conditional { flag: String, negate: bool },
}

impl FrameKind {
    /// Frames whose children are implicitly ANDed together
    fn is_all(&self) -> bool {
        !matches!(self, FrameKind::AnyOf)
    }
}

struct Frame<T> {
    kind: FrameKind,
    opener: String,
    children: Vec<DepNode<T>>,
}

impl<T> Frame<T> {
    fn new(kind: FrameKind, opener: &str) -> Self {
        Self {
            kind,
            opener: opener.to_string(),
            children: Vec::new(),
        }
    }
}

/// Parse `text` into top-level nodes, building leaves with `element`
pub(crate) fn parse_nodes<T, F>(
    text: &str,
    mut element: F,
    options: &ParseOptions,
) -> Result<Vec<DepNode<T>>>
where
    F: FnMut(&str) -> Result<T>,
{
    let mut frames: Vec<Frame<T>> = vec![Frame::new(FrameKind::Root, "")];
    let mut tokens = text.split_whitespace();

    while let Some(token) = tokens.next() {
        match token {
            "(" => frames.push(Frame::new(FrameKind::Plain, token)),
            ")" => {
                if frames.len() == 1 {
                    return Err(Error::depset(token, "unmatched ')'"));
                }
                let Some(frame) = frames.pop() else {
                    return Err(Error::depset(token, "unmatched ')'"));
                };
                if frame.children.is_empty() {
                    return Err(Error::depset(&frame.opener, "empty group"));
                }
                let Some(parent) = frames.last_mut() else {
                    return Err(Error::depset(token, "unmatched ')'"));
                };
                close_frame(frame, parent);
            }
            _ if options.or_operators.iter().any(|op| op == token) => {
                expect_open(&mut tokens, token)?;
                frames.push(Frame::new(FrameKind::AnyOf, token));
            }
            _ if token.ends_with('?') => {
                if !options.allow_conditionals {
                    return Err(Error::depset(token, "conditionals are not allowed here"));
                }
                let body = &token[..token.len() - 1];
                let (negate, flag) = match body.strip_prefix('!') {
                    Some(flag) => (true, flag),
                    None => (false, body),
                };
                if flag.is_empty() || !flag.starts_with(|c: char| c.is_ascii_alphanumeric()) {
                    return Err(Error::depset(token, "invalid conditional flag"));
                }
                expect_open(&mut tokens, token)?;
                frames.push(Frame::new(
                    FrameKind::Conditional {
                        flag: flag.to_string(),
                        negate,
                    },
                    token,
                ));
            }
            _ => {
                if token.contains(['(', ')']) {
                    return Err(Error::depset(token, "parenthesis must be its own token"));
                }
                let leaf = element(token).map_err(|e| Error::depset(token, e.to_string()))?;
                if let Some(frame) = frames.last_mut() {
                    frame.children.push(DepNode::Leaf(leaf));
                }
            }
        }
    }

    if frames.len() > 1 {
        let opener = frames
            .last()
            .map(|f| f.opener.clone())
            .unwrap_or_default();
        return Err(Error::depset(&opener, "unclosed group at end of input"));
    }

    Ok(frames.pop().map(|f| f.children).unwrap_or_default())
}

fn expect_open<'a>(tokens: &mut impl Iterator<Item = &'a str>, opener: &str) -> Result<()> {
    match tokens.next() {
        Some("(") => Ok(()),
        Some(other) => Err(Error::depset(
            opener,
            format!("expected '(' but found '{}'", other),
        )),
        None => Err(Error::depset(opener, "expected '(' but input ended")),
    }
}

fn close_frame<T>(frame: Frame<T>, parent: &mut Frame<T>) {
    let Frame { kind, children, .. } = frame;
    match kind {
        FrameKind::Conditional { flag, negate } => parent.children.push(DepNode::Conditional {
            flag,
            negate,
            payload: children,
        }),
        FrameKind::AnyOf => parent.children.push(DepNode::AnyOf(children)),
        FrameKind::Plain | FrameKind::Root => {
            if parent.kind.is_all() {
                // ( a b ) inside an AND context is just a b
                parent.children.extend(children);
            } else if children.len() == 1 {
                parent.children.extend(children);
            } else {
                parent.children.push(DepNode::All(children));
            }
        }
    }
}
