// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Parsing of `##` metadata directives embedded in CI scripts.
//!
//! A directive is a list of positional arguments followed by any number of
//! `key OP value` conditions. Tokens are bare words or double-quoted strings
//! with backslash escapes. Once a condition has been seen, further positional
//! arguments are a parse error.

use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use thiserror::Error;

/// Errors from parsing a single directive line
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DirectiveError {
    #[error("positional argument after condition: {0}")]
    PositionalAfterCondition(String),
    #[error("invalid escape sequence: \\{0}")]
    InvalidEscape(char),
    #[error("unterminated string")]
    UnterminatedString,
    #[error("unexpected character: {0:?}")]
    Unexpected(char),
}

/// Errors from parsing a whole file's metadata
#[derive(Debug, Error)]
pub enum MetaError {
    #[error("line {line}: {source}")]
    Directive {
        line: usize,
        source: DirectiveError,
    },
    #[error("line {line}: no arguments")]
    NoArguments { line: usize },
    #[error("line {line}: 'on' directive takes exactly one argument")]
    OnArity { line: usize },
    #[error("line {line}: 'permission' directive takes a key and a value")]
    PermissionArity { line: usize },
    #[error("line {line}: 'permission_repo' directive takes exactly one argument")]
    PermissionRepoArity { line: usize },
    #[error("line {line}: '{verb}' directive does not take conditions")]
    UnexpectedConditions { line: usize, verb: &'static str },
}

/// Condition operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Ne,
    Match,
    NotMatch,
}

impl Op {
    pub fn as_str(self) -> &'static str {
        match self {
            Op::Eq => "=",
            Op::Ne => "!=",
            Op::Match => "~=",
            Op::NotMatch => "!~=",
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `key OP value` condition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub key: String,
    pub op: Op,
    pub value: String,
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.key, self.op, self.value)
    }
}

impl Condition {
    /// Evaluate this condition against an event's attribute map.
    ///
    /// Missing keys behave as the empty string. Regex conditions are anchored
    /// on both ends; an invalid pattern logs a warning and evaluates false.
    pub fn matches(&self, attributes: &HashMap<String, String>) -> bool {
        let actual = attributes
            .get(&self.key)
            .map(String::as_str)
            .unwrap_or_default();
        match self.op {
            Op::Eq => actual == self.value,
            Op::Ne => actual != self.value,
            Op::Match | Op::NotMatch => {
                let anchored = format!("^{}$", self.value);
                let matched = match Regex::new(&anchored) {
                    Ok(re) => re.is_match(actual),
                    Err(err) => {
                        tracing::warn!(condition = %self, error = %err, "invalid regex in condition");
                        return false;
                    }
                };
                if self.op == Op::Match {
                    matched
                } else {
                    !matched
                }
            }
        }
    }
}

/// A single parsed directive line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Directive {
    pub args: Vec<String>,
    pub conditions: Vec<Condition>,
}

struct Scanner<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self, c: char) {
        self.pos += c.len_utf8();
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if matches!(c, ' ' | '\t' | '\n') {
                self.bump(c);
            } else {
                break;
            }
        }
    }

    /// Consume an operator if one starts here. `!~=` must win over `!=`.
    fn eat_op(&mut self) -> Option<Op> {
        let rest = &self.src[self.pos..];
        for (text, op) in [
            ("!~=", Op::NotMatch),
            ("!=", Op::Ne),
            ("~=", Op::Match),
            ("=", Op::Eq),
        ] {
            if rest.starts_with(text) {
                self.pos += text.len();
                return Some(op);
            }
        }
        None
    }

    /// Consume a token: quoted string or (possibly empty) bare word.
    fn token(&mut self) -> Result<String, DirectiveError> {
        if self.peek() == Some('"') {
            self.quoted()
        } else {
            Ok(self.bare())
        }
    }

    fn bare(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if matches!(c, ' ' | '\t' | '\n' | '!' | '~' | '=' | ';' | '"' | '\\') {
                break;
            }
            self.bump(c);
        }
        self.src[start..self.pos].to_string()
    }

    fn quoted(&mut self) -> Result<String, DirectiveError> {
        self.bump('"');
        let mut out = String::new();
        while let Some(c) = self.peek() {
            self.bump(c);
            match c {
                '"' => return Ok(out),
                '\\' => {
                    let esc = self.peek().ok_or(DirectiveError::UnterminatedString)?;
                    self.bump(esc);
                    out.push(match esc {
                        '\\' => '\\',
                        '"' => '"',
                        'n' => '\n',
                        'r' => '\r',
                        't' => '\t',
                        other => return Err(DirectiveError::InvalidEscape(other)),
                    });
                }
                other => out.push(other),
            }
        }
        Err(DirectiveError::UnterminatedString)
    }
}

/// Parse one directive line (the text after the `##` prefix)
pub fn parse_directive(src: &str) -> Result<Directive, DirectiveError> {
    let mut scanner = Scanner { src, pos: 0 };
    let mut directive = Directive::default();

    loop {
        scanner.skip_whitespace();
        if scanner.pos >= src.len() {
            break;
        }

        let start = scanner.pos;
        let token = scanner.token()?;
        if let Some(op) = scanner.eat_op() {
            let value = scanner.token()?;
            directive.conditions.push(Condition {
                key: token,
                op,
                value,
            });
        } else {
            if !directive.conditions.is_empty() {
                return Err(DirectiveError::PositionalAfterCondition(
                    src[start..].trim_end().to_string(),
                ));
            }
            if scanner.pos == start {
                return Err(DirectiveError::Unexpected(scanner.peek().unwrap_or(' ')));
            }
            directive.args.push(token);
        }
    }

    Ok(directive)
}

/// An `on <kind> [conditions]` entry from a script's metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaEvent {
    pub kind: String,
    pub conditions: Vec<Condition>,
}

/// The parsed metadata of a whole script file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Meta {
    pub events: Vec<MetaEvent>,
    pub permissions: BTreeMap<String, String>,
    pub permission_repos: Vec<String>,
}

impl Meta {
    /// Whether any of this file's `on` entries matches the given event kind
    /// with all conditions holding against the attribute map.
    pub fn matches(&self, kind: &str, attributes: &HashMap<String, String>) -> bool {
        self.events.iter().any(|event| {
            event.kind == kind && event.conditions.iter().all(|c| c.matches(attributes))
        })
    }
}

/// Parse every `##` directive line in a script
pub fn parse_meta(content: &str) -> Result<Meta, MetaError> {
    let mut meta = Meta::default();

    for (idx, line) in content.lines().enumerate() {
        let line_num = idx + 1;
        let Some(rest) = line.strip_prefix("##") else {
            continue;
        };

        let directive =
            parse_directive(rest).map_err(|source| MetaError::Directive {
                line: line_num,
                source,
            })?;

        if directive.args.is_empty() {
            return Err(MetaError::NoArguments { line: line_num });
        }

        match directive.args[0].as_str() {
            "on" => {
                if directive.args.len() != 2 {
                    return Err(MetaError::OnArity { line: line_num });
                }
                meta.events.push(MetaEvent {
                    kind: directive.args[1].clone(),
                    conditions: directive.conditions,
                });
            }
            "permission" => {
                if directive.args.len() != 3 {
                    return Err(MetaError::PermissionArity { line: line_num });
                }
                if !directive.conditions.is_empty() {
                    return Err(MetaError::UnexpectedConditions {
                        line: line_num,
                        verb: "permission",
                    });
                }
                meta.permissions
                    .insert(directive.args[1].clone(), directive.args[2].clone());
            }
            "permission_repo" => {
                if directive.args.len() != 2 {
                    return Err(MetaError::PermissionRepoArity { line: line_num });
                }
                if !directive.conditions.is_empty() {
                    return Err(MetaError::UnexpectedConditions {
                        line: line_num,
                        verb: "permission_repo",
                    });
                }
                meta.permission_repos.push(directive.args[1].clone());
            }
            other => {
                tracing::warn!(line = line_num, verb = other, "unknown directive");
            }
        }
    }

    Ok(meta)
}

#[cfg(test)]
#[path = "meta_tests.rs"]
mod tests;
