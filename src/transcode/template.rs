//! Command templates
//!
//! A template is an argument string with `%name%` placeholders. It is split
//! into arguments once (whitespace separated, double or single quotes group)
//! and placeholders are substituted per argument, so a substituted path with
//! spaces always stays a single argument.

use crate::error::TranscodeError;

/// Pre-split argument template
#[derive(Debug, Clone, PartialEq)]
pub struct CommandTemplate {
    args: Vec<String>,
}

impl CommandTemplate {
    pub fn parse(template: &str) -> Result<Self, TranscodeError> {
        Ok(Self {
            args: split_args(template)?,
        })
    }

    /// Substitute every `(placeholder, value)` pair in every argument
    pub fn render(&self, substitutions: &[(&str, &str)]) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| {
                substitutions
                    .iter()
                    .fold(arg.clone(), |acc, (placeholder, value)| {
                        acc.replace(placeholder, value)
                    })
            })
            .collect()
    }
}

fn split_args(template: &str) -> Result<Vec<String>, TranscodeError> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                in_token = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') if matches!(chars.peek(), Some('"') | Some('\\')) => {
                            current.extend(chars.next());
                        }
                        Some(other) => current.push(other),
                        None => {
                            return Err(TranscodeError::Template(format!(
                                "unterminated double quote in '{}'",
                                template
                            )))
                        }
                    }
                }
            }
            '\'' => {
                in_token = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(other) => current.push(other),
                        None => {
                            return Err(TranscodeError::Template(format!(
                                "unterminated single quote in '{}'",
                                template
                            )))
                        }
                    }
                }
            }
            c if c.is_whitespace() => {
                if in_token {
                    args.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            c => {
                in_token = true;
                current.push(c);
            }
        }
    }
    if in_token {
        args.push(current);
    }
    Ok(args)
}
