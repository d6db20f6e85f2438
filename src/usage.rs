// vultrctl - CLI for the Vultr VPS API
// Copyright (C) 2026 The vultrctl Authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Usage lines such as `destroy [--yes] <subid>` double as the arity contract
//! for a command's positional arguments.

use std::fmt;
use thiserror::Error;

const VARIADIC: &str = "...";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Command name, flag syntax or any other literal text.
    Word(String),
    Required(String),
    Optional(String),
    Variadic,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UsageError {
    #[error("malformed usage token `{token}` in `{usage}`")]
    Malformed { token: String, usage: String },
    #[error("invalid argument\nUsage: {usage}")]
    InvalidArguments { usage: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Usage {
    tokens: Vec<Token>,
}

impl Usage {
    pub fn parse(line: &str) -> Result<Self, UsageError> {
        let tokens = line
            .split_whitespace()
            .map(|raw| classify(raw, line))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { tokens })
    }

    /// Placeholder names of the positional slots, in order.
    pub fn positional_names(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().filter_map(|t| match t {
            Token::Required(name) | Token::Optional(name) => Some(name.as_str()),
            Token::Word(_) | Token::Variadic => None,
        })
    }

    /// Checks the positional argument count against the usage line.
    ///
    /// Tokens are scanned left to right; once `...` is reached and every
    /// required token seen so far is covered, any number of trailing
    /// arguments is accepted.
    pub fn validate<S: AsRef<str>>(&self, args: &[S]) -> Result<(), UsageError> {
        let given = args.len();
        let mut required = 0;
        let mut optional = 0;

        for token in &self.tokens {
            match token {
                Token::Required(_) => required += 1,
                Token::Optional(_) => optional += 1,
                Token::Variadic if required <= given => return Ok(()),
                Token::Variadic | Token::Word(_) => {}
            }
        }

        if required <= given && given <= required + optional {
            Ok(())
        } else {
            Err(UsageError::InvalidArguments {
                usage: self.to_string(),
            })
        }
    }
}

impl fmt::Display for Usage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, token) in self.tokens.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            match token {
                Token::Word(word) => f.write_str(word)?,
                Token::Required(name) => write!(f, "<{name}>")?,
                Token::Optional(name) => write!(f, "[{name}]")?,
                Token::Variadic => f.write_str(VARIADIC)?,
            }
        }
        Ok(())
    }
}

fn classify(raw: &str, line: &str) -> Result<Token, UsageError> {
    if raw == VARIADIC {
        return Ok(Token::Variadic);
    }

    let bracketed = |open: char, close: char| -> Option<Result<String, UsageError>> {
        let inner = raw.strip_prefix(open)?;
        let name = match inner.strip_suffix(close) {
            Some(name) if is_word(name) => name,
            _ => {
                return Some(Err(UsageError::Malformed {
                    token: raw.to_string(),
                    usage: line.to_string(),
                }));
            }
        };
        Some(Ok(name.to_string()))
    };

    if let Some(name) = bracketed('<', '>') {
        return name.map(Token::Required);
    }
    // `[--yes]` documents a flag, not a positional slot.
    if raw.starts_with("[-") && raw.ends_with(']') {
        return Ok(Token::Word(raw.to_string()));
    }
    if let Some(name) = bracketed('[', ']') {
        return name.map(Token::Optional);
    }
    Ok(Token::Word(raw.to_string()))
}

fn is_word(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_')
}
