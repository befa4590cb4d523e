//! Parsing for `FILE:REFS` selections given on the command line.
//!
//! This is the non-interactive way to drive a [`SelectionModel`]: each ref
//! activates lines the same way clicking them would.
//!
//! # Syntax
//!
//! `FILE:REFS`, where `REFS` is a comma-separated list of:
//!
//! - `N` - added line N (new file numbering)
//! - `N..M` - added lines N through M
//! - `-N` - removed line N (old file numbering)
//! - `-N..-M` - removed lines N through M
//! - `@N` - every change in the N-th hunk, like clicking its header
//!
//! # Examples
//!
//! ```
//! use git_loom::parse::{parse_file_refs, LineRef};
//! use std::num::NonZeroU32;
//!
//! let refs = parse_file_refs("gtk.nix:-10,12..13,@2").unwrap();
//! assert_eq!(refs.file, "gtk.nix");
//! assert_eq!(refs.refs, vec![
//!     LineRef::Delete(NonZeroU32::new(10).unwrap()),
//!     LineRef::AddRange(NonZeroU32::new(12).unwrap(), NonZeroU32::new(13).unwrap()),
//!     LineRef::Hunk(NonZeroU32::new(2).unwrap()),
//! ]);
//! ```
//!
//! [`SelectionModel`]: crate::selection::SelectionModel

use error_set::error_set;
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::tag,
    character::complete::char,
    combinator::{all_consuming, map, opt},
    sequence::preceded,
};
use std::num::NonZeroU32;

error_set! {
    /// Errors from parsing file:refs syntax
    ParseError := {
        /// Input string does not contain a colon separator
        #[display("Invalid format '{input}': expected 'file:refs'")]
        InvalidFormat { input: String },
        /// File name portion before the colon is empty or whitespace
        #[display("Invalid format '{input}': file name cannot be empty")]
        EmptyFileName { input: String },
        /// No line references provided after the colon
        #[display("No line references provided")]
        EmptyRefs,
        /// Line number could not be parsed as a valid non-zero u32
        #[display("Invalid line number '{value}'")]
        InvalidLineNumber { value: String },
        /// Range has start greater than end
        #[display("Invalid range {start}..{end}: start must be <= end")]
        InvalidRange { start: u32, end: u32 },
        /// Removed-line range whose end lacks the '-' prefix
        #[display("Delete reference must start with '-', got '{value}'")]
        InvalidDeleteRef { value: String },
    }
}

/// A reference to lines to select.
#[derive(Debug, Clone, PartialEq)]
pub enum LineRef {
    /// Added line, by new line number
    Add(NonZeroU32),
    /// Added lines, inclusive
    AddRange(NonZeroU32, NonZeroU32),
    /// Removed line, by old line number
    Delete(NonZeroU32),
    /// Removed lines, inclusive
    DeleteRange(NonZeroU32, NonZeroU32),
    /// Every change in the N-th hunk (1-based)
    Hunk(NonZeroU32),
}

/// Parsed `FILE:REFS` argument.
#[derive(Debug, Clone, PartialEq)]
pub struct FileLineRefs {
    pub file: String,
    pub refs: Vec<LineRef>,
}

/// Parse a `FILE:REFS` string.
///
/// # Errors
///
/// Returns [`ParseError`] if the colon or file name is missing, no refs are
/// given, or a ref is malformed.
pub fn parse_file_refs(input: &str) -> Result<FileLineRefs, ParseError> {
    let Some((file, refs)) = input.split_once(':') else {
        return Err(ParseError::InvalidFormat {
            input: input.to_string(),
        });
    };

    let file = file.trim();
    if file.is_empty() {
        return Err(ParseError::EmptyFileName {
            input: input.to_string(),
        });
    }

    let refs = refs
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(parse_single_ref)
        .collect::<Result<Vec<_>, _>>()?;

    if refs.is_empty() {
        return Err(ParseError::EmptyRefs);
    }

    Ok(FileLineRefs {
        file: file.to_string(),
        refs,
    })
}

#[derive(Debug, Clone, Copy)]
enum Endpoint {
    Add(u32),
    Delete(u32),
}

enum Selector {
    Hunk(u32),
    Lines(Endpoint, Option<Endpoint>),
}

fn number(input: &str) -> IResult<&str, u32> {
    nom::character::complete::u32(input)
}

fn endpoint(input: &str) -> IResult<&str, Endpoint> {
    alt((
        map(preceded(char('-'), number), Endpoint::Delete),
        map(number, Endpoint::Add),
    ))
    .parse(input)
}

fn selector(input: &str) -> IResult<&str, Selector> {
    alt((
        map(preceded(char('@'), number), Selector::Hunk),
        map(
            (endpoint, opt(preceded(tag(".."), endpoint))),
            |(start, end)| Selector::Lines(start, end),
        ),
    ))
    .parse(input)
}

fn parse_single_ref(input: &str) -> Result<LineRef, ParseError> {
    let invalid = || ParseError::InvalidLineNumber {
        value: input.to_string(),
    };
    let nonzero = |n: u32| NonZeroU32::new(n).ok_or_else(invalid);

    let (_, selector) = all_consuming(selector).parse(input).map_err(|_| invalid())?;

    match selector {
        Selector::Hunk(n) => Ok(LineRef::Hunk(nonzero(n)?)),
        Selector::Lines(Endpoint::Add(n), None) => Ok(LineRef::Add(nonzero(n)?)),
        Selector::Lines(Endpoint::Delete(n), None) => Ok(LineRef::Delete(nonzero(n)?)),
        Selector::Lines(Endpoint::Add(start), Some(Endpoint::Add(end))) => {
            let (start, end) = ordered(nonzero(start)?, nonzero(end)?)?;
            Ok(LineRef::AddRange(start, end))
        }
        Selector::Lines(Endpoint::Delete(start), Some(Endpoint::Delete(end))) => {
            let (start, end) = ordered(nonzero(start)?, nonzero(end)?)?;
            Ok(LineRef::DeleteRange(start, end))
        }
        Selector::Lines(Endpoint::Delete(_), Some(Endpoint::Add(_))) => {
            Err(ParseError::InvalidDeleteRef {
                value: input.to_string(),
            })
        }
        Selector::Lines(Endpoint::Add(_), Some(Endpoint::Delete(_))) => Err(invalid()),
    }
}

fn ordered(start: NonZeroU32, end: NonZeroU32) -> Result<(NonZeroU32, NonZeroU32), ParseError> {
    if start > end {
        return Err(ParseError::InvalidRange {
            start: start.get(),
            end: end.get(),
        });
    }
    Ok((start, end))
}
