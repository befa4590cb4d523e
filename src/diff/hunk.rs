use super::DiffError;
use nom::{
    IResult, Parser,
    bytes::complete::tag,
    character::complete::char,
    combinator::opt,
    sequence::preceded,
};
use std::fmt;
use std::str::FromStr;

/// The ranges of a `@@ -a,b +c,d @@` line.
///
/// Starts follow git's convention: a range with a count of zero names the
/// line *before* the (empty) range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HunkHeader {
    pub old_start: u32,
    pub old_count: u32,
    pub new_start: u32,
    pub new_count: u32,
    /// Function context git prints after the closing `@@`
    pub section: Option<String>,
}

impl HunkHeader {
    /// First line of the hunk on the old side (`reverse == false`) or the new
    /// side (`reverse == true`).
    pub fn reference_line(&self, reverse: bool) -> u32 {
        let (start, count) = if reverse {
            (self.new_start, self.new_count)
        } else {
            (self.old_start, self.old_count)
        };
        if count == 0 { start + 1 } else { start }
    }
}

fn number(input: &str) -> IResult<&str, u32> {
    nom::character::complete::u32(input)
}

/// `start[,count]`, with an omitted count meaning one line.
fn range(input: &str) -> IResult<&str, (u32, u32)> {
    // A stray sign (`--3`) is read as the absolute value.
    let (input, _) = opt(char('-')).parse(input)?;
    let (input, start) = number(input)?;
    let (input, count) = opt(preceded(char(','), number)).parse(input)?;
    Ok((input, (start, count.unwrap_or(1))))
}

fn header(input: &str) -> IResult<&str, HunkHeader> {
    let (input, _) = tag("@@ -").parse(input)?;
    let (input, (old_start, old_count)) = range(input)?;
    let (input, _) = tag(" +").parse(input)?;
    let (input, (new_start, new_count)) = range(input)?;
    let (input, _) = tag(" @@").parse(input)?;

    let section = Some(input.trim()).filter(|s| !s.is_empty()).map(str::to_string);
    Ok((
        "",
        HunkHeader {
            old_start,
            old_count,
            new_start,
            new_count,
            section,
        },
    ))
}

impl FromStr for HunkHeader {
    type Err = DiffError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        header(line)
            .map(|(_, header)| header)
            .map_err(|_| DiffError::InvalidHunkHeader {
                line: line.to_string(),
            })
    }
}

fn write_range(f: &mut fmt::Formatter<'_>, sign: char, start: u32, count: u32) -> fmt::Result {
    match count {
        1 => write!(f, "{}{}", sign, start),
        n => write!(f, "{}{},{}", sign, start, n),
    }
}

impl fmt::Display for HunkHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@@ ")?;
        write_range(f, '-', self.old_start, self.old_count)?;
        write!(f, " ")?;
        write_range(f, '+', self.new_start, self.new_count)?;
        write!(f, " @@")?;
        if let Some(section) = &self.section {
            write!(f, " {}", section)?;
        }
        Ok(())
    }
}

/// Lines removed from or added to one side of a hunk
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ModifiedLines {
    pub start: u32,
    /// Full patch lines, including their `+`/`-` marker
    pub lines: Vec<String>,
    pub missing_final_newline: bool,
}

/// A zero-context hunk as emitted into a reconstructed patch
#[derive(Debug, PartialEq, Eq)]
pub struct Hunk {
    pub old: ModifiedLines,
    pub new: ModifiedLines,
}

impl Hunk {
    pub fn header(&self) -> HunkHeader {
        HunkHeader {
            old_start: self.old.start,
            old_count: self.old.lines.len() as u32,
            new_start: self.new.start,
            new_count: self.new.lines.len() as u32,
            section: None,
        }
    }
}

impl fmt::Display for Hunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.header())?;

        // Removed lines always precede added lines
        for line in &self.old.lines {
            writeln!(f, "{}", line)?;
        }
        if self.old.missing_final_newline {
            writeln!(f, "\\ No newline at end of file")?;
        }

        for line in &self.new.lines {
            writeln!(f, "{}", line)?;
        }
        if self.new.missing_final_newline {
            writeln!(f, "\\ No newline at end of file")?;
        }

        Ok(())
    }
}
