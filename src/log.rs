//! Parsing of `git log --pretty=raw --decorate=full` output.
//!
//! The raw format is a sequence of blocks, each starting with a
//! `commit <hash> [(decorations)]` line followed by header lines and a
//! message indented by four spaces:
//!
//! ```text
//! commit 3f2c...e1 (HEAD -> refs/heads/main, tag: refs/tags/v1.0)
//! tree 9a1b...
//! parent 77d0...
//! author Jane Doe <jane@example.com> 1700000000 +0100
//! committer Jane Doe <jane@example.com> 1700000000 +0100
//!
//!     Subject line
//! ```
//!
//! Parsing is tolerant: an unreadable field is left unset, and only a block
//! whose hash or parent lines cannot be read is dropped.

use serde::Serialize;
use tracing::debug;

/// Boundary between two records in raw log output.
const RECORD_BOUNDARY: &str = "\ncommit ";

/// Who made a commit, and when (seconds since the epoch, UTC).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Signature {
    pub name: String,
    pub email: String,
    pub timestamp: i64,
}

/// Category of a ref attached to a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RefKind {
    /// `refs/remotes/*`
    Remote,
    /// `refs/heads/*`
    Branch,
    /// `tag: refs/tags/*`
    Tag,
    /// Anything else, e.g. `HEAD` or `refs/stash`
    Other,
}

/// A ref label from the decoration list of a `commit` line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decoration {
    /// The label as git printed it, e.g. `refs/heads/main`
    pub name: String,
    pub kind: RefKind,
}

impl Decoration {
    /// Classify a decoration entry by its prefix.
    pub fn new(name: &str) -> Self {
        let kind = if name.starts_with("refs/remotes/") {
            RefKind::Remote
        } else if name.starts_with("refs/heads/") {
            RefKind::Branch
        } else if name.starts_with("tag: refs/tags/") {
            RefKind::Tag
        } else {
            RefKind::Other
        };
        Self {
            name: name.to_string(),
            kind,
        }
    }

    /// Label with the namespace prefix removed (`origin/main`, `v1.0`, ...).
    pub fn short_name(&self) -> &str {
        let prefix = match self.kind {
            RefKind::Remote => "refs/remotes/",
            RefKind::Branch => "refs/heads/",
            RefKind::Tag => "tag: refs/tags/",
            RefKind::Other => "",
        };
        self.name.strip_prefix(prefix).unwrap_or(&self.name)
    }
}

/// One commit as reported by `git log --pretty=raw`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommitRecord {
    pub hash: String,
    /// Parent hashes in the order git emitted them; the first is the mainline.
    pub parents: Vec<String>,
    pub tree: Option<String>,
    pub author: Option<Signature>,
    pub committer: Option<Signature>,
    pub decorations: Vec<Decoration>,
    pub message: String,
}

impl CommitRecord {
    /// First line of the commit message.
    pub fn subject(&self) -> &str {
        self.message.lines().next().unwrap_or("")
    }

    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }
}

/// Parse raw log output into records, preserving input order.
///
/// ```
/// use git_loom::log::parse_log;
///
/// let raw = "commit 1111111111111111111111111111111111111111\n\
///            parent 2222222222222222222222222222222222222222\n\
///            \n    Fix the frobnicator\n";
/// let commits = parse_log(raw);
/// assert_eq!(commits.len(), 1);
/// assert_eq!(commits[0].parents.len(), 1);
/// assert_eq!(commits[0].subject(), "Fix the frobnicator");
/// ```
pub fn parse_log(raw: &str) -> Vec<CommitRecord> {
    split_records(raw)
        .into_iter()
        .filter_map(parse_block)
        .collect()
}

/// Split raw log output into one block per commit, malformed or not.
///
/// The `commit ` keyword is stripped from every block.
pub fn split_records(raw: &str) -> Vec<&str> {
    let body = raw.strip_prefix("commit ").unwrap_or(raw);
    body.split(RECORD_BOUNDARY)
        .filter(|block| !block.trim().is_empty())
        .collect()
}

/// Parse a block from [`split_records`], logging it when it is skipped.
pub fn parse_block(block: &str) -> Option<CommitRecord> {
    let record = parse_record(block);
    if record.is_none() {
        debug!(
            block = block.lines().next().unwrap_or(""),
            "skipping malformed commit record"
        );
    }
    record
}

/// Hash of a block from [`split_records`], read from its first line only.
pub fn block_hash(block: &str) -> Option<String> {
    parse_commit_line(block.lines().next()?).map(|(hash, _)| hash)
}

/// Parse one block. The leading `commit ` has already been stripped by the split.
fn parse_record(block: &str) -> Option<CommitRecord> {
    let mut lines = block.lines();
    let (hash, decorations) = parse_commit_line(lines.next()?)?;

    let mut record = CommitRecord {
        hash,
        decorations,
        ..CommitRecord::default()
    };
    let mut message: Vec<&str> = Vec::new();
    let mut in_message = false;

    for line in lines {
        if let Some(text) = line.strip_prefix("    ") {
            in_message = true;
            message.push(text);
        } else if line.is_empty() {
            // Blank separator before the message, or a paragraph break inside it.
            if in_message {
                message.push("");
            }
        } else if in_message {
            continue;
        } else if let Some(parent) = line.strip_prefix("parent ") {
            record.parents.push(parse_hash(parent)?.to_string());
        } else if let Some(tree) = line.strip_prefix("tree ") {
            record.tree = parse_hash(tree).map(str::to_string);
        } else if let Some(author) = line.strip_prefix("author ") {
            record.author = parse_signature(author);
        } else if let Some(committer) = line.strip_prefix("committer ") {
            record.committer = parse_signature(committer);
        }
    }

    record.message = message.join("\n").trim().to_string();
    Some(record)
}

/// `<hash>` optionally followed by ` (ref, ref, ...)`.
fn parse_commit_line(line: &str) -> Option<(String, Vec<Decoration>)> {
    let line = line.strip_prefix("commit ").unwrap_or(line);
    let (hash, rest) = match line.split_once(' ') {
        Some((hash, rest)) => (hash, rest.trim()),
        None => (line.trim(), ""),
    };
    let hash = parse_hash(hash)?.to_string();

    let decorations = rest
        .strip_prefix('(')
        .and_then(|r| r.strip_suffix(')'))
        .map(parse_decorations)
        .unwrap_or_default();

    Some((hash, decorations))
}

fn parse_decorations(list: &str) -> Vec<Decoration> {
    let mut decorations = Vec::new();
    for entry in list.split(", ").map(str::trim).filter(|e| !e.is_empty()) {
        // `HEAD -> refs/heads/main` names two refs
        if let Some((head, target)) = entry.split_once(" -> ") {
            decorations.push(Decoration::new(head));
            decorations.push(Decoration::new(target));
        } else {
            decorations.push(Decoration::new(entry));
        }
    }
    decorations
}

/// Accepts full SHA-1 (40) or SHA-256 (64) object names.
fn parse_hash(text: &str) -> Option<&str> {
    let text = text.trim();
    let valid_len = text.len() == 40 || text.len() == 64;
    (valid_len && text.bytes().all(|b| b.is_ascii_hexdigit())).then_some(text)
}

/// `Name <email> epoch tz`; the timezone is dropped.
fn parse_signature(text: &str) -> Option<Signature> {
    let open = text.find('<')?;
    let close = open + text[open..].find('>')?;
    let name = text[..open].trim().to_string();
    let email = text[open + 1..close].to_string();
    let timestamp = text[close + 1..]
        .split_whitespace()
        .next()
        .and_then(|t| t.parse::<i64>().ok())
        .unwrap_or_default();

    Some(Signature {
        name,
        email,
        timestamp,
    })
}
