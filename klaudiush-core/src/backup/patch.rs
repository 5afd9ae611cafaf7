//! Line-oriented patch encoding for snapshot storage.
//!
//! A patch is the op list of a line diff against the chain base. Applying it
//! to the base must reproduce the original bytes exactly; the store verifies
//! the checksum after every rematerialization.

use serde::{Deserialize, Serialize};
use similar::{ChangeTag, TextDiff};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PatchError {
    #[error("patch consumes {wanted} base lines but only {available} remain")]
    BaseTooShort { wanted: usize, available: usize },
    #[error("patch left {remaining} base lines unconsumed")]
    BaseTooLong { remaining: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOp {
    /// Copy `count` lines from the base.
    Equal { count: usize },
    /// Skip `count` base lines.
    Delete { count: usize },
    /// Emit these literal lines (terminators included).
    Insert { lines: Vec<String> },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinePatch {
    pub ops: Vec<PatchOp>,
}

impl LinePatch {
    /// Diff `base` -> `target`.
    pub fn between(base: &str, target: &str) -> Self {
        let diff = TextDiff::from_lines(base, target);
        let mut ops: Vec<PatchOp> = Vec::new();

        for change in diff.iter_all_changes() {
            match change.tag() {
                ChangeTag::Equal => match ops.last_mut() {
                    Some(PatchOp::Equal { count }) => *count += 1,
                    _ => ops.push(PatchOp::Equal { count: 1 }),
                },
                ChangeTag::Delete => match ops.last_mut() {
                    Some(PatchOp::Delete { count }) => *count += 1,
                    _ => ops.push(PatchOp::Delete { count: 1 }),
                },
                ChangeTag::Insert => {
                    let line = change.value().to_string();
                    match ops.last_mut() {
                        Some(PatchOp::Insert { lines }) => lines.push(line),
                        _ => ops.push(PatchOp::Insert { lines: vec![line] }),
                    }
                }
            }
        }

        Self { ops }
    }

    /// Replay the ops over `base`.
    pub fn apply(&self, base: &str) -> Result<String, PatchError> {
        let base_lines: Vec<&str> = base.split_inclusive('\n').collect();
        let mut cursor = 0;
        let mut output = String::with_capacity(base.len());

        for op in &self.ops {
            match op {
                PatchOp::Equal { count } => {
                    if cursor + count > base_lines.len() {
                        return Err(PatchError::BaseTooShort {
                            wanted: *count,
                            available: base_lines.len() - cursor,
                        });
                    }
                    for line in &base_lines[cursor..cursor + count] {
                        output.push_str(line);
                    }
                    cursor += count;
                }
                PatchOp::Delete { count } => {
                    if cursor + count > base_lines.len() {
                        return Err(PatchError::BaseTooShort {
                            wanted: *count,
                            available: base_lines.len() - cursor,
                        });
                    }
                    cursor += count;
                }
                PatchOp::Insert { lines } => {
                    for line in lines {
                        output.push_str(line);
                    }
                }
            }
        }

        if cursor != base_lines.len() {
            return Err(PatchError::BaseTooLong {
                remaining: base_lines.len() - cursor,
            });
        }

        Ok(output)
    }

    /// Size of the serialized form, used for the full-vs-patch decision.
    pub fn encoded_size(&self) -> usize {
        serde_json::to_vec(self).map(|bytes| bytes.len()).unwrap_or(usize::MAX)
    }
}
