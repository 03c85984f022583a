//! Frame state snapshots and their binary form.
//!
//! The encoding is, for every frame relation in compiled order, the row
//! count as a little-endian `i32` followed by the rows' symbol codes as
//! little-endian `u32`. Nothing separates relations; the decoder takes the
//! arities from the compiled game. Codes are only meaningful to graphs
//! built from the same ruleset.

use crate::error::{GdlError, Result};
use crate::relation::Relation;
use crate::ruleset::RuleSet;
use crate::symbol::Symbol;

/// Content of every frame relation, in [`RuleSet::frames`] order.
#[derive(Clone, Debug, Default)]
pub struct StateSnapshot {
    frames: Vec<Relation>,
}

impl StateSnapshot {
    pub fn new(frames: Vec<Relation>) -> Self {
        Self { frames }
    }

    pub fn frames(&self) -> &[Relation] {
        &self.frames
    }

    pub fn encode(&self) -> Vec<u8> {
        let words: usize = self.frames.iter().map(|f| 1 + f.len() * f.arity()).sum();
        let mut out = Vec::with_capacity(words * 4);
        for frame in &self.frames {
            out.extend_from_slice(&(frame.len() as i32).to_le_bytes());
            for row in frame.rows() {
                for sym in row {
                    out.extend_from_slice(&sym.raw().to_le_bytes());
                }
            }
        }
        out
    }

    pub fn decode(bytes: &[u8], arities: &[usize]) -> Result<Self> {
        let mut reader = Words { bytes, pos: 0 };
        let mut frames = Vec::with_capacity(arities.len());
        for (i, &arity) in arities.iter().enumerate() {
            let count = reader.next()? as i32;
            if count < 0 {
                return Err(GdlError::StateDecode(format!(
                    "frame {i} has negative row count {count}"
                )));
            }
            let count = count as usize;
            if count.saturating_mul(arity * 4) > bytes.len() - reader.pos {
                return Err(GdlError::StateDecode(format!(
                    "frame {i} claims {count} rows past the end of the input"
                )));
            }
            let mut frame = Relation::with_capacity(arity, count);
            let mut row = Vec::with_capacity(arity);
            for _ in 0..count {
                row.clear();
                for _ in 0..arity {
                    row.push(Symbol::from_raw(reader.next()?));
                }
                frame.push_row(&row);
            }
            frames.push(frame);
        }
        if reader.pos != bytes.len() {
            return Err(GdlError::StateDecode(format!(
                "{} trailing bytes",
                bytes.len() - reader.pos
            )));
        }
        Ok(Self { frames })
    }

    /// Order-insensitive equality of the frame contents.
    pub fn same_facts(&self, other: &StateSnapshot) -> bool {
        self.frames.len() == other.frames.len()
            && self
                .frames
                .iter()
                .zip(&other.frames)
                .all(|(a, b)| a.sorted_rows() == b.sorted_rows())
    }

    /// Every fact as KIF text, e.g. `(cell 1 1 x)`, sorted.
    pub fn render(&self, set: &RuleSet) -> Vec<String> {
        let mut out: Vec<String> = set
            .frames()
            .iter()
            .zip(&self.frames)
            .flat_map(|(&relation, frame)| frame.rows().map(move |row| set.render_fact(relation, row)))
            .collect();
        out.sort();
        out
    }
}

struct Words<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl Words<'_> {
    fn next(&mut self) -> Result<u32> {
        let end = self.pos + 4;
        let word = self
            .bytes
            .get(self.pos..end)
            .and_then(|b| <[u8; 4]>::try_from(b).ok())
            .ok_or_else(|| GdlError::StateDecode(format!("truncated at byte {}", self.pos)))?;
        self.pos = end;
        Ok(u32::from_le_bytes(word))
    }
}
