//! Self-tuning duplicate suppression.

use crate::relation::Relation;

/// Runs [`Relation::delete_duplicates`] for one merge or union site until the
/// site has proven it never produces duplicates: after `limit` calls that
/// removed nothing, the site stops checking for the rest of the graph's life.
#[derive(Clone, Debug)]
pub struct DuplicateRemover {
    limit: u32,
    visits: u32,
    removed: u64,
    enabled: bool,
}

impl DuplicateRemover {
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            visits: 0,
            removed: 0,
            enabled: true,
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn total_removed(&self) -> u64 {
        self.removed
    }

    /// Remove duplicates of rows at or after `from`, comparing `columns`.
    pub fn run(&mut self, rel: &mut Relation, columns: Option<&[usize]>, from: usize) {
        if !self.enabled {
            return;
        }
        self.visits += 1;
        self.removed += rel.delete_duplicates(columns, from) as u64;
        if self.visits > self.limit && self.removed == 0 {
            self.enabled = false;
        }
    }
}
