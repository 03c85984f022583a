//! Propagated equality constraints.
//!
//! A [`Filter`] ties columns at one level of the proof graph to columns of
//! an accumulator owned by a conjunction `distance` levels further up. A
//! candidate row passes when the source accumulator holds at least one row
//! agreeing with it on the mapped columns, which lets a descendant skip work
//! whose results the ancestor would discard anyway.
//!
//! Filters learn: in their learning phase they count visits and
//! rejections, and sites drop filters that rarely reject anything.

use smallvec::SmallVec;

use crate::graph::RelId;
use crate::mapping::ColumnMapping;
use crate::query::EqualityQuery;
use crate::relation::Relation;
use crate::ruleset::Var;
use crate::symbol::Symbol;

#[derive(Clone, Debug)]
pub struct Filter {
    /// Conjunction levels between the filter's owner and the source accumulator.
    distance: u32,
    /// Path of the source accumulator inside that conjunction.
    path: usize,
    /// `local` columns at this level, `foreign` columns of the source.
    mapping: ColumnMapping,
    /// Rule variable carried by each pair, where one is known.
    vars: SmallVec<[Option<Var>; 4]>,
    source: Option<RelId>,
    visits: u32,
    rejected: u32,
    established: bool,
    lucky: usize,
}

/// Identity of a filter for subtree pooling: where it reads and which columns it ties.
pub type FilterKey = (u32, usize, ColumnMapping);

impl Filter {
    /// A filter reading accumulator `path` of the enclosing conjunction.
    /// Pairs are `(source column, local column, variable)`.
    pub fn new<I>(distance: u32, path: usize, pairs: I) -> Option<Self>
    where
        I: IntoIterator<Item = (usize, usize, Option<Var>)>,
    {
        let mut mapping = ColumnMapping::new();
        let mut vars = SmallVec::new();
        for (foreign, local, var) in pairs {
            if mapping.local().contains(&local) {
                continue;
            }
            mapping.push(local, foreign);
            vars.push(var);
        }
        if mapping.is_empty() {
            return None;
        }
        Some(Self {
            distance,
            path,
            mapping,
            vars,
            source: None,
            visits: 0,
            rejected: 0,
            established: false,
            lucky: 0,
        })
    }

    /// Re-express the filter one step down the graph. `f` maps each pair's
    /// local column and variable to the new level, or drops the pair.
    pub fn remap<F>(&self, distance: u32, mut f: F) -> Option<Self>
    where
        F: FnMut(usize, Option<Var>) -> Option<(usize, Option<Var>)>,
    {
        let pairs: SmallVec<[(usize, usize, Option<Var>); 4]> = self
            .mapping
            .pairs()
            .zip(self.vars.iter().copied())
            .filter_map(|((local, foreign), var)| f(local, var).map(|(l, v)| (foreign, l, v)))
            .collect();
        let mut out = Self::new(distance, self.path, pairs)?;
        out.source = self.source;
        Some(out)
    }

    pub fn distance(&self) -> u32 {
        self.distance
    }

    pub fn path(&self) -> usize {
        self.path
    }

    pub fn mapping(&self) -> &ColumnMapping {
        &self.mapping
    }

    pub fn vars(&self) -> impl Iterator<Item = Var> + '_ {
        self.vars.iter().flatten().copied()
    }

    pub fn source(&self) -> Option<RelId> {
        self.source
    }

    pub fn set_source(&mut self, source: RelId) {
        self.source = Some(source);
    }

    pub fn key(&self) -> FilterKey {
        (self.distance, self.path, self.mapping.clone())
    }

    pub fn established(&self) -> bool {
        self.established
    }

    pub(crate) fn mark_established(&mut self) {
        self.established = true;
    }

    /// Share of visited rows this filter rejected. Young filters count as perfect.
    pub fn performance(&self) -> f64 {
        match self.visits {
            0 => 0.0,
            1..=3 => 1.0,
            v => self.rejected as f64 / v as f64,
        }
    }

    /// Same source and every tie of `other` is also a tie of `self`.
    pub fn subsumes(&self, other: &Filter) -> bool {
        self.distance == other.distance
            && self.path == other.path
            && other
                .mapping
                .pairs()
                .all(|p| self.mapping.pairs().any(|q| q == p))
    }

    /// Check a row, starting from the source row that matched last time.
    pub fn pass(&mut self, row: &[Symbol], source: &Relation) -> bool {
        let n = source.len();
        let start = self.lucky.min(n);
        let hit = (start..n)
            .chain(0..start)
            .find(|&i| self.mapping.matches(row, source.row(i)));
        match hit {
            Some(i) => {
                self.lucky = i;
                true
            }
            None => false,
        }
    }

    /// Check a row while counting visits and rejections.
    pub fn pass_learning(&mut self, row: &[Symbol], source: &Relation) -> bool {
        self.visits += 1;
        match source.find_row(0, &self.mapping, row) {
            Some(i) => {
                self.lucky = i;
                true
            }
            None => {
                self.rejected += 1;
                self.established = true;
                false
            }
        }
    }

    /// Rows of `target` (indexed, read at local columns) that can match some
    /// source row. The union over source rows of the index-narrowed ranges.
    pub fn candidate_range(&self, target: &Relation, source: &Relation) -> std::ops::Range<usize> {
        if !target.index_valid() {
            return 0..target.len();
        }
        let mut start = target.len();
        let mut end = 0;
        for s in source.rows() {
            let r = target.narrow(self.mapping.pairs().map(|(l, f)| (l, s[f])));
            if r.start < r.end {
                start = start.min(r.start);
                end = end.max(r.end);
            }
        }
        if start >= end {
            0..0
        } else {
            start..end
        }
    }
}

/// Filters installed at one site.
#[derive(Clone, Debug, Default)]
pub struct FilterSet {
    filters: Vec<Filter>,
    visits: u32,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a filter unless an existing one subsumes it; replace one it subsumes.
    pub fn add(&mut self, filter: Filter) {
        for existing in &mut self.filters {
            if existing.subsumes(&filter) {
                return;
            }
            if filter.subsumes(existing) {
                *existing = filter;
                return;
            }
        }
        self.filters.push(filter);
    }

    pub fn extend<I: IntoIterator<Item = Filter>>(&mut self, filters: I) {
        for f in filters {
            self.add(f);
        }
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Filter> {
        self.filters.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Filter> {
        self.filters.iter_mut()
    }

    pub fn visits(&self) -> u32 {
        self.visits
    }

    pub(crate) fn visit(&mut self) -> u32 {
        self.visits += 1;
        self.visits
    }

    pub(crate) fn rewind_visits(&mut self, by: u32) {
        self.visits = self.visits.saturating_sub(by);
    }

    /// Order-sensitive identity of the whole set.
    pub fn key(&self) -> Vec<FilterKey> {
        self.filters.iter().map(Filter::key).collect()
    }

    /// Index of the filter whose source currently holds the fewest rows.
    pub fn choose_one(&self, relations: &[Relation]) -> Option<usize> {
        self.filters
            .iter()
            .enumerate()
            .min_by_key(|(_, f)| f.source.map_or(usize::MAX, |r| relations[r.index()].len()))
            .map(|(i, _)| i)
    }

    pub fn get(&self, i: usize) -> Option<&Filter> {
        self.filters.get(i)
    }

    pub fn get_mut(&mut self, i: usize) -> Option<&mut Filter> {
        self.filters.get_mut(i)
    }

    /// Drop filters with performance below `threshold`; returns how many went.
    pub fn drop_below(&mut self, threshold: f64) -> usize {
        let before = self.filters.len();
        self.filters.retain(|f| f.performance() >= threshold);
        before - self.filters.len()
    }

    /// Drop filters that never narrowed anything; returns how many went.
    pub fn retain_established(&mut self) -> usize {
        let before = self.filters.len();
        self.filters.retain(Filter::established);
        before - self.filters.len()
    }

    /// Move the best-performing filter to the front.
    pub fn order_by_performance(&mut self) {
        if self.filters.len() < 2 {
            return;
        }
        let mut best = 0;
        for (i, f) in self.filters.iter().enumerate() {
            if f.performance() > self.filters[best].performance() {
                best = i;
            }
        }
        self.filters.swap(0, best);
    }
}

/// Guard evaluated before proving a conjunction: the rule head's own
/// constants and ties, read through a filter, must be satisfiable by at
/// least one source row or the conjunction cannot contribute.
#[derive(Clone, Debug)]
pub struct HeadGuard {
    filter: Filter,
    query: EqualityQuery,
}

impl HeadGuard {
    pub fn new(filter: &Filter, head: &EqualityQuery) -> Option<Self> {
        let to_source = |col: usize| {
            filter
                .mapping
                .pairs()
                .find(|&(l, _)| l == col)
                .map(|(_, f)| f)
        };
        let mut query = EqualityQuery::new();
        for &(t, s) in head.variables() {
            if let (Some(a), Some(b)) = (to_source(t), to_source(s)) {
                query.equal_columns(a, b);
            }
        }
        for &(c, sym) in head.symbols() {
            if let Some(a) = to_source(c) {
                query.equal_symbol(a, sym);
            }
        }
        if query.is_empty() {
            return None;
        }
        Some(Self {
            filter: filter.clone(),
            query,
        })
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    pub fn filter_mut(&mut self) -> &mut Filter {
        &mut self.filter
    }

    pub fn pass(&self, source: &Relation) -> bool {
        source.rows().any(|row| self.query.pass(row))
    }
}

#[cfg(test)]
#[path = "tests/filter.rs"]
mod tests;
