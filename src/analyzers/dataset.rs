//! The consolidated, append-only dataset of accepted effort rows.
//!
//! Rows of one effort always sit in one contiguous block and the index holds
//! one [`IndexRow`] per block. The blocks partition the rows exactly; every
//! mutation replaces rows and index together.

use tracing::debug;

use crate::analyzers::types::{IndexRow, IntegrityError, PercentileBand, Row};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    rows: Vec<Row>,
    index: Vec<IndexRow>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reassembles a dataset from persisted halves.
    ///
    /// # Errors
    ///
    /// Returns [`IntegrityError`] if the index does not partition `rows`
    /// into non-empty contiguous blocks in order.
    pub fn from_parts(rows: Vec<Row>, index: Vec<IndexRow>) -> Result<Self, IntegrityError> {
        check_partition(&index, rows.len())?;
        Ok(Self { rows, index })
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn index(&self) -> &[IndexRow] {
        &self.index
    }

    /// Number of rows across all efforts.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn n_efforts(&self) -> usize {
        self.index.len()
    }

    /// Appends one effort's surviving rows as a new block. Empty blocks are
    /// not recorded.
    pub(crate) fn append_effort(
        &mut self,
        athlete_id: u64,
        effort_id: u64,
        rows: impl IntoIterator<Item = Row>,
    ) -> usize {
        let start_row = self.rows.len();
        self.rows.extend(rows);
        let n_rows = self.rows.len() - start_row;
        if n_rows > 0 {
            self.index.push(IndexRow {
                athlete_id,
                effort_id,
                start_row,
                n_rows,
            });
        }
        n_rows
    }

    /// Rows of the effort at index position `i`.
    pub fn effort_rows(&self, i: usize) -> &[Row] {
        let entry = &self.index[i];
        &self.rows[entry.start_row..entry.end_row()]
    }

    /// Last row time minus first row time of the effort at position `i`.
    pub fn total_time(&self, i: usize) -> f64 {
        match self.effort_rows(i) {
            [] => 0.0,
            [first, .., last] => last.time - first.time,
            [_] => 0.0,
        }
    }

    /// Reorders efforts by ascending total time, fastest first.
    ///
    /// Ties keep their current relative order, so sorting an already sorted
    /// dataset leaves it unchanged.
    pub fn sort_by_total_time(&mut self) {
        let mut keyed: Vec<(f64, usize)> = (0..self.index.len())
            .map(|i| (self.total_time(i), i))
            .collect();
        keyed.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut rows = Vec::with_capacity(self.rows.len());
        let mut index = Vec::with_capacity(self.index.len());
        for (_, i) in keyed {
            let entry = self.index[i];
            index.push(IndexRow {
                start_row: rows.len(),
                ..entry
            });
            rows.extend_from_slice(self.effort_rows(i));
        }

        debug!(efforts = index.len(), rows = rows.len(), "Dataset sorted by total time");
        self.rows = rows;
        self.index = index;
    }

    /// Rows of all efforts whose rank falls inside `band`.
    ///
    /// Ranks follow the current index order, so call
    /// [`Dataset::sort_by_total_time`] first for "fastest N%" semantics.
    pub fn band_rows(&self, band: PercentileBand) -> &[Row] {
        let start = self.band_boundary(band.lb());
        let end = self.band_boundary(band.ub());
        &self.rows[start..end]
    }

    fn band_boundary(&self, percentile: u8) -> usize {
        let position = self.index.len() * percentile as usize / 100;
        self.index
            .get(position)
            .map_or(self.rows.len(), |entry| entry.start_row)
    }
}

fn check_partition(index: &[IndexRow], rows: usize) -> Result<(), IntegrityError> {
    let mut expected = 0;
    for (position, entry) in index.iter().enumerate() {
        if entry.n_rows == 0 {
            return Err(IntegrityError::EmptyEffort { position });
        }
        if entry.start_row != expected || entry.end_row() > rows {
            return Err(IntegrityError::BrokenPartition {
                position,
                start: entry.start_row,
                end: entry.end_row(),
                expected,
            });
        }
        expected = entry.end_row();
    }
    if expected != rows {
        return Err(IntegrityError::UncoveredRows {
            covered: expected,
            rows,
        });
    }
    Ok(())
}
