use std::collections::BTreeSet;

use rand::Rng;
use serde::{Deserialize, Serialize};
use sheet_model::{CellAddress, Column, RowRange};

/// Which cells a snapshot covers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplingPlan {
    /// Always captured, in this order.
    pub summary_cells: Vec<CellAddress>,
    /// Captured on every sampled row.
    pub detail_columns: Vec<Column>,
    /// Inclusive data rows the sample is drawn from.
    pub rows: RowRange,
    /// Rows drawn at random on top of the first, middle and last row.
    pub random_rows: usize,
}

impl SamplingPlan {
    /// Draw one concrete row set.
    ///
    /// The first, last and integer-floor middle rows are always present. Random rows
    /// are added until the sample holds `fixed + random_rows` distinct rows, or every
    /// row of the range when the range is smaller than that.
    ///
    /// Draw once per before/after pair and reuse the result for both captures.
    pub fn sample_rows<R: Rng>(&self, rng: &mut R) -> RowSample {
        let mut rows = BTreeSet::new();
        rows.insert(self.rows.start);
        rows.insert(self.rows.end);
        rows.insert(self.rows.middle());

        let target = rows
            .len()
            .saturating_add(self.random_rows)
            .min(self.rows.len() as usize);
        while rows.len() < target {
            rows.insert(rng.random_range(self.rows.start..=self.rows.end));
        }

        RowSample { rows }
    }

    /// Every address a snapshot over `sample` reads: summary cells first, then each
    /// sampled row across the detail columns.
    pub fn addresses(&self, sample: &RowSample) -> Vec<CellAddress> {
        let mut out =
            Vec::with_capacity(self.summary_cells.len() + sample.len() * self.detail_columns.len());
        out.extend(self.summary_cells.iter().copied());
        for row in sample.iter() {
            out.extend(self.detail_columns.iter().map(|column| column.at(row)));
        }
        out
    }
}

/// A deduplicated set of sampled rows, ascending.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowSample {
    rows: BTreeSet<u32>,
}

impl RowSample {
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.rows.iter().copied()
    }

    pub fn contains(&self, row: u32) -> bool {
        self.rows.contains(&row)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl FromIterator<u32> for RowSample {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        Self {
            rows: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng as _;

    fn plan(start: u32, end: u32, random_rows: usize) -> SamplingPlan {
        SamplingPlan {
            summary_cells: vec![CellAddress::from_a1("S2").unwrap()],
            detail_columns: vec![
                Column::from_letters("H").unwrap(),
                Column::from_letters("AE").unwrap(),
            ],
            rows: RowRange::new(start, end).unwrap(),
            random_rows,
        }
    }

    #[test]
    fn fixed_rows_are_always_present() {
        let mut rng = StdRng::seed_from_u64(7);
        let sample = plan(5, 169, 10).sample_rows(&mut rng);
        assert!(sample.contains(5));
        assert!(sample.contains(87));
        assert!(sample.contains(169));
        assert_eq!(sample.len(), 13);
    }

    #[test]
    fn same_seed_same_rows() {
        let a = plan(5, 169, 10).sample_rows(&mut StdRng::seed_from_u64(42));
        let b = plan(5, 169, 10).sample_rows(&mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn small_ranges_cap_at_their_size() {
        let mut rng = StdRng::seed_from_u64(1);
        let sample = plan(5, 8, 10).sample_rows(&mut rng);
        assert_eq!(sample.iter().collect::<Vec<_>>(), vec![5, 6, 7, 8]);

        let single = plan(9, 9, 3).sample_rows(&mut rng);
        assert_eq!(single.iter().collect::<Vec<_>>(), vec![9]);
    }

    #[test]
    fn huge_random_row_counts_take_the_whole_range() {
        let mut rng = StdRng::seed_from_u64(3);
        let sample = plan(5, 20, usize::MAX).sample_rows(&mut rng);
        assert_eq!(sample.iter().collect::<Vec<_>>(), (5..=20).collect::<Vec<_>>());
    }

    #[test]
    fn addresses_put_summary_cells_first() {
        let plan = plan(5, 169, 0);
        let sample: RowSample = [5, 87, 169].into_iter().collect();
        let a1: Vec<String> = plan
            .addresses(&sample)
            .into_iter()
            .map(|c| c.to_a1())
            .collect();
        assert_eq!(
            a1,
            vec!["S2", "H5", "AE5", "H87", "AE87", "H169", "AE169"]
        );
    }
}
