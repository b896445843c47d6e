use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::learning::state::EncodedState;

/// Dense `n_states x n_actions` table of action values, stored row-major.
///
/// Serialises as a list of rows so the shape is implied by the data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "Vec<Vec<f64>>", try_from = "Vec<Vec<f64>>")]
pub struct QTable {
    n_states: usize,
    n_actions: usize,
    tab: Vec<f64>,
}

impl QTable {
    pub fn zeros(n_states: usize, n_actions: usize) -> Self {
        QTable {
            n_states,
            n_actions,
            tab: vec![0.0; n_states * n_actions],
        }
    }

    pub fn n_states(&self) -> usize {
        self.n_states
    }

    pub fn n_actions(&self) -> usize {
        self.n_actions
    }

    fn check(&self, state: EncodedState, action: usize) -> Result<()> {
        if state >= self.n_states {
            return Err(Error::Index {
                what: "state",
                index: state,
                len: self.n_states,
            });
        }
        if action >= self.n_actions {
            return Err(Error::Index {
                what: "action",
                index: action,
                len: self.n_actions,
            });
        }
        Ok(())
    }

    pub fn get(&self, state: EncodedState, action: usize) -> Result<f64> {
        self.check(state, action)?;
        Ok(self.tab[state * self.n_actions + action])
    }

    pub fn set(&mut self, state: EncodedState, action: usize, val: f64) -> Result<()> {
        self.check(state, action)?;
        self.tab[state * self.n_actions + action] = val;
        Ok(())
    }

    pub fn row(&self, state: EncodedState) -> Result<&[f64]> {
        self.check(state, 0)?;
        let start = state * self.n_actions;
        Ok(&self.tab[start..start + self.n_actions])
    }

    /// Greedy action index at `state`; ties go to the lowest index.
    pub fn best_index(&self, state: EncodedState) -> Result<usize> {
        let row = self.row(state)?;
        let mut best = 0;
        for (idx, q) in row.iter().enumerate().skip(1) {
            if *q > row[best] {
                best = idx;
            }
        }
        Ok(best)
    }

    pub fn max_value(&self, state: EncodedState) -> Result<f64> {
        let best = self.best_index(state)?;
        Ok(self.row(state)?[best])
    }

    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let n_states = rows.len();
        let n_actions = rows.first().map(Vec::len).unwrap_or(0);
        if n_states == 0 || n_actions == 0 {
            return Err(Error::CorruptData(format!(
                "Q-table must be non-empty, got {n_states} x {n_actions}"
            )));
        }
        if let Some((idx, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != n_actions) {
            return Err(Error::CorruptData(format!(
                "Q-table row {idx} has {} columns, expected {n_actions}",
                row.len()
            )));
        }
        Ok(QTable {
            n_states,
            n_actions,
            tab: rows.into_iter().flatten().collect(),
        })
    }

    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        if self.n_actions == 0 {
            return vec![];
        }
        self.tab
            .chunks(self.n_actions)
            .map(<[f64]>::to_vec)
            .collect()
    }
}

impl From<QTable> for Vec<Vec<f64>> {
    fn from(q_table: QTable) -> Self {
        q_table.to_rows()
    }
}

impl TryFrom<Vec<Vec<f64>>> for QTable {
    type Error = Error;

    fn try_from(rows: Vec<Vec<f64>>) -> Result<Self> {
        QTable::from_rows(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeros_and_bounds() {
        let mut q = QTable::zeros(4, 3);
        assert_eq!(q.get(3, 2).unwrap(), 0.0);
        assert!(matches!(q.get(4, 0), Err(Error::Index { what: "state", .. })));
        assert!(matches!(q.get(0, 3), Err(Error::Index { what: "action", .. })));
        q.set(2, 1, 1.5).unwrap();
        assert_eq!(q.row(2).unwrap(), &[0.0, 1.5, 0.0]);
    }

    #[test]
    fn test_best_index_ties_lowest() {
        let mut q = QTable::zeros(2, 4);
        assert_eq!(q.best_index(0).unwrap(), 0);
        q.set(1, 1, 2.0).unwrap();
        q.set(1, 3, 2.0).unwrap();
        assert_eq!(q.best_index(1).unwrap(), 1);
        assert_eq!(q.max_value(1).unwrap(), 2.0);

        q.set(0, 0, -1.0).unwrap();
        assert_eq!(q.best_index(0).unwrap(), 1);
        assert_eq!(q.max_value(0).unwrap(), 0.0);
    }

    #[test]
    fn test_rows_shape_validation() {
        let q = QTable::from_rows(vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]]).unwrap();
        assert_eq!((q.n_states(), q.n_actions()), (3, 2));
        assert_eq!(q.get(2, 0).unwrap(), 5.0);

        assert!(matches!(
            QTable::from_rows(vec![vec![1.0, 2.0], vec![3.0]]),
            Err(Error::CorruptData(_))
        ));
        assert!(matches!(QTable::from_rows(vec![]), Err(Error::CorruptData(_))));
        assert!(matches!(QTable::from_rows(vec![vec![]]), Err(Error::CorruptData(_))));
    }

    #[test]
    fn test_json_rejects_ragged_table() {
        let parsed: std::result::Result<QTable, _> = serde_json::from_str("[[1.0, 2.0], [3.0]]");
        assert!(parsed.is_err());

        let q: QTable = serde_json::from_str("[[0.1, 0.2], [0.3, 0.4]]").unwrap();
        assert_eq!(q.get(1, 1).unwrap(), 0.4);
    }
}
