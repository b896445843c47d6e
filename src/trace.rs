use std::fs::File;
use std::path::Path;

use itertools::{Itertools, MinMaxResult};
use log::{debug, info};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Result, invalid, io_at};

/// One day of the historical demand/cost series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DayRecord {
    pub day: i64,
    pub inventory_level: f64,
    pub demand: f64,
    pub transport_cost: f64,
}

/// Validated, zero-based, contiguous sequence of daily records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    records: Vec<DayRecord>,
}

impl Trace {
    /// Validates `records` and re-bases their day counter so the first record is day 0.
    pub fn new(mut records: Vec<DayRecord>) -> Result<Self> {
        let Some(first) = records.first().map(|r| r.day) else {
            return invalid("trace is empty");
        };
        for (offset, record) in records.iter().enumerate() {
            let Some(expected) = i64::try_from(offset).ok().and_then(|o| first.checked_add(o)) else {
                return invalid(format!(
                    "trace day counter overflows after day {first} ({} records)",
                    records.len()
                ));
            };
            if record.day != expected {
                return invalid(format!(
                    "trace days must be contiguous: expected day {expected}, found {}",
                    record.day
                ));
            }
            let values = [
                ("inventory_level", record.inventory_level),
                ("demand", record.demand),
                ("transport_cost", record.transport_cost),
            ];
            for (name, val) in values {
                if !(val.is_finite() && val >= 0.0) {
                    return invalid(format!("day {}: {name} must be non-negative, got {val}", record.day));
                }
            }
        }
        if first != 0 {
            debug!("Re-basing trace starting at day {first} to day 0");
            for record in records.iter_mut() {
                record.day -= first;
            }
        }
        Ok(Trace { records })
    }

    /// Reads a CSV with a header row containing at least `day`, `inventory_level`,
    /// `demand` and `transport_cost`. Other columns are ignored.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| io_at(path, e))?;
        let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(file);
        let records = reader
            .deserialize()
            .collect::<std::result::Result<Vec<DayRecord>, csv::Error>>()?;
        info!("Loaded {} daily records from {}", records.len(), path.display());
        Trace::new(records)
    }

    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut writer = csv::Writer::from_path(path)?;
        for record in &self.records {
            writer.serialize(record)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Random trace with integer inventory in [10, 100), integer demand in
    /// [5, 20) and transport cost in [50, 200).
    pub fn synthetic<R: Rng + ?Sized>(num_days: usize, rng: &mut R) -> Result<Self> {
        let records = (0..num_days)
            .map(|day| DayRecord {
                day: day as i64,
                inventory_level: rng.random_range(10..100) as f64,
                demand: rng.random_range(5..20) as f64,
                transport_cost: rng.random_range(50.0..200.0),
            })
            .collect();
        Trace::new(records)
    }

    /// Min-max scales inventory, demand and transport cost to [0, 1] column by
    /// column. Inventory and demand share one scale so their ratio is kept.
    pub fn normalized(&self) -> Trace {
        let stock = self
            .records
            .iter()
            .flat_map(|r| [r.inventory_level, r.demand]);
        let (stock_min, stock_max) = min_max(stock);
        let (cost_min, cost_max) = min_max(self.records.iter().map(|r| r.transport_cost));
        let records = self
            .records
            .iter()
            .map(|r| DayRecord {
                day: r.day,
                inventory_level: scale(r.inventory_level, stock_min, stock_max),
                demand: scale(r.demand, stock_min, stock_max),
                transport_cost: scale(r.transport_cost, cost_min, cost_max),
            })
            .collect();
        Trace { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn record(&self, day: usize) -> Option<&DayRecord> {
        self.records.get(day)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DayRecord> {
        self.records.iter()
    }
}

fn min_max(values: impl Iterator<Item = f64>) -> (f64, f64) {
    match values.minmax() {
        MinMaxResult::NoElements => (0.0, 0.0),
        MinMaxResult::OneElement(v) => (v, v),
        MinMaxResult::MinMax(lo, hi) => (lo, hi),
    }
}

fn scale(val: f64, min: f64, max: f64) -> f64 {
    if max > min { (val - min) / (max - min) } else { 0.0 }
}
