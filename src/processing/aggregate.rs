//! Single-pass statistics over equipment records.

use std::collections::HashMap;

use crate::types::{EquipmentRecord, FieldStats, Parameter, StatisticsSnapshot, TypeCount};

/// Result of one pass over a record sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    pub count: usize,
    /// `None` when `count == 0`; there is no mean of nothing.
    pub snapshot: Option<StatisticsSnapshot>,
    pub distribution: TypeDistribution,
}

impl Aggregate {
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Category label → occurrence count, kept in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeDistribution {
    entries: Vec<TypeCount>,
    index: HashMap<String, usize>,
}

impl TypeDistribution {
    /// Count one occurrence of `category`.
    pub fn observe(&mut self, category: &str) {
        match self.index.get(category) {
            Some(&i) => self.entries[i].count += 1,
            None => {
                self.index.insert(category.to_owned(), self.entries.len());
                self.entries.push(TypeCount {
                    category: category.to_owned(),
                    count: 1,
                });
            }
        }
    }

    /// Build from records without computing numeric statistics.
    pub fn from_records(records: &[EquipmentRecord]) -> Self {
        let mut out = Self::default();
        for rec in records {
            out.observe(&rec.category);
        }
        out
    }

    /// Entries in first-seen order.
    pub fn entries(&self) -> &[TypeCount] {
        &self.entries
    }

    /// Entries by descending count; ties keep first-seen order.
    pub fn sorted(&self) -> Vec<TypeCount> {
        let mut out = self.entries.clone();
        // Stable sort, so equal counts stay in first-seen order.
        out.sort_by(|a, b| b.count.cmp(&a.count));
        out
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Share of `count` in `total`, in percent. `None` when `total == 0`.
pub fn percentage(count: usize, total: usize) -> Option<f64> {
    if total == 0 {
        None
    } else {
        Some(count as f64 / total as f64 * 100.0)
    }
}

#[derive(Debug, Clone, Copy)]
struct RunningStats {
    n: usize,
    sum: f64,
    /// Incremental mean over pre-divided terms; stays finite when `sum` overflows.
    mean: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    fn start(v: f64) -> Self {
        Self {
            n: 1,
            sum: v,
            mean: v,
            min: v,
            max: v,
        }
    }

    fn push(&mut self, v: f64) {
        self.n += 1;
        let n = self.n as f64;
        self.sum += v;
        self.mean += v / n - self.mean / n;
        // Strict comparisons: on ties the first value seen stays.
        if v.total_cmp(&self.min).is_lt() {
            self.min = v;
        }
        if v.total_cmp(&self.max).is_gt() {
            self.max = v;
        }
    }

    fn finish(self) -> FieldStats {
        let avg = if self.sum.is_finite() {
            self.sum / self.n as f64
        } else {
            self.mean
        };
        // Rounding can land the mean just outside the observed range.
        FieldStats {
            avg: avg.clamp(self.min, self.max),
            min: self.min,
            max: self.max,
        }
    }
}

/// Compute count, per-parameter `{avg, min, max}`, and the type distribution in one fold.
pub fn aggregate(records: &[EquipmentRecord]) -> Aggregate {
    let mut distribution = TypeDistribution::default();
    let mut running: Option<[RunningStats; 3]> = None;

    for rec in records {
        distribution.observe(&rec.category);
        let values = Parameter::ALL.map(|p| p.value_of(rec));
        match running.as_mut() {
            Some(acc) => {
                for (stats, v) in acc.iter_mut().zip(values) {
                    stats.push(v);
                }
            }
            None => running = Some(values.map(RunningStats::start)),
        }
    }

    let count = records.len();
    let snapshot = running.map(|[flowrate, pressure, temperature]| StatisticsSnapshot {
        flowrate: flowrate.finish(),
        pressure: pressure.finish(),
        temperature: temperature.finish(),
    });

    Aggregate {
        count,
        snapshot,
        distribution,
    }
}

#[cfg(test)]
mod tests {
    use super::{aggregate, percentage, TypeDistribution};
    use crate::types::{EquipmentRecord, Parameter};

    fn rec(name: &str, category: &str, f: f64, p: f64, t: f64) -> EquipmentRecord {
        EquipmentRecord {
            name: name.to_string(),
            category: category.to_string(),
            flowrate: f,
            pressure: p,
            temperature: t,
        }
    }

    fn sample() -> Vec<EquipmentRecord> {
        vec![
            rec("P-1", "Pump", 10.0, 5.0, 80.0),
            rec("V-1", "Valve", 2.0, 1.0, 40.0),
            rec("P-2", "Pump", 30.0, 6.0, 90.0),
            rec("R-1", "Reactor", 120.0, 20.0, 300.0),
            rec("V-2", "Valve", 4.0, 1.5, 45.0),
        ]
    }

    #[test]
    fn aggregate_computes_mean_min_max() {
        let agg = aggregate(&sample());
        assert_eq!(agg.count, 5);
        let snap = agg.snapshot.unwrap();
        assert_eq!(snap.flowrate.min, 2.0);
        assert_eq!(snap.flowrate.max, 120.0);
        assert!((snap.flowrate.avg - 33.2).abs() < 1e-9);
        assert_eq!(snap.pressure.max, 20.0);
        assert_eq!(snap.temperature.min, 40.0);
    }

    #[test]
    fn aggregate_of_nothing_has_no_snapshot() {
        let agg = aggregate(&[]);
        assert!(agg.is_empty());
        assert!(agg.snapshot.is_none());
        assert!(agg.distribution.is_empty());
    }

    #[test]
    fn mean_stays_within_range_under_rounding() {
        let records: Vec<_> = (0..3).map(|i| rec(&i.to_string(), "X", 0.1, 0.1, 0.1)).collect();
        let snap = aggregate(&records).snapshot.unwrap();
        for p in Parameter::ALL {
            let s = snap.get(p);
            assert!(s.min <= s.avg && s.avg <= s.max, "{p:?}: {s:?}");
        }
    }

    #[test]
    fn mean_of_huge_values_does_not_overflow() {
        let records = vec![
            rec("A", "X", 1e308, f64::MAX, 1.0),
            rec("B", "X", 1.7e308, -f64::MAX, 2.0),
            rec("C", "X", -1.0, f64::MAX, 3.0),
        ];
        let snap = aggregate(&records).snapshot.unwrap();

        let flow = snap.flowrate;
        assert!(flow.avg.is_finite());
        assert!((flow.avg - 9e307).abs() / 9e307 < 1e-12, "{flow:?}");
        assert!(flow.avg < flow.max);

        let pressure = snap.pressure;
        let expected = f64::MAX / 3.0;
        assert!((pressure.avg - expected).abs() / expected < 1e-12, "{pressure:?}");
        assert_eq!(snap.temperature.avg, 2.0);
    }

    #[test]
    fn distribution_sorts_by_count_then_first_seen() {
        let mut records = sample();
        records.push(rec("H-1", "Heat Exchanger", 1.0, 1.0, 1.0));
        records.push(rec("H-2", "Heat Exchanger", 1.0, 1.0, 1.0));
        let agg = aggregate(&records);

        let first_seen: Vec<_> = agg
            .distribution
            .entries()
            .iter()
            .map(|t| t.category.as_str())
            .collect();
        assert_eq!(first_seen, vec!["Pump", "Valve", "Reactor", "Heat Exchanger"]);

        let sorted: Vec<_> = agg
            .distribution
            .sorted()
            .into_iter()
            .map(|t| (t.category, t.count))
            .collect();
        assert_eq!(
            sorted,
            vec![
                ("Pump".to_string(), 2),
                ("Valve".to_string(), 2),
                ("Heat Exchanger".to_string(), 2),
                ("Reactor".to_string(), 1),
            ]
        );
        assert_eq!(TypeDistribution::from_records(&records), agg.distribution);
    }

    #[test]
    fn percentage_guards_zero_total() {
        assert_eq!(percentage(3, 0), None);
        assert_eq!(percentage(1, 4), Some(25.0));
    }
}
