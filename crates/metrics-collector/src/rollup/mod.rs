pub mod hour;
pub mod minute;

use std::collections::HashMap;

#[derive(Debug, Clone)]
pub(crate) struct GroupAgg {
    pub count: i64,
    pub sum: f64,
    pub min: f64,
    pub max: f64,
    pub values: Vec<f64>,
    pub kind: String,
}

impl GroupAgg {
    fn push(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.values.push(value);
    }
}

pub(crate) fn group_points(rows: Vec<(String, String, f64, String)>) -> HashMap<(String, String), GroupAgg> {
    let mut groups: HashMap<(String, String), GroupAgg> = HashMap::new();
    for (name, labels, value, kind) in rows {
        groups
            .entry((name, labels))
            .or_insert_with(|| GroupAgg {
                count: 0,
                sum: 0.0,
                min: f64::INFINITY,
                max: f64::NEG_INFINITY,
                values: Vec::new(),
                kind,
            })
            .push(value);
    }
    groups
}
