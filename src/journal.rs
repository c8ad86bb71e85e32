use crate::types::TrajectoryRecord;

/// Append-only trajectory log. Recording is a no-op while disabled.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    enabled: bool,
    records: Vec<TrajectoryRecord>,
}

impl Journal {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            records: Vec::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn record(&mut self, record: TrajectoryRecord) {
        if self.enabled {
            self.records.push(record);
        }
    }

    pub fn records(&self) -> &[TrajectoryRecord] {
        &self.records
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.records)
    }
}
