//! Query Log Ring (component I). Fixed-capacity ring buffer behind a
//! single mutex, grounded on the bounded-`VecDeque` shape the teacher
//! uses for its in-memory metrics history.

use std::collections::VecDeque;

use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Cache,
    Upstream,
}

#[derive(Debug, Clone)]
pub struct QueryRecord {
    pub time: chrono::DateTime<chrono::Utc>,
    pub qname: String,
    pub qtype: String,
    pub route: String,
    pub latency_ms: f64,
    pub source: Source,
}

pub struct QueryLogRing {
    capacity: usize,
    records: Mutex<VecDeque<QueryRecord>>,
}

impl QueryLogRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            records: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// O(1): overwrites the oldest entry once at capacity.
    pub fn append(&self, record: QueryRecord) {
        let mut records = self.records.lock();
        if records.len() >= self.capacity {
            records.pop_front();
        }
        records.push_back(record);
    }

    /// The most recent `min(k, size)` entries, oldest first.
    pub fn tail(&self, k: usize) -> Vec<QueryRecord> {
        let records = self.records.lock();
        let skip = records.len().saturating_sub(k);
        records.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(qname: &str) -> QueryRecord {
        QueryRecord {
            time: chrono::Utc::now(),
            qname: qname.to_string(),
            qtype: "A".to_string(),
            route: "china".to_string(),
            latency_ms: 1.0,
            source: Source::Upstream,
        }
    }

    #[test]
    fn overflow_overwrites_oldest() {
        let ring = QueryLogRing::new(2);
        ring.append(record("a.com"));
        ring.append(record("b.com"));
        ring.append(record("c.com"));
        let tail = ring.tail(10);
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].qname, "b.com");
        assert_eq!(tail[1].qname, "c.com");
    }

    #[test]
    fn tail_returns_chronological_order() {
        let ring = QueryLogRing::new(5);
        for name in ["a.com", "b.com", "c.com"] {
            ring.append(record(name));
        }
        let tail = ring.tail(2);
        assert_eq!(tail.iter().map(|r| r.qname.as_str()).collect::<Vec<_>>(), vec!["b.com", "c.com"]);
    }
}
