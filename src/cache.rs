//! Response cache (component B): TTL-aware, bounded, insertion-order
//! eviction. Grounded on the teacher's `DnsCache`/`CacheStats` shape, with
//! the TTL math tightened per spec: clamped to `[min_ttl, max_ttl]` and
//! responses that are not `NOERROR` with at least one answer are never
//! stored at all (the teacher instead kept a separate negative-TTL path).

use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::trace;

use crate::dns::{DnsPacket, DnsQClass, DnsQType, DnsResponseCode};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub name: String,
    pub qtype: DnsQType,
    pub qclass: DnsQClass,
}

impl CacheKey {
    /// `name` must already be normalized (lowercase, no trailing dot).
    pub fn new(name: impl Into<String>, qtype: DnsQType, qclass: DnsQClass) -> Self {
        Self {
            name: name.into(),
            qtype,
            qclass,
        }
    }

    pub fn from_question(question: &crate::dns::DnsQuestion) -> Self {
        Self::new(
            normalize_name(&question.name),
            question.qtype,
            question.qclass,
        )
    }
}

/// Lowercases and strips a single trailing dot, per §3's cache key rule.
pub fn normalize_name(name: &str) -> String {
    let lower = name.to_ascii_lowercase();
    lower.strip_suffix('.').map(str::to_string).unwrap_or(lower)
}

#[derive(Debug, Clone)]
struct CacheEntry {
    response: DnsPacket,
    inserted_at: Instant,
    ttl: u32,
}

impl CacheEntry {
    fn expire_at(&self) -> Instant {
        self.inserted_at + Duration::from_secs(self.ttl as u64)
    }

    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expire_at()
    }

    /// Rewrites every record's TTL to `max(1, ttl - elapsed)` and stamps
    /// the response with the querying transaction's id.
    fn materialize(&self, now: Instant, txid: u16) -> DnsPacket {
        let elapsed = now.saturating_duration_since(self.inserted_at).as_secs() as u32;
        let mut response = self.response.clone();
        response.header.id = txid;
        for record in response
            .answers
            .iter_mut()
            .chain(response.authorities.iter_mut())
            .chain(response.additional.iter_mut())
        {
            record.ttl = record.ttl.saturating_sub(elapsed).max(1);
        }
        response
    }
}

#[derive(Debug, Default)]
pub struct CacheStats {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub evictions: AtomicU64,
}

impl CacheStats {
    fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }
    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }
    fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, entries: usize) -> CacheStatsSnapshot {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        CacheStatsSnapshot {
            hits,
            misses,
            evictions: self.evictions.load(Ordering::Relaxed),
            hit_rate: if total == 0 { 0.0 } else { hits as f64 / total as f64 },
            entries,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub hit_rate: f64,
    pub entries: usize,
}

pub struct Cache {
    entries: DashMap<CacheKey, CacheEntry>,
    insertion_order: Mutex<Vec<CacheKey>>,
    max_entries: usize,
    min_ttl: u32,
    max_ttl: u32,
    stats: CacheStats,
}

impl Cache {
    pub fn new(max_entries: usize, min_ttl: u32, max_ttl: u32) -> Self {
        Self {
            entries: DashMap::new(),
            insertion_order: Mutex::new(Vec::new()),
            max_entries,
            min_ttl,
            max_ttl,
            stats: CacheStats::default(),
        }
    }

    /// Returns `Some(response)` with rewritten TTLs and transaction id on
    /// hit, `None` on miss (including a just-expired entry, which is
    /// removed as a side effect).
    pub fn get(&self, key: &CacheKey, txid: u16) -> Option<DnsPacket> {
        let now = Instant::now();
        let hit = match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => Some(entry.materialize(now, txid)),
            Some(_) => None,
            None => None,
        };
        match hit {
            Some(response) => {
                self.stats.record_hit();
                Some(response)
            }
            None => {
                self.entries.remove(key);
                self.stats.record_miss();
                None
            }
        }
    }

    /// Stores `response` under `key` if it is cacheable (NOERROR with at
    /// least one answer). Evicts the oldest entry by insertion order when
    /// over capacity. Returns `true` if storing this entry evicted another,
    /// so the caller can drive the matching Prometheus counter.
    pub fn put(&self, key: CacheKey, response: DnsPacket) -> bool {
        let Some(ttl) = self.cacheable_ttl(&response) else {
            trace!(name = %key.name, "response not cacheable, skipping store");
            return false;
        };

        let mut evicted = false;
        if !self.entries.contains_key(&key) {
            let mut order = self.insertion_order.lock();
            order.push(key.clone());
            if order.len() > self.max_entries {
                if let Some(oldest) = order.first().cloned() {
                    order.remove(0);
                    self.entries.remove(&oldest);
                    self.stats.record_eviction();
                    evicted = true;
                }
            }
        }

        self.entries.insert(
            key,
            CacheEntry {
                response,
                inserted_at: Instant::now(),
                ttl,
            },
        );
        evicted
    }

    /// The minimum positive answer TTL clamped to `[min_ttl, max_ttl]`, or
    /// `None` if the response must not be cached at all.
    fn cacheable_ttl(&self, response: &DnsPacket) -> Option<u32> {
        if response.header.rcode() != DnsResponseCode::NoError || response.answers.is_empty() {
            return None;
        }
        let min_answer_ttl = response.answers.iter().map(|r| r.ttl).min()?;
        Some(min_answer_ttl.clamp(self.min_ttl, self.max_ttl))
    }

    pub fn clear(&self) {
        self.entries.clear();
        self.insertion_order.lock().clear();
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::{DnsHeader, DnsRecord};
    use std::net::Ipv4Addr;

    fn noerror_response(ttl: u32) -> DnsPacket {
        let mut packet = DnsPacket::new(DnsHeader {
            qr: true,
            ancount: 1,
            ..Default::default()
        });
        packet
            .answers
            .push(DnsRecord::a("example.com", ttl, Ipv4Addr::new(1, 2, 3, 4)));
        packet
    }

    #[test]
    fn miss_then_hit_round_trip() {
        let cache = Cache::new(10, 60, 86_400);
        let key = CacheKey::new("example.com", DnsQType::A, DnsQClass::IN);
        assert!(cache.get(&key, 1).is_none());
        cache.put(key.clone(), noerror_response(300));
        let hit = cache.get(&key, 7).unwrap();
        assert_eq!(hit.header.id, 7);
        assert_eq!(hit.answers[0].ttl, 300);
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn ttl_clamped_to_config_bounds() {
        let cache = Cache::new(10, 60, 86_400);
        let key = CacheKey::new("example.com", DnsQType::A, DnsQClass::IN);
        cache.put(key.clone(), noerror_response(5));
        // stored ttl should have been clamped up to 60
        let hit = cache.get(&key, 1).unwrap();
        assert_eq!(hit.answers[0].ttl, 60);
    }

    #[test]
    fn non_noerror_response_is_not_cached() {
        let cache = Cache::new(10, 60, 86_400);
        let key = CacheKey::new("nx.example.com", DnsQType::A, DnsQClass::IN);
        let mut nx = DnsPacket::new(DnsHeader::default());
        nx.header.set_rcode(DnsResponseCode::NxDomain);
        cache.put(key.clone(), nx);
        assert!(cache.get(&key, 1).is_none());
    }

    #[test]
    fn lru_bound_evicts_first_inserted() {
        let cache = Cache::new(2, 60, 86_400);
        let a = CacheKey::new("a.com", DnsQType::A, DnsQClass::IN);
        let b = CacheKey::new("b.com", DnsQType::A, DnsQClass::IN);
        let c = CacheKey::new("c.com", DnsQType::A, DnsQClass::IN);
        assert!(!cache.put(a.clone(), noerror_response(300)));
        assert!(!cache.put(b.clone(), noerror_response(300)));
        assert!(cache.put(c.clone(), noerror_response(300)));
        assert!(cache.get(&a, 1).is_none());
        assert!(cache.get(&b, 1).is_some());
        assert!(cache.get(&c, 1).is_some());
    }

    #[test]
    fn suffix_boundary_helper_normalizes_case_and_dot() {
        assert_eq!(normalize_name("Example.COM."), "example.com");
    }
}
