/*
 * Bounded history of comparison outcomes and rolling provider statistics
 */

mod exporter;

use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, PoisonError};
use crate::models::{CompareResult, ProviderTag};

pub use exporter::MetricsExporter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSample {
    pub provider: ProviderTag,
    pub success: bool,
    pub latency_ms: Option<u64>,
}

/// Serialized flat: `{ts, gluexSuccess, lifiSuccess, gluexMs, lifiMs}` with
/// `ts` in epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricRecord {
    pub ts: DateTime<Utc>,
    pub providers: Vec<ProviderSample>,
}

impl Serialize for MetricRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("ts", &self.ts.timestamp_millis())?;
        for sample in &self.providers {
            map.serialize_entry(&format!("{}Success", sample.provider), &sample.success)?;
        }
        for sample in &self.providers {
            if let Some(ms) = sample.latency_ms {
                map.serialize_entry(&format!("{}Ms", sample.provider), &ms)?;
            }
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSummary {
    #[serde(skip)]
    pub provider: ProviderTag,
    pub ok_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_ms: Option<u64>,
}

/// Serialized as `{sampleSize, <tag>: {okCount, avgMs}}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSummary {
    pub sample_size: usize,
    pub providers: Vec<ProviderSummary>,
}

impl Serialize for MetricsSummary {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.providers.len() + 1))?;
        map.serialize_entry("sampleSize", &self.sample_size)?;
        for summary in &self.providers {
            map.serialize_entry(summary.provider.as_str(), summary)?;
        }
        map.end()
    }
}

/// Fixed-capacity ring of [`MetricRecord`]s, newest first.
#[derive(Debug)]
pub struct MetricsRecorder {
    capacity: usize,
    records: Mutex<VecDeque<MetricRecord>>,
}

impl MetricsRecorder {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            records: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn record_comparison(&self, result: &CompareResult) {
        let samples = result
            .quotes
            .iter()
            .map(|quote| ProviderSample {
                provider: quote.provider,
                success: quote.success,
                latency_ms: result.elapsed_ms(quote.provider),
            })
            .collect();
        self.push(MetricRecord { ts: result.fetched_at, providers: samples });
    }

    fn push(&self, record: MetricRecord) {
        if self.capacity == 0 {
            return;
        }
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        records.push_front(record);
        records.truncate(self.capacity);
    }

    /// Success counts and rounded mean latency per provider over the newest
    /// `limit` records. Every provider appears, in tag order.
    pub fn summary(&self, limit: usize) -> MetricsSummary {
        let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        let window = records.iter().take(limit);
        let sample_size = window.len();

        // (ok_count, latency_sum, latency_samples)
        let mut totals: BTreeMap<ProviderTag, (usize, u128, u128)> =
            ProviderTag::ALL.iter().map(|tag| (*tag, (0, 0, 0))).collect();
        for record in window {
            for sample in &record.providers {
                let entry = totals.entry(sample.provider).or_default();
                if sample.success {
                    entry.0 += 1;
                }
                if let Some(ms) = sample.latency_ms {
                    entry.1 += u128::from(ms);
                    entry.2 += 1;
                }
            }
        }

        let providers = totals
            .into_iter()
            .map(|(provider, (ok_count, sum, n))| ProviderSummary {
                provider,
                ok_count,
                avg_ms: (n > 0).then(|| u64::try_from((sum + n / 2) / n).unwrap_or(u64::MAX)),
            })
            .collect();

        MetricsSummary { sample_size, providers }
    }

    pub fn recent(&self, limit: usize) -> Vec<MetricRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
