//! Density sampling.
//!
//! Probes the store at strategic instants to estimate how many rows per
//! day the search predicate matches, so the planner can size chunks
//! inversely to density. Sampling never fails a job: probes that error
//! are logged and skipped, and zero successful probes yield the fallback
//! model that routes planning to the legacy path.

use std::time::Instant;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tracing::{debug, warn};

use crate::traits::store::MessageStore;
use crate::types::config::EngineConfig;
use crate::types::plan::{is_weekend, DateRange, DensityModel, SampleStat};

/// Probe the store and derive a [`DensityModel`] for `range`.
///
/// Probe placement: the two range edges, the midpoint, the quartiles,
/// and for ranges longer than the random-probe threshold up to two
/// uniformly-random interior instants for anomaly detection. Each probe
/// counts rows in the 24h window following its instant, using the same
/// predicate the real search will use.
pub async fn sample_density<S>(
    store: &S,
    keywords: &[String],
    range: DateRange,
    config: &EngineConfig,
) -> DensityModel
where
    S: MessageStore + ?Sized,
{
    let probes = probe_instants(range, config);
    let mut stats = Vec::with_capacity(probes.len());

    for instant in probes {
        let window = DateRange::new(instant, instant + ChronoDuration::days(1));
        let started = Instant::now();
        match store.count(keywords, window).await {
            Ok(rows_in_day) => {
                let latency = started.elapsed();
                debug!(
                    probed_at = %instant,
                    rows_in_day,
                    latency_ms = latency.as_millis() as u64,
                    "density probe"
                );
                stats.push(SampleStat {
                    probed_at: instant,
                    rows_in_day,
                    latency,
                    weekend: is_weekend(instant),
                });
            }
            Err(e) => {
                warn!(probed_at = %instant, error = %e, "density probe failed, skipping");
            }
        }
    }

    let model = DensityModel::from_stats(&stats);
    debug!(
        probes = model.sample_count,
        mean = model.mean,
        std_dev = model.std_dev,
        weekday_mean = model.weekday_mean,
        weekend_mean = model.weekend_mean,
        "density model derived"
    );
    model
}

/// Strategic probe instants inside `range`, sorted and deduplicated.
/// Short ranges collapse overlapping probes, so the count is 1..=7.
pub fn probe_instants(range: DateRange, config: &EngineConfig) -> Vec<DateTime<Utc>> {
    let span = range.span();
    let day = ChronoDuration::days(1);

    let mut probes = vec![
        range.start,
        range.start + span / 4,
        range.start + span / 2,
        range.start + (span / 4) * 3,
        // Near the trailing edge: the last full sampling window.
        range.end - day,
    ];

    if span.num_days() > config.random_probe_threshold_days {
        let max_offset = (span - day).num_seconds();
        for _ in 0..2 {
            let offset = fastrand::i64(0..max_offset.max(1));
            probes.push(range.start + ChronoDuration::seconds(offset));
        }
    }

    probes.retain(|p| range.contains(*p));
    probes.sort();
    probes.dedup();
    probes
}
