//! Query-shape frequency table.

use std::time::Duration;

use serde::Serialize;

/// Frequency and timing for one normalized pattern.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatternStat {
    pub pattern: String,
    /// Number of cache writes tagged with this pattern.
    pub count: u64,
    /// Running average over writes that reported a response time.
    pub avg_response_ms: Option<f64>,
    #[serde(skip)]
    timed: u64,
}

impl PatternStat {
    fn new(pattern: String) -> Self {
        Self {
            pattern,
            count: 0,
            avg_response_ms: None,
            timed: 0,
        }
    }

    fn observe(&mut self, response_time: Option<Duration>) {
        self.count += 1;
        if let Some(rt) = response_time {
            let ms = rt.as_secs_f64() * 1000.0;
            self.timed += 1;
            let avg = self.avg_response_ms.unwrap_or(0.0);
            self.avg_response_ms = Some(avg + (ms - avg) / self.timed as f64);
        }
    }
}

/// Bounded, thread-safe pattern frequency table.
///
/// Backed by a moka LRU so rarely seen shapes age out in long-running
/// processes.
pub struct PatternTracker {
    table: moka::sync::Cache<String, PatternStat>,
}

impl PatternTracker {
    pub fn new(capacity: u64) -> Self {
        Self {
            table: moka::sync::Cache::new(capacity),
        }
    }

    /// Count one occurrence of `raw`. Patterns that normalize to nothing
    /// are ignored.
    pub fn record(&self, raw: &str, response_time: Option<Duration>) {
        let pattern = normalize_pattern(raw);
        if pattern.is_empty() {
            return;
        }
        self.table
            .entry(pattern.clone())
            .and_upsert_with(|existing| {
                let mut stat = existing
                    .map(|entry| entry.into_value())
                    .unwrap_or_else(|| PatternStat::new(pattern));
                stat.observe(response_time);
                stat
            });
    }

    /// Top `n` patterns, most frequent first. Ties order by pattern text.
    pub fn top(&self, n: usize) -> Vec<PatternStat> {
        let mut stats: Vec<PatternStat> = self.table.iter().map(|(_, stat)| stat).collect();
        stats.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.pattern.cmp(&b.pattern)));
        stats.truncate(n);
        stats
    }

    pub fn get(&self, raw: &str) -> Option<PatternStat> {
        self.table.get(&normalize_pattern(raw))
    }

    pub fn clear(&self) {
        self.table.invalidate_all();
    }
}

/// Lowercase, drop punctuation and collapse whitespace runs.
pub fn normalize_pattern(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_ascii_punctuation() && !is_wide_punctuation(*c))
        .flat_map(char::to_lowercase)
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_wide_punctuation(c: char) -> bool {
    matches!(
        c,
        '？' | '！' | '。' | '，' | '、' | '：' | '；' | '「' | '」' | '『' | '』' | '（' | '）' | '…'
    )
}
