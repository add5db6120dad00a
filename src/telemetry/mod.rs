//! Telemetry system for cortexrag
//!
//! Pipeline events update running counters for the session summary. Events
//! are not retained; only the last failure message is kept.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

/// Telemetry event types
#[derive(Debug, Clone)]
pub enum TelemetryEvent {
    QueryStarted,
    Retrieved {
        count: usize,
        duration_ms: u64,
    },
    Filtered {
        kept: usize,
        dropped: usize,
    },
    /// Passages that reached the prompt, for either pipeline variant
    ContextBuilt {
        passages: usize,
    },
    Completed {
        answer_chars: usize,
        duration_ms: u64,
    },
    Failed {
        stage: String,
        error: String,
    },
}

/// Telemetry statistics
#[derive(Debug, Clone, Default)]
pub struct TelemetryStats {
    pub queries: usize,
    pub passages_retrieved: usize,
    pub passages_dropped: usize,
    pub empty_contexts: usize,
    pub completions: usize,
    pub answer_chars: usize,
    pub failures: usize,
    pub last_failure: Option<String>,
    pub retrieval_ms: u64,
    pub completion_ms: u64,
}

/// Telemetry collector
#[derive(Clone)]
pub struct TelemetryCollector {
    stats: Arc<Mutex<TelemetryStats>>,
    start_time: Instant,
}

/// Lock ignoring poisoning; the data is plain counters
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl TelemetryCollector {
    /// Create a new telemetry collector
    pub fn new() -> Self {
        Self {
            stats: Arc::new(Mutex::new(TelemetryStats::default())),
            start_time: Instant::now(),
        }
    }

    /// Record an event
    pub fn record(&self, event: TelemetryEvent) {
        let mut stats = lock(&self.stats);
        match event {
            TelemetryEvent::QueryStarted => {
                stats.queries += 1;
            }
            TelemetryEvent::Retrieved { count, duration_ms } => {
                stats.passages_retrieved += count;
                stats.retrieval_ms += duration_ms;
            }
            TelemetryEvent::Filtered { dropped, .. } => {
                stats.passages_dropped += dropped;
            }
            TelemetryEvent::ContextBuilt { passages } => {
                if passages == 0 {
                    stats.empty_contexts += 1;
                }
            }
            TelemetryEvent::Completed {
                answer_chars,
                duration_ms,
            } => {
                stats.completions += 1;
                stats.answer_chars += answer_chars;
                stats.completion_ms += duration_ms;
            }
            TelemetryEvent::Failed { stage, error } => {
                stats.failures += 1;
                stats.last_failure = Some(format!("{}: {}", stage, error));
            }
        }
    }

    /// Get current statistics
    pub fn get_stats(&self) -> TelemetryStats {
        lock(&self.stats).clone()
    }

    /// Get elapsed time since start
    pub fn elapsed(&self) -> std::time::Duration {
        self.start_time.elapsed()
    }

    /// Fraction of retrieved passages the filter removed
    pub fn drop_rate(&self) -> f64 {
        let stats = lock(&self.stats);
        if stats.passages_retrieved == 0 {
            0.0
        } else {
            stats.passages_dropped as f64 / stats.passages_retrieved as f64
        }
    }
}

impl Default for TelemetryCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Simple telemetry display
pub struct TelemetryDisplay {
    collector: TelemetryCollector,
    verbosity: crate::cli::Verbosity,
}

impl TelemetryDisplay {
    /// Create a new display
    pub fn new(collector: TelemetryCollector, verbosity: crate::cli::Verbosity) -> Self {
        Self {
            collector,
            verbosity,
        }
    }

    /// Display summary statistics
    pub fn display_summary(&self) {
        let stats = self.collector.get_stats();
        let elapsed = self.collector.elapsed();

        println!("\nSession Summary");
        println!("─────────────────────────────────────");
        println!("Duration:            {:?}", elapsed);
        println!("Queries:             {}", stats.queries);
        println!("Passages retrieved:  {}", stats.passages_retrieved);
        println!("Passages dropped:    {} ({:.1}%)", stats.passages_dropped, self.collector.drop_rate() * 100.0);
        println!("Empty contexts:      {}", stats.empty_contexts);
        println!("Completions:         {}", stats.completions);
        println!("Failures:            {}", stats.failures);
        if let Some(last) = &stats.last_failure {
            println!("Last failure:        {}", last);
        }
        println!("Retrieval time:      {}ms", stats.retrieval_ms);
        println!("Completion time:     {}ms", stats.completion_ms);
        println!();
    }

    /// Check if should show detailed output
    pub fn should_show_details(&self) -> bool {
        self.verbosity.show_events()
    }
}
