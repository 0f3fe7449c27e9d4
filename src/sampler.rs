use crate::metrics::MetricSample;

pub const DEFAULT_METRIC_NAME: &str = "action";
pub const NAMESPACE_LABEL: &str = "namespace";

/// Picks the series of one counter out of a scrape, optionally narrowed by
/// the `namespace` label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterSelector {
    metric_name: String,
    included_namespace: Option<String>,
    excluded_namespace: Option<String>,
}

/// Sum of every matching series at one scrape.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Snapshot {
    pub value: f64,
    pub series: usize,
    /// Newest exposition timestamp among the matching series, if any carried one.
    pub latest_timestamp: Option<f64>,
}

impl CounterSelector {
    pub fn new(metric_name: impl Into<String>) -> Self {
        CounterSelector {
            metric_name: metric_name.into(),
            included_namespace: None,
            excluded_namespace: None,
        }
    }

    pub fn include_namespace(mut self, namespace: Option<String>) -> Self {
        self.included_namespace = namespace;
        self
    }

    pub fn exclude_namespace(mut self, namespace: Option<String>) -> Self {
        self.excluded_namespace = namespace;
        self
    }

    pub fn matches(&self, sample: &MetricSample) -> bool {
        self.matches_name(&sample.name) && self.matches_namespace(sample.label(NAMESPACE_LABEL))
    }

    /// Counters may be exposed with or without the `_total` suffix.
    fn matches_name(&self, name: &str) -> bool {
        name == self.metric_name || name.strip_suffix("_total") == Some(self.metric_name.as_str())
    }

    fn matches_namespace(&self, namespace: Option<&str>) -> bool {
        if self.excluded_namespace.is_some() && namespace == self.excluded_namespace.as_deref() {
            return false;
        }
        match &self.included_namespace {
            Some(included) => namespace == Some(included.as_str()),
            None => true,
        }
    }

    /// Non-finite values never contribute.
    pub fn snapshot(&self, samples: &[MetricSample]) -> Snapshot {
        samples
            .iter()
            .filter(|sample| self.matches(sample) && sample.value.is_finite())
            .fold(Snapshot::default(), |acc, sample| Snapshot {
                value: acc.value + sample.value,
                series: acc.series + 1,
                latest_timestamp: match (acc.latest_timestamp, sample.timestamp) {
                    (Some(latest), Some(timestamp)) => Some(latest.max(timestamp)),
                    (latest, timestamp) => latest.or(timestamp),
                },
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickKind {
    /// First successful scrape; nothing to compare against yet.
    Baseline,
    Delta,
    /// The counter went backwards, e.g. the server restarted.
    Reset { previous: f64, current: f64 },
    /// No snapshot could be taken.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    pub delta: f64,
    pub kind: TickKind,
}

/// Running totals for one monitoring window.
#[derive(Debug, Default)]
pub struct SamplingState {
    previous: Option<f64>,
    total_actions: f64,
    ticks: u64,
    failed_ticks: u64,
    counter_resets: u64,
}

impl SamplingState {
    pub fn record(&mut self, current: f64) -> Tick {
        self.ticks += 1;
        let tick = match self.previous {
            None => Tick {
                delta: 0.0,
                kind: TickKind::Baseline,
            },
            Some(previous) if current < previous => {
                self.counter_resets += 1;
                Tick {
                    delta: 0.0,
                    kind: TickKind::Reset { previous, current },
                }
            }
            Some(previous) => Tick {
                delta: current - previous,
                kind: TickKind::Delta,
            },
        };
        self.previous = Some(current);
        self.total_actions += tick.delta;
        tick
    }

    /// A failed scrape still uses up its tick but leaves the previous
    /// snapshot in place.
    pub fn record_failure(&mut self) -> Tick {
        self.ticks += 1;
        self.failed_ticks += 1;
        Tick {
            delta: 0.0,
            kind: TickKind::Failed,
        }
    }

    pub fn total_actions(&self) -> f64 {
        self.total_actions
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn failed_ticks(&self) -> u64 {
        self.failed_ticks
    }

    pub fn counter_resets(&self) -> u64 {
        self.counter_resets
    }
}
