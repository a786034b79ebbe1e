//! Passive observers of group and connection activity
//!
//! Monitors accumulate observations into a *window*. A window is closed by
//! the session at the end of every `step` call made with reporting
//! enabled; closed windows are kept for the lifetime of the session.

use core::fmt;
use core::str::FromStr;

use crate::{
    engine::SynapseView,
    error::*,
    ids::{ConnectionId, GroupId},
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Reporting policy of a monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MonitorMode {
    /// Record and log a summary whenever a window closes
    #[default]
    Default,
    /// Record only
    Silent,
}

impl MonitorMode {
    /// Whether closed windows are logged
    pub fn logs_windows(&self) -> bool {
        matches!(self, Self::Default)
    }
}

impl FromStr for MonitorMode {
    type Err = RuntimeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "DEFAULT" => Ok(Self::Default),
            "SILENT" | "NULL" | "NONE" => Ok(Self::Silent),
            other => Err(RuntimeError::invalid_parameter(
                "monitor_mode",
                other,
                "DEFAULT | SILENT | NULL",
            )),
        }
    }
}

/// Spike statistics of one closed window
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SpikeWindow {
    /// Zero-based window number
    pub index: usize,
    /// First tick of the window (ms)
    pub start_ms: u64,
    /// Window length (ms)
    pub duration_ms: u64,
    /// Spikes of the whole group inside the window
    pub spike_count: u64,
    /// Mean per-neuron firing rate (Hz)
    pub mean_rate_hz: f32,
    /// Lowest per-neuron firing rate (Hz)
    pub min_rate_hz: f32,
    /// Highest per-neuron firing rate (Hz)
    pub max_rate_hz: f32,
}

impl fmt::Display for SpikeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "window #{} [{}, {}) ms: {} spikes, {:.2} Hz mean (min {:.2}, max {:.2})",
            self.index,
            self.start_ms,
            self.start_ms + self.duration_ms,
            self.spike_count,
            self.mean_rate_hz,
            self.min_rate_hz,
            self.max_rate_hz
        )
    }
}

/// Records the spikes of one group
#[derive(Debug, Clone)]
pub struct SpikeMonitor {
    group: GroupId,
    group_name: String,
    mode: MonitorMode,
    spike_times: Vec<Vec<u64>>,
    window_counts: Vec<u32>,
    window_start_ms: u64,
    windows: Vec<SpikeWindow>,
}

impl SpikeMonitor {
    /// Attach a monitor to a group of `num_neurons` neurons at time `now_ms`
    pub fn new(
        group: GroupId,
        group_name: impl Into<String>,
        num_neurons: usize,
        mode: MonitorMode,
        now_ms: u64,
    ) -> Self {
        Self {
            group,
            group_name: group_name.into(),
            mode,
            spike_times: vec![Vec::new(); num_neurons],
            window_counts: vec![0; num_neurons],
            window_start_ms: now_ms,
            windows: Vec::new(),
        }
    }

    /// Observed group
    pub fn group(&self) -> GroupId {
        self.group
    }

    /// Name of the observed group
    pub fn group_name(&self) -> &str {
        &self.group_name
    }

    /// Reporting policy
    pub fn mode(&self) -> MonitorMode {
        self.mode
    }

    /// Number of neurons in the observed group
    pub fn num_neurons(&self) -> usize {
        self.spike_times.len()
    }

    /// Record one spike
    pub fn record(&mut self, neuron: u32, time_ms: u64) {
        let neuron = neuron as usize;
        if let Some(times) = self.spike_times.get_mut(neuron) {
            times.push(time_ms);
            self.window_counts[neuron] += 1;
        }
    }

    /// Close the open window at `end_ms` and start a new one
    pub fn close_window(&mut self, end_ms: u64) -> &SpikeWindow {
        let duration_ms = end_ms.saturating_sub(self.window_start_ms);
        let to_hz = |count: u64| {
            if duration_ms == 0 {
                0.0
            } else {
                count as f32 * 1000.0 / duration_ms as f32
            }
        };

        let spike_count: u64 = self.window_counts.iter().map(|&c| c as u64).sum();
        let min_count = self.window_counts.iter().copied().min().unwrap_or(0);
        let max_count = self.window_counts.iter().copied().max().unwrap_or(0);
        let neurons = self.window_counts.len().max(1) as f32;

        self.windows.push(SpikeWindow {
            index: self.windows.len(),
            start_ms: self.window_start_ms,
            duration_ms,
            spike_count,
            mean_rate_hz: to_hz(spike_count) / neurons,
            min_rate_hz: to_hz(min_count as u64),
            max_rate_hz: to_hz(max_count as u64),
        });

        self.window_counts.iter_mut().for_each(|c| *c = 0);
        self.window_start_ms = end_ms;
        &self.windows[self.windows.len() - 1]
    }

    /// Closed windows in chronological order
    pub fn windows(&self) -> &[SpikeWindow] {
        &self.windows
    }

    /// Number of closed windows
    pub fn num_windows(&self) -> usize {
        self.windows.len()
    }

    /// Spikes recorded since the monitor was attached
    pub fn total_spike_count(&self) -> u64 {
        self.spike_times.iter().map(|t| t.len() as u64).sum()
    }

    /// Spike times of one neuron
    pub fn spike_times(&self, neuron: usize) -> Option<&[u64]> {
        self.spike_times.get(neuron).map(Vec::as_slice)
    }

    /// Spike count of one neuron
    pub fn neuron_spike_count(&self, neuron: usize) -> Option<usize> {
        self.spike_times.get(neuron).map(Vec::len)
    }

    /// Mean per-neuron rate over all closed windows (Hz)
    pub fn mean_rate_hz(&self) -> f32 {
        let duration: u64 = self.windows.iter().map(|w| w.duration_ms).sum();
        if duration == 0 {
            return 0.0;
        }
        let spikes: u64 = self.windows.iter().map(|w| w.spike_count).sum();
        spikes as f32 * 1000.0 / duration as f32 / self.num_neurons().max(1) as f32
    }
}

/// Weight statistics of one closed window
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WeightWindow {
    /// Zero-based window number
    pub index: usize,
    /// First tick of the window (ms)
    pub start_ms: u64,
    /// Window length (ms)
    pub duration_ms: u64,
    /// Synaptic events delivered over the connection inside the window
    pub spikes_transmitted: u64,
    /// Number of synapses in the connection
    pub num_synapses: usize,
    /// Smallest weight at window close
    pub min_weight: f32,
    /// Largest weight at window close
    pub max_weight: f32,
    /// Mean weight at window close
    pub mean_weight: f32,
    /// Sum of absolute weight changes since the previous window
    pub total_abs_change: f32,
}

impl fmt::Display for WeightWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "window #{} [{}, {}) ms: {} events over {} synapses, weight {:.4} mean (min {:.4}, max {:.4}), change {:.4}",
            self.index,
            self.start_ms,
            self.start_ms + self.duration_ms,
            self.spikes_transmitted,
            self.num_synapses,
            self.mean_weight,
            self.min_weight,
            self.max_weight,
            self.total_abs_change
        )
    }
}

/// Tracks the synapses of one connection
#[derive(Debug, Clone)]
pub struct ConnectionMonitor {
    connection: ConnectionId,
    source: GroupId,
    destination: GroupId,
    label: String,
    mode: MonitorMode,
    num_pre: usize,
    num_post: usize,
    weights: Vec<Option<f32>>,
    num_synapses: usize,
    /// (min, max, mean) of the latest snapshot
    weight_stats: (f32, f32, f32),
    window_start_ms: u64,
    window_transmitted: u64,
    windows: Vec<WeightWindow>,
}

impl ConnectionMonitor {
    /// Attach a monitor to a connection, taking an initial weight snapshot
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        connection: ConnectionId,
        source: GroupId,
        destination: GroupId,
        label: impl Into<String>,
        num_pre: usize,
        num_post: usize,
        mode: MonitorMode,
        now_ms: u64,
        synapses: &[SynapseView],
    ) -> Self {
        let mut monitor = Self {
            connection,
            source,
            destination,
            label: label.into(),
            mode,
            num_pre,
            num_post,
            weights: vec![None; num_pre * num_post],
            num_synapses: 0,
            weight_stats: (0.0, 0.0, 0.0),
            window_start_ms: now_ms,
            window_transmitted: 0,
            windows: Vec::new(),
        };
        monitor.snapshot(synapses);
        monitor
    }

    /// Observed connection
    pub fn connection(&self) -> ConnectionId {
        self.connection
    }

    /// Pre-synaptic group
    pub fn source(&self) -> GroupId {
        self.source
    }

    /// Post-synaptic group
    pub fn destination(&self) -> GroupId {
        self.destination
    }

    /// Human-readable `source -> destination` label
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Reporting policy
    pub fn mode(&self) -> MonitorMode {
        self.mode
    }

    /// Number of synapses in the latest snapshot
    pub fn num_synapses(&self) -> usize {
        self.num_synapses
    }

    /// Weight of the synapse `pre -> post`, if one exists
    pub fn weight(&self, pre: usize, post: usize) -> Option<f32> {
        if pre >= self.num_pre || post >= self.num_post {
            return None;
        }
        self.weights[pre * self.num_post + post]
    }

    /// Weight matrix indexed `[pre][post]`
    pub fn weights(&self) -> Vec<Vec<Option<f32>>> {
        if self.num_post == 0 {
            return vec![Vec::new(); self.num_pre];
        }
        self.weights
            .chunks(self.num_post)
            .map(<[Option<f32>]>::to_vec)
            .collect()
    }

    /// Add delivered synaptic events to the open window
    pub fn record_transmissions(&mut self, count: u64) {
        self.window_transmitted += count;
    }

    /// Close the open window at `end_ms`
    ///
    /// `synapses` is a fresh weight snapshot; `None` means the weights are
    /// unchanged since the previous one and the stored snapshot is reused.
    pub fn close_window(&mut self, end_ms: u64, synapses: Option<&[SynapseView]>) -> &WeightWindow {
        let total_abs_change = synapses.map_or(0.0, |s| self.snapshot(s));
        let (min_weight, max_weight, mean_weight) = self.weight_stats;

        self.windows.push(WeightWindow {
            index: self.windows.len(),
            start_ms: self.window_start_ms,
            duration_ms: end_ms.saturating_sub(self.window_start_ms),
            spikes_transmitted: self.window_transmitted,
            num_synapses: self.num_synapses,
            min_weight,
            max_weight,
            mean_weight,
            total_abs_change,
        });

        self.window_transmitted = 0;
        self.window_start_ms = end_ms;
        &self.windows[self.windows.len() - 1]
    }

    /// Closed windows in chronological order
    pub fn windows(&self) -> &[WeightWindow] {
        &self.windows
    }

    /// Number of closed windows
    pub fn num_windows(&self) -> usize {
        self.windows.len()
    }

    /// Replace the stored weights, returning the summed absolute change
    fn snapshot(&mut self, synapses: &[SynapseView]) -> f32 {
        let previous = std::mem::replace(&mut self.weights, vec![None; self.num_pre * self.num_post]);
        self.num_synapses = 0;
        let (mut min, mut max, mut sum) = (f32::INFINITY, f32::NEG_INFINITY, 0.0f32);
        for syn in synapses {
            let (pre, post) = (syn.pre as usize, syn.post as usize);
            if pre < self.num_pre && post < self.num_post {
                self.weights[pre * self.num_post + post] = Some(syn.weight);
                self.num_synapses += 1;
                min = min.min(syn.weight);
                max = max.max(syn.weight);
                sum += syn.weight;
            }
        }
        self.weight_stats = if self.num_synapses == 0 {
            (0.0, 0.0, 0.0)
        } else {
            (min, max, sum / self.num_synapses as f32)
        };

        previous
            .iter()
            .zip(&self.weights)
            .map(|(old, new)| match (old, new) {
                (Some(a), Some(b)) => (a - b).abs(),
                (Some(w), None) | (None, Some(w)) => w.abs(),
                (None, None) => 0.0,
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parsing() {
        assert_eq!("DEFAULT".parse::<MonitorMode>().unwrap(), MonitorMode::Default);
        assert_eq!("null".parse::<MonitorMode>().unwrap(), MonitorMode::Silent);
        assert!("LOUD".parse::<MonitorMode>().is_err());
        assert!(MonitorMode::Default.logs_windows());
        assert!(!MonitorMode::Silent.logs_windows());
    }

    #[test]
    fn test_spike_window_rates() {
        let mut mon = SpikeMonitor::new(GroupId::new(0), "input", 4, MonitorMode::Silent, 0);
        mon.record(0, 0);
        mon.record(0, 5);
        mon.record(3, 7);
        let window = mon.close_window(10).clone();
        assert_eq!(window.index, 0);
        assert_eq!(window.duration_ms, 10);
        assert_eq!(window.spike_count, 3);
        assert!((window.max_rate_hz - 200.0).abs() < 1e-3);
        assert_eq!(window.min_rate_hz, 0.0);
        assert!((window.mean_rate_hz - 75.0).abs() < 1e-3);

        let next = mon.close_window(20).clone();
        assert_eq!(next.index, 1);
        assert_eq!(next.start_ms, 10);
        assert_eq!(next.spike_count, 0);

        assert_eq!(mon.num_windows(), 2);
        assert_eq!(mon.total_spike_count(), 3);
        assert_eq!(mon.spike_times(0), Some(&[0u64, 5][..]));
        assert_eq!(mon.neuron_spike_count(3), Some(1));
        assert!((mon.mean_rate_hz() - 37.5).abs() < 1e-3);
    }

    #[test]
    fn test_out_of_range_spike_ignored() {
        let mut mon = SpikeMonitor::new(GroupId::new(1), "out", 2, MonitorMode::Default, 0);
        mon.record(9, 1);
        assert_eq!(mon.total_spike_count(), 0);
    }

    #[test]
    fn test_connection_snapshot_and_change() {
        let synapses = vec![
            SynapseView { pre: 0, post: 1, weight: 0.5, delay: 1 },
            SynapseView { pre: 1, post: 0, weight: 0.25, delay: 2 },
        ];
        let mut mon = ConnectionMonitor::new(
            ConnectionId::new(0),
            GroupId::new(0),
            GroupId::new(1),
            "a -> b",
            2,
            2,
            MonitorMode::Silent,
            0,
            &synapses,
        );
        assert_eq!(mon.num_synapses(), 2);
        assert_eq!(mon.weight(0, 1), Some(0.5));
        assert_eq!(mon.weight(0, 0), None);
        assert_eq!(mon.weights(), vec![vec![None, Some(0.5)], vec![Some(0.25), None]]);

        mon.record_transmissions(3);
        let window = mon.close_window(5, Some(&synapses)).clone();
        assert_eq!(window.spikes_transmitted, 3);
        assert_eq!(window.total_abs_change, 0.0);
        assert_eq!(window.min_weight, 0.25);
        assert_eq!(window.max_weight, 0.5);
        assert!((window.mean_weight - 0.375).abs() < 1e-6);

        let changed = vec![SynapseView { pre: 0, post: 1, weight: 0.75, delay: 1 }];
        let window = mon.close_window(6, Some(&changed)).clone();
        assert_eq!(window.spikes_transmitted, 0);
        assert!((window.total_abs_change - 0.5).abs() < 1e-6);
        assert_eq!(mon.num_synapses(), 1);
    }

    #[test]
    fn test_connection_window_reuses_static_snapshot() {
        let synapses = vec![
            SynapseView { pre: 0, post: 0, weight: 0.2, delay: 1 },
            SynapseView { pre: 1, post: 1, weight: 0.4, delay: 1 },
        ];
        let mut mon = ConnectionMonitor::new(
            ConnectionId::new(0),
            GroupId::new(0),
            GroupId::new(1),
            "a -> b",
            2,
            2,
            MonitorMode::Silent,
            0,
            &synapses,
        );
        mon.record_transmissions(2);
        let window = mon.close_window(1, None).clone();
        assert_eq!(window.spikes_transmitted, 2);
        assert_eq!(window.num_synapses, 2);
        assert_eq!(window.total_abs_change, 0.0);
        assert_eq!(window.min_weight, 0.2);
        assert_eq!(window.max_weight, 0.4);
        assert!((window.mean_weight - 0.3).abs() < 1e-6);
        assert_eq!(mon.weight(1, 1), Some(0.4));

        let window = mon.close_window(2, None).clone();
        assert_eq!(window.index, 1);
        assert_eq!(window.start_ms, 1);
        assert!((window.mean_weight - 0.3).abs() < 1e-6);
    }
}
