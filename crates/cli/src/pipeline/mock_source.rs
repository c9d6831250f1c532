//! Built-in probe source.
//!
//! Generates a sinusoidal pH trace with temperature and supply-voltage
//! side channels, standing in for the serial probe driver during bench
//! runs and tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use contracts::Reading;
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Probe source configuration
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Sensor ID stamped on every reading
    pub sensor_id: String,

    /// Measurement mode column value
    pub mode: String,

    /// Reading cadence (Hz)
    pub frequency_hz: f64,

    /// Center of the generated value trace
    pub base_value: f64,

    /// Sinusoid amplitude around the base value
    pub amplitude: f64,

    /// Sinusoid period in seconds
    pub period_secs: f64,

    /// Water temperature baseline (°C)
    pub base_temp_c: f64,

    /// Supply voltage at start (V); decays slowly over the run
    pub base_vin: f64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            sensor_id: "mock_probe".to_string(),
            mode: "pH".to_string(),
            frequency_hz: 5.0,
            base_value: 8.1,
            amplitude: 0.15,
            period_secs: 60.0,
            base_temp_c: 18.0,
            base_vin: 12.4,
        }
    }
}

/// Mock probe source
///
/// Owns no task state; `start` spawns the generator loop and returns the
/// receiving end of the reading stream.
pub struct MockProbeSource {
    config: ProbeConfig,
    running: Arc<AtomicBool>,
}

impl MockProbeSource {
    /// Create a new probe source
    pub fn new(config: ProbeConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Create a pH probe source with the given id and cadence
    pub fn ph(sensor_id: &str, frequency_hz: f64) -> Self {
        Self::new(ProbeConfig {
            sensor_id: sensor_id.to_string(),
            frequency_hz,
            ..Default::default()
        })
    }

    /// Start the generator loop, returning the reading stream.
    pub fn start(&self, channel_capacity: usize) -> mpsc::Receiver<Reading> {
        let (tx, rx) = mpsc::channel(channel_capacity);
        let config = self.config.clone();
        let running = Arc::clone(&self.running);
        running.store(true, Ordering::SeqCst);

        tokio::spawn(async move {
            let tick = Duration::from_secs_f64(1.0 / config.frequency_hz.max(0.001));
            let started = std::time::Instant::now();
            let mut sent: u64 = 0;

            debug!(
                sensor_id = %config.sensor_id,
                frequency_hz = config.frequency_hz,
                "Probe source started"
            );

            while running.load(Ordering::SeqCst) {
                let elapsed = started.elapsed().as_secs_f64();
                let phase = 2.0 * std::f64::consts::PI * elapsed / config.period_secs;

                let reading = Reading {
                    time: Utc::now(),
                    sensor_id: config.sensor_id.clone(),
                    mode: config.mode.clone(),
                    value: config.base_value + config.amplitude * phase.sin(),
                    temp_c: Some(config.base_temp_c + 0.4 * (phase * 0.5).sin()),
                    // Slow supply decay, ~0.36V per hour
                    vin: Some(config.base_vin - elapsed * 0.0001),
                };

                trace!(sensor_id = %reading.sensor_id, value = reading.value, "Probe reading");
                if tx.send(reading).await.is_err() {
                    debug!(sensor_id = %config.sensor_id, "Reading channel closed");
                    break;
                }
                sent += 1;

                tokio::time::sleep(tick).await;
            }

            debug!(sensor_id = %config.sensor_id, sent, "Probe source stopped");
        });

        rx
    }

    /// Stop the generator loop.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_readings_stay_within_trace_bounds() {
        let source = MockProbeSource::ph("bench-ph", 200.0);
        let mut rx = source.start(64);

        let mut readings = Vec::new();
        for _ in 0..5 {
            readings.push(rx.recv().await.expect("source should produce readings"));
        }
        source.stop();

        for reading in &readings {
            assert_eq!(reading.sensor_id, "bench-ph");
            assert_eq!(reading.mode, "pH");
            assert!((reading.value - 8.1).abs() <= 0.15 + 1e-9);
            assert!(reading.temp_c.is_some());
            assert!(reading.vin.is_some());
            assert!(!reading.is_marker());
        }
    }

    #[tokio::test]
    async fn test_stop_closes_the_stream() {
        let source = MockProbeSource::ph("bench-ph", 500.0);
        let mut rx = source.start(4);

        assert!(rx.recv().await.is_some());
        source.stop();

        // Drain until the generator notices the flag and drops the sender
        while rx.recv().await.is_some() {}
    }
}
