use super::connection::LinkEvent;
use super::history::TrendHistory;
use super::link::BusLink;
use super::{MonitorEvent, Sample};
use crate::error::BusError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time;
use tracing::{debug, info, warn};

#[derive(Debug)]
pub enum PollOutcome {
    Sampled(Sample),
    /// No transport; the reconnect task is working on it.
    Skipped,
    Failed(BusError),
}

/// Fixed-cadence reader of the plant telemetry. Owns the trend history.
pub struct PollLoop {
    link: Arc<BusLink>,
    history: TrendHistory,
    running: Arc<AtomicBool>,
    period: Duration,
    latest: watch::Sender<Option<Sample>>,
    sequence: u64,
}

impl PollLoop {
    pub fn new(
        link: Arc<BusLink>,
        running: Arc<AtomicBool>,
        latest: watch::Sender<Option<Sample>>,
    ) -> Self {
        let period = link.config().poll_period();
        Self {
            link,
            history: TrendHistory::new(),
            running,
            period,
            latest,
            sequence: 0,
        }
    }

    pub fn history(&self) -> &TrendHistory {
        &self.history
    }

    /// Poll until the running flag clears. The flag is checked once per
    /// cadence, so shutdown takes at most one period.
    pub async fn run(mut self) {
        info!("📈 Poll loop started (every {} ms)", self.period.as_millis());
        let mut interval = time::interval(self.period);
        interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            if !self.running.load(Ordering::SeqCst) {
                break;
            }
            match self.poll_once().await {
                PollOutcome::Sampled(sample) => debug!(
                    "Sample {}: pressure={} temperature={} pump={}",
                    sample.sequence, sample.pressure, sample.temperature, sample.pump_on
                ),
                PollOutcome::Skipped => {}
                // the link already dropped its transport and woke the reconnector
                PollOutcome::Failed(e) if e.breaks_transport() => warn!("Poll failed, link lost: {}", e),
                PollOutcome::Failed(e) => warn!("Poll got an error reply: {}", e),
            }
        }
        info!("🛑 Poll loop stopped after {} samples", self.sequence);
    }

    pub async fn poll_once(&mut self) -> PollOutcome {
        if !self.link.state().is_linked() {
            return PollOutcome::Skipped;
        }

        match self.link.read_telemetry().await {
            Ok(readings) => {
                self.link.apply(LinkEvent::ReadSucceeded);
                self.history.push(readings.pressure, readings.temperature);
                self.sequence += 1;

                let sample = Sample::from_readings(self.sequence, readings);
                self.latest.send_replace(Some(sample.clone()));
                self.link.emit(MonitorEvent::Sample {
                    sample: sample.clone(),
                    trend: self.history.snapshot(),
                });
                PollOutcome::Sampled(sample)
            }
            Err(e) if e.breaks_transport() => PollOutcome::Failed(e),
            Err(e) => {
                self.link.apply(LinkEvent::ErrorResponse);
                PollOutcome::Failed(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MonitorConfig, PlcConfig};
    use crate::monitor::ConnectionState;
    use crate::server::{self, PlcServer};
    use crate::store::DataStore;
    use std::net::SocketAddr;
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    fn poller(endpoint: SocketAddr) -> (Arc<BusLink>, PollLoop, mpsc::UnboundedReceiver<MonitorEvent>) {
        let config = MonitorConfig {
            endpoint,
            request_timeout_ms: 500,
            ..MonitorConfig::default()
        };
        let (tx, rx) = mpsc::unbounded_channel();
        let link = Arc::new(BusLink::new(config, tx));
        let (latest, _) = watch::channel(None);
        let poller = PollLoop::new(Arc::clone(&link), Arc::new(AtomicBool::new(true)), latest);
        (link, poller, rx)
    }

    #[tokio::test]
    async fn test_skips_without_transport() {
        let (link, mut poller, _rx) = poller("127.0.0.1:9".parse().unwrap());
        assert!(matches!(poller.poll_once().await, PollOutcome::Skipped));
        assert!(poller.history().is_empty());
        assert_eq!(link.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_samples_fill_history() {
        let config = PlcConfig {
            bind: "127.0.0.1:0".parse().unwrap(),
            seed: Some(1),
            ..PlcConfig::default()
        };
        let server = PlcServer::bind(&config).await.unwrap();
        let addr = server.local_addr().unwrap();
        let plc = tokio::spawn(server.run());

        let (link, mut poller, mut rx) = poller(addr);
        link.try_connect().await.unwrap();

        for expected in 1..=3 {
            match poller.poll_once().await {
                PollOutcome::Sampled(sample) => assert_eq!(sample.sequence, expected),
                other => panic!("unexpected outcome {:?}", other),
            }
        }
        assert_eq!(poller.history().len(), 3);
        assert_eq!(link.state(), ConnectionState::Connected);

        let mut samples = 0;
        while let Ok(event) = rx.try_recv() {
            if let MonitorEvent::Sample { trend, .. } = event {
                samples += 1;
                assert_eq!(trend.len(), samples);
            }
        }
        assert_eq!(samples, 3);
        plc.abort();
    }

    #[tokio::test]
    async fn test_error_reply_keeps_transport() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let plc = tokio::spawn(server::serve(listener, Arc::new(DataStore::with_size(5))));

        let (link, mut poller, _rx) = poller(addr);
        link.try_connect().await.unwrap();

        for _ in 0..2 {
            match poller.poll_once().await {
                PollOutcome::Failed(e) => assert!(!e.breaks_transport()),
                other => panic!("unexpected outcome {:?}", other),
            }
            assert_eq!(link.state(), ConnectionState::ReadError);
            assert!(link.has_transport().await);
        }
        assert!(poller.history().is_empty());
        plc.abort();
    }
}
