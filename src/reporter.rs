use crate::structures::ProbeEvent;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

type ProbeEventRx = mpsc::Receiver<ProbeEvent>;

/// Turns session events into log lines.
#[derive(Debug, Default)]
pub struct Reporter {
    failed: usize,
}

impl Reporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs until every sender of `rx` is gone and returns the number of
    /// failed probes seen.
    pub async fn report_probe_events(mut self, mut rx: ProbeEventRx) -> usize {
        while let Some(event) = rx.recv().await {
            self.report(&event);
        }
        self.failed
    }

    fn report(&mut self, event: &ProbeEvent) {
        let line = Self::line(event);
        match event {
            ProbeEvent::Failed { .. } => {
                self.failed += 1;
                error!("{}", line);
            }
            ProbeEvent::Ended { summary: None } => warn!("{}", line),
            _ => info!("{}", line),
        }
    }

    pub fn line(event: &ProbeEvent) -> String {
        match event {
            ProbeEvent::Started { target, interval } => {
                format!("pinging {} every {:?}", target, interval)
            }
            ProbeEvent::Succeeded { seq, rtt } => {
                format!("received response within {:?} (seq {})", rtt, seq)
            }
            ProbeEvent::Failed { seq, error } => {
                format!("probe failed ({}) (seq {}): {}", error.kind(), seq, error)
            }
            ProbeEvent::Ended {
                summary: Some(summary),
            } => format!(
                "average: {} milliseconds, over {} iterations",
                summary.mean_ms, summary.count
            ),
            ProbeEvent::Ended { summary: None } => {
                "no probe succeeded, no average to report".to_string()
            }
        }
    }
}
