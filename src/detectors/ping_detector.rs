use super::ping_socket::EchoSocket;
use super::pinger::Pinger;
use crate::cancel::CancelToken;
use crate::error::{Result, SessionError};
use crate::structures::{process_identifier, ProbeEvent, ProbeRequest, SessionConf};
use crate::summary::summarize;
use std::num::Wrapping;
use tokio::sync::mpsc::Sender;
use tokio::time::{self, Duration, Instant, MissedTickBehavior};
use tracing::{debug, info, instrument, trace};

const SINGLE_SHOT_SEQ: u16 = 1;

/// Drives probes against the configured target, either once or on a fixed
/// cadence until cancelled. At most one probe is ever in flight.
pub struct PingDetector {
    conf: SessionConf,
    identifier: u16,
}

impl PingDetector {
    pub fn new(conf: SessionConf) -> Self {
        Self {
            conf,
            identifier: process_identifier(),
        }
    }

    pub fn conf(&self) -> &SessionConf {
        &self.conf
    }

    fn request(&self, seq: u16) -> ProbeRequest {
        ProbeRequest::new(self.identifier, seq, self.conf.payload.clone())
    }

    #[instrument(skip(self), fields(target = %self.conf.target.ip))]
    pub async fn ping_once(&self) -> Result<Duration> {
        let pinger = Pinger::open(&self.conf.target).map_err(SessionError::Open)?;
        self.ping_once_with(pinger).await
    }

    pub async fn ping_once_with<S: EchoSocket>(&self, mut pinger: Pinger<S>) -> Result<Duration> {
        if let Some(timeout) = self.conf.timeout {
            trace!("timeout is set to {:?}", timeout);
        }
        let outcome = pinger
            .probe(&self.request(SINGLE_SHOT_SEQ), self.conf.timeout)
            .await;
        pinger.close();
        Ok(outcome?)
    }

    /// Opens the endpoint and probes every interval until `cancel` fires.
    ///
    /// Returns the round-trip times of the successful probes in order. Failed
    /// probes are reported through `events` and do not end the session.
    #[instrument(skip(self, cancel, events), fields(target = %self.conf.target.ip))]
    pub async fn ping_until_cancelled(
        &self,
        cancel: &CancelToken,
        events: Sender<ProbeEvent>,
    ) -> Result<Vec<Duration>> {
        let pinger = Pinger::open(&self.conf.target).map_err(SessionError::Open)?;
        Ok(self.run_session(pinger, cancel, events).await)
    }

    pub async fn run_session<S: EchoSocket>(
        &self,
        mut pinger: Pinger<S>,
        cancel: &CancelToken,
        events: Sender<ProbeEvent>,
    ) -> Vec<Duration> {
        let interval = self.conf.interval;
        if let Some(timeout) = self.conf.timeout {
            trace!("timeout is set to {:?}", timeout);
        }

        // first tick is one whole interval out, later ticks keep to the
        // cadence set here and a late probe never triggers a burst
        let mut ticker = time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!("sending first ping in {:?}", interval);
        Self::emit(
            &events,
            ProbeEvent::Started {
                target: pinger.target(),
                interval,
            },
        )
        .await;

        let mut results = Vec::new();
        let mut seq = Wrapping(0_u16);
        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break,
                at = ticker.tick() => trace!("sending at {:?}", at),
            }

            seq += Wrapping(1);
            if seq.0 == 0 {
                seq += Wrapping(1);
            }

            match pinger.probe(&self.request(seq.0), self.conf.timeout).await {
                Ok(rtt) => {
                    results.push(rtt);
                    Self::emit(&events, ProbeEvent::Succeeded { seq: seq.0, rtt }).await;
                }
                Err(error) => {
                    Self::emit(&events, ProbeEvent::Failed { seq: seq.0, error }).await;
                }
            }
        }

        info!("done sending pings");
        pinger.close();
        let summary = summarize(&results).ok();
        Self::emit(&events, ProbeEvent::Ended { summary }).await;
        results
    }

    async fn emit(events: &Sender<ProbeEvent>, event: ProbeEvent) {
        if let Err(e) = events.send(event).await {
            debug!("Event receiver closed, drop {:?}", e.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::ping_socket::mock::{MockSocket, Script};
    use super::*;
    use crate::error::{ProbeError, ProbeErrorKind};
    use crate::structures::{SocketFlavor, Target};
    use crate::summary::Summary;
    use more_asserts as ma;
    use tokio::sync::mpsc::{self, Receiver};

    const INTERVAL: Duration = Duration::from_millis(100);

    fn conf(timeout: Duration) -> SessionConf {
        SessionConf::new(
            "192.0.2.1",
            SocketFlavor::Dgram,
            "pingo!",
            INTERVAL,
            timeout,
            false,
        )
        .unwrap()
    }

    fn pinger(sock: &MockSocket) -> Pinger<MockSocket> {
        let target = Target::parse("192.0.2.1", SocketFlavor::Dgram).unwrap();
        Pinger::with_socket(sock.clone(), &target)
    }

    /// Collects events and cancels once `stop_after` probes succeeded.
    async fn drive(
        mut rx: Receiver<ProbeEvent>,
        cancel: &CancelToken,
        stop_after: usize,
    ) -> Vec<ProbeEvent> {
        let mut seen = Vec::new();
        let mut succeeded = 0;
        while let Some(event) = rx.recv().await {
            if let ProbeEvent::Succeeded { .. } = event {
                succeeded += 1;
                if succeeded == stop_after {
                    cancel.cancel();
                }
            }
            seen.push(event);
        }
        seen
    }

    #[tokio::test(start_paused = true)]
    async fn session_records_exactly_the_successful_ticks() {
        let detector = PingDetector::new(conf(Duration::ZERO));
        let sock = MockSocket::echoing(Duration::from_millis(10));
        let cancel = CancelToken::new();
        let (tx, rx) = mpsc::channel(64);

        let start = Instant::now();
        let (results, events) = tokio::join!(
            detector.run_session(pinger(&sock), &cancel, tx),
            drive(rx, &cancel, 3),
        );

        assert_eq!(results, vec![Duration::from_millis(10); 3]);
        ma::assert_ge!(start.elapsed(), INTERVAL * 3);
        assert_eq!(sock.sent().len(), 3);
        assert!(matches!(events.first(), Some(ProbeEvent::Started { .. })));
        match events.last() {
            Some(ProbeEvent::Ended {
                summary: Some(Summary { count, mean_ms }),
            }) => {
                assert_eq!(*count, 3);
                assert!((mean_ms - 10.0).abs() < 1e-9);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_keep_cadence_from_session_start() {
        let detector = PingDetector::new(conf(Duration::ZERO));
        let sock = MockSocket::echoing(Duration::from_millis(30));
        let cancel = CancelToken::new();
        let (tx, rx) = mpsc::channel(64);

        let start = Instant::now();
        tokio::join!(
            detector.run_session(pinger(&sock), &cancel, tx),
            drive(rx, &cancel, 3),
        );

        let offsets = sock
            .sent()
            .iter()
            .map(|(at, _)| *at - start)
            .collect::<Vec<_>>();
        assert_eq!(offsets, vec![INTERVAL, INTERVAL * 2, INTERVAL * 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_probes_are_serialized_without_catch_up() {
        let detector = PingDetector::new(conf(Duration::ZERO));
        let rtt = Duration::from_millis(250);
        let sock = MockSocket::echoing(rtt);
        let cancel = CancelToken::new();
        let (tx, rx) = mpsc::channel(64);

        tokio::join!(
            detector.run_session(pinger(&sock), &cancel, tx),
            drive(rx, &cancel, 4),
        );

        let sent = sock.sent();
        assert_eq!(sent.len(), 4);
        for pair in sent.windows(2) {
            ma::assert_ge!(pair[1].0 - pair[0].0, rtt);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn failed_probes_are_reported_and_session_continues() {
        let detector = PingDetector::new(conf(Duration::from_millis(50)));
        let sock = MockSocket::echoing(Duration::from_millis(5)).with_script([
            Script::RecvError,
            Script::Reply(Duration::from_millis(5), vec![3, 3, 0, 0, 0, 0, 0, 0]),
            Script::Silent,
        ]);
        let cancel = CancelToken::new();
        let (tx, rx) = mpsc::channel(64);

        let (results, events) = tokio::join!(
            detector.run_session(pinger(&sock), &cancel, tx),
            drive(rx, &cancel, 1),
        );

        assert_eq!(results, vec![Duration::from_millis(5)]);
        let failures = events
            .iter()
            .filter_map(|e| match e {
                ProbeEvent::Failed { seq, error } => Some((*seq, error.kind())),
                _ => None,
            })
            .collect::<Vec<_>>();
        assert_eq!(
            failures,
            vec![
                (1, ProbeErrorKind::Receive),
                (2, ProbeErrorKind::TypeMismatch),
                (3, ProbeErrorKind::DeadlineExceeded),
            ]
        );
        assert!(events.iter().any(|e| matches!(
            e,
            ProbeEvent::Succeeded { seq: 4, .. }
        )));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_waits_for_in_flight_probe() {
        let detector = PingDetector::new(conf(Duration::ZERO));
        let rtt = Duration::from_secs(1);
        let sock = MockSocket::echoing(rtt);
        let cancel = CancelToken::new();
        let (tx, mut rx) = mpsc::channel(64);

        let start = Instant::now();
        let (results, _) = tokio::join!(
            detector.run_session(pinger(&sock), &cancel, tx),
            async {
                // first probe goes out at 100ms and is still unanswered at 150ms
                time::sleep(Duration::from_millis(150)).await;
                cancel.cancel();
                while rx.recv().await.is_some() {}
            },
        );

        assert_eq!(results, vec![rtt]);
        ma::assert_ge!(start.elapsed(), INTERVAL + rtt);
        assert_eq!(sock.sent().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_before_first_tick_sends_nothing() {
        let detector = PingDetector::new(conf(Duration::ZERO));
        let sock = MockSocket::echoing(Duration::from_millis(1));
        let cancel = CancelToken::new();
        let (tx, mut rx) = mpsc::channel(64);
        cancel.cancel();

        let results = detector.run_session(pinger(&sock), &cancel, tx).await;

        assert!(results.is_empty());
        assert!(sock.sent().is_empty());
        assert!(matches!(rx.recv().await, Some(ProbeEvent::Started { .. })));
        assert!(matches!(
            rx.recv().await,
            Some(ProbeEvent::Ended { summary: None })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn session_survives_a_closed_event_channel() {
        let detector = PingDetector::new(conf(Duration::ZERO));
        let sock = MockSocket::echoing(Duration::from_millis(1));
        let cancel = CancelToken::new();
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let (results, _) = tokio::join!(
            detector.run_session(pinger(&sock), &cancel, tx),
            async {
                time::sleep(INTERVAL * 2 + Duration::from_millis(50)).await;
                cancel.cancel();
            },
        );

        assert_eq!(results.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn single_shot_returns_the_round_trip() {
        let detector = PingDetector::new(conf(Duration::ZERO));
        let sock = MockSocket::echoing(Duration::from_millis(12));

        let rtt = detector.ping_once_with(pinger(&sock)).await.unwrap();

        assert_eq!(rtt, Duration::from_millis(12));
        assert_eq!(sock.sent().len(), 1);
        assert_eq!(&sock.sent()[0].1[6..8], &[0, 1]);
    }

    #[tokio::test(start_paused = true)]
    async fn single_shot_surfaces_probe_errors() {
        let detector = PingDetector::new(conf(Duration::from_millis(20)));
        let sock = MockSocket::echoing(Duration::ZERO).with_script([Script::Silent]);

        match detector.ping_once_with(pinger(&sock)).await {
            Err(SessionError::Probe(ProbeError::DeadlineExceeded(t))) => {
                assert_eq!(t, Duration::from_millis(20))
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
