use clap::Parser;
use pingo::conf::{read_conf_from, Args};
use pingo::detectors::PingDetector;
use pingo::reporter::Reporter;
use pingo::{CancelToken, SessionError};
use std::io;
use std::process;
use tokio::signal;
use tokio::sync::mpsc;
use tokio::task;
use tracing::{debug, error, info, info_span, Level};
use tracing_futures::Instrument;

const EVENT_CHANNEL_SIZE: usize = 1024;

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let level = match args.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .without_time()
        .with_writer(io::stderr)
        .init();

    let conf = match read_conf_from(args).await {
        Ok(conf) => conf,
        Err(e) => {
            error!("Load conf fail: {:#}", e);
            process::exit(exitcode::CONFIG);
        }
    };
    let session = match conf.session() {
        Ok(session) => session,
        Err(e) => {
            error!("{}", e);
            process::exit(exitcode::USAGE);
        }
    };

    let detector = PingDetector::new(session);
    let code = if conf.single {
        ping_once(&detector).await
    } else {
        ping_until_interrupted(&detector).await
    };
    process::exit(code);
}

async fn ping_once(detector: &PingDetector) -> exitcode::ExitCode {
    match detector.ping_once().await {
        Ok(rtt) => {
            info!("received response within {:?}", rtt);
            exitcode::OK
        }
        Err(e) => {
            error!("{}", e);
            exit_code(&e)
        }
    }
}

async fn ping_until_interrupted(detector: &PingDetector) -> exitcode::ExitCode {
    let cancel = CancelToken::new();
    let listener = {
        let cancel = cancel.clone();
        task::spawn(
            async move {
                match signal::ctrl_c().await {
                    Ok(()) => {
                        info!("Interrupt received, stop after current probe");
                        cancel.cancel();
                    }
                    Err(e) => error!("Listen for interrupt fail: {}", e),
                }
            }
            .instrument(info_span!("interrupt")),
        )
    };

    let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_SIZE);
    let reporter = task::spawn(Reporter::new().report_probe_events(event_rx));

    let result = detector.ping_until_cancelled(&cancel, event_tx).await;
    listener.abort();
    // the session owned the only sender, so the reporter drains and returns
    match reporter.await {
        Ok(failed) => debug!("{} probes failed", failed),
        Err(e) => error!("Reporter task fail: {}", e),
    }

    match result {
        Ok(results) => {
            debug!("session ended with {} results", results.len());
            exitcode::OK
        }
        Err(e) => {
            error!("{}", e);
            exit_code(&e)
        }
    }
}

fn exit_code(e: &SessionError) -> exitcode::ExitCode {
    match e {
        SessionError::Config(_) => exitcode::USAGE,
        SessionError::Open(_) => exitcode::OSERR,
        SessionError::Probe(_) => exitcode::UNAVAILABLE,
    }
}
