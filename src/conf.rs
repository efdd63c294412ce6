use crate::error::ConfError;
use crate::structures::{SessionConf, SocketFlavor, DEFAULT_INTERVAL, DEFAULT_PAYLOAD};
use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

const DEFAULT_IPADDR: &str = "1.1.1.1";

/// Measure round-trip latency to a host with ICMP echo.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// IP address to target
    #[clap(long)]
    pub ipaddr: Option<String>,

    /// Data to be sent and expected back
    #[clap(long)]
    pub strdata: Option<String>,

    /// Time between pings, in milliseconds
    #[clap(long)]
    pub interval_ms: Option<u64>,

    /// Time to wait for each reply, in milliseconds (0 = no timeout)
    #[clap(long)]
    pub timeout_ms: Option<u64>,

    /// Only run a single round trip
    #[clap(long)]
    pub single: bool,

    /// Use a raw socket instead of an unprivileged datagram socket
    #[clap(long)]
    pub raw: bool,

    /// TOML file with the same settings, overridden by flags
    #[clap(short, long)]
    pub conf: Option<PathBuf>,

    #[clap(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Deserialize, Debug, Default, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConf {
    pub ipaddr: Option<String>,
    pub strdata: Option<String>,
    pub interval_ms: Option<u64>,
    pub timeout_ms: Option<u64>,
    pub single: Option<bool>,
    pub raw: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conf {
    pub ipaddr: String,
    pub strdata: String,
    pub interval: Duration,
    pub timeout: Duration,
    pub single: bool,
    pub flavor: SocketFlavor,
    pub verbose: u8,
}

impl Conf {
    pub fn merge(args: Args, file: FileConf) -> Self {
        let flavor = if args.raw || file.raw.unwrap_or(false) {
            SocketFlavor::Raw
        } else {
            SocketFlavor::Dgram
        };
        let interval = args
            .interval_ms
            .or(file.interval_ms)
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_INTERVAL);
        let timeout = Duration::from_millis(args.timeout_ms.or(file.timeout_ms).unwrap_or(0));

        Self {
            ipaddr: args
                .ipaddr
                .or(file.ipaddr)
                .unwrap_or_else(|| DEFAULT_IPADDR.to_string()),
            strdata: args
                .strdata
                .or(file.strdata)
                .unwrap_or_else(|| DEFAULT_PAYLOAD.to_string()),
            interval,
            timeout,
            single: args.single || file.single.unwrap_or(false),
            flavor,
            verbose: args.verbose,
        }
    }

    pub fn session(&self) -> std::result::Result<SessionConf, ConfError> {
        SessionConf::new(
            &self.ipaddr,
            self.flavor,
            self.strdata.clone().into_bytes(),
            self.interval,
            self.timeout,
            self.single,
        )
    }
}

pub async fn read_conf() -> Result<Conf> {
    read_conf_from(Args::parse()).await
}

pub async fn read_conf_from(args: Args) -> Result<Conf> {
    use tokio::fs;

    let file = match &args.conf {
        Some(path) => {
            info!("read conf from {}", path.display());
            let conf = fs::read_to_string(path)
                .await
                .with_context(|| format!("read {}", path.display()))?;
            toml::from_str::<FileConf>(&conf)
                .with_context(|| format!("parse {}", path.display()))?
        }
        None => FileConf::default(),
    };

    Ok(Conf::merge(args, file))
}
