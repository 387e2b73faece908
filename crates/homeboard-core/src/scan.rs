// ── Port scanner ──
//
// Best-effort reachability probe over a fixed list of camera ports.
// Probes run strictly one after another with a fixed delay between them;
// small embedded devices do not cope well with bursts.

use std::time::Duration;

use serde::Serialize;
use tokio::net::TcpStream;
use tracing::{debug, trace};

use homeboard_api::{TlsMode, TransportConfig};

use crate::config::ScanConfig;
use crate::error::CoreError;

/// Outcome of probing one port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PortStatus {
    Open,
    Closed,
    Timeout,
}

/// How a port is probed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeFamily {
    /// HEAD request; any HTTP response means open.
    Http { tls: bool },
    /// RTSP/RTMP/vendor media; optimistic unless TCP probing is enabled.
    Streaming,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanProbe {
    pub port: u16,
    pub label: &'static str,
    pub family: ProbeFamily,
}

impl ScanProbe {
    const fn http(port: u16, label: &'static str) -> Self {
        Self {
            port,
            label,
            family: ProbeFamily::Http { tls: false },
        }
    }

    const fn streaming(port: u16, label: &'static str) -> Self {
        Self {
            port,
            label,
            family: ProbeFamily::Streaming,
        }
    }
}

/// The default probe list, in report order.
pub const DEFAULT_PROBES: [ScanProbe; 7] = [
    ScanProbe::http(80, "HTTP"),
    ScanProbe {
        port: 443,
        label: "HTTPS",
        family: ProbeFamily::Http { tls: true },
    },
    ScanProbe::http(8000, "HTTP Alt"),
    ScanProbe::http(8080, "HTTP Alt"),
    ScanProbe::streaming(554, "RTSP"),
    ScanProbe::streaming(1935, "RTMP"),
    ScanProbe::streaming(9000, "ReoLink Media"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortResult {
    pub port: u16,
    pub label: &'static str,
    pub status: PortStatus,
}

pub struct PortScanner {
    config: ScanConfig,
    http: reqwest::Client,
    probes: Vec<ScanProbe>,
}

impl PortScanner {
    /// Scanner over [`DEFAULT_PROBES`]. Certificates are not verified:
    /// a TLS handshake with a self-signed camera still proves the port open.
    pub fn new(config: ScanConfig) -> Result<Self, CoreError> {
        let transport = TransportConfig {
            tls: TlsMode::DangerAcceptInvalid,
            timeout: config.probe_timeout,
        };
        Ok(Self {
            http: transport.build_client()?,
            config,
            probes: DEFAULT_PROBES.to_vec(),
        })
    }

    /// Replace the probe list.
    #[must_use]
    pub fn with_probes(mut self, probes: Vec<ScanProbe>) -> Self {
        self.probes = probes;
        self
    }

    pub fn probes(&self) -> &[ScanProbe] {
        &self.probes
    }

    /// Probe every port in list order. One result per probe.
    pub async fn scan(&self, host: Option<&str>) -> Vec<PortResult> {
        let host = host.map(normalize_host).filter(|h| !h.is_empty());
        let Some(host) = host else {
            debug!("no host configured, reporting all ports closed");
            return self
                .probes
                .iter()
                .map(|p| result(p, PortStatus::Closed))
                .collect();
        };

        let mut results = Vec::with_capacity(self.probes.len());
        for (i, probe) in self.probes.iter().enumerate() {
            if i > 0 && !self.config.inter_probe_delay.is_zero() {
                tokio::time::sleep(self.config.inter_probe_delay).await;
            }
            let status = self.probe(&host, probe).await;
            trace!(%host, port = probe.port, %status, "probed");
            results.push(result(probe, status));
        }
        debug!(%host, open = results.iter().filter(|r| r.status == PortStatus::Open).count(), "scan complete");
        results
    }

    async fn probe(&self, host: &str, probe: &ScanProbe) -> PortStatus {
        match probe.family {
            ProbeFamily::Http { tls } => {
                let scheme = if tls { "https" } else { "http" };
                let url = if host.contains(':') {
                    format!("{scheme}://[{host}]:{}/", probe.port)
                } else {
                    format!("{scheme}://{host}:{}/", probe.port)
                };
                match self.http.head(&url).send().await {
                    Ok(_) => PortStatus::Open,
                    Err(e) if e.is_timeout() => PortStatus::Timeout,
                    Err(e) => {
                        trace!(error = %e, %url, "HEAD failed");
                        PortStatus::Closed
                    }
                }
            }
            ProbeFamily::Streaming if self.config.tcp_probe_streaming => {
                tcp_probe(host, probe.port, self.config.probe_timeout).await
            }
            ProbeFamily::Streaming => PortStatus::Open,
        }
    }
}

async fn tcp_probe(host: &str, port: u16, timeout: Duration) -> PortStatus {
    match tokio::time::timeout(timeout, TcpStream::connect((host, port))).await {
        Ok(Ok(_)) => PortStatus::Open,
        Ok(Err(_)) => PortStatus::Closed,
        Err(_) => PortStatus::Timeout,
    }
}

fn result(probe: &ScanProbe, status: PortStatus) -> PortResult {
    PortResult {
        port: probe.port,
        label: probe.label,
        status,
    }
}

/// Accept `http://host:port/` style input as well as a bare host.
///
/// Any port is dropped since every probe supplies its own. IPv6 hosts come
/// back without brackets.
fn normalize_host(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_scheme = trimmed
        .split_once("://")
        .map_or(trimmed, |(_, rest)| rest);
    let authority = without_scheme.split('/').next().unwrap_or_default();

    if let Some(bracketed) = authority.strip_prefix('[') {
        return bracketed
            .split_once(']')
            .map_or(bracketed, |(host, _)| host)
            .to_owned();
    }
    match authority.split_once(':') {
        // More than one colon is a bare IPv6 address.
        Some((host, port)) if !port.contains(':') => host.to_owned(),
        _ => authority.to_owned(),
    }
}
