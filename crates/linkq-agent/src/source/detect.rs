//! Interface discovery and association checks via `ip` / `iw`.

use std::net::IpAddr;
use std::process::Stdio;

/// Run a command and return its stdout, or `None` if it could not be
/// spawned, failed, or printed nothing. The child is killed if the future
/// is dropped (e.g. by the monitor's read timeout).
pub async fn run(argv: &[&str]) -> Option<String> {
    let (cmd, args) = argv.split_first()?;
    let output = tokio::process::Command::new(cmd)
        .args(args)
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .ok()?;
    if !output.status.success() || output.stdout.is_empty() {
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Find the interface carrying `ip` in `ip -o -4 addr show` output.
///
/// Lines look like `3: wlan0    inet 192.168.0.10/24 brd ... scope global wlan0`.
pub fn parse_iface_for_ip(output: &str, ip: IpAddr) -> Option<String> {
    let prefix = format!("{ip}/");
    output.lines().find_map(|line| {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() >= 4 && parts[3].starts_with(&prefix) {
            Some(parts[1].trim_end_matches(':').to_string())
        } else {
            None
        }
    })
}

pub async fn find_iface_for_ip(ip: IpAddr) -> Option<String> {
    let out = run(&["ip", "-o", "-4", "addr", "show"]).await?;
    parse_iface_for_ip(&out, ip)
}

/// True when `iw dev <iface> link` reports an association.
pub async fn is_connected(iface: &str) -> bool {
    run(&["iw", "dev", iface, "link"])
        .await
        .is_some_and(|out| out.starts_with("Connected to"))
}

/// The interface a source reads from: either forced, or whichever interface
/// currently carries `target_ip`. Re-detected on every association check so
/// a renamed or re-created interface is picked up.
#[derive(Debug, Clone)]
pub struct IfaceResolver {
    forced: Option<String>,
    target_ip: Option<IpAddr>,
    current: Option<String>,
}

impl IfaceResolver {
    pub fn new(forced: Option<String>, target_ip: Option<IpAddr>) -> Self {
        IfaceResolver {
            current: forced.clone(),
            forced,
            target_ip,
        }
    }

    /// Interface found by the last [`IfaceResolver::resolve`].
    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub async fn resolve(&mut self) -> Option<String> {
        if let Some(iface) = &self.forced {
            return Some(iface.clone());
        }
        let ip = self.target_ip?;
        let found = find_iface_for_ip(ip).await;
        if found != self.current {
            if let Some(name) = &found {
                tracing::info!(%ip, iface = %name, "target address found");
            }
            self.current = found.clone();
        }
        found
    }

    /// Resolve, then check the association.
    pub async fn is_associated(&mut self) -> bool {
        match self.resolve().await {
            Some(iface) => is_connected(&iface).await,
            None => false,
        }
    }

    /// Forced interface or target address, for log labels.
    pub fn describe(&self) -> Option<String> {
        match (&self.forced, &self.target_ip) {
            (Some(iface), _) => Some(iface.clone()),
            (None, Some(ip)) => Some(ip.to_string()),
            (None, None) => None,
        }
    }
}
