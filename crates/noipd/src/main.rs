// # noipd - No-IP contact sensor daemon
//
// This is a THIN integration layer. All polling, interpretation and sensor
// logic lives in noip-core; the daemon only:
// 1. Reads configuration from environment variables (or a JSON file)
// 2. Initializes tracing and the runtime
// 3. Builds one PollScheduler per configured hostname
// 4. Waits for SIGTERM/SIGINT and tears the schedulers down
//
// ## Configuration
//
// ### Devices
// - `NOIP_CONFIG_FILE`: Path to a JSON platform config with a `devices` list
//
// Or a single device:
// - `NOIP_HOSTNAME`: Hostname to keep updated
// - `NOIP_USERNAME` / `NOIP_PASSWORD`: Account credentials
// - `NOIP_FIRMWARE`: Version reported in the User-Agent
// - `NOIP_REFRESH_RATE`: Poll interval in seconds (default 1800)
// - `NOIP_LOGGING`: standard, debug, debugMode or none
//
// ### Public IP
// - `NOIP_PUBLIC_IP`: Fixed IPv4 address to report
// - `NOIP_IP_SOURCE_URL`: Echo service to ask instead (http feature)
//
// ### Client
// - `NOIP_CLIENT_NAME`: Name sent in the User-Agent
// - `NOIP_LOG_LEVEL`: trace, debug, info, warn, error
//
// ## Example
//
// ```bash
// export NOIP_HOSTNAME=home.ddns.net
// export NOIP_USERNAME=me@example.com
// export NOIP_PASSWORD=...
// export NOIP_REFRESH_RATE=1800
//
// noipd
// ```

use anyhow::{Context, Result};
use noip_client::NoIpClient;
use noip_core::config::DeviceSettings;
use noip_core::traits::{IpSource, StaticIpSource, UpdateClient};
use noip_core::{
    Collaborators, DeviceConfig, LogMode, MemoryAccessory, PlatformConfig, PollEvent,
    PollScheduler, TracingSink,
};
use std::net::Ipv4Addr;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tracing::{Level, debug, error, info};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// How long teardown may take before the daemon gives up waiting
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum NoipExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<NoipExitCode> for ExitCode {
    fn from(code: NoipExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Where the public IPv4 address comes from
#[derive(Debug, Clone, PartialEq, Eq)]
enum PublicIp {
    Static(Ipv4Addr),
    #[cfg_attr(not(feature = "http"), allow(dead_code))]
    Lookup(String),
}

/// Application configuration
#[derive(Debug)]
struct Config {
    platform: PlatformConfig,
    public_ip: PublicIp,
    client_name: Option<String>,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from any key/value lookup
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let platform = match lookup("NOIP_CONFIG_FILE") {
            Some(path) => PlatformConfig::from_json_file(&path)
                .with_context(|| format!("Failed to load NOIP_CONFIG_FILE {path}"))?,
            None => {
                let hostname = lookup("NOIP_HOSTNAME").context(
                    "NOIP_HOSTNAME is required. Set it via: export NOIP_HOSTNAME=home.ddns.net \
                     (or point NOIP_CONFIG_FILE at a JSON config)",
                )?;
                let mut device = DeviceConfig::new(
                    hostname,
                    lookup("NOIP_USERNAME").unwrap_or_default(),
                    lookup("NOIP_PASSWORD").unwrap_or_default(),
                );
                if let Some(firmware) = lookup("NOIP_FIRMWARE") {
                    device = device.with_firmware(firmware);
                }
                // An unparsable interval falls back to the default like an unset one
                device.refresh_rate = lookup("NOIP_REFRESH_RATE").and_then(|s| s.parse().ok());
                if let Some(logging) = lookup("NOIP_LOGGING") {
                    device = device.with_logging(logging.parse::<LogMode>()?);
                }

                PlatformConfig {
                    name: None,
                    devices: vec![device],
                    options: None,
                }
            }
        };

        let public_ip = match lookup("NOIP_PUBLIC_IP") {
            Some(ip) => PublicIp::Static(
                ip.parse()
                    .with_context(|| format!("NOIP_PUBLIC_IP '{ip}' is not an IPv4 address"))?,
            ),
            None => PublicIp::Lookup(
                lookup("NOIP_IP_SOURCE_URL").unwrap_or_else(|| default_ip_service().to_string()),
            ),
        };

        Ok(Self {
            platform,
            public_ip,
            client_name: lookup("NOIP_CLIENT_NAME"),
            log_level: lookup("NOIP_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the configuration and resolve every device
    fn validate(&self) -> Result<Vec<DeviceSettings>> {
        let devices = self.platform.resolve_devices()?;

        if let PublicIp::Lookup(url) = &self.public_ip {
            if !cfg!(feature = "http") {
                anyhow::bail!(
                    "NOIP_PUBLIC_IP is required when noipd is built without the http feature"
                );
            }
            if !url.starts_with("https://") && !url.starts_with("http://") {
                anyhow::bail!("NOIP_IP_SOURCE_URL must use HTTP or HTTPS scheme. Got: {}", url);
            }
        }

        self.level()?;
        Ok(devices)
    }

    /// Parse the tracing level
    fn level(&self) -> Result<Level> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Ok(Level::TRACE),
            "debug" => Ok(Level::DEBUG),
            "info" => Ok(Level::INFO),
            "warn" => Ok(Level::WARN),
            "error" => Ok(Level::ERROR),
            _ => anyhow::bail!(
                "NOIP_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }
    }
}

#[cfg(feature = "http")]
fn default_ip_service() -> &'static str {
    noip_ip_http::DEFAULT_IP_SERVICE
}

#[cfg(not(feature = "http"))]
fn default_ip_service() -> &'static str {
    ""
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return NoipExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    let devices = match config.validate() {
        Ok(devices) => devices,
        Err(e) => {
            eprintln!("Configuration validation error: {:#}", e);
            return NoipExitCode::ConfigError.into();
        }
    };

    // Initialize tracing
    let log_level = config.level().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return NoipExitCode::ConfigError.into();
    }

    info!("Starting noipd daemon");
    info!("Configuration loaded: {} device(s)", devices.len());

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return NoipExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_daemon(config, devices).await {
            error!("Daemon error: {:#}", e);
            NoipExitCode::RuntimeError
        } else {
            NoipExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Build the IP source shared by all devices
fn build_ip_source(public_ip: &PublicIp) -> Result<Arc<dyn IpSource>> {
    match public_ip {
        PublicIp::Static(ip) => {
            info!("Reporting fixed public IP {}", ip);
            Ok(Arc::new(StaticIpSource::new(*ip)))
        }
        #[cfg(feature = "http")]
        PublicIp::Lookup(url) => {
            info!("Looking up public IP via {}", url);
            Ok(Arc::new(noip_ip_http::HttpIpSource::new(url.clone())?))
        }
        #[cfg(not(feature = "http"))]
        PublicIp::Lookup(_) => anyhow::bail!("HTTP IP lookup not compiled in"),
    }
}

/// Run the daemon
async fn run_daemon(config: Config, devices: Vec<DeviceSettings>) -> Result<()> {
    let client: Arc<dyn UpdateClient> = match &config.client_name {
        Some(name) => Arc::new(NoIpClient::with_client_name(name.clone())?),
        None => Arc::new(NoIpClient::new()?),
    };
    let ip_source = build_ip_source(&config.public_ip)?;

    let mut schedulers = Vec::with_capacity(devices.len());
    let mut monitors = Vec::with_capacity(devices.len());

    for settings in devices {
        let accessory = Arc::new(MemoryAccessory::new());
        let collaborators = Collaborators {
            client: Arc::clone(&client),
            ip_source: Arc::clone(&ip_source),
            accessory: accessory.clone(),
            log_sink: Arc::new(TracingSink),
        };

        info!(
            "Managing {} every {:?}",
            settings.identity.hostname,
            settings.poll.refresh_rate()
        );

        let (scheduler, events) = PollScheduler::spawn(settings, collaborators)?;
        monitors.push(monitor_device(
            scheduler.device_name().to_string(),
            accessory,
            events,
        ));
        schedulers.push(scheduler);
    }

    info!("Daemon initialized successfully");

    let signal = wait_for_shutdown().await?;
    info!("Received shutdown signal: {}", signal);
    info!("Shutting down daemon");

    for scheduler in schedulers {
        let name = scheduler.device_name().to_string();
        if tokio::time::timeout(SHUTDOWN_TIMEOUT, scheduler.shutdown())
            .await
            .is_err()
        {
            error!("Shutdown timeout after {:?} for {}", SHUTDOWN_TIMEOUT, name);
        }
    }
    for monitor in monitors {
        monitor.abort();
    }

    Ok(())
}

/// Log characteristic values and poll events for one device
fn monitor_device(
    device: String,
    accessory: Arc<MemoryAccessory>,
    mut events: mpsc::Receiver<PollEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut values = accessory.watch();
        loop {
            tokio::select! {
                Some(value) = values.next() => {
                    info!(device = %device, "ContactSensorState: {}", value);
                }
                event = events.recv() => match event {
                    Some(PollEvent::Suspended { code }) => {
                        error!(device = %device, "Polling suspended by '{}', fix the configuration and restart", code);
                    }
                    Some(event) => debug!(device = %device, "{:?}", event),
                    None => break,
                },
            }
        }
    })
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
