// Runtime configuration: HTTP behaviour shared by both API clients and the
// endpoints/credentials the interactive session starts from.

use std::time::Duration;

/// Default Cisco Spark API root.
pub const DEFAULT_SPARK_URL: &str = "https://api.ciscospark.com/v1/";

/// Per-request timeout used when nothing else is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Time the controller is given to compute a path trace before polling.
pub const DEFAULT_PATH_TRACE_WAIT: Duration = Duration::from_secs(10);

/// Settings applied to every outbound request.
///
/// `accept_invalid_certs` is a trust decision: APIC-EM appliances usually
/// ship with self-signed certificates, so the CLI turns verification off
/// unless `--verify-certs` is given. Library users must opt in explicitly
/// through [`HttpConfig::accept_invalid_certs`]; `Default` verifies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpConfig {
    pub timeout: Duration,
    pub accept_invalid_certs: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        HttpConfig {
            timeout: DEFAULT_TIMEOUT,
            accept_invalid_certs: false,
        }
    }
}

impl HttpConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Disable (or re-enable) TLS certificate verification.
    pub fn accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }
}

/// Everything the interactive session needs to start.
///
/// Credentials left as `None` are prompted for at startup.
#[derive(Clone)]
pub struct Config {
    pub http: HttpConfig,
    pub apic_host: Option<String>,
    pub apic_user: Option<String>,
    pub apic_password: Option<String>,
    pub spark_url: String,
    pub spark_token: Option<String>,
    pub path_trace_wait: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            http: HttpConfig::default(),
            apic_host: None,
            apic_user: None,
            apic_password: None,
            spark_url: DEFAULT_SPARK_URL.to_string(),
            spark_token: None,
            path_trace_wait: DEFAULT_PATH_TRACE_WAIT,
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("http", &self.http)
            .field("apic_host", &self.apic_host)
            .field("apic_user", &self.apic_user)
            .field("apic_password", &self.apic_password.as_ref().map(|_| "<redacted>"))
            .field("spark_url", &self.spark_url)
            .field("spark_token", &self.spark_token.as_ref().map(|_| "<redacted>"))
            .field("path_trace_wait", &self.path_trace_wait)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_http_config_verifies_certificates() {
        let http = HttpConfig::default();
        assert!(!http.accept_invalid_certs);
        assert_eq!(http.timeout, Duration::from_secs(10));
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let config = Config {
            apic_password: Some("hunter2".into()),
            spark_token: Some("tok".into()),
            ..Config::default()
        };
        let out = format!("{config:?}");
        assert!(!out.contains("hunter2"));
        assert!(!out.contains("\"tok\""));
        assert!(out.contains("<redacted>"));
    }
}
