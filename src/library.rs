// Controller operations used by the CLI, built on top of `ApicSession`:
// listing network devices and running a path trace.

use std::thread;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use crate::apic::ApicSession;
use crate::error::DispatchError;
use crate::transport::HttpTransport;

/// Every controller response wraps its payload in `response`.
#[derive(Deserialize, Debug)]
struct Envelope<T> {
    response: T,
}

/// One row of `GET network-device`.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct NetworkDevice {
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub management_ip_address: Option<String>,
    #[serde(default)]
    pub up_time: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub last_updated: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct FlowAnalysisStarted {
    flow_analysis_id: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct FlowAnalysis {
    request: FlowAnalysisRequest,
    #[serde(default)]
    network_elements_info: Vec<PathElement>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct FlowAnalysisRequest {
    status: String,
    #[serde(default)]
    failure_reason: Option<String>,
}

/// A hop on a traced path.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct PathElement {
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Outcome of a path trace between two addresses.
#[derive(Debug, Clone, PartialEq)]
pub struct PathTrace {
    pub status: String,
    pub failure_reason: Option<String>,
    pub elements: Vec<PathElement>,
}

impl PathTrace {
    pub fn is_failed(&self) -> bool {
        self.status == "FAILED"
    }
}

/// High-level controller API.
pub struct Library<T> {
    apic: ApicSession<T>,
}

impl<T: HttpTransport> Library<T> {
    pub fn new(apic: ApicSession<T>) -> Self {
        Library { apic }
    }

    fn get<R: DeserializeOwned>(&mut self, resource: &str) -> Result<R, DispatchError> {
        let value = self.apic.get_json(resource)?;
        let envelope: Envelope<R> = serde_json::from_value(value)?;
        Ok(envelope.response)
    }

    /// Devices known to the controller, at most `max` of them when given.
    pub fn network_devices(
        &mut self,
        max: Option<u32>,
    ) -> Result<Vec<NetworkDevice>, DispatchError> {
        let resource = match max {
            Some(limit) => format!("network-device?limit={limit}"),
            None => "network-device".to_string(),
        };
        let devices: Vec<NetworkDevice> = self.get(&resource)?;
        debug!(count = devices.len(), "fetched network devices");
        Ok(devices)
    }

    /// Submit a path trace and return the flow analysis id.
    pub fn start_path_trace(
        &mut self,
        source: &str,
        destination: &str,
    ) -> Result<String, DispatchError> {
        let value = self.apic.post_json(
            "flow-analysis",
            json!({"sourceIP": source, "destIP": destination}),
        )?;
        let envelope: Envelope<FlowAnalysisStarted> = serde_json::from_value(value)?;
        info!(
            flow_id = %envelope.response.flow_analysis_id,
            source,
            destination,
            "path trace submitted"
        );
        Ok(envelope.response.flow_analysis_id)
    }

    /// Fetch the state of a submitted path trace.
    pub fn path_trace_result(&mut self, flow_id: &str) -> Result<PathTrace, DispatchError> {
        let analysis: FlowAnalysis = self.get(&format!("flow-analysis/{flow_id}"))?;
        Ok(PathTrace {
            status: analysis.request.status,
            failure_reason: analysis.request.failure_reason,
            elements: analysis.network_elements_info,
        })
    }

    /// Submit a trace, give the controller `wait` to compute it, then fetch
    /// the result. There is no polling beyond that single fetch.
    pub fn path_trace(
        &mut self,
        source: &str,
        destination: &str,
        wait: Duration,
    ) -> Result<PathTrace, DispatchError> {
        let flow_id = self.start_path_trace(source, destination)?;
        thread::sleep(wait);
        self.path_trace_result(&flow_id)
    }
}

/// `lastUpdated` shows up as a string or as epoch millis depending on the
/// controller release.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}
