use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::classifier::FeatureVector;
use crate::pipeline::supervisor::CaptureControl;

/// Externally submitted feature vector. Field names mirror the dataset
/// column names, they are part of the public request contract.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct Features {
    #[serde(rename = "Flow_Duration")]
    pub flow_duration: f64,
    #[serde(rename = "Total_Fwd_Packets")]
    pub total_fwd_packets: u64,
    #[serde(rename = "Total_Backward_Packets")]
    pub total_backward_packets: u64,
    #[serde(rename = "Total_Length_of_Fwd_Packets")]
    pub total_length_of_fwd_packets: u64,
    #[serde(rename = "Total_Length_of_Bwd_Packets")]
    pub total_length_of_bwd_packets: u64,
}

impl Features {
    /// Lower into the fixed-order vector the classifier consumes.
    pub fn vector(&self) -> FeatureVector {
        FeatureVector([
            self.flow_duration,
            self.total_fwd_packets as f64,
            self.total_backward_packets as f64,
            self.total_length_of_fwd_packets as f64,
            self.total_length_of_bwd_packets as f64,
        ])
    }
}

/// One labeled flow, as pushed to live subscribers. Immutable once built;
/// `timestamp` is the flush time in milliseconds. Endpoints are only
/// known for events produced by the capture pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct ClassificationEvent {
    pub fwd: u64,
    pub bwd: u64,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dst_ip: Option<String>,
    pub timestamp: u64,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct Labeled {
    pub label: String,
}

/// Structured result of a capture control call. Never an HTTP error,
/// the status field carries the outcome.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct ControlResponse {
    pub status: String,
    pub message: String,
}

impl From<CaptureControl> for ControlResponse {
    fn from(outcome: CaptureControl) -> Self {
        let (status, message) = match outcome {
            CaptureControl::Started => ("started", "capture started".to_owned()),
            CaptureControl::AlreadyRunning => {
                ("already_running", "capture is already running".to_owned())
            }
            CaptureControl::Stopped => ("stopped", "capture stopped".to_owned()),
            CaptureControl::NotRunning => ("not_running", "no active capture".to_owned()),
            CaptureControl::Error(message) => ("error", message),
        };

        Self {
            status: status.to_owned(),
            message,
        }
    }
}
