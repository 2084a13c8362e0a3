// QC feed wire message and its validation into a ParamEvent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{ParamEvent, ParameterKind, StationId, round_one_decimal};

/// One waveform quality record as published on the QC feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QcMessage {
    /// `NET.STA.LOC.CHA`
    #[serde(default)]
    pub waveform_id: Option<String>,
    pub parameter: String,
    #[serde(default)]
    pub value: serde_json::Value,
    /// Start of the QC window; receive time is used when absent.
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
}

#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("malformed feed payload: {0}")]
    Payload(String),

    #[error("missing waveform id")]
    MissingWaveformId,

    #[error("malformed waveform id {0:?}")]
    BadWaveformId(String),

    #[error("value {0} is not a finite number")]
    BadValue(String),
}

impl QcMessage {
    /// Decode one feed payload.
    pub fn from_json(payload: &str) -> Result<Self, EventError> {
        serde_json::from_str(payload).map_err(|e| EventError::Payload(e.to_string()))
    }

    /// `Ok(None)` when the parameter is not one of the six tracked kinds.
    pub fn to_param_event(
        &self,
        received_at: DateTime<Utc>,
    ) -> Result<Option<ParamEvent>, EventError> {
        let Some(kind) = ParameterKind::from_feed_name(&self.parameter) else {
            return Ok(None);
        };
        let waveform_id = self
            .waveform_id
            .as_deref()
            .ok_or(EventError::MissingWaveformId)?;
        let station = StationId::from_waveform_id(waveform_id)
            .ok_or_else(|| EventError::BadWaveformId(waveform_id.to_string()))?;
        let value = cast_value(&self.value)?;
        Ok(Some(ParamEvent {
            station,
            kind,
            value: round_one_decimal(value),
            timestamp: self.start.unwrap_or(received_at),
        }))
    }
}

/// Numbers and numeric strings are accepted; NaN/inf are not.
fn cast_value(value: &serde_json::Value) -> Result<f64, EventError> {
    let v = match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    v.filter(|v| v.is_finite())
        .ok_or_else(|| EventError::BadValue(value.to_string()))
}
