//! Serializable diagnostics snapshots of knobs, domains and participants

use std::collections::BTreeMap;

use dptf_protocol::{
    DomainIndex, ParticipantIndex, Percentage, Power, TargetIndex, Temperature, TemperatureThresholds,
};
use serde::Serialize;

use crate::constants::status::JSON_INDENT;
use crate::data::{DomainInterfaces, DomainType};
use crate::error::Result;
use crate::knob::Bounds;

/// Arbitration state of one knob
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KnobStatus<V> {
    pub control: &'static str,
    pub supported: bool,
    pub has_been_limited: bool,
    pub requests: BTreeMap<TargetIndex, V>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounds: Option<Bounds<V>>,
    /// Value last written by this process
    #[serde(skip_serializing_if = "Option::is_none")]
    pub programmed: Option<V>,
}

impl<V> KnobStatus<V> {
    pub fn new(control: &'static str, supported: bool) -> Self {
        Self {
            control,
            supported,
            has_been_limited: false,
            requests: BTreeMap::new(),
            bounds: None,
            programmed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DomainStatus {
    pub participant: ParticipantIndex,
    pub domain: DomainIndex,
    pub name: String,
    pub domain_type: DomainType,
    pub interfaces: DomainInterfaces,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power: Option<KnobStatus<Power>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pstates: Option<KnobStatus<u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tstates: Option<KnobStatus<u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cores: Option<KnobStatus<u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<KnobStatus<u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<Temperature>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature_thresholds: Option<TemperatureThresholds>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utilization: Option<Percentage>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParticipantStatus {
    pub participant: ParticipantIndex,
    pub name: String,
    pub domains: Vec<DomainStatus>,
}

/// Render a snapshot as indented JSON
pub fn to_pretty_json<T: Serialize>(value: &T) -> Result<String> {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(JSON_INDENT);
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    value.serialize(&mut serializer)?;
    String::from_utf8(out).map_err(|e| crate::error::DptfError::generic(e.to_string()))
}
