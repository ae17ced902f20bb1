//! Bridge to the platform action layer
//!
//! Facades never touch hardware directly. They submit [`ActionRequest`]s through
//! an [`ActionLayer`] and decode the typed answer via [`DomainActions`].

use std::fmt;
use std::sync::Arc;

use dptf_protocol::{
    ActionRequest, ActionResponse, CoreControlDynamicCaps, CoreControlLpoPreference,
    CoreControlStaticCaps, CoreControlStatus, DisplayControlDynamicCaps, DisplayControlStatus,
    DomainIndex, ParticipantIndex, Percentage, PerformanceControlDynamicCaps,
    PerformanceControlSet, PerformanceControlStatus, Power, PowerControlDynamicCapsSet,
    PowerControlType, Temperature, TemperatureThresholds,
};
use tracing::debug;

use crate::error::{DptfError, Result};

/// Synchronous, possibly failing request/response channel to the hardware
pub trait ActionLayer: Send + Sync {
    fn submit_request(
        &self,
        participant: ParticipantIndex,
        domain: DomainIndex,
        request: ActionRequest,
    ) -> Result<ActionResponse>;
}

/// Typed action-layer calls bound to one (participant, domain)
#[derive(Clone)]
pub struct DomainActions {
    layer: Arc<dyn ActionLayer>,
    participant: ParticipantIndex,
    domain: DomainIndex,
}

impl fmt::Debug for DomainActions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomainActions")
            .field("participant", &self.participant)
            .field("domain", &self.domain)
            .finish()
    }
}

/// Unwrap one response variant or report the mismatch
macro_rules! expect_response {
    ($self:ident, $request:expr, $variant:ident) => {{
        let request = $request;
        let name = request.type_name();
        match $self.submit(request)? {
            ActionResponse::$variant(value) => Ok(value),
            other => Err(DptfError::UnexpectedResponse {
                request: name.to_string(),
                response: other.type_name().to_string(),
            }),
        }
    }};
}

impl DomainActions {
    pub fn new(layer: Arc<dyn ActionLayer>, participant: ParticipantIndex, domain: DomainIndex) -> Self {
        Self {
            layer,
            participant,
            domain,
        }
    }

    pub fn participant(&self) -> ParticipantIndex {
        self.participant
    }

    pub fn domain(&self) -> DomainIndex {
        self.domain
    }

    /// Validate and submit a raw request
    pub fn submit(&self, request: ActionRequest) -> Result<ActionResponse> {
        request.validate().map_err(DptfError::InvalidRequest)?;
        debug!(
            "Submitting {} to participant {} domain {}",
            request.type_name(),
            self.participant,
            self.domain
        );
        self.layer.submit_request(self.participant, self.domain, request)
    }

    fn submit_write(&self, request: ActionRequest) -> Result<()> {
        let name = request.type_name();
        match self.submit(request)? {
            ActionResponse::Done => Ok(()),
            other => Err(DptfError::UnexpectedResponse {
                request: name.to_string(),
                response: other.type_name().to_string(),
            }),
        }
    }

    // ========================================================================
    // Power
    // ========================================================================

    pub fn power_control_capabilities(&self) -> Result<PowerControlDynamicCapsSet> {
        expect_response!(self, ActionRequest::GetPowerControlCapabilities, PowerCapabilities)
    }

    pub fn set_power_control_capabilities(&self, capabilities: PowerControlDynamicCapsSet) -> Result<()> {
        self.submit_write(ActionRequest::SetPowerControlCapabilities { capabilities })
    }

    pub fn set_power_caps_lock(&self, locked: bool) -> Result<()> {
        self.submit_write(ActionRequest::SetPowerCapsLock { locked })
    }

    pub fn power_limit(&self, control_type: PowerControlType) -> Result<Power> {
        expect_response!(self, ActionRequest::GetPowerLimit { control_type }, Power)
    }

    pub fn set_power_limit(&self, control_type: PowerControlType, limit: Power) -> Result<()> {
        self.submit_write(ActionRequest::SetPowerLimit { control_type, limit })
    }

    pub fn power_limit_time_window_ms(&self, control_type: PowerControlType) -> Result<u64> {
        expect_response!(self, ActionRequest::GetPowerLimitTimeWindow { control_type }, TimeWindow)
    }

    pub fn set_power_limit_time_window_ms(&self, control_type: PowerControlType, time_window_ms: u64) -> Result<()> {
        self.submit_write(ActionRequest::SetPowerLimitTimeWindow {
            control_type,
            time_window_ms,
        })
    }

    pub fn average_power(&self) -> Result<Power> {
        expect_response!(self, ActionRequest::GetAveragePower, Power)
    }

    pub fn current_power(&self) -> Result<Power> {
        expect_response!(self, ActionRequest::GetCurrentPower, Power)
    }

    // ========================================================================
    // Performance
    // ========================================================================

    pub fn performance_control_set(&self) -> Result<PerformanceControlSet> {
        expect_response!(self, ActionRequest::GetPerformanceControlSet, PerformanceControls)
    }

    pub fn performance_dynamic_caps(&self) -> Result<PerformanceControlDynamicCaps> {
        expect_response!(self, ActionRequest::GetPerformanceDynamicCaps, PerformanceCapabilities)
    }

    pub fn performance_status(&self) -> Result<PerformanceControlStatus> {
        expect_response!(self, ActionRequest::GetPerformanceStatus, PerformanceStatus)
    }

    pub fn set_performance_control(&self, index: u32) -> Result<()> {
        self.submit_write(ActionRequest::SetPerformanceControl { index })
    }

    // ========================================================================
    // Core
    // ========================================================================

    pub fn core_static_caps(&self) -> Result<CoreControlStaticCaps> {
        expect_response!(self, ActionRequest::GetCoreStaticCaps, CoreStaticCaps)
    }

    pub fn core_dynamic_caps(&self) -> Result<CoreControlDynamicCaps> {
        expect_response!(self, ActionRequest::GetCoreDynamicCaps, CoreDynamicCaps)
    }

    pub fn core_lpo_preference(&self) -> Result<CoreControlLpoPreference> {
        expect_response!(self, ActionRequest::GetCoreLpoPreference, CoreLpoPreference)
    }

    pub fn core_status(&self) -> Result<CoreControlStatus> {
        expect_response!(self, ActionRequest::GetCoreStatus, CoreStatus)
    }

    pub fn set_active_cores(&self, count: u32) -> Result<()> {
        self.submit_write(ActionRequest::SetActiveCores { count })
    }

    // ========================================================================
    // Display
    // ========================================================================

    pub fn display_capabilities(&self) -> Result<DisplayControlDynamicCaps> {
        expect_response!(self, ActionRequest::GetDisplayCapabilities, DisplayCapabilities)
    }

    pub fn display_status(&self) -> Result<DisplayControlStatus> {
        expect_response!(self, ActionRequest::GetDisplayStatus, DisplayStatus)
    }

    pub fn set_display_control(&self, index: u32) -> Result<()> {
        self.submit_write(ActionRequest::SetDisplayControl { index })
    }

    // ========================================================================
    // Temperature / Utilization
    // ========================================================================

    pub fn temperature(&self) -> Result<Temperature> {
        expect_response!(self, ActionRequest::GetTemperature, Temperature)
    }

    pub fn temperature_thresholds(&self) -> Result<TemperatureThresholds> {
        expect_response!(self, ActionRequest::GetTemperatureThresholds, TemperatureThresholds)
    }

    pub fn set_temperature_thresholds(&self, thresholds: TemperatureThresholds) -> Result<()> {
        self.submit_write(ActionRequest::SetTemperatureThresholds { thresholds })
    }

    pub fn utilization(&self) -> Result<Percentage> {
        expect_response!(self, ActionRequest::GetUtilization, Utilization)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockActions;

    #[test]
    fn test_wrong_variant_is_unexpected_response() {
        let mut layer = MockActions::new();
        layer
            .expect_submit_request()
            .returning(|_, _, _| Ok(ActionResponse::Done));

        let actions = DomainActions::new(Arc::new(layer), 0, 0);
        let err = actions.average_power().unwrap_err();
        assert!(matches!(err, DptfError::UnexpectedResponse { .. }));
        assert!(err.to_string().contains("GetAveragePower"));
    }

    #[test]
    fn test_invalid_request_never_reaches_layer() {
        let mut layer = MockActions::new();
        layer.expect_submit_request().times(0);

        let actions = DomainActions::new(Arc::new(layer), 0, 0);
        let err = actions
            .set_power_limit_time_window_ms(PowerControlType::Pl2, 1_000)
            .unwrap_err();
        assert!(matches!(err, DptfError::InvalidRequest(_)));
    }

    #[test]
    fn test_requests_carry_domain_address() {
        let mut layer = MockActions::new();
        layer
            .expect_submit_request()
            .withf(|p, d, r| *p == 3 && *d == 1 && *r == ActionRequest::SetActiveCores { count: 4 })
            .times(1)
            .returning(|_, _, _| Ok(ActionResponse::Done));

        let actions = DomainActions::new(Arc::new(layer), 3, 1);
        actions.set_active_cores(4).unwrap();
    }
}
