//! Participant-level grouping of domain proxies

use std::collections::BTreeMap;
use std::sync::Arc;

use dptf_protocol::{DomainIndex, ParticipantIndex, TargetIndex};
use tracing::{debug, info};

use crate::data::DomainProperties;
use crate::domain::DomainProxy;
use crate::error::{DptfError, Result};
use crate::services::{ActionLayer, DomainActions};
use crate::status::ParticipantStatus;

#[derive(Debug)]
pub struct ParticipantProxy {
    index: ParticipantIndex,
    name: String,
    domains: BTreeMap<DomainIndex, DomainProxy>,
}

impl ParticipantProxy {
    pub fn new(index: ParticipantIndex, name: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
            domains: BTreeMap::new(),
        }
    }

    pub fn index(&self) -> ParticipantIndex {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Create the proxy for one domain, replacing any previous binding
    pub fn bind_domain(
        &mut self,
        layer: Arc<dyn ActionLayer>,
        domain: DomainIndex,
        properties: DomainProperties,
    ) -> &mut DomainProxy {
        info!("Participant {} ({}): binding domain {} ({})", self.index, self.name, domain, properties.name);
        let proxy = DomainProxy::new(DomainActions::new(layer, self.index, domain), properties);
        self.domains.remove(&domain);
        self.domains.entry(domain).or_insert(proxy)
    }

    pub fn unbind_domain(&mut self, domain: DomainIndex) -> Option<DomainProxy> {
        let removed = self.domains.remove(&domain);
        if removed.is_some() {
            info!("Participant {} ({}): unbound domain {}", self.index, self.name, domain);
        }
        removed
    }

    pub fn domain(&self, domain: DomainIndex) -> Result<&DomainProxy> {
        self.domains.get(&domain).ok_or(DptfError::UnknownDomain {
            participant: self.index,
            domain,
        })
    }

    pub fn domain_mut(&mut self, domain: DomainIndex) -> Result<&mut DomainProxy> {
        self.domains.get_mut(&domain).ok_or(DptfError::UnknownDomain {
            participant: self.index,
            domain,
        })
    }

    pub fn domain_indexes(&self) -> Vec<DomainIndex> {
        self.domains.keys().copied().collect()
    }

    pub fn initialize_controls(&self) {
        for proxy in self.domains.values() {
            proxy.initialize_controls();
        }
    }

    pub fn set_controls_to_max(&self) {
        for proxy in self.domains.values() {
            proxy.set_controls_to_max();
        }
    }

    pub fn clear_temperature_thresholds(&self) {
        for proxy in self.domains.values() {
            proxy.clear_temperature_thresholds();
        }
    }

    /// Offer the limit step to domains in ascending index order; the first
    /// domain that absorbs it wins
    pub fn request_limit(&mut self, target: TargetIndex) -> bool {
        let absorbed = self
            .domains
            .values_mut()
            .any(|proxy| proxy.request_limit(target));
        if !absorbed {
            debug!("Participant {}: fully limited for target {}", self.index, target);
        }
        absorbed
    }

    /// Offer the unlimit step to domains in descending index order
    pub fn request_unlimit(&mut self, target: TargetIndex) -> bool {
        self.domains
            .values_mut()
            .rev()
            .any(|proxy| proxy.request_unlimit(target))
    }

    pub fn clear_all_requests_for_target(&mut self, target: TargetIndex) {
        for proxy in self.domains.values_mut() {
            proxy.clear_all_requests_for_target(target);
        }
    }

    /// Commit every domain. Stops at the first failure.
    pub fn commit_limits(&mut self) -> Result<bool> {
        let mut committed = false;
        for proxy in self.domains.values_mut() {
            committed |= proxy.commit_limits()?;
        }
        Ok(committed)
    }

    pub fn status(&self) -> ParticipantStatus {
        ParticipantStatus {
            participant: self.index,
            name: self.name.clone(),
            domains: self.domains.values().map(DomainProxy::status).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{DomainInterfaces, DomainType};
    use crate::knob::ControlKnob;
    use crate::simulator::SimulatedPlatform;
    use crate::test_utils::{cpu_interfaces, create_mock_cpu_domain, create_mock_display_domain};

    fn participant() -> (Arc<SimulatedPlatform>, ParticipantProxy) {
        let platform = Arc::new(SimulatedPlatform::new());
        platform.insert_domain(0, 0, create_mock_cpu_domain());
        platform.insert_domain(0, 1, create_mock_display_domain(3));

        let mut participant = ParticipantProxy::new(0, "SoC");
        participant.bind_domain(
            platform.clone(),
            0,
            DomainProperties::new("CPU", DomainType::Processor, cpu_interfaces()),
        );
        participant.bind_domain(
            platform.clone(),
            1,
            DomainProperties::new("Panel", DomainType::Display, DomainInterfaces::DISPLAY_CONTROL),
        );
        participant.initialize_controls();
        platform.clear_writes();
        (platform, participant)
    }

    #[test]
    fn test_lowest_domain_absorbs_limit_first() {
        let (_, mut participant) = participant();
        assert!(participant.request_limit(1));
        assert!(participant.domain(0).unwrap().power().unwrap().has_been_limited());
        assert_eq!(participant.domain(1).unwrap().display().unwrap().target_request(1).unwrap(), 0);
    }

    #[test]
    fn test_unlimit_starts_from_highest_domain() {
        let (platform, mut participant) = participant();
        participant.request_limit(1);
        participant.domain_mut(1).unwrap().request_limit(1);
        participant.commit_limits().unwrap();
        assert_eq!(platform.domain(0, 1).unwrap().display.unwrap().current_index, 4);

        assert!(participant.request_unlimit(1));
        let display = participant.domain(1).unwrap().display().unwrap();
        assert_eq!(display.target_request(1).unwrap(), 3);
        let power = participant.domain(0).unwrap().power().unwrap();
        assert_eq!(power.target_request(1).unwrap(), crate::test_utils::watts(11.0));
    }

    #[test]
    fn test_unknown_domain() {
        let (_, mut participant) = participant();
        assert!(matches!(
            participant.domain(7).unwrap_err(),
            DptfError::UnknownDomain { participant: 0, domain: 7 }
        ));
        assert!(participant.unbind_domain(1).is_some());
        assert_eq!(participant.domain_indexes(), vec![0]);
    }

    #[test]
    fn test_status_lists_domains_in_order() {
        let (_, participant) = participant();
        let status = participant.status();
        assert_eq!(status.name, "SoC");
        let names: Vec<_> = status.domains.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["CPU", "Panel"]);
    }
}
