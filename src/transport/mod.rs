// Blocking instrument sessions. Everything above this module talks to an
// `Instrument`; how the bytes travel (VXI-11, VISA, or a scripted mock) is
// decided once, when the resource string is opened.

use std::collections::HashSet;
use std::time::Duration;

use lazy_static::lazy_static;
use log::{debug, info, warn};
use regex::Regex;

use crate::config::TransportConfig;
use crate::error::{Result, ScopeError};
use crate::rpc::port_mapping::{self, Mapping, Protocol, TcpPortMapperClient};
use crate::vxi11::{DEVICE_CORE_PROG, DEVICE_CORE_VERS, DEFAULT_DEVICE_NAME};

pub mod mock;
#[cfg(feature = "visa")]
pub mod visa;
pub mod vxi11;

pub use self::mock::MockInstrument;
pub use self::vxi11::Vxi11Instrument;

lazy_static! {
    static ref VXI11_RE: Regex = Regex::new(r"^TCPIP\d*::([^:]+)::(?:(inst\d+)::)?INSTR$").unwrap();
}

// How long to listen for port mappers answering a discovery broadcast
const BROADCAST_LISTEN:Duration = Duration::from_millis(1000);

pub trait Instrument {
    fn resource(&self) -> &str;

    fn write(&mut self, command: &str) -> Result<()>;

    // Write followed by a terminated read, with the read termination stripped
    fn query(&mut self, command: &str) -> Result<String>;

    // One complete message exactly as the instrument sent it, for binary blocks
    fn read_raw(&mut self) -> Result<Vec<u8>>;
}

impl<T: Instrument + ?Sized> Instrument for Box<T> {
    fn resource(&self) -> &str { (**self).resource() }
    fn write(&mut self, command: &str) -> Result<()> { (**self).write(command) }
    fn query(&mut self, command: &str) -> Result<String> { (**self).query(command) }
    fn read_raw(&mut self) -> Result<Vec<u8>> { (**self).read_raw() }
}

// Where a session gets a fresh instrument for each acquisition
pub trait InstrumentSource {
    fn open_instrument(&mut self) -> Result<Box<dyn Instrument>>;
}

pub fn vxi11_resource_string(host: &str) -> String {
    format!("TCPIP0::{}::{}::INSTR", host, DEFAULT_DEVICE_NAME)
}

// Host and device name for resources that can be reached over plain VXI-11
pub fn parse_vxi11_resource(resource: &str) -> Option<(String, String)> {
    let caps = VXI11_RE.captures(resource)?;
    let host = caps.get(1)?.as_str().to_owned();
    let device = caps.get(2).map(|m| m.as_str()).unwrap_or(DEFAULT_DEVICE_NAME).to_owned();
    Some((host, device))
}

pub fn select_resource(resources: &[String], filter: &str) -> Result<String> {
    resources
        .iter()
        .find(|r| r.contains(filter))
        .cloned()
        .ok_or_else(|| ScopeError::ResourceNotFound { filter: filter.to_owned(), found: resources.to_vec() })
}

#[cfg(feature = "visa")]
fn discover_visa(found: &mut Vec<String>) {
    match visa::list_resources() {
        Ok(list) => found.extend(list),
        Err(e)   => warn!("VISA discovery failed: {}", e),
    }
}

#[cfg(not(feature = "visa"))]
fn discover_visa(_found: &mut Vec<String>) {}

pub struct ResourceManager {
    config: TransportConfig,
}

impl ResourceManager {

    pub fn new(config: TransportConfig) -> Self { Self { config } }

    // Discovery is best effort per mechanism: a missing VISA library or a network
    // without broadcast shouldn't hide the instruments another mechanism found
    pub fn discover(&self) -> Result<Vec<String>> {
        let mut found: Vec<String> = vec![];

        discover_visa(&mut found);

        let mapping = Mapping { program: DEVICE_CORE_PROG, version: DEVICE_CORE_VERS, protocol: Protocol::TCP, port: 0 };

        for host in &self.config.vxi11_hosts {
            let probe = TcpPortMapperClient::new(host, self.config.open_timeout())
                .and_then(|mut pmap| pmap.get_port(&mapping));
            match probe {
                Ok(0)  => debug!("{} does not export the VXI-11 core program", host),
                Ok(_)  => found.push(vxi11_resource_string(host)),
                Err(e) => debug!("No VXI-11 port mapper at {}: {}", host, e),
            }
        }

        if self.config.discovery_broadcast {
            match port_mapping::broadcast_get_port(&mapping, BROADCAST_LISTEN.min(self.config.open_timeout())) {
                Ok(hosts) => found.extend(hosts.into_iter().map(|(ip, _)| vxi11_resource_string(&ip.to_string()))),
                Err(e)    => warn!("VXI-11 broadcast discovery failed: {}", e),
            }
        }

        // Keep discovery order, a host can answer both a probe and the broadcast
        let mut seen: HashSet<String> = HashSet::new();
        found.retain(|r| seen.insert(r.clone()));
        debug!("Discovered resources: {:?}", found);
        Ok(found)
    }

    pub fn open(&self, resource: &str) -> Result<Box<dyn Instrument>> {
        info!("Opening instrument {}", resource);
        if let Some((host, device)) = parse_vxi11_resource(resource) {
            return Ok(Box::new(Vxi11Instrument::open(resource, &host, &device, &self.config)?));
        }
        self.open_visa(resource)
    }

    #[cfg(feature = "visa")]
    fn open_visa(&self, resource: &str) -> Result<Box<dyn Instrument>> {
        Ok(Box::new(visa::VisaInstrument::open(resource, &self.config)?))
    }

    #[cfg(not(feature = "visa"))]
    fn open_visa(&self, resource: &str) -> Result<Box<dyn Instrument>> {
        debug!("{} needs VISA", resource);
        Err(ScopeError::FeatureNotEnabled("visa".to_owned()))
    }

    // The configured resource wins, otherwise the first discovered one that
    // passes the filter
    pub fn open_first(&self) -> Result<Box<dyn Instrument>> {
        let resource = match &self.config.resource {
            Some(r) => r.clone(),
            None    => select_resource(&self.discover()?, &self.config.resource_filter)?,
        };
        self.open(&resource)
    }

}

impl InstrumentSource for ResourceManager {
    fn open_instrument(&mut self) -> Result<Box<dyn Instrument>> { self.open_first() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_usb_resource_is_selected() {
        let found = vec![
            "ASRL1::INSTR".to_owned(),
            "USB0::0x1AB1::0x04CE::DS1ZA000000001::INSTR".to_owned(),
            "USB0::0x1AB1::0x04CE::DS1ZA000000002::INSTR".to_owned(),
        ];
        assert_eq!(select_resource(&found, "USB").unwrap(), found[1]);
    }

    #[test]
    fn no_match_lists_what_was_found() {
        let found = vec!["ASRL1::INSTR".to_owned()];
        match select_resource(&found, "USB") {
            Err(ScopeError::ResourceNotFound { filter, found }) => {
                assert_eq!(filter, "USB");
                assert_eq!(found, vec!["ASRL1::INSTR".to_owned()]);
            }
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn vxi11_resources_are_recognised() {
        assert_eq!(
            parse_vxi11_resource("TCPIP0::192.168.1.101::inst0::INSTR"),
            Some(("192.168.1.101".to_owned(), "inst0".to_owned()))
        );
        assert_eq!(
            parse_vxi11_resource("TCPIP::scope.lab::INSTR"),
            Some(("scope.lab".to_owned(), "inst0".to_owned()))
        );
        assert_eq!(parse_vxi11_resource("TCPIP0::192.168.1.101::hislip0::INSTR"), None);
        assert_eq!(parse_vxi11_resource("USB0::0x1AB1::0x04CE::DS1ZA1::INSTR"), None);
    }

    #[test]
    fn resource_string_round_trips_through_the_parser() {
        let r = vxi11_resource_string("10.0.0.7");
        assert_eq!(parse_vxi11_resource(&r), Some(("10.0.0.7".to_owned(), "inst0".to_owned())));
    }

    #[cfg(not(feature = "visa"))]
    #[test]
    fn usb_without_visa_is_a_feature_error() {
        let rm = ResourceManager::new(TransportConfig::default());
        let e = rm.open("USB0::0x1AB1::0x04CE::DS1ZA1::INSTR").err().unwrap();
        assert!(matches!(e, ScopeError::FeatureNotEnabled(_)));
    }
}
