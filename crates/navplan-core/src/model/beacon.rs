//! Positioning beacons.

use super::{BeaconId, BeaconTypeId, FloorId};
use kurbo::Point;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// iBeacon identification triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IBeacon {
    pub uuid: Uuid,
    pub major: u16,
    pub minor: u16,
}

/// A fixed positioning transmitter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Beacon {
    pub(crate) id: Option<BeaconId>,
    pub floor_id: FloorId,
    pub beacon_type_id: Option<BeaconTypeId>,
    pub name: String,
    pub(crate) ibeacon: Option<IBeacon>,
    pub location: Option<Point>,
    pub active: bool,
    pub visible: bool,
    pub(crate) battery_level: u8,
    #[serde(default)]
    pub(crate) created_at: Option<i64>,
    #[serde(default)]
    pub(crate) updated_at: Option<i64>,
}

impl Beacon {
    pub fn id(&self) -> Option<BeaconId> {
        self.id
    }

    pub fn ibeacon(&self) -> Option<&IBeacon> {
        self.ibeacon.as_ref()
    }

    /// Battery charge in percent, `0..=100`.
    pub fn battery_level(&self) -> u8 {
        self.battery_level
    }

    pub fn created_at(&self) -> Option<i64> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<i64> {
        self.updated_at
    }

    pub fn is_drawable(&self) -> bool {
        self.visible && self.location.is_some()
    }
}
