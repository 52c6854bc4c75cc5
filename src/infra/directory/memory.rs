//! In-memory driver directory.

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::core::error::DispatchError;
use crate::core::model::{Driver, Reservation};
use crate::core::ports::DriverDirectory;
use crate::core::window::{overlap, TimeWindow};
use crate::util::serde::{Capability, ContactHandle, DriverId, OrgId};

/// Driver pool and reservations held in process memory.
///
/// Drivers are returned in id order so candidate lists are deterministic.
#[derive(Default)]
pub struct InMemoryDirectory {
    drivers: RwLock<BTreeMap<DriverId, Driver>>,
    reservations: RwLock<Vec<Reservation>>,
}

impl InMemoryDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a driver.
    pub fn upsert(&self, driver: Driver) {
        self.drivers.write().insert(driver.id.clone(), driver);
    }

    /// Remove a driver.
    pub fn remove(&self, id: &DriverId) -> Option<Driver> {
        self.drivers.write().remove(id)
    }

    /// Record a formal reservation.
    pub fn reserve(&self, reservation: Reservation) {
        self.reservations.write().push(reservation);
    }

    /// Number of drivers.
    pub fn len(&self) -> usize {
        self.drivers.read().len()
    }

    /// Whether the directory has no drivers.
    pub fn is_empty(&self) -> bool {
        self.drivers.read().is_empty()
    }
}

impl FromIterator<Driver> for InMemoryDirectory {
    fn from_iter<I: IntoIterator<Item = Driver>>(iter: I) -> Self {
        let dir = Self::new();
        for driver in iter {
            dir.upsert(driver);
        }
        dir
    }
}

#[async_trait]
impl DriverDirectory for InMemoryDirectory {
    async fn drivers_with_capability(
        &self,
        capability: &Capability,
        sponsor: Option<&OrgId>,
    ) -> Result<Vec<Driver>, DispatchError> {
        Ok(self
            .drivers
            .read()
            .values()
            .filter(|d| d.capabilities.contains(capability))
            .filter(|d| sponsor.is_none_or(|org| d.organizations.contains(org)))
            .cloned()
            .collect())
    }

    async fn driver(&self, id: &DriverId) -> Result<Option<Driver>, DispatchError> {
        Ok(self.drivers.read().get(id).cloned())
    }

    async fn driver_by_handle(&self, handle: &ContactHandle) -> Result<Option<Driver>, DispatchError> {
        Ok(self
            .drivers
            .read()
            .values()
            .find(|d| d.contact.as_ref() == Some(handle))
            .cloned())
    }

    async fn reservations_between(
        &self,
        driver: &DriverId,
        range: TimeWindow,
    ) -> Result<Vec<Reservation>, DispatchError> {
        Ok(self
            .reservations
            .read()
            .iter()
            .filter(|r| r.driver_id == *driver && overlap(&r.window, &range))
            .cloned()
            .collect())
    }
}
