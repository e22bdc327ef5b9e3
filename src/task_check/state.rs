//! # Scheduler State
//!
//! In-memory admission bookkeeping owned by one scheduler: the set of check
//! runs currently dispatched and the outstanding connection count per
//! database instance. Nothing here is durable; a restarted process starts
//! empty and may dispatch a queued check again.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Why a check run was not admitted this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionDenied {
    /// Already dispatched and not finished
    InFlight,
    /// The instance is at its connection cap
    InstanceBusy,
}

#[derive(Debug)]
pub struct SchedulerState {
    max_connections_per_instance: u32,
    in_flight: DashMap<i64, i64>,
    instance_connections: Mutex<HashMap<i64, u32>>,
}

impl SchedulerState {
    pub fn new(max_connections_per_instance: u32) -> Self {
        Self {
            max_connections_per_instance,
            in_flight: DashMap::new(),
            instance_connections: Mutex::new(HashMap::new()),
        }
    }

    pub fn max_connections_per_instance(&self) -> u32 {
        self.max_connections_per_instance
    }

    pub fn is_in_flight(&self, check_run_id: i64) -> bool {
        self.in_flight.contains_key(&check_run_id)
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    pub fn outstanding_connections(&self, instance_id: i64) -> u32 {
        self.instance_connections
            .lock()
            .get(&instance_id)
            .copied()
            .unwrap_or(0)
    }

    /// Reserve a connection slot on the instance and mark the run in flight
    ///
    /// The returned permit releases both when dropped.
    pub fn try_admit(
        self: &Arc<Self>,
        check_run_id: i64,
        instance_id: i64,
    ) -> Result<CheckRunPermit, AdmissionDenied> {
        if self.is_in_flight(check_run_id) {
            return Err(AdmissionDenied::InFlight);
        }

        {
            let mut connections = self.instance_connections.lock();
            let outstanding = connections.entry(instance_id).or_insert(0);
            if *outstanding >= self.max_connections_per_instance {
                return Err(AdmissionDenied::InstanceBusy);
            }
            *outstanding += 1;
        }

        if self.in_flight.insert(check_run_id, instance_id).is_some() {
            // Lost a race with another admission for the same run
            self.release_connection(instance_id);
            return Err(AdmissionDenied::InFlight);
        }

        Ok(CheckRunPermit {
            state: Arc::clone(self),
            check_run_id,
            instance_id,
        })
    }

    fn release_connection(&self, instance_id: i64) {
        let mut connections = self.instance_connections.lock();
        if let Some(outstanding) = connections.get_mut(&instance_id) {
            *outstanding = outstanding.saturating_sub(1);
            if *outstanding == 0 {
                connections.remove(&instance_id);
            }
        }
    }
}

/// Admission held by a dispatched check run
#[derive(Debug)]
pub struct CheckRunPermit {
    state: Arc<SchedulerState>,
    check_run_id: i64,
    instance_id: i64,
}

impl CheckRunPermit {
    pub fn check_run_id(&self) -> i64 {
        self.check_run_id
    }

    pub fn instance_id(&self) -> i64 {
        self.instance_id
    }
}

impl Drop for CheckRunPermit {
    fn drop(&mut self) {
        self.state.in_flight.remove(&self.check_run_id);
        self.state.release_connection(self.instance_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_cap() {
        let state = Arc::new(SchedulerState::new(2));
        let a = state.try_admit(1, 10).unwrap();
        let _b = state.try_admit(2, 10).unwrap();
        assert_eq!(state.try_admit(3, 10).unwrap_err(), AdmissionDenied::InstanceBusy);
        // Other instances are unaffected
        let _c = state.try_admit(4, 11).unwrap();

        drop(a);
        assert_eq!(state.outstanding_connections(10), 1);
        assert!(state.try_admit(3, 10).is_ok());
    }

    #[test]
    fn test_in_flight_run_not_admitted_twice() {
        let state = Arc::new(SchedulerState::new(5));
        let permit = state.try_admit(1, 10).unwrap();
        assert_eq!(state.try_admit(1, 10).unwrap_err(), AdmissionDenied::InFlight);
        assert_eq!(state.outstanding_connections(10), 1);

        drop(permit);
        assert!(!state.is_in_flight(1));
        assert_eq!(state.outstanding_connections(10), 0);
        assert_eq!(state.in_flight_count(), 0);
    }
}
