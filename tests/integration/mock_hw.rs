//! Mock port adapters for integration tests.
//!
//! Records every actuator call and lets tests drive contactor/interlock
//! feedback deterministically, without any real CAN transceiver, relay
//! driver, or NVM chip.

use bms_core::app::events::AppEvent;
use bms_core::app::ports::{
    ContactorDriverState, ContactorPort, ContactorStateRequest, EventSink, InterlockPort,
    InterlockStateRequest, NvmPort, SocTriplet,
};

// ── FakeContactor ──────────────────────────────────────────────

#[derive(Default)]
pub struct FakeContactor {
    pub state: ContactorDriverState,
    pub last_request: Option<ContactorStateRequest>,
    pub requests: Vec<ContactorStateRequest>,
}

impl FakeContactor {
    /// Simulate the driver's own state machine confirming whatever was
    /// last requested, as if precharge/discharge completed instantly.
    pub fn confirm_last_request(&mut self) {
        self.state = match self.last_request {
            Some(ContactorStateRequest::Init) => ContactorDriverState::Standby,
            Some(ContactorStateRequest::Standby) => ContactorDriverState::Standby,
            Some(ContactorStateRequest::Normal) => ContactorDriverState::Normal,
            Some(ContactorStateRequest::Charge) => ContactorDriverState::Charge,
            Some(ContactorStateRequest::Error) => ContactorDriverState::Error,
            Some(ContactorStateRequest::NoRequest) | None => self.state,
        };
    }
}

impl ContactorPort for FakeContactor {
    fn set_state_request(&mut self, request: ContactorStateRequest) {
        self.last_request = Some(request);
        self.requests.push(request);
    }

    fn get_state(&self) -> ContactorDriverState {
        self.state
    }
}

// ── FakeInterlock ──────────────────────────────────────────────

#[derive(Default)]
pub struct FakeInterlock {
    pub closed: bool,
    pub last_command: Option<InterlockStateRequest>,
}

impl InterlockPort for FakeInterlock {
    fn set_state_request(&mut self, request: InterlockStateRequest) {
        self.last_command = Some(request);
        self.closed = matches!(request, InterlockStateRequest::Close);
    }

    fn get_interlock_feedback(&self) -> bool {
        self.closed
    }
}

// ── FakeNvm ──────────────────────────────────────────────────────

pub struct FakeNvm {
    pub soc: SocTriplet,
}

impl Default for FakeNvm {
    fn default() -> Self {
        Self {
            soc: SocTriplet { mean_pct: 50.0, min_pct: 50.0, max_pct: 50.0 },
        }
    }
}

impl NvmPort for FakeNvm {
    fn get_soc(&self) -> SocTriplet {
        self.soc
    }

    fn set_soc(&mut self, soc: SocTriplet) {
        self.soc = soc;
    }
}

// ── RecordingSink ────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(*event);
    }
}

impl RecordingSink {
    pub fn faults_latched(&self) -> impl Iterator<Item = &AppEvent> {
        self.events.iter().filter(|e| matches!(e, AppEvent::FaultLatched(_)))
    }
}
