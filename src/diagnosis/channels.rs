//! Diagnosis channel table: debounces raw anomaly reports into latched
//! `SystemState` error flags.
//!
//! Generalizes the teacher's single bitmask fault accumulator
//! (evaluate-every-tick, OR everything together) into a table of named
//! channels, each with its own sensitivity (consecutive NOK reports
//! before latching) and a callback into one field of
//! [`crate::telemetry::blocks::ErrorFlags`], per §4.2. Channel set is
//! grounded on the platform's `diag_ch_cfg[]` table.

use log::{error, info};

use crate::telemetry::blocks::ErrorFlags;

/// Outcome reported to a channel by its caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Ok,
    Nok,
    Reset,
}

/// The closed set of diagnosis channels, grounded on `diag_ch_cfg[]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Channel {
    OverVoltage = 0,
    UnderVoltage = 1,
    OverTemperatureCharge = 2,
    OverTemperatureDischarge = 3,
    UnderTemperatureCharge = 4,
    UnderTemperatureDischarge = 5,
    OverCurrentCharge = 6,
    OverCurrentDischarge = 7,
    ContactorMainPlusFeedback = 8,
    ContactorMainMinusFeedback = 9,
    ContactorPrechargeFeedback = 10,
    ContactorChargeMainPlusFeedback = 11,
    ContactorChargeMainMinusFeedback = 12,
    ContactorChargePrechargeFeedback = 13,
    InterlockFeedback = 14,
    CurrentSensorResponding = 15,
    Pec = 16,
}

impl Channel {
    pub const COUNT: usize = 17;

    fn index(self) -> usize {
        self as usize
    }

    fn name(self) -> &'static str {
        match self {
            Self::OverVoltage => "over_voltage",
            Self::UnderVoltage => "under_voltage",
            Self::OverTemperatureCharge => "over_temperature_charge",
            Self::OverTemperatureDischarge => "over_temperature_discharge",
            Self::UnderTemperatureCharge => "under_temperature_charge",
            Self::UnderTemperatureDischarge => "under_temperature_discharge",
            Self::OverCurrentCharge => "over_current_charge",
            Self::OverCurrentDischarge => "over_current_discharge",
            Self::ContactorMainPlusFeedback => "contactor_main_plus_feedback",
            Self::ContactorMainMinusFeedback => "contactor_main_minus_feedback",
            Self::ContactorPrechargeFeedback => "contactor_precharge_feedback",
            Self::ContactorChargeMainPlusFeedback => "contactor_charge_main_plus_feedback",
            Self::ContactorChargeMainMinusFeedback => "contactor_charge_main_minus_feedback",
            Self::ContactorChargePrechargeFeedback => "contactor_charge_precharge_feedback",
            Self::InterlockFeedback => "interlock_feedback",
            Self::CurrentSensorResponding => "current_sensor_responding",
            Self::Pec => "pec",
        }
    }

    /// Apply this channel's latching event to the error record.
    fn apply(self, flags: &mut ErrorFlags, latched: bool) {
        let target = match self {
            Self::OverVoltage => &mut flags.over_voltage,
            Self::UnderVoltage => &mut flags.under_voltage,
            Self::OverTemperatureCharge => &mut flags.over_temperature_charge,
            Self::OverTemperatureDischarge => &mut flags.over_temperature_discharge,
            Self::UnderTemperatureCharge => &mut flags.under_temperature_charge,
            Self::UnderTemperatureDischarge => &mut flags.under_temperature_discharge,
            Self::OverCurrentCharge => &mut flags.over_current_charge,
            Self::OverCurrentDischarge => &mut flags.over_current_discharge,
            Self::ContactorMainPlusFeedback => &mut flags.contactor_main_plus_feedback,
            Self::ContactorMainMinusFeedback => &mut flags.contactor_main_minus_feedback,
            Self::ContactorPrechargeFeedback => &mut flags.contactor_precharge_feedback,
            Self::ContactorChargeMainPlusFeedback => &mut flags.contactor_charge_main_plus_feedback,
            Self::ContactorChargeMainMinusFeedback => {
                &mut flags.contactor_charge_main_minus_feedback
            }
            Self::ContactorChargePrechargeFeedback => {
                &mut flags.contactor_charge_precharge_feedback
            }
            Self::InterlockFeedback => &mut flags.interlock_feedback,
            Self::CurrentSensorResponding => &mut flags.current_sensor_not_responding,
            Self::Pec => &mut flags.pec_failure,
        };
        *target = latched;
    }
}

/// Per-channel debounce state: a NOK counter and whether the channel
/// has latched.
#[derive(Debug, Clone, Copy, Default)]
struct ChannelState {
    counter: u8,
    latched: bool,
}

/// The fixed diagnosis channel table.
pub struct DiagnosisPlane {
    states: [ChannelState; Channel::COUNT],
    sensitivity: [u8; Channel::COUNT],
}

impl DiagnosisPlane {
    /// Build the table with per-category sensitivities from config.
    pub fn new(
        sensitivity_voltage: u8,
        sensitivity_temperature: u8,
        sensitivity_current: u8,
        sensitivity_feedback: u8,
    ) -> Self {
        let mut sensitivity = [sensitivity_feedback; Channel::COUNT];
        sensitivity[Channel::OverVoltage.index()] = sensitivity_voltage;
        sensitivity[Channel::UnderVoltage.index()] = sensitivity_voltage;
        sensitivity[Channel::OverTemperatureCharge.index()] = sensitivity_temperature;
        sensitivity[Channel::OverTemperatureDischarge.index()] = sensitivity_temperature;
        sensitivity[Channel::UnderTemperatureCharge.index()] = sensitivity_temperature;
        sensitivity[Channel::UnderTemperatureDischarge.index()] = sensitivity_temperature;
        sensitivity[Channel::OverCurrentCharge.index()] = sensitivity_current;
        sensitivity[Channel::OverCurrentDischarge.index()] = sensitivity_current;

        Self { states: [ChannelState::default(); Channel::COUNT], sensitivity }
    }

    /// Report an outcome on `channel`, updating its debounce counter and,
    /// on a latch/unlatch transition, the corresponding field of `flags`.
    pub fn notify(&mut self, channel: Channel, outcome: Outcome, flags: &mut ErrorFlags) {
        let idx = channel.index();
        let state = &mut self.states[idx];

        match outcome {
            Outcome::Nok => {
                if state.latched {
                    // already latched; explicit RESET required per §4.2
                    return;
                }
                state.counter = state.counter.saturating_add(1);
                if state.counter >= self.sensitivity[idx] {
                    state.latched = true;
                    error!("diagnosis channel {} latched after {} NOK reports", channel.name(), state.counter);
                    channel.apply(flags, true);
                }
            }
            Outcome::Ok => {
                if !state.latched {
                    state.counter = 0;
                }
                // if latched, OK alone does nothing — explicit RESET required.
            }
            Outcome::Reset => {
                state.counter = 0;
                if state.latched {
                    state.latched = false;
                    info!("diagnosis channel {} reset", channel.name());
                }
                channel.apply(flags, false);
            }
        }
    }

    /// Whether `channel` is currently latched.
    pub fn is_latched(&self, channel: Channel) -> bool {
        self.states[channel.index()].latched
    }
}
