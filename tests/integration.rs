//! Integration test driver.
//!
//! Each submodule exercises [`BmsService`](bms_core::app::service::BmsService)
//! end to end against the mock port adapters in [`mock_hw`]. All tests
//! run on the host with no real CAN transceiver, contactor driver, or
//! NVM chip.

mod balancing_tests;
mod cold_boot_tests;
mod fault_tests;
mod mock_hw;
mod scheduler_tests;
