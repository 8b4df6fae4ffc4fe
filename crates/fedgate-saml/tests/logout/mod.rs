//! Association store, coordinator and fan-out tests

pub mod association_tests;
pub mod back_channel_tests;
pub mod fan_out_tests;
