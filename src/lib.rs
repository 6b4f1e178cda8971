pub mod calibration;
pub mod config;
pub mod exercise;
pub mod logging;
pub mod pose;
pub mod session;
pub mod tracker;

#[cfg(test)]
pub mod testutil;
