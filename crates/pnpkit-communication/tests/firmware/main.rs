//! Firmware driver tests against the in-memory controller

mod openbuilds;
