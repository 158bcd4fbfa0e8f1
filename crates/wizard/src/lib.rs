//! `dcut-wizard` -- job lifecycle for the dataset converter client.
//!
//! Ties the form, the conversion service transport and a presenter
//! together: [`controller::JobController`] runs submit, poll, cancel,
//! download and reset for one job at a time, and [`session`] drives it
//! from the command line.

pub mod cli;
pub mod config;
pub mod controller;
pub mod events;
pub mod presenter;
pub mod schedule;
pub mod session;
