// UI module - host loop and controller
//
// This module contains:
// - EventQueue: the single-threaded host loop that cooperative tasks yield to
// - Controller: wires user actions to the selection model and the services

pub mod bridge;
pub mod controller;

pub use bridge::EventQueue;
pub use controller::Controller;
