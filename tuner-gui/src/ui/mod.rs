//! # UI Module
//!
//! View code for the vocal tuner window.

pub mod cent_meter;
pub mod main_display;
pub mod note_keyboard;
