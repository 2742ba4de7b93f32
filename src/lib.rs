//! Stream Deck plugin that drives Spotify playback from keys and dials.
//!
//! The crate is organized leaf-first:
//!
//! * [`tokens`] and [`auth`] own the OAuth PKCE token lifecycle
//! * [`api`] is a thin client for the Spotify Web API
//! * [`host`] is the boundary to the control-surface software
//! * [`actions`] translate gestures on keys and dials into API calls
//! * [`plugin`] dispatches host events to one worker per placed control
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

#[macro_use]
extern crate log;

pub mod actions;
pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod host;
pub mod http;
pub mod plugin;
pub mod protocol;
pub mod settings;
pub mod signal;
pub mod tokens;

#[cfg(test)]
pub(crate) mod testing;
