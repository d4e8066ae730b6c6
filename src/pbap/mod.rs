//! Phone Book Access Profile
//!
//! Client role (PCE) of PBAP on top of an OBEX engine:
//!
//! - [`client`]: application entry points and response handling
//! - [`session`]: per-connection state machine
//! - [`registry`]: fixed pool of sessions addressed by [`SessionId`]
//! - [`auth`]: OBEX MD5 challenge/response
//! - [`app_param`]: application parameter encoding and response getters

pub mod app_param;
pub mod auth;
pub mod client;
pub mod registry;
pub mod session;

pub use client::{PbapClient, PceHandler};
pub use registry::{SessionId, SessionRegistry};
pub use session::{
    Credential, PullKind, PullPhase, Session, SessionConfig, SessionState, SetPathTarget,
};
