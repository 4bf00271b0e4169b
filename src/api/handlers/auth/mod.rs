//! Auth handlers and supporting modules.
//!
//! Every credential operation is forwarded to the hosted provider. The handlers
//! here only validate input, translate provider answers into HTTP responses and
//! hand new sessions to [`session::establish_session`], which sets the cookies,
//! ensures the profile row and publishes the auth event.
//!
//! ## Events
//!
//! | Endpoint | Event |
//! |---|---|
//! | login, verify-otp, auto-confirmed signup | `SIGNED_IN` |
//! | confirm (`signup`, `email`) | `USER_UPDATED` |
//! | confirm (`magiclink`, `recovery`) | `SIGNED_IN` |
//! | reset-password | `USER_UPDATED` |
//! | refresh | `TOKEN_REFRESHED` |
//! | logout | `SIGNED_OUT` |
//!
//! Connected tabs receive these through [`events::auth_events`].

pub mod confirm;
pub mod cookies;
pub mod events;
pub mod login;
pub mod otp;
pub mod password;
pub mod refresh;
pub mod session;
pub mod signup;
mod state;
pub mod types;
pub mod user;

pub use state::{AuthConfig, AuthState};
