//! # Dispatch
//!
//! Glues the envelope codec, route resolver and meta builder into one
//! request pipeline. Transport-neutral: the HTTP adapter converts to and from
//! [`InboundRequest`] / [`OutboundResponse`].

mod auth;
mod dispatcher;

pub use auth::{AuthFailure, Authenticator, BearerToken, Principal, StaticTokenAuthenticator};
pub use dispatcher::{
    Dispatcher, InboundRequest, OutboundResponse, RequestMethod, META_CODE_HEADER,
};
