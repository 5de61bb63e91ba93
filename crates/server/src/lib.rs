//! An OAuth 2.0 authorization server for Open Badges wallets and issuers.
//!
//! This library provides dynamic client registration, the authorization code flow
//! with mandatory PKCE, refresh and legacy password grants, token revocation and
//! introspection.

pub mod api;
pub mod config;
pub mod error;
pub mod oauth2;
