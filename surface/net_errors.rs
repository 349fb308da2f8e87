/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Engine network error codes the lifecycle controller cares about.
//!
//! The embedded engine reports load failures with Chromium-style negative
//! net error codes. Only two families matter here: the "request was blocked
//! before it ran" family (identity providers refusing embedded contexts)
//! and the connection/TLS family (a failed automatic https upgrade).

pub const ERR_ACCESS_DENIED: i32 = -10;
pub const ERR_BLOCKED_BY_CLIENT: i32 = -20;
pub const ERR_BLOCKED_BY_RESPONSE: i32 = -27;

pub const ERR_CONNECTION_CLOSED: i32 = -100;
pub const ERR_CONNECTION_RESET: i32 = -101;
pub const ERR_CONNECTION_REFUSED: i32 = -102;
pub const ERR_CONNECTION_FAILED: i32 = -104;
pub const ERR_SSL_PROTOCOL_ERROR: i32 = -107;
pub const ERR_CERT_COMMON_NAME_INVALID: i32 = -200;
pub const ERR_CERT_DATE_INVALID: i32 = -201;
pub const ERR_CERT_AUTHORITY_INVALID: i32 = -202;

/// Codes that mean "the engine refused to run this request at all". On a
/// known identity-provider host these trigger the external browser handoff.
pub fn is_auth_blocked_error(code: i32) -> bool {
    matches!(
        code,
        ERR_ACCESS_DENIED | ERR_BLOCKED_BY_CLIENT | ERR_BLOCKED_BY_RESPONSE
    )
}

/// Codes that mean the secure connection itself failed, i.e. an automatic
/// http-to-https upgrade did not hold. These raise the security
/// interstitial.
pub fn is_connection_security_error(code: i32) -> bool {
    matches!(
        code,
        ERR_CONNECTION_CLOSED
            | ERR_CONNECTION_RESET
            | ERR_CONNECTION_REFUSED
            | ERR_CONNECTION_FAILED
            | ERR_SSL_PROTOCOL_ERROR
            | ERR_CERT_COMMON_NAME_INVALID
            | ERR_CERT_DATE_INVALID
            | ERR_CERT_AUTHORITY_INVALID
    )
}

/// Symbolic name for a known code, for logs and interstitial payloads.
pub fn error_name(code: i32) -> &'static str {
    match code {
        ERR_ACCESS_DENIED => "ERR_ACCESS_DENIED",
        ERR_BLOCKED_BY_CLIENT => "ERR_BLOCKED_BY_CLIENT",
        ERR_BLOCKED_BY_RESPONSE => "ERR_BLOCKED_BY_RESPONSE",
        ERR_CONNECTION_CLOSED => "ERR_CONNECTION_CLOSED",
        ERR_CONNECTION_RESET => "ERR_CONNECTION_RESET",
        ERR_CONNECTION_REFUSED => "ERR_CONNECTION_REFUSED",
        ERR_CONNECTION_FAILED => "ERR_CONNECTION_FAILED",
        ERR_SSL_PROTOCOL_ERROR => "ERR_SSL_PROTOCOL_ERROR",
        ERR_CERT_COMMON_NAME_INVALID => "ERR_CERT_COMMON_NAME_INVALID",
        ERR_CERT_DATE_INVALID => "ERR_CERT_DATE_INVALID",
        ERR_CERT_AUTHORITY_INVALID => "ERR_CERT_AUTHORITY_INVALID",
        _ => "ERR_UNKNOWN",
    }
}
