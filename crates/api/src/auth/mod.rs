//! Token validation for the collaboration surface. Session issuance lives in
//! the external identity service; this module only verifies what it minted.

pub mod jwt;
