// Start of file: /src/utils/mod.rs

/*
    * Re-exports for all utility modules like error handling,
    * response formats, middleware wrappers, shared utilities, etc.
*/

pub mod error;
pub mod error_handler;
pub mod formatting;
pub mod response_handler;

// End of file: /src/utils/mod.rs
