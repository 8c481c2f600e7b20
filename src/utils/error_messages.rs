//! Represents all possible public error messages of the application

pub const UNAUTHORIZED: &str = "Unauthorized";

pub const INTERNAL_ERROR: &str = "Internal server error";

pub const SESSION_ERROR: &str = "Session failure";
