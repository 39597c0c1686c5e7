//! Fixed application paths.

pub const HOME: &str = "/";
pub const ACCOUNTS: &str = "/accounts";
pub const OPERATIONS: &str = "/operations";
pub const CATEGORIES: &str = "/categories";
pub const REPORTS: &str = "/reports";
pub const SETTINGS: &str = "/settings";

pub const LOGIN: &str = "/login";
pub const REGISTER: &str = "/register";

/// Pages that require a signed-in user.
pub const PROTECTED: [&str; 6] = [HOME, ACCOUNTS, OPERATIONS, CATEGORIES, REPORTS, SETTINGS];
