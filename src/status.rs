//! Reply codes the session interprets (RFC 959 §4.2)

pub const SERVICE_READY_IN: u16 = 120;

pub const COMMAND_OK: u16 = 200;
pub const NOT_IMPLEMENTED_SUPERFLUOUS: u16 = 202;
pub const SERVICE_READY: u16 = 220;
pub const CLOSING_CONTROL_CONN: u16 = 221;
pub const ENTERING_PASSIVE_MODE: u16 = 227;
pub const USER_LOGGED_IN: u16 = 230;
pub const PATH_CREATED: u16 = 257;

pub const USERNAME_OK: u16 = 331;
pub const NEED_ACCOUNT: u16 = 332;
