pub mod credits;
pub mod historical;
pub mod identity;
