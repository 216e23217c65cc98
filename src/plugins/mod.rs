pub mod approval;
pub mod change;
pub mod freeze;
pub mod lifecycle;
pub mod quality;
pub mod release;
pub mod schedule;
pub mod version;
