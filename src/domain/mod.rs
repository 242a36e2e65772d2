pub mod clock;
pub mod monthly;
pub mod period;
pub mod punch;
pub mod quota;
pub mod workflow;
