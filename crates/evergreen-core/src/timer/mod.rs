mod controller;
mod machine;
mod ticker;

pub use controller::FocusController;
pub use machine::{FocusTimerMachine, TimerPhase};
pub use ticker::TickSource;
