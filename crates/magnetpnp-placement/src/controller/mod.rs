//! Operation state machine driven by the command stream hooks

mod pick_place;
mod state;

pub use pick_place::PickPlaceController;
pub use state::OperationState;
