mod decide;
mod delta;
mod intent;

pub use decide::{Decision, DecisionContext, TransitionEngine};
pub use delta::Delta;
pub use intent::{Direction, DropTarget, Intent, intent_for_drop};
