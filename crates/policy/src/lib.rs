pub mod confirmation;
pub mod gate;

pub use confirmation::{
    ConfirmationLevel, ConfirmationPolicy, ConfirmationRequirement, ConfirmationRule,
    OperationRef, PolicyError,
};
pub use gate::InvocationState;
