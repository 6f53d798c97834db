//! Handoffs to collaborators outside the engine.

pub mod export {
    pub use crate::export::*;
}

pub mod candidates {
    pub use crate::candidates::*;
}
