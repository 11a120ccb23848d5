pub mod classify;
pub mod evaluate;
pub mod label;
pub mod normalize;
pub mod train;
