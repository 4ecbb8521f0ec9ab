pub mod logl;
pub mod posterior;
pub mod prior;
pub mod weights;
