pub mod model;
pub mod reconcile;
pub mod state;
