pub mod importer;
pub mod rankings;
pub mod reconcile;
pub mod rounds;
pub mod squiggle;
pub mod tip_engine;
