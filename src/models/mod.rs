pub mod game;
pub mod rows;
pub mod squiggle;
pub mod tips;
