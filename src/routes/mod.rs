pub mod import;
pub mod rankings;
pub mod rounds;
pub mod tips;
