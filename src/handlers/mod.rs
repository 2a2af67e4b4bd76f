pub(crate) mod import;
pub(crate) mod rankings;
pub(crate) mod rounds;
pub(crate) mod tips;
