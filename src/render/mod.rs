pub(crate) mod handle;
pub(crate) mod renderer;
pub(crate) mod source;
pub(crate) mod surface;
