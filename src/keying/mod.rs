pub(crate) mod detect;
pub(crate) mod pick;
pub(crate) mod processor;
pub(crate) mod sampler;
pub(crate) mod settings;
pub(crate) mod store;
