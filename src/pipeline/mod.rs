pub(crate) mod batch;
pub(crate) mod flight;
pub(crate) mod rx;
pub(crate) mod tracker;
pub(crate) mod tx;
