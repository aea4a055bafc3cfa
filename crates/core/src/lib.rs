pub mod capture;
pub mod detection;
pub mod measurement;
pub mod pipeline;
pub mod render;
pub mod shared;

#[cfg(test)]
pub(crate) mod testing;
