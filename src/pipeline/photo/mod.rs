pub(crate) mod funnel;
pub mod score;

pub use funnel::PhotoSelection;
