pub mod degrade;
pub(crate) mod text;
