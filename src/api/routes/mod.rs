pub mod ping;
pub mod root;
pub mod update;
pub mod value;
