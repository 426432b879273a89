pub mod data_path;
pub mod endpoint;
pub mod suggest;
pub mod text;
