pub mod http_client;
pub mod logger;
pub mod parameter_mapper;
pub mod response_transformer;
pub mod tool_executor;
pub mod tool_generator;
