pub mod api_response;
pub mod telemetry_dto;

pub use api_response::ApiResponse;
pub use telemetry_dto::*;
