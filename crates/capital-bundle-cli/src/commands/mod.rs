pub mod optimize;
pub mod risk;
pub mod thesis;
