pub mod interface;
pub mod error;
pub mod languages;
pub mod resolver;
pub mod service;
pub mod ct2;
pub mod factory;

#[cfg(test)]
pub mod testing;

pub use interface::{TranslateInterface, TranslateRequest, TranslateResponse};
pub use error::TranslateError;
pub use factory::TranslatorFactory;
pub use service::TranslatorService;
