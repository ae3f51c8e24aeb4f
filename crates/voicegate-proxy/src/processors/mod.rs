//! Built-in message processors.

mod function_call;
mod settings;

pub use function_call::FunctionCallProcessor;
pub use settings::SettingsProcessor;
