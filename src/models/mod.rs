pub mod languages;
pub mod profiles;

pub use languages::{default_languages, Language, LanguageSet};
pub use profiles::{ModelProfile, ModelRegistry, SizeClass};
