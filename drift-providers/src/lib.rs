pub mod google_maps;
pub mod openai_compatible;
pub mod parse;
pub mod request;
pub mod runtime;
