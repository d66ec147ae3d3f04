pub mod app;
pub mod channel;
pub mod clips;
pub mod config;
pub mod crossfade;
pub mod decode;
pub mod fade;
pub mod gate;
pub mod logging;
pub mod mapper;
pub mod output;
pub mod show;
pub mod terminal;
pub mod track;
