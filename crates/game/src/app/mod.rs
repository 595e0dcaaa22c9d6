mod bootstrap;
mod demo;
mod hooks;
mod loop_runner;
mod sprite_keys;

pub(crate) use bootstrap::build_app;
pub(crate) use loop_runner::run;
