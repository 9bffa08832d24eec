mod common;
mod disconnect;
mod monitor;
mod multiply_defined;
mod properties;
mod runtime;
