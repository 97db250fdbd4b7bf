#![deny(rust_2018_idioms)]

pub mod portal;
pub mod render;
pub mod session;
