//! spacetraveling: a server-rendered blog over the Prismic content API.

pub mod comments;
pub mod compat;
pub mod config;
pub mod content;
pub mod model;
pub mod page;
pub mod render;
pub mod richtext;
pub mod routes;
pub mod server;
