//! A GraphQL gateway over a REST resource service.
//!
//! Clients send GraphQL queries and mutations about `User` and `Company` entities. Each root
//! field becomes one call to the resource service, and each selected relation field one more,
//! issued only when the client asks for it:
//!
//! ```graphql
//! {
//!   user(id: "23") {
//!     firstName
//!     company { name }
//!   }
//! }
//! ```
//!
//! resolves through `GET users/23` then `GET companies/{companyId}`.

#![warn(unreachable_pub)]

pub mod json_ext;

mod axum_factory;
pub mod client;
pub mod configuration;
pub mod engine;
pub mod error;
mod executable;
pub mod gateway;
pub mod graphql;
pub mod mutation;
pub mod registry;
mod request;
mod response;
pub mod spec;

pub use axum_factory::make_router;
pub use client::ResourceClient;
pub use configuration::Configuration;
pub use engine::Engine;
pub use engine::Operation;
pub use executable::main;
pub use gateway::Gateway;
pub use registry::Registry;
