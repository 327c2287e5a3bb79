//! HTTP endpoint for the latest captured price: routes, DTOs, OpenAPI document.

pub mod config;
pub mod dto;
pub mod error;
pub mod openapi;
pub mod routes;
pub mod state;
