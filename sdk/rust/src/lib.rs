//! Rust client for the urls-panel admin API.

pub mod client;

pub use client::{
    ApiError, ExecuteRequest, ExecuteResponse, InventoryStats, PanelClient, RouteSummary, SdkError,
};
