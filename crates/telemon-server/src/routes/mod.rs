//! API routes.

pub mod flow;
pub mod health;

pub use flow::{
    FlowQuery, FlowResponse, LogoutResponse, StatsResponse, flow_handler, logout_handler,
    qry_important_data_handler, stats_handler, user_flux_package_handler,
};
pub use health::health_routes;
