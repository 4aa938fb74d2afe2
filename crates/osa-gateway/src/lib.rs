mod auth;
mod connection;
mod hmac_auth;
mod lane;
mod middleware;
mod protocol;
mod routes;
mod routes_v1;
mod server;
mod state;
mod static_files;

pub use server::GatewayServer;
