/*
* SQL gateway endpoints: connection verification, table lookup and raw queries.
*/

pub mod handler;
pub mod request;
pub mod routes;

pub use routes::sql_routes;
