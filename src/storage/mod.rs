pub mod gateway;
pub mod migrations;
pub mod sqlite;
