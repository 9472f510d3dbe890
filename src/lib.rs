//! # Gremlin Driver
//!
//! An async Rust client for [Apache TinkerPop](https://tinkerpop.apache.org/) Gremlin Server,
//! speaking the WebSocket sub-protocol with GraphSON 3.0 payloads.
//!
//! ## Features
//!
//! - **WebSocket transport** - RFC 6455 framing with client masking, ping/pong and fragments
//! - **GraphSON 3.0** - Type-tagged encoding and decoding including vertices, edges, paths and trees
//! - **Streaming** - Partial (206) responses are reassembled into a single result list
//! - **Sessions and Transactions** - Server-side sessions with commit/rollback scripts
//! - **Retry** - Linear retry of transient script evaluation errors (597)
//! - **SASL** - Answers authentication challenges (407) with PLAIN credentials
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! gremlin-driver = "0.1"
//! tokio = { version = "1", features = ["full"] }
//! ```
//!
//! ## Basic Usage
//!
//! ```rust,no_run
//! use gremlin_driver::{Connection, ConnectionConfig, Value};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConnectionConfig::from_uri("ws://localhost:8182/gremlin")?;
//!     let mut conn: Connection = Connection::new(config);
//!     conn.open().await?;
//!
//!     conn.message_mut().bind_value("age", 29);
//!     let rows = conn
//!         .send(Some("g.V().has('age', age).values('name')"), "", "eval", Default::default())
//!         .await?;
//!     for row in rows {
//!         if let Value::String(name) = row {
//!             println!("{}", name);
//!         }
//!     }
//!
//!     conn.close().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Transaction Functions
//!
//! The work is retried on 597 and rolled back when it fails:
//!
//! ```rust,no_run
//! # use gremlin_driver::{Connection, ConnectionConfig};
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! # let mut conn: Connection = Connection::new(ConnectionConfig::default());
//! let created = conn
//!     .transaction(|conn| Box::pin(async move { conn.query("g.addV('person')").await }))
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! ```rust,no_run
//! # use gremlin_driver::{Connection, ConnectionConfig, DriverError};
//! # async fn example(conn: &mut Connection) {
//! match conn.query("g.V().foo()").await {
//!     Ok(rows) => println!("{} rows", rows.len()),
//!     Err(DriverError::Server(e)) => eprintln!("server said {} ({})", e.message, e.code),
//!     Err(e) => eprintln!("local failure: {}", e),
//! }
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`driver`] - Connection, configuration, request template and values
//! - [`serializer`] - GraphSON 3.0 and plain JSON serializers
//! - [`protocol`] - WebSocket framing, handshake and envelope
//!

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod driver;
pub mod protocol;
pub mod serializer;

// Re-exports for convenience
pub use driver::{
    Args, Connection, ConnectionConfig, ConnectionConfigBuilder,
    DriverError, DriverResult, Map, MapKey, Message,
    ServerError, StatusCode, Value, Workload,
};

pub use protocol::ProtocolError;

pub use serializer::{GraphSon3, JsonSerializer, Serializer, SerializerError};
