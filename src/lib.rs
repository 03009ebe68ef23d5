//! cdcflow - DynamoDB change-data-capture into Redshift
//!
//! Three stateless functions glue a DynamoDB stream to a Redshift table
//! through an object-storage staging area:
//!
//! ```text
//! [DynamoDB stream] --batch--> [stream writer] --put--> {pending}/...
//!                                                          |
//!            [scheduler] --> [loader] --COPY--> [Redshift] |
//!                                 \--move--> {processed}/...
//! ```
//!
//! The bootstrap function creates the destination schema and table before
//! the loader first runs.

pub mod change;
pub mod config;
pub mod lease;
pub mod mover;
pub mod staging;
pub mod utils;
pub mod warehouse;
