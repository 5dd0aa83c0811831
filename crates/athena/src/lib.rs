pub mod client;
pub mod config;
pub mod credentials;
pub mod engine;
pub mod error;
pub mod executor;
pub mod materialize;
pub mod result;

pub use client::AthenaClient;
pub use config::AthenaConfig;
pub use credentials::{CredentialBroker, StsCredentialBroker, SESSION_NAME};
pub use engine::{JobState, JobStatus, QueryEngine, QueryJob, ResultPage};
pub use error::AthenaError;
pub use executor::{PollPolicy, QueryExecutor};
pub use materialize::TableMaterializer;
pub use result::ResultSet;
