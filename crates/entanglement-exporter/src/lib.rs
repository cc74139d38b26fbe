pub mod collector;
pub mod cycle;
pub mod handlers;
pub mod metrics;
pub mod routes;
pub mod server;
pub mod state;

pub use collector::{PostgresSource, RelationSource, SchemaQueries};
pub use cycle::*;
pub use metrics::EntanglementMetrics;
pub use routes::create_router;
pub use server::Server;
pub use state::AppState;
