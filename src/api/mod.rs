pub mod graphql;
pub mod retry;
pub mod transport;

pub use graphql::GraphQlClient;
pub use transport::Transport;
