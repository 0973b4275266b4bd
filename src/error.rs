use derive_more::{Display, Error};

#[derive(Debug, Display, Error)]
pub enum ConfigError {
    #[display("failed to read config file")]
    ReadFile,
    #[display("failed to parse config: {reason}")]
    Parse { reason: String },
    #[display("invalid config: {field}")]
    Validation { field: String },
}

#[derive(Debug, Display, Error)]
pub enum FeedError {
    #[display("request to {provider} failed")]
    Request { provider: String },
    #[display("failed to parse response from {provider}")]
    ResponseParse { provider: String },
}

#[derive(Debug, Display, Error)]
pub enum ExtractError {
    #[display("data not found")]
    NoData,
    #[display("indicator array for {symbol} too short: need {required}, got {available}")]
    DataContract {
        symbol: String,
        required: usize,
        available: usize,
    },
}

#[derive(Debug, Display, Error)]
pub enum DeliveryError {
    #[display("no {target} available for {action} action")]
    MissingTarget { action: String, target: String },
    #[display("{action} request rejected by transport")]
    Transport { action: String },
    #[display("{failed} of {attempted} send actions failed")]
    Partial { failed: usize, attempted: usize },
}

#[derive(Debug, Display, Error)]
pub enum StorageError {
    #[display("database migration failed")]
    Migration,
    #[display("failed to query data")]
    Query,
}

#[derive(Debug, Display, Error)]
pub enum ServiceError {
    #[display("feed fetch failed")]
    Feed,
    #[display("signal extraction failed")]
    Extract,
    #[display("message delivery failed")]
    Delivery,
}

#[derive(Debug, Display, Error)]
pub enum JobError {
    #[display("keep-alive ping to {url} failed")]
    KeepAlive { url: String },
}

#[derive(Debug, Display, Error)]
pub enum ServerError {
    #[display("failed to bind {addr}")]
    Bind { addr: String },
    #[display("webhook server stopped unexpectedly")]
    Serve,
}
