pub mod model_gateway;
pub mod upstream;

pub use model_gateway::{GatewayStatsSnapshot, ModelGateway, RetryPolicy};
pub use upstream::{ChatUpstream, OpenAiCompatUpstream, TransportError, UpstreamReply};
