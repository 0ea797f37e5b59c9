//! Network capability
//!
//! Peer discovery and the protocol stream. The transport feeds inbound protocol
//! messages to [`SwapStateNet::handle_protocol_message`] and writes back any response.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::protocol::handle::SwapStateNet;
use crate::protocol::message::{Message, SendKeysMessage};
use crate::types::{Hash, Offer, ProvidesCoin};

/// Opaque peer address as understood by the transport
pub type PeerId = String;

/// Offers a peer advertises
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub offers: Vec<Offer>,
}

#[async_trait]
pub trait Net: Send + Sync {
    /// Advertises this node's offers
    fn advertise(&self);

    /// Finds peers providing `provides`, searching for up to `search_time`
    async fn discover(
        &self,
        provides: ProvidesCoin,
        search_time: Duration,
    ) -> anyhow::Result<Vec<PeerId>>;

    async fn query(&self, peer: &PeerId) -> anyhow::Result<QueryResponse>;

    /// Opens a protocol stream to `peer`, sends `msg`, and routes replies to `swap`
    async fn initiate(
        &self,
        peer: &PeerId,
        msg: SendKeysMessage,
        swap: Arc<dyn SwapStateNet>,
    ) -> anyhow::Result<()>;

    /// Sends a message on the open protocol stream of swap `id`
    async fn send_message(&self, id: Hash, msg: Message) -> anyhow::Result<()>;

    async fn close_protocol_stream(&self, id: Hash);
}
