pub mod events;
pub mod groups;
pub mod lifecycle;
pub mod presence;
pub mod router;
pub mod websocket;

pub use events::{ClientEvent, OutboundEvent};
pub use groups::GroupTracker;
pub use lifecycle::RealtimeState;
pub use presence::{ConnectionHandle, ConnectionId, ConnectionRegistry};
pub use router::{Audience, EventRouter, SeenTarget};
pub use websocket::chat_socket;
