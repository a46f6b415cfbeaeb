//! Message-type strings understood by this client.
//!
//! The bridge routes on namespaced type names. The correlation layer treats
//! all of them as opaque except the Ping/Pong pair, which drives peer
//! discovery.

/// Routing scope stamped on every outbound envelope.
pub const SCOPE_NETWORK: &str = "Network";

/// Discovery request, broadcast before the peer is known.
pub const PING: &str = "/Script/AvalancheMediaEditor.AvaRundownPing";

/// Discovery reply; its `Sender` becomes the peer address.
pub const PONG: &str = "/Script/AvalancheMedia.AvaRundownPong";

/// Load a rundown asset by path.
pub const LOAD_RUNDOWN: &str = "/Script/AvalancheMediaEditor.AvaRundownLoadRundown";

/// List the loaded rundown's pages.
pub const GET_PAGES: &str = "/Script/AvalancheMediaEditor.AvaRundownGetPages";

/// Run an action (e.g. `Play`) against a page.
pub const PAGE_ACTION: &str = "/Script/AvalancheMediaEditor.AvaRundownPageAction";
