//! # Shared Constants
//!
//! Constants used across the client, the mock backend and the game module.

/// Version of the RPG client stack
pub const RPG_CLIENT_VERSION: &str = "0.1.0";

/// Connection defaults
pub mod network {
    use std::time::Duration;

    /// Default SpacetimeDB server address
    pub const DEFAULT_SERVER: &str = "http://127.0.0.1:3000";

    /// Default module (database) name
    pub const DEFAULT_MODULE: &str = "rpg-game";

    /// WebSocket subprotocol for the JSON text encoding
    pub const JSON_SUBPROTOCOL: &str = "v1.json.spacetimedb";

    /// How long the client waits for a connection before giving up
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Pause before the single reconnect attempt after a timeout
    pub const RECONNECT_DELAY: Duration = Duration::from_secs(2);

    /// Interval between position publishes
    pub const POSITION_SYNC_INTERVAL: Duration = Duration::from_secs(5);

    /// Capacity of the client event bus
    pub const EVENT_CHANNEL_CAPACITY: usize = 256;
}

/// Mock backend constants
pub mod mock {
    use std::time::Duration;

    /// Identity handed out by the mock backend
    pub const MOCK_IDENTITY: &str = "mock-identity-123";

    /// Connection address recorded on mock sessions
    pub const MOCK_ADDRESS: &str = "mock-address";

    /// Username used when seeding demo characters
    pub const MOCK_USERNAME: &str = "mock-user";

    /// Simulated connection latency
    pub const CONNECT_DELAY: Duration = Duration::from_millis(100);

    /// Artificial delay before a reducer's completion event
    pub const REDUCER_DELAY: Duration = Duration::from_millis(500);
}

/// Game rule constants
pub mod game {
    /// Name of the counter that hands out character ids
    pub const CHARACTER_ID_COUNTER: &str = "character_id";

    /// Level of a freshly created character
    pub const STARTING_LEVEL: u32 = 1;

    /// Longest accepted username
    pub const MAX_USERNAME_LEN: usize = 32;

    /// Longest accepted character name
    pub const MAX_CHARACTER_NAME_LEN: usize = 24;

    /// Upper bound (exclusive) of spawn coordinates on both axes
    pub const SPAWN_RANGE: f32 = 500.0;

    /// Player movement speed in world units per second
    pub const PLAYER_SPEED: f32 = 150.0;

    pub const SKIN_OPTIONS: &[&str] = &["light", "medium", "dark", "tan", "olive"];
    pub const HAIR_OPTIONS: &[&str] = &["black", "brown", "blonde", "red", "white", "gray"];
    pub const EYE_OPTIONS: &[&str] = &["brown", "blue", "green", "gray", "amber"];
    pub const OUTFIT_OPTIONS: &[&str] = &["casual", "noble", "warrior", "mage", "hunter", "rogue"];
}
