mod events;

pub use events::{
    ConnectEvent, DisconnectEvent, ErrorEvent, Event, Events, HomeEvent, IdentityEvent,
    InputEvent, JoinEvent, JoinRequestEvent, MessageEvent,
};
