mod test_session;

pub use test_peer::TestPeer;
pub use test_session::{init_logging, json_value, TestSession};
