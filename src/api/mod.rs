pub mod feed_server;

pub use feed_server::{FeedServer, FeedServerHandle};
