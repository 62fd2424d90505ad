pub mod change_feed;
