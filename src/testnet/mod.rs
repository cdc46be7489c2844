//! Test helpers shared by the unit tests

pub mod test_utils;

pub use test_utils::{build_chain, create_test_node, mine_block, StaticPeers};
