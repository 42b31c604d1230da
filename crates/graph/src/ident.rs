use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_BLANK_NODE: AtomicU64 = AtomicU64::new(1);

/// Fresh blank-node identifier, unique within the running process
pub fn new_node_id() -> String {
    let n = NEXT_BLANK_NODE.fetch_add(1, Ordering::Relaxed);
    format!("_:b{n:05}")
}
