//! Queue storage.
//!
//! One [`QueueStore`] per guild holds every waiting or matched entry and is
//! the authority on entry lock state.
//!
//! | Operation | Complexity |
//! |-----------|------------|
//! | Insert entry | O(m) for m members |
//! | Remove / lookup by id | O(1) |
//! | Member to entry lookup | O(1) |
//! | Arrival-ordered scan | O(n log n) |

pub mod store;

pub use store::QueueStore;
