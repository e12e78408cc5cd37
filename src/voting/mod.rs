pub mod transfer;
pub mod winners;

pub use transfer::{transfer_winners, TransferSummary};
pub use winners::{select_winners, ScoredParticipant, Winner};
