pub mod deck;
pub mod engine;

pub use deck::{generate_initial_deck, role_distribution, CardValue, Deck, Role, RoleDistribution};
pub use engine::{prepare_shuffle, shuffle_and_encrypt, PreparedShuffle};
